//! Long-running operation polling.
//!
//! Resource Manager reports asynchronous work in one of three ways, checked
//! in this order:
//!
//! 1. An `Azure-AsyncOperation` header naming a status monitor that reports
//!    `InProgress` until it reaches `Succeeded`, `Failed` or `Canceled`
//! 2. A `Location` header on a `202 Accepted` that keeps answering 202 until
//!    the work is done
//! 3. A `properties.provisioningState` on the returned resource, polled by
//!    re-reading the resource itself

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::client::{ArmClient, RawResponse};
use super::error::{ArmError, ArmResult, ErrorDetail};

/// Polling cadence and deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between polls when the service gives no `Retry-After`
    pub interval: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1800),
        }
    }
}

/// How the outcome of an accepted request is observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollStrategy {
    AsyncOperation(String),
    Location(String),
    ProvisioningState,
    Done,
}

impl PollStrategy {
    pub fn detect(response: &RawResponse, method: &Method) -> Self {
        if let Some(url) = response.header("azure-asyncoperation") {
            return Self::AsyncOperation(url.to_string());
        }
        if response.status == 202 {
            if let Some(url) = response.header("location") {
                return Self::Location(url.to_string());
            }
        }
        if *method != Method::DELETE {
            if let Ok(body) = response.json() {
                if provisioning_state(&body).is_some_and(|s| !is_terminal(s)) {
                    return Self::ProvisioningState;
                }
            }
        }
        Self::Done
    }
}

fn provisioning_state(body: &Value) -> Option<&str> {
    body.pointer("/properties/provisioningState")
        .and_then(|v| v.as_str())
}

fn is_terminal(state: &str) -> bool {
    matches!(
        state.to_ascii_lowercase().as_str(),
        "succeeded" | "failed" | "canceled" | "cancelled"
    )
}

/// Reject a resource whose provisioning ended in `Failed` or `Canceled`.
fn ensure_provisioned(path: &str, body: Value) -> ArmResult<Value> {
    match provisioning_state(&body) {
        Some(state) if is_terminal(state) && !state.eq_ignore_ascii_case("succeeded") => {
            Err(ArmError::OperationFailed {
                status: state.to_string(),
                code: String::from("ProvisioningFailed"),
                message: format!("provisioning of {} ended in state {}", path, state),
            })
        }
        _ => Ok(body),
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    status: String,
    error: Option<ErrorDetail>,
}

/// Wait until the request that produced `initial` has finished.
///
/// Returns the final resource for `PUT`/`PATCH`, and `Null` for `DELETE`.
pub(crate) async fn wait_for_completion(
    client: &ArmClient,
    initial: RawResponse,
    method: Method,
    path: &str,
    api_version: &str,
) -> ArmResult<Value> {
    let config = client.poll_config().clone();
    let deadline = Instant::now() + config.timeout;
    let strategy = PollStrategy::detect(&initial, &method);
    trace!("{} {} completes via {:?}", method, path, strategy);

    let mut delay = initial.retry_after().unwrap_or(config.interval);
    let check_deadline = |path: &str| -> ArmResult<()> {
        if Instant::now() >= deadline {
            Err(ArmError::Timeout {
                path: path.to_string(),
                timeout_secs: config.timeout.as_secs(),
            })
        } else {
            Ok(())
        }
    };

    match strategy {
        PollStrategy::Done => {
            let body = initial.json()?;
            if method == Method::DELETE {
                Ok(Value::Null)
            } else if body.is_null() {
                get_resource(client, path, api_version).await
            } else {
                ensure_provisioned(path, body)
            }
        }

        PollStrategy::AsyncOperation(url) => {
            loop {
                check_deadline(path)?;
                tokio::time::sleep(delay).await;

                let response = client.send(Method::GET, &url, None, &[], None).await?;
                let status: OperationStatus = serde_json::from_str(&response.body)?;
                debug!("Operation on {} is {}", path, status.status);

                match status.status.to_ascii_lowercase().as_str() {
                    "succeeded" => break,
                    "failed" | "canceled" | "cancelled" => {
                        let detail = status.error.unwrap_or(ErrorDetail {
                            code: String::from("Unknown"),
                            message: String::new(),
                        });
                        return Err(ArmError::OperationFailed {
                            status: status.status,
                            code: detail.code,
                            message: detail.message,
                        });
                    }
                    _ => delay = response.retry_after().unwrap_or(config.interval),
                }
            }

            if method == Method::DELETE {
                Ok(Value::Null)
            } else {
                get_resource(client, path, api_version).await
            }
        }

        PollStrategy::Location(url) => {
            let body = loop {
                check_deadline(path)?;
                tokio::time::sleep(delay).await;

                let response = match client.send(Method::GET, &url, None, &[], None).await {
                    Ok(response) => response,
                    Err(ArmError::NotFound { .. }) if method == Method::DELETE => {
                        return Ok(Value::Null)
                    }
                    Err(e) => return Err(e),
                };

                if response.status != 202 {
                    break response.json()?;
                }
                debug!("Operation on {} still running", path);
                delay = response.retry_after().unwrap_or(config.interval);
            };

            if method == Method::DELETE {
                Ok(Value::Null)
            } else if body.is_null() {
                get_resource(client, path, api_version).await
            } else {
                ensure_provisioned(path, body)
            }
        }

        PollStrategy::ProvisioningState => loop {
            check_deadline(path)?;
            tokio::time::sleep(delay).await;

            let body = get_resource(client, path, api_version).await?;
            match provisioning_state(&body) {
                Some(state) if !is_terminal(state) => debug!("{} is {}", path, state),
                _ => return ensure_provisioned(path, body),
            }
            delay = config.interval;
        },
    }
}

async fn get_resource(client: &ArmClient, path: &str, api_version: &str) -> ArmResult<Value> {
    client
        .send(Method::GET, path, Some(api_version), &[], None)
        .await?
        .json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response(status: u16, headers: &[(&'static str, &'static str)], body: &str) -> RawResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(value));
        }
        RawResponse {
            status,
            headers: map,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_async_operation_header_wins() {
        let r = response(
            201,
            &[
                ("azure-asyncoperation", "https://x/op"),
                ("location", "https://x/loc"),
            ],
            "",
        );
        assert_eq!(
            PollStrategy::detect(&r, &Method::PUT),
            PollStrategy::AsyncOperation("https://x/op".into())
        );
    }

    #[test]
    fn test_location_only_on_accepted() {
        let accepted = response(202, &[("location", "https://x/loc")], "");
        assert_eq!(
            PollStrategy::detect(&accepted, &Method::DELETE),
            PollStrategy::Location("https://x/loc".into())
        );

        let created = response(201, &[("location", "https://x/loc")], "{}");
        assert_eq!(PollStrategy::detect(&created, &Method::PUT), PollStrategy::Done);
    }

    #[test]
    fn test_provisioning_state_in_progress() {
        let r = response(201, &[], r#"{"properties":{"provisioningState":"Creating"}}"#);
        assert_eq!(
            PollStrategy::detect(&r, &Method::PUT),
            PollStrategy::ProvisioningState
        );

        let done = response(200, &[], r#"{"properties":{"provisioningState":"Succeeded"}}"#);
        assert_eq!(PollStrategy::detect(&done, &Method::PUT), PollStrategy::Done);
    }

    #[test]
    fn test_failed_provisioning_is_an_error() {
        let failed = serde_json::json!({"properties": {"provisioningState": "Failed"}});
        let err = ensure_provisioned("/x", failed).unwrap_err();
        assert!(matches!(err, ArmError::OperationFailed { ref status, .. } if status == "Failed"));

        let ok = serde_json::json!({"properties": {"provisioningState": "Succeeded"}});
        assert!(ensure_provisioned("/x", ok).is_ok());
        assert!(ensure_provisioned("/x", serde_json::json!({"name": "x"})).is_ok());
    }

    #[test]
    fn test_terminal_states() {
        assert!(is_terminal("Succeeded"));
        assert!(is_terminal("Canceled"));
        assert!(!is_terminal("Updating"));
    }
}
