//! Integration tests for the Resource Manager client using wiremock
//!
//! These tests verify request shaping, pagination, retries and
//! long-running operation polling against mocked endpoints.

mod common;

use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use rustible_azure::azure::{ArmError, ManagementApi, PollConfig};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VERSION: &str = "2023-01-01";

mod request_tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[tokio::test]
    async fn test_get_sends_token_and_api_version() {
        let server = MockServer::start().await;
        let account = storage_account("rg", "sa1", "Standard_LRS");

        Mock::given(method("GET"))
            .and(path(storage_account_path("rg", "sa1")))
            .and(query_param("api-version", VERSION))
            .and(bearer_token(TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(&account))
            .expect(1)
            .mount(&server)
            .await;

        let client = arm_client(&server);
        let body = client
            .get(&storage_account_path("rg", "sa1"), VERSION)
            .await
            .unwrap();
        assert_eq!(body, account);
    }

    #[tokio::test]
    async fn test_get_404_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(arm_error("ResourceNotFound", "gone")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = arm_client(&server)
            .get(&storage_account_path("rg", "missing"), VERSION)
            .await
            .unwrap_err();
        assert!(matches!(err, ArmError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(arm_error("InvalidResourceName", "bad name")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = arm_client(&server)
            .put(&storage_account_path("rg", "BAD"), VERSION, &json!({}))
            .await
            .unwrap_err();
        match err {
            ArmError::Api { status, code, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code, "InvalidResourceName");
                assert_eq!(message, "bad name");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_of_missing_resource_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(storage_account_path("rg", "gone")))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        arm_client(&server)
            .delete(&storage_account_path("rg", "gone"), VERSION)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_204_finishes_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        arm_client(&server)
            .delete(&storage_account_path("rg", "sa1"), VERSION)
            .await
            .unwrap();
    }
}

mod retry_tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[tokio::test]
    async fn test_throttled_request_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "0")
                    .set_body_json(arm_error("TooManyRequests", "slow down")),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "sa1"})))
            .expect(1)
            .mount(&server)
            .await;

        let body = arm_client(&server)
            .get(&storage_account_path("rg", "sa1"), VERSION)
            .await
            .unwrap();
        assert_eq!(body["name"], "sa1");
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let server = MockServer::start().await;

        // One attempt plus two retries
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(arm_error("ServiceUnavailable", "busy")),
            )
            .expect(3)
            .mount(&server)
            .await;

        let err = arm_client(&server)
            .get(&storage_account_path("rg", "sa1"), VERSION)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, ArmError::Api { status: 503, .. }));
    }
}

mod pagination_tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[tokio::test]
    async fn test_list_follows_next_link() {
        let server = MockServer::start().await;
        let collection = storage_accounts_path("rg");
        let next = format!(
            "{}{}?api-version={}&$skiptoken=page2",
            server.uri(),
            collection,
            VERSION
        );

        Mock::given(method("GET"))
            .and(path(collection.clone()))
            .and(query_param("$skiptoken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [storage_account("rg", "c", "Standard_LRS")]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(collection.clone()))
            .and(query_param("api-version", VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    storage_account("rg", "a", "Standard_LRS"),
                    storage_account("rg", "b", "Standard_GRS")
                ],
                "nextLink": next
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = arm_client(&server)
            .list(&collection, VERSION, None)
            .await
            .unwrap();
        let names: Vec<&str> = items.iter().map(|i| i["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_passes_filter() {
        let server = MockServer::start().await;
        let groups = format!("/subscriptions/{}/resourcegroups", SUBSCRIPTION);

        Mock::given(method("GET"))
            .and(path(groups.clone()))
            .and(query_param("$filter", "tagName eq 'env'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"name": "rg1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = arm_client(&server)
            .list(&groups, "2021-04-01", Some("tagName eq 'env'".to_string()))
            .await
            .unwrap();
        assert_eq!(items, vec![json!({"name": "rg1"})]);
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .mount(&server)
            .await;

        let items = arm_client(&server)
            .list(&storage_accounts_path("rg"), VERSION, None)
            .await
            .unwrap();
        assert!(items.is_empty());
    }
}

mod long_running_tests {
    use pretty_assertions::assert_eq;
    use super::*;

    #[tokio::test]
    async fn test_put_polls_async_operation() {
        let server = MockServer::start().await;
        let resource = storage_account_path("rg", "sa1");
        let body = json!({"location": "westeurope", "sku": {"name": "Standard_LRS"}});
        let monitor = format!("{}/providers/Microsoft.Storage/operations/op1", server.uri());

        Mock::given(method("PUT"))
            .and(path(resource.clone()))
            .and(body_json(&body))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", monitor.as_str())
                    .set_body_json(json!({"properties": {"provisioningState": "Creating"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/providers/Microsoft.Storage/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/providers/Microsoft.Storage/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(resource.clone()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(storage_account("rg", "sa1", "Standard_LRS")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let created = arm_client(&server).put(&resource, VERSION, &body).await.unwrap();
        assert_eq!(created["properties"]["provisioningState"], "Succeeded");
    }

    #[tokio::test]
    async fn test_failed_async_operation_is_an_error() {
        let server = MockServer::start().await;
        let monitor = format!("{}/operations/op2", server.uri());

        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", monitor.as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": {"code": "Conflict", "message": "name already taken"}
            })))
            .mount(&server)
            .await;

        let err = arm_client(&server)
            .put(&storage_account_path("rg", "sa1"), VERSION, &json!({}))
            .await
            .unwrap_err();
        match err {
            ArmError::OperationFailed { status, code, message } => {
                assert_eq!(status, "Failed");
                assert_eq!(code, "Conflict");
                assert_eq!(message, "name already taken");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_polls_location() {
        let server = MockServer::start().await;
        let resource = resource_group_path("rg-old");
        let location = format!("{}/operationresults/op3", server.uri());

        Mock::given(method("DELETE"))
            .and(path(resource.clone()))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", location.as_str()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operationresults/op3"))
            .respond_with(ResponseTemplate::new(202))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operationresults/op3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        arm_client(&server)
            .delete(&resource, "2021-04-01")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_polls_provisioning_state() {
        let server = MockServer::start().await;
        let resource = storage_account_path("rg", "sa1");
        let mut updating = storage_account("rg", "sa1", "Standard_GRS");
        updating["properties"]["provisioningState"] = json!("Updating");

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&updating))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(resource.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(&updating))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(resource.clone()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(storage_account("rg", "sa1", "Standard_GRS")),
            )
            .mount(&server)
            .await;

        let updated = arm_client(&server)
            .put(&resource, VERSION, &json!({"sku": {"name": "Standard_GRS"}}))
            .await
            .unwrap();
        assert_eq!(updated["properties"]["provisioningState"], "Succeeded");
        assert_eq!(updated["sku"]["name"], "Standard_GRS");
    }

    #[tokio::test]
    async fn test_poll_deadline_times_out() {
        let server = MockServer::start().await;
        let monitor = format!("{}/operations/stuck", server.uri());

        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", monitor.as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/stuck"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
            .mount(&server)
            .await;

        let config = rustible_azure::azure::ArmClientConfig {
            poll: PollConfig {
                interval: Duration::from_millis(10),
                timeout: Duration::from_millis(100),
            },
            ..test_client_config(&server.uri())
        };
        let err = arm_client_with(config)
            .put(&storage_account_path("rg", "sa1"), VERSION, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArmError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_synchronous_put_returns_body() {
        let server = MockServer::start().await;
        let account = storage_account("rg", "sa1", "Standard_LRS");

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&account))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let created = arm_client(&server)
            .put(&storage_account_path("rg", "sa1"), VERSION, &json!({}))
            .await
            .unwrap();
        assert_eq!(created, account);
    }

    #[tokio::test]
    async fn test_synchronous_put_with_failed_provisioning() {
        let server = MockServer::start().await;
        let mut account = storage_account("rg", "sa1", "Standard_LRS");
        account["properties"]["provisioningState"] = json!("Failed");

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&account))
            .expect(1)
            .mount(&server)
            .await;

        let err = arm_client(&server)
            .put(&storage_account_path("rg", "sa1"), VERSION, &json!({}))
            .await
            .unwrap_err();
        match err {
            ArmError::OperationFailed { status, .. } => assert_eq!(status, "Failed"),
            other => panic!("expected OperationFailed, got {:?}", other),
        }
    }
}
