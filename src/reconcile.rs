//! Desired-state reconciliation for write modules.
//!
//! Each invocation fetches the current resource, decides on exactly one
//! [`Action`] and, outside check mode, applies it:
//!
//! | observed | state   | differences | action   |
//! |----------|---------|-------------|----------|
//! | absent   | present | n/a         | Create   |
//! | absent   | absent  | n/a         | NoAction |
//! | present  | absent  | n/a         | Delete   |
//! | present  | present | none        | NoAction |
//! | present  | present | some        | Update   |
//!
//! Only a 404 counts as absence. Any other failure while reading the
//! current state aborts, so a throttled or unauthorized read can never be
//! mistaken for a missing resource.

use serde::Serialize;
use serde_json::{Map, Value};
use similar::{ChangeTag, TextDiff};
use std::fmt;
use tracing::{debug, info};

use crate::azure::{ArmError, ArmResult, ResourceClient};
use crate::modules::{Diff, ModuleError, ModuleResult};
use crate::resource::body::{self, remove_path};
use crate::resource::compare::{diff, extra_keys, Difference};
use crate::resource::{BoundArgs, LocationPolicy, ResourceDefinition, ResourceIdentity, UpdateMethod};

/// API version used to read a resource group's location.
const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";

/// The single change an invocation makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoAction,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_change(&self) -> bool {
        *self != Action::NoAction
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoAction => write!(f, "no_action"),
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Requested end state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Present,
    Absent,
}

impl DesiredState {
    pub fn from_args(args: &BoundArgs) -> Self {
        match args.str("state") {
            Some("absent") => DesiredState::Absent,
            _ => DesiredState::Present,
        }
    }
}

/// Current state of the resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Absent,
    Present(Value),
}

impl Observed {
    pub fn body(&self) -> Option<&Value> {
        match self {
            Observed::Absent => None,
            Observed::Present(body) => Some(body),
        }
    }
}

/// Read the resource at `path`. Only a 404 is reported as absent.
pub async fn fetch_observed(client: &ResourceClient, path: &str) -> ArmResult<Observed> {
    match client.get(path).await {
        Ok(body) => Ok(Observed::Present(body)),
        Err(ArmError::NotFound { .. }) => Ok(Observed::Absent),
        Err(e) => Err(e),
    }
}

/// Decided action with the body that carries it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub action: Action,
    /// Request body for Create and Update
    pub body: Value,
    pub differences: Vec<Difference>,
    pub warnings: Vec<String>,
}

/// Decide what to do, without side effects.
pub fn plan(
    definition: &ResourceDefinition,
    args: &BoundArgs,
    desired: Value,
    observed: &Observed,
) -> Plan {
    let mut plan = Plan {
        action: Action::NoAction,
        body: Value::Null,
        differences: Vec::new(),
        warnings: Vec::new(),
    };

    match (DesiredState::from_args(args), observed) {
        (DesiredState::Absent, Observed::Absent) => {}
        (DesiredState::Absent, Observed::Present(_)) => plan.action = Action::Delete,
        (DesiredState::Present, Observed::Absent) => {
            let mut body = desired;
            for path in definition.policies.update_only_paths() {
                remove_path(&mut body, path);
            }
            plan.action = Action::Create;
            plan.body = body;
        }
        (DesiredState::Present, Observed::Present(current)) => {
            let mut body = desired;
            let mut differences = Vec::new();

            if definition.taggable {
                reconcile_tags(&mut body, current, args.bool_or("append_tags", true), &mut differences);
            }

            differences.extend(diff(&body, current, &definition.policies));

            for difference in differences.iter().filter(|d| !d.updatable) {
                plan.warnings.push(format!(
                    "{} cannot be changed on an existing resource (current: {}, requested: {})",
                    difference.path, difference.observed, difference.desired
                ));
            }

            if differences.iter().any(|d| d.updatable) {
                plan.action = Action::Update;
                plan.body = match definition.update_method {
                    UpdateMethod::Patch => {
                        for difference in differences.iter().filter(|d| !d.updatable) {
                            remove_path(&mut body, &difference.path);
                        }
                        body
                    }
                    UpdateMethod::Put => replacement_body(current, &body, &differences),
                };
            }
            plan.differences = differences;
        }
    }

    plan
}

/// Keys the service maintains itself and rejects or ignores on PUT.
const READ_ONLY_KEYS: &[&str] = &["id", "type", "etag", "systemData"];

/// Body for a PUT update.
///
/// PUT replaces the whole resource, so the request starts from the observed
/// resource and the desired fields are merged over it. Tags replace the
/// observed set, and fields that cannot change keep their observed value.
fn replacement_body(current: &Value, desired: &Value, differences: &[Difference]) -> Value {
    let mut request = current.clone();
    if let Value::Object(map) = &mut request {
        for key in READ_ONLY_KEYS {
            map.remove(*key);
        }
    }
    remove_path(&mut request, "/properties/provisioningState");

    merge(&mut request, desired);
    if let (Value::Object(map), Some(tags)) = (&mut request, desired.get("tags")) {
        map.insert("tags".to_string(), tags.clone());
    }

    for difference in differences.iter().filter(|d| !d.updatable) {
        if difference.observed.is_null() {
            remove_path(&mut request, &difference.path);
        } else {
            set_path(&mut request, &difference.path, difference.observed.clone());
        }
    }
    request
}

fn set_path(body: &mut Value, path: &str, value: Value) {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if let Value::Object(map) = body {
        body::insert(map, &segments, value);
    }
}

fn reconcile_tags(
    body: &mut Value,
    current: &Value,
    append: bool,
    differences: &mut Vec<Difference>,
) {
    let observed_tags = current.get("tags").cloned().unwrap_or(Value::Object(Map::new()));
    let Some(desired_tags) = body.get("tags").cloned() else {
        return;
    };

    if append {
        let mut merged = observed_tags.as_object().cloned().unwrap_or_default();
        if let Value::Object(wanted) = desired_tags {
            merged.extend(wanted);
        }
        if let Value::Object(map) = body {
            map.insert("tags".to_string(), Value::Object(merged));
        }
    } else {
        for key in extra_keys(&desired_tags, &observed_tags) {
            differences.push(Difference {
                path: format!("/tags/{}", key),
                desired: Value::Null,
                observed: observed_tags.get(&key).cloned().unwrap_or(Value::Null),
                updatable: true,
            });
        }
    }
}

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub action: Action,
    pub changed: bool,
    pub identity: ResourceIdentity,
    /// The resource after the change, or as observed when nothing changed
    pub resource: Option<Value>,
    pub differences: Vec<Difference>,
    pub warnings: Vec<String>,
    pub diff: Option<Diff>,
}

/// Drives one write invocation against the remote service.
pub struct Reconciler<'a> {
    definition: &'a ResourceDefinition,
    client: ResourceClient,
    check_mode: bool,
    diff_mode: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(definition: &'a ResourceDefinition, client: ResourceClient) -> Self {
        Self {
            definition,
            client,
            check_mode: false,
            diff_mode: false,
        }
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }

    pub async fn reconcile(&self, args: &BoundArgs) -> ModuleResult<Outcome> {
        let definition = self.definition;
        let identity = ResourceIdentity::resolve(&definition.resource, args)?;

        let observed = fetch_observed(&self.client, &identity.path)
            .await
            .map_err(ModuleError::ObservedState)?;
        debug!(
            "{} is {}",
            identity,
            if observed.body().is_some() { "present" } else { "absent" }
        );

        let desired = body::inflate(&definition.schema, args);
        let mut plan = plan(definition, args, desired, &observed);

        if plan.action == Action::Create && plan.body.get("location").is_none() {
            match self.default_location(&identity).await {
                Ok(location) => {
                    if let Value::Object(map) = &mut plan.body {
                        map.insert("location".to_string(), Value::String(location));
                    }
                }
                Err(e) if self.check_mode => plan.warnings.push(e.to_string()),
                Err(e) => return Err(e),
            }
        }

        let diff = if self.diff_mode {
            Some(self.render_diff(&observed, &plan))
        } else {
            None
        };

        if self.check_mode || !plan.action.is_change() {
            return Ok(Outcome {
                action: plan.action,
                changed: plan.action.is_change(),
                identity,
                resource: observed.body().cloned(),
                differences: plan.differences,
                warnings: plan.warnings,
                diff,
            });
        }

        let resource = self.apply(&identity, &plan).await?;

        Ok(Outcome {
            action: plan.action,
            changed: true,
            identity,
            resource,
            differences: plan.differences,
            warnings: plan.warnings,
            diff,
        })
    }

    async fn apply(&self, identity: &ResourceIdentity, plan: &Plan) -> ModuleResult<Option<Value>> {
        let kind = self.definition.resource_type;
        match plan.action {
            Action::Create => {
                info!("Creating {} {}", kind, identity);
                let created = self.client.put(&identity.path, &plan.body).await?;
                Ok(Some(created))
            }
            Action::Update => {
                let paths: Vec<&str> = plan.differences.iter().map(|d| d.path.as_str()).collect();
                info!("Updating {} {} ({})", kind, identity, paths.join(", "));
                let updated = match self.definition.update_method {
                    UpdateMethod::Put => self.client.put(&identity.path, &plan.body).await?,
                    UpdateMethod::Patch => self.client.patch(&identity.path, &plan.body).await?,
                };
                Ok(Some(updated))
            }
            Action::Delete => {
                info!("Deleting {} {}", kind, identity);
                self.client.delete(&identity.path).await?;
                Ok(None)
            }
            Action::NoAction => Ok(None),
        }
    }

    async fn default_location(&self, identity: &ResourceIdentity) -> ModuleResult<String> {
        match self.definition.location {
            LocationPolicy::Fixed(location) => Ok(location.to_string()),
            LocationPolicy::Required => Err(ModuleError::MissingParameter(
                "location (required when creating)".to_string(),
            )),
            LocationPolicy::ResourceGroup => {
                let path = identity.resource_group_path().ok_or_else(|| {
                    ModuleError::MissingParameter("location (required when creating)".to_string())
                })?;
                let group = self
                    .client
                    .with_api_version(RESOURCE_GROUP_API_VERSION)
                    .get(&path)
                    .await
                    .map_err(|e| match e {
                        ArmError::NotFound { .. } => ModuleError::ExecutionFailed(format!(
                            "resource group '{}' does not exist",
                            identity.resource_group.as_deref().unwrap_or_default()
                        )),
                        other => ModuleError::Api(other),
                    })?;
                let location = group
                    .get("location")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ModuleError::ExecutionFailed(format!("resource group {} has no location", path))
                    })?;
                debug!("Defaulting location of {} to {}", identity, location);
                Ok(location.to_string())
            }
        }
    }

    fn render_diff(&self, observed: &Observed, plan: &Plan) -> Diff {
        let policies = &self.definition.policies;
        let before = match observed {
            Observed::Absent => Value::Object(Map::new()),
            Observed::Present(body) => policies.redact(body),
        };
        let after = match plan.action {
            Action::Delete => Value::Object(Map::new()),
            Action::NoAction => before.clone(),
            Action::Create | Action::Update => {
                let request = policies.redact(&plan.body);
                let mut merged = before.clone();
                merge(&mut merged, &request);
                if let (Value::Object(map), Some(tags)) = (&mut merged, request.get("tags")) {
                    map.insert("tags".to_string(), tags.clone());
                }
                merged
            }
        };

        let before = serde_json::to_string_pretty(&before).unwrap_or_default() + "\n";
        let after = serde_json::to_string_pretty(&after).unwrap_or_default() + "\n";
        let details = unified(&before, &after);
        Diff::new(before, after).with_details(details)
    }
}

/// Deep-merge `patch` into `target`; objects merge, everything else replaces.
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (key, value) in p {
                if value.is_null() {
                    continue;
                }
                match t.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        t.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (t, p) => *t = p.clone(),
    }
}

fn unified(before: &str, after: &str) -> String {
    let text_diff = TextDiff::from_lines(before, after);
    let mut details = String::from("--- before\n+++ after\n");
    for change in text_diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        details.push_str(sign);
        details.push_str(change.as_str().unwrap_or_default());
        if change.missing_newline() {
            details.push('\n');
        }
    }
    details
}
