//! Generic write module: ensures a resource is present with the requested
//! configuration, or absent.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{Module, ModuleContext, ModuleOutput, ModuleParams, ModuleResult};
use crate::azure::ResourceClient;
use crate::normalize::{normalize, Response};
use crate::reconcile::{Action, Outcome, Reconciler};
use crate::resource::{ArgumentSchema, ResourceDefinition};

/// Write module for one resource definition.
pub struct ResourceModule {
    definition: Arc<ResourceDefinition>,
}

impl ResourceModule {
    pub fn new(definition: Arc<ResourceDefinition>) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    fn message(&self, outcome: &Outcome, check_mode: bool) -> String {
        let kind = self.definition.resource_type;
        let name = &outcome.identity.name;
        match (outcome.action, check_mode) {
            (Action::NoAction, _) => format!("{} '{}' is up to date", kind, name),
            (Action::Create, false) => format!("Created {} '{}'", kind, name),
            (Action::Create, true) => format!("Would create {} '{}'", kind, name),
            (Action::Update, false) => format!("Updated {} '{}'", kind, name),
            (Action::Update, true) => format!("Would update {} '{}'", kind, name),
            (Action::Delete, false) => format!("Deleted {} '{}'", kind, name),
            (Action::Delete, true) => format!("Would delete {} '{}'", kind, name),
        }
    }
}

#[async_trait]
impl Module for ResourceModule {
    fn name(&self) -> &str {
        self.definition.module_name
    }

    fn description(&self) -> &str {
        self.definition.description
    }

    fn schema(&self) -> &ArgumentSchema {
        &self.definition.schema
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let definition = &self.definition;
        let args = definition.schema.bind(params, &context.defaults())?;
        debug!(
            "{} arguments: {}",
            definition.module_name,
            definition.schema.redact(&args)
        );

        let client = ResourceClient::new(context.api()?, definition.api_version);
        let outcome = Reconciler::new(definition, client)
            .with_check_mode(context.check_mode)
            .with_diff_mode(context.diff_mode)
            .reconcile(&args)
            .await?;

        let msg = self.message(&outcome, context.check_mode);
        let mut output = if outcome.changed {
            ModuleOutput::changed(msg)
        } else {
            ModuleOutput::ok(msg)
        };

        let id = outcome
            .resource
            .as_ref()
            .and_then(|r| r.get("id"))
            .cloned()
            .unwrap_or_else(|| Value::String(outcome.identity.path.clone()));

        output = output
            .with_data("action", Value::String(outcome.action.to_string()))
            .with_data("id", id);

        if let Some(resource) = &outcome.resource {
            let redacted = definition.policies.redact(resource);
            if let Some(map) = normalize(Response::Single(redacted)).into_iter().next() {
                output = output.with_data("resource", Value::Object(map));
            }
        }

        if !outcome.differences.is_empty() {
            let paths = outcome
                .differences
                .iter()
                .map(|d| Value::String(d.path.clone()))
                .collect();
            output = output.with_data("differences", Value::Array(paths));
        }

        if let Some(diff) = outcome.diff {
            output = output.with_diff(diff);
        }

        Ok(output.with_warnings(outcome.warnings))
    }
}
