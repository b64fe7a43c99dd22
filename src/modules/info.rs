//! Generic info module: reads one resource or a collection of them.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{Module, ModuleContext, ModuleOutput, ModuleParams, ModuleResult};
use crate::azure::ResourceClient;
use crate::dispatch::dispatch;
use crate::normalize::normalize;
use crate::resource::{ArgumentSchema, ResourceDefinition};

/// Read-only companion of a [`ResourceModule`](super::ResourceModule).
pub struct ResourceInfoModule {
    definition: Arc<ResourceDefinition>,
    name: String,
    description: String,
}

impl ResourceInfoModule {
    pub fn new(definition: Arc<ResourceDefinition>) -> Self {
        let name = definition.info_module_name();
        let description = format!("Get facts for {}", definition.resource_type);
        Self {
            definition,
            name,
            description,
        }
    }
}

#[async_trait]
impl Module for ResourceInfoModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &ArgumentSchema {
        &self.definition.info_schema
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let definition = &self.definition;
        let args = definition.info_schema.bind(params, &context.defaults())?;
        let client = ResourceClient::new(context.api()?, definition.api_version);

        let outcome = dispatch(&client, &definition.rules, &args).await?;
        let items: Vec<Value> = normalize(outcome.response)
            .into_iter()
            .map(|item| definition.policies.redact(&Value::Object(item)))
            .collect();

        Ok(ModuleOutput::ok(format!("Found {} {}", items.len(), definition.info_key))
            .with_data(definition.info_key, Value::Array(items))
            .with_warnings(outcome.warnings))
    }
}
