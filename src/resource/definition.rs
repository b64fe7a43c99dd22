//! Declarative resource definitions.
//!
//! A [`ResourceDefinition`] is everything the generic write and info
//! modules need to manage one ARM resource type: its address template,
//! pinned API version, argument schemas, field policies and read
//! operations. Arguments shared by every module (`state`, `subscription_id`,
//! `location`, `tags`, ...) are injected by the builder.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::identity::{PathTemplate, NAME, RESOURCE_GROUP, SUBSCRIPTION_ID};
use super::schema::{ArgSpec, ArgType, ArgumentSchema, FieldPolicies, FieldPolicy};

/// HTTP verb used to apply changes to an existing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    #[default]
    Put,
    Patch,
}

/// Where the `location` of a new resource comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPolicy {
    /// Must be supplied on create
    Required,
    /// Defaults to the location of the enclosing resource group
    ResourceGroup,
    /// Defaults to a fixed value (`global` for DNS zones)
    Fixed(&'static str),
}

/// Remote read operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Get => write!(f, "get"),
            Operation::List => write!(f, "list"),
        }
    }
}

/// One read operation, selected when all its placeholders are bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRule {
    pub operation: Operation,
    pub template: PathTemplate,
    /// Accepts an OData `$filter`
    pub filterable: bool,
}

impl DispatchRule {
    pub fn get(template: &str) -> Self {
        Self {
            operation: Operation::Get,
            template: PathTemplate::new(template),
            filterable: false,
        }
    }

    pub fn list(template: &str) -> Self {
        Self {
            operation: Operation::List,
            template: PathTemplate::new(template),
            filterable: false,
        }
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    fn placeholder_set(&self) -> BTreeSet<&str> {
        self.template.placeholders().into_iter().collect()
    }
}

/// A managed ARM resource type.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    /// Write module name, e.g. `azure_rm_storageaccount`
    pub module_name: &'static str,
    pub description: &'static str,
    /// ARM type, e.g. `Microsoft.Storage/storageAccounts`
    pub resource_type: &'static str,
    pub api_version: &'static str,
    /// Address of a single resource
    pub resource: PathTemplate,
    pub location: LocationPolicy,
    pub taggable: bool,
    pub update_method: UpdateMethod,
    /// Output key of the info module
    pub info_key: &'static str,
    pub schema: ArgumentSchema,
    pub info_schema: ArgumentSchema,
    pub rules: Vec<DispatchRule>,
    pub policies: FieldPolicies,
}

impl ResourceDefinition {
    pub fn builder(
        module_name: &'static str,
        resource_type: &'static str,
        api_version: &'static str,
        resource: &str,
    ) -> ResourceDefinitionBuilder {
        ResourceDefinitionBuilder {
            module_name,
            description: "",
            resource_type,
            api_version,
            resource: PathTemplate::new(resource),
            location: LocationPolicy::Required,
            taggable: true,
            update_method: UpdateMethod::Put,
            info_key: "",
            args: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Name of the companion info module.
    pub fn info_module_name(&self) -> String {
        format!("{}_info", self.module_name)
    }

    pub fn has_filterable_rule(&self) -> bool {
        self.rules.iter().any(|r| r.filterable)
    }
}

/// Problems found when assembling a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("{module}: rules '{first}' and '{second}' bind the same arguments")]
    AmbiguousRules {
        module: &'static str,
        first: String,
        second: String,
    },

    #[error("{module}: no read operations declared")]
    NoRules { module: &'static str },

    #[error("{module}: duplicate argument '{name}'")]
    DuplicateArgument { module: &'static str, name: String },
}

pub struct ResourceDefinitionBuilder {
    module_name: &'static str,
    description: &'static str,
    resource_type: &'static str,
    api_version: &'static str,
    resource: PathTemplate,
    location: LocationPolicy,
    taggable: bool,
    update_method: UpdateMethod,
    info_key: &'static str,
    args: Vec<ArgSpec>,
    rules: Vec<DispatchRule>,
}

impl ResourceDefinitionBuilder {
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn location(mut self, location: LocationPolicy) -> Self {
        self.location = location;
        self
    }

    pub fn taggable(mut self, taggable: bool) -> Self {
        self.taggable = taggable;
        self
    }

    pub fn update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    pub fn info_key(mut self, key: &'static str) -> Self {
        self.info_key = key;
        self
    }

    /// Resource-specific argument.
    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    /// Read operation, in priority order.
    pub fn rule(mut self, rule: DispatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn build(self) -> Result<ResourceDefinition, DefinitionError> {
        let module = self.module_name;

        if self.rules.is_empty() {
            return Err(DefinitionError::NoRules { module });
        }
        for (i, first) in self.rules.iter().enumerate() {
            for second in &self.rules[i + 1..] {
                if first.placeholder_set() == second.placeholder_set() {
                    return Err(DefinitionError::AmbiguousRules {
                        module,
                        first: first.template.to_string(),
                        second: second.template.to_string(),
                    });
                }
            }
        }

        let schema = self.write_schema()?;
        let info_schema = self.info_schema();
        let policies = FieldPolicies::from_schema(&schema);

        Ok(ResourceDefinition {
            module_name: self.module_name,
            description: self.description,
            resource_type: self.resource_type,
            api_version: self.api_version,
            resource: self.resource,
            location: self.location,
            taggable: self.taggable,
            update_method: self.update_method,
            info_key: self.info_key,
            schema,
            info_schema,
            rules: self.rules,
            policies,
        })
    }

    fn write_schema(&self) -> Result<ArgumentSchema, DefinitionError> {
        let mut schema = ArgumentSchema::default();

        for placeholder in self.resource.placeholders() {
            schema.push(identity_arg(placeholder, true));
        }

        schema.push(
            ArgSpec::new("state", ArgType::choice(["present", "absent"]))
                .default_value("present")
                .describe("Assert the state of the resource."),
        );

        let location = ArgSpec::new("location", ArgType::Str)
            .body("/location")
            .policy(FieldPolicy::location())
            .describe("Resource location.");
        schema.push(match self.location {
            LocationPolicy::Fixed(value) => location.default_value(value),
            _ => location,
        });

        if self.taggable {
            schema.push(
                ArgSpec::new("tags", ArgType::Dict)
                    .body("/tags")
                    .describe("Resource tags."),
            );
            schema.push(
                ArgSpec::new("append_tags", ArgType::Bool)
                    .default_value(true)
                    .describe("Merge tags with the existing ones instead of replacing them."),
            );
        }

        for spec in &self.args {
            if schema.get(&spec.name).is_some() {
                return Err(DefinitionError::DuplicateArgument {
                    module: self.module_name,
                    name: spec.name.clone(),
                });
            }
            schema.push(spec.clone());
        }

        Ok(schema)
    }

    fn info_schema(&self) -> ArgumentSchema {
        let mut schema = ArgumentSchema::default();
        let mut seen = BTreeSet::new();

        for rule in &self.rules {
            for placeholder in rule.template.placeholders() {
                if seen.insert(placeholder.to_string()) {
                    schema.push(identity_arg(placeholder, placeholder == SUBSCRIPTION_ID));
                }
            }
        }
        if seen.insert(SUBSCRIPTION_ID.to_string()) {
            schema.push(identity_arg(SUBSCRIPTION_ID, true));
        }

        schema.push(
            ArgSpec::new("tags", ArgType::list_of(ArgType::Str))
                .describe("Limit results by tag, given as 'key' or 'key:value'."),
        );
        if self.rules.iter().any(|r| r.filterable) {
            schema.push(
                ArgSpec::new("filter", ArgType::Str)
                    .describe("OData filter applied by the service to list operations."),
            );
        }

        schema
    }
}

fn identity_arg(name: &str, required: bool) -> ArgSpec {
    let spec = ArgSpec::new(name, ArgType::Str);
    let spec = if required { spec.required() } else { spec };
    match name {
        SUBSCRIPTION_ID => spec.describe("Subscription id, defaults to the configured subscription."),
        RESOURCE_GROUP => spec
            .alias("resource_group_name")
            .describe("Name of the resource group."),
        NAME => spec.describe("Name of the resource."),
        parent => {
            let text = format!("Name of the parent {}.", parent.trim_end_matches("_name"));
            spec.describe(text)
        }
    }
}
