//! Argument schema and binding.
//!
//! An [`ArgumentSchema`] declares the inputs a module accepts. Binding a
//! flat parameter mapping against it produces an immutable [`BoundArgs`]
//! record with aliases resolved, values coerced to their declared types,
//! defaults applied and nested option groups validated.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use super::body::body_path;
use crate::modules::{ModuleError, ModuleParams, ModuleResult};

/// Placeholder written in place of secret values.
pub const REDACTED: &str = "********";

/// Declared type of an argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "of")]
pub enum ArgType {
    Str,
    Int,
    Float,
    Bool,
    List(Box<ArgType>),
    Dict,
    /// Nested option group with its own sub-arguments
    Group(Vec<ArgSpec>),
    /// String restricted to the listed values (case-sensitive)
    Choice(Vec<String>),
}

impl ArgType {
    pub fn list_of(inner: ArgType) -> Self {
        ArgType::List(Box::new(inner))
    }

    pub fn choice<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgType::Choice(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Str => write!(f, "str"),
            ArgType::Int => write!(f, "int"),
            ArgType::Float => write!(f, "float"),
            ArgType::Bool => write!(f, "bool"),
            ArgType::List(inner) => write!(f, "list[{}]", inner),
            ArgType::Dict => write!(f, "dict"),
            ArgType::Group(_) => write!(f, "group"),
            ArgType::Choice(values) => write!(f, "choice[{}]", values.join("|")),
        }
    }
}

/// How a body field takes part in change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Never compared
    Ignore,
    /// Compared with the field's matcher
    #[default]
    Compare,
    /// Left out of create bodies; compared and sent only on update
    UpdateOnly,
}

/// How two string values of a field are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    #[default]
    Exact,
    CaseInsensitive,
    /// Region names: case and spaces are insignificant (`West US` == `westus`)
    Location,
}

impl Matcher {
    pub fn matches(&self, desired: &str, observed: &str) -> bool {
        match self {
            Matcher::Exact => desired == observed,
            Matcher::CaseInsensitive => desired.eq_ignore_ascii_case(observed),
            Matcher::Location => normalize_location(desired) == normalize_location(observed),
        }
    }
}

/// Lowercase a region name and drop its spaces.
pub fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Per-field comparison policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldPolicy {
    pub comparison: Comparison,
    pub matcher: Matcher,
    /// When false, differences are reported but never trigger an update
    pub updatable: bool,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            comparison: Comparison::Compare,
            matcher: Matcher::Exact,
            updatable: true,
        }
    }
}

impl FieldPolicy {
    pub fn ignore() -> Self {
        Self {
            comparison: Comparison::Ignore,
            ..Self::default()
        }
    }

    pub fn update_only() -> Self {
        Self {
            comparison: Comparison::UpdateOnly,
            ..Self::default()
        }
    }

    pub fn case_insensitive() -> Self {
        Self {
            matcher: Matcher::CaseInsensitive,
            ..Self::default()
        }
    }

    pub fn location() -> Self {
        Self {
            matcher: Matcher::Location,
            updatable: false,
            ..Self::default()
        }
    }

    /// Set at creation, cannot be changed afterwards.
    pub fn create_only() -> Self {
        Self {
            updatable: false,
            ..Self::default()
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }
}

/// Declaration of one argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub no_log: bool,
    /// Where the value lands in the request body; `None` for identity and
    /// control arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    pub policy: FieldPolicy,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>, arg_type: ArgType) -> Self {
        Self {
            name: name.into(),
            arg_type,
            required: false,
            default: None,
            aliases: Vec::new(),
            no_log: false,
            disposition: None,
            policy: FieldPolicy::default(),
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn no_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    /// Place the value at `path` in the request body.
    pub fn body(mut self, path: impl Into<String>) -> Self {
        self.disposition = Some(path.into());
        self
    }

    /// Shorthand for `body("/properties/*")`.
    pub fn property(self) -> Self {
        self.body("/properties/*")
    }

    pub fn policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn matches_name(&self, key: &str) -> bool {
        self.name == key || self.aliases.iter().any(|a| a == key)
    }
}

/// The set of arguments a module accepts.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ArgumentSchema {
    specs: Vec<ArgSpec>,
}

impl ArgumentSchema {
    pub fn new(specs: Vec<ArgSpec>) -> Self {
        Self { specs }
    }

    pub fn push(&mut self, spec: ArgSpec) {
        self.specs.push(spec);
    }

    pub fn specs(&self) -> &[ArgSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ArgSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Bind `params` to this schema.
    ///
    /// `defaults` supplies values for arguments the caller left out (the
    /// context subscription, for example) and take precedence over the
    /// declared defaults.
    pub fn bind(&self, params: &ModuleParams, defaults: &ModuleParams) -> ModuleResult<BoundArgs> {
        let provided: Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let values = bind_specs(&self.specs, &provided, Some(defaults), "")?;
        Ok(BoundArgs { values })
    }

    /// Reject parameter names that are neither an argument nor an alias.
    pub fn check_supported(&self, params: &ModuleParams) -> ModuleResult<()> {
        let mut unsupported: Vec<&str> = params
            .keys()
            .filter(|key| !self.specs.iter().any(|s| s.matches_name(key)))
            .map(|key| key.as_str())
            .collect();
        if unsupported.is_empty() {
            return Ok(());
        }
        unsupported.sort_unstable();
        Err(ModuleError::UnsupportedParameter {
            names: unsupported.join(", "),
            supported: supported_names(&self.specs),
        })
    }

    /// Copy of `args` with secret values masked.
    pub fn redact(&self, args: &BoundArgs) -> Value {
        let mut out = Map::new();
        for (name, value) in args.iter() {
            let masked = match self.get(name) {
                Some(spec) => redact_value(spec, value),
                None => value.clone(),
            };
            out.insert(name.clone(), masked);
        }
        Value::Object(out)
    }
}

fn redact_value(spec: &ArgSpec, value: &Value) -> Value {
    if spec.no_log {
        return Value::String(REDACTED.to_string());
    }
    match (&spec.arg_type, value) {
        (ArgType::Group(children), Value::Object(map)) => redact_group(children, map),
        (ArgType::List(inner), Value::Array(items)) => match inner.as_ref() {
            ArgType::Group(children) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => redact_group(children, map),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn redact_group(children: &[ArgSpec], map: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    for (key, value) in map {
        let masked = match children.iter().find(|c| &c.name == key) {
            Some(child) => redact_value(child, value),
            None => value.clone(),
        };
        out.insert(key.clone(), masked);
    }
    Value::Object(out)
}

fn qualified(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn bind_specs(
    specs: &[ArgSpec],
    provided: &Map<String, Value>,
    defaults: Option<&ModuleParams>,
    prefix: &str,
) -> ModuleResult<IndexMap<String, Value>> {
    let mut resolved: HashMap<&str, (&str, &Value)> = HashMap::new();
    let mut unsupported = Vec::new();

    for (key, value) in provided {
        match specs.iter().find(|s| s.matches_name(key)) {
            Some(spec) => {
                if let Some((first, _)) = resolved.get(spec.name.as_str()) {
                    return Err(ModuleError::InvalidParameter(format!(
                        "parameters are mutually exclusive: {}|{}",
                        qualified(prefix, first),
                        qualified(prefix, key)
                    )));
                }
                resolved.insert(spec.name.as_str(), (key.as_str(), value));
            }
            None => unsupported.push(qualified(prefix, key)),
        }
    }

    if !unsupported.is_empty() {
        unsupported.sort();
        return Err(ModuleError::UnsupportedParameter {
            names: unsupported.join(", "),
            supported: supported_names(specs),
        });
    }

    let mut values = IndexMap::new();
    let mut missing = Vec::new();

    for spec in specs {
        let name = qualified(prefix, &spec.name);
        let value = resolved
            .get(spec.name.as_str())
            .map(|(_, v)| *v)
            .filter(|v| !v.is_null())
            .or_else(|| defaults.and_then(|d| d.get(&spec.name)).filter(|v| !v.is_null()))
            .or(spec.default.as_ref());

        match value {
            Some(value) => {
                values.insert(spec.name.clone(), coerce(&spec.arg_type, value, &name)?);
            }
            None if spec.required => missing.push(name),
            None => {}
        }
    }

    if !missing.is_empty() {
        return Err(ModuleError::MissingParameter(missing.join(", ")));
    }

    Ok(values)
}

fn supported_names(specs: &[ArgSpec]) -> String {
    let mut names: Vec<&str> = specs
        .iter()
        .flat_map(|s| std::iter::once(s.name.as_str()).chain(s.aliases.iter().map(String::as_str)))
        .collect();
    names.sort_unstable();
    names.join(", ")
}

fn coerce(arg_type: &ArgType, value: &Value, name: &str) -> ModuleResult<Value> {
    match arg_type {
        ArgType::Str => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(_) | Value::Bool(_) => Ok(Value::String(value.to_string())),
            _ => Err(invalid(name, "a string")),
        },

        ArgType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Value::from)
                .ok_or_else(|| invalid(name, "an integer")),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid(name, "an integer")),
            _ => Err(invalid(name, "an integer")),
        },

        ArgType::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| invalid(name, "a number")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| invalid(name, "a number")),
            _ => Err(invalid(name, "a number")),
        },

        ArgType::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "no" | "0" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid(name, "a boolean")),
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(Value::Bool(true)),
                Some(0) => Ok(Value::Bool(false)),
                _ => Err(invalid(name, "a boolean")),
            },
            _ => Err(invalid(name, "a boolean")),
        },

        ArgType::List(inner) => {
            let items: Vec<Value> = match value {
                Value::Array(items) => items.clone(),
                // Handle comma-separated string
                Value::String(s) => s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
                Value::Object(_) if matches!(inner.as_ref(), ArgType::Group(_)) => {
                    vec![value.clone()]
                }
                Value::Number(_) | Value::Bool(_) => vec![value.clone()],
                _ => return Err(invalid(name, "a list")),
            };
            items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce(inner, item, &format!("{}[{}]", name, i)))
                .collect::<ModuleResult<Vec<_>>>()
                .map(Value::Array)
        }

        ArgType::Dict => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(invalid(name, "a dictionary")),
        },

        ArgType::Group(children) => match value {
            Value::Object(map) => {
                let bound = bind_specs(children, map, None, name)?;
                Ok(Value::Object(bound.into_iter().collect()))
            }
            _ => Err(invalid(name, "a dictionary")),
        },

        ArgType::Choice(choices) => {
            let s = match value {
                Value::String(s) => s.clone(),
                Value::Number(_) | Value::Bool(_) => value.to_string(),
                _ => return Err(invalid(name, "a string")),
            };
            if choices.iter().any(|c| c == &s) {
                Ok(Value::String(s))
            } else {
                Err(ModuleError::InvalidParameter(format!(
                    "value of {} must be one of: {}, got: {}",
                    name,
                    choices.join(", "),
                    s
                )))
            }
        }
    }
}

fn invalid(name: &str, expected: &str) -> ModuleError {
    ModuleError::InvalidParameter(format!("{} must be {}", name, expected))
}

/// Immutable, validated arguments of one invocation.
///
/// Holds only non-null values, in schema declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    values: IndexMap<String, Value>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.bool(name).unwrap_or(default)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Field policies of a schema, keyed by body path.
///
/// Paths are `/`-joined body segments; array elements do not add a
/// segment, so every element of `/properties/subnets` shares the policies
/// under that prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPolicies {
    policies: IndexMap<String, FieldPolicy>,
    secrets: Vec<String>,
}

impl FieldPolicies {
    pub fn from_schema(schema: &ArgumentSchema) -> Self {
        let mut policies = Self::default();
        for spec in schema.specs() {
            if let Some(disposition) = &spec.disposition {
                let path = join(&[], &body_path(disposition, &spec.name));
                policies.collect(spec, path);
            }
        }
        policies
    }

    fn collect(&mut self, spec: &ArgSpec, path: String) {
        self.policies.insert(path.clone(), spec.policy);
        if spec.no_log {
            self.secrets.push(path.clone());
        }

        let children = match &spec.arg_type {
            ArgType::Group(children) => Some(children),
            ArgType::List(inner) => match inner.as_ref() {
                ArgType::Group(children) => Some(children),
                _ => None,
            },
            _ => None,
        };

        for child in children.into_iter().flatten() {
            let disposition = child.disposition.as_deref().unwrap_or("*");
            let segments = body_path(disposition, &child.name);
            let child_path = join(&[path.as_str()], &segments);
            self.collect(child, child_path);
        }
    }

    /// Policy of the field at `path`, or the default policy.
    pub fn get(&self, path: &str) -> FieldPolicy {
        self.find(path).unwrap_or_default()
    }

    /// Policy declared for exactly `path`.
    pub fn find(&self, path: &str) -> Option<FieldPolicy> {
        self.policies.get(path).copied()
    }

    pub fn is_secret(&self, path: &str) -> bool {
        self.secrets.iter().any(|s| s == path)
    }

    /// Paths whose comparison is `UpdateOnly`.
    pub fn update_only_paths(&self) -> Vec<&str> {
        self.policies
            .iter()
            .filter(|(_, p)| p.comparison == Comparison::UpdateOnly)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Copy of a request or response body with secret fields masked.
    pub fn redact(&self, body: &Value) -> Value {
        self.redact_at(body, "")
    }

    fn redact_at(&self, value: &Value, path: &str) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, child)| {
                        let child_path = format!("{}/{}", path, key);
                        let masked = if self.is_secret(&child_path) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact_at(child, &child_path)
                        };
                        (key.clone(), masked)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.redact_at(v, path)).collect())
            }
            other => other.clone(),
        }
    }
}

fn join(prefix: &[&str], segments: &[String]) -> String {
    let mut path: String = prefix.concat();
    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }
    path
}
