//! Read operation dispatch.
//!
//! The first rule whose placeholders are all bound is invoked. Read
//! failures never fail the invocation: a missing resource is an empty
//! result, and any other error is logged, recorded as a warning and also
//! treated as empty.

use serde_json::Value;
use tracing::{debug, warn};

use crate::azure::{ArmError, ResourceClient};
use crate::modules::{ModuleError, ModuleResult};
use crate::normalize::Response;
use crate::resource::identity::NAME;
use crate::resource::{BoundArgs, DispatchRule, Operation};

/// Result of a dispatched read.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub response: Response,
    pub warnings: Vec<String>,
}

/// First rule whose placeholders are all bound.
pub fn select<'r>(rules: &'r [DispatchRule], args: &BoundArgs) -> Option<&'r DispatchRule> {
    rules.iter().find(|rule| rule.template.is_bound(args))
}

/// Run the read operation selected by `args`.
pub async fn dispatch(
    client: &ResourceClient,
    rules: &[DispatchRule],
    args: &BoundArgs,
) -> ModuleResult<DispatchOutcome> {
    let rule = select(rules, args).ok_or_else(|| {
        let expected: Vec<String> = rules
            .iter()
            .map(|r| r.template.placeholders().join(" + "))
            .collect();
        ModuleError::InvalidParameter(format!(
            "no read operation matches the supplied arguments; expected one of: {}",
            expected.join(", ")
        ))
    })?;

    let path = rule
        .template
        .render(args)
        .ok_or_else(|| ModuleError::MissingParameter(rule.template.to_string()))?;

    let mut warnings = Vec::new();
    let filter = match args.str("filter") {
        Some(f) if rule.filterable && rule.operation == Operation::List => Some(f.to_string()),
        Some(f) => {
            warnings.push(format!(
                "filter '{}' ignored: {} {} does not support filtering",
                f, rule.operation, rule.template
            ));
            None
        }
        None => None,
    };

    debug!("Dispatching {} {}", rule.operation, path);
    let result = match rule.operation {
        Operation::Get => client.get(&path).await.map(Response::Single),
        Operation::List => client.list(&path, filter).await.map(Response::Many),
    };

    let response = match result {
        Ok(response) => response,
        Err(ArmError::NotFound { .. }) => {
            debug!("{} not found", path);
            Response::empty()
        }
        Err(e) => {
            warn!("Failed to {} {}: {}", rule.operation, path, e);
            warnings.push(format!("failed to {} {}: {}", rule.operation, path, e));
            Response::empty()
        }
    };

    let consumes_name = rule.template.placeholders().contains(&NAME);
    let name = args.str(NAME).filter(|_| !consumes_name);
    let tags = tag_filters(args);

    let response = response.retain(|item| {
        // Resource names are case-insensitive
        name.map_or(true, |n| {
            item.get("name")
                .and_then(Value::as_str)
                .is_some_and(|found| found.eq_ignore_ascii_case(n))
        }) && matches_tags(item, &tags)
    });

    Ok(DispatchOutcome { response, warnings })
}

fn tag_filters(args: &BoundArgs) -> Vec<String> {
    match args.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether `item` carries every tag filter (`key` or `key:value`).
pub fn matches_tags(item: &Value, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }
    let Some(tags) = item.get("tags").and_then(Value::as_object) else {
        return false;
    };
    filters.iter().all(|filter| match filter.split_once(':') {
        Some((key, value)) => tags.get(key).and_then(Value::as_str) == Some(value),
        None => tags.contains_key(filter.as_str()),
    })
}
