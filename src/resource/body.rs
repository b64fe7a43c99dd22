//! Request body construction.
//!
//! Each argument with a disposition is placed into the body along its
//! path: `/properties/*` puts `account_type` at `properties.accountType`,
//! `/sku/name` is taken literally, and inside option groups paths are
//! relative to the group's own object.

use serde_json::{Map, Value};

use super::schema::{ArgSpec, ArgType, ArgumentSchema, BoundArgs};

/// `snake_case` to `camelCase`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Body path segments for `disposition`, with `*` standing for the
/// camelCase form of `name`.
pub fn body_path(disposition: &str, name: &str) -> Vec<String> {
    disposition
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if segment == "*" {
                camel_case(name)
            } else {
                segment.to_string()
            }
        })
        .collect()
}

/// Build the desired request body from bound arguments.
pub fn inflate(schema: &ArgumentSchema, args: &BoundArgs) -> Value {
    let mut body = Map::new();
    for spec in schema.specs() {
        let (Some(disposition), Some(value)) = (&spec.disposition, args.get(&spec.name)) else {
            continue;
        };
        let segments = body_path(disposition, &spec.name);
        insert(&mut body, &segments, shape(spec, value));
    }
    Value::Object(body)
}

fn shape(spec: &ArgSpec, value: &Value) -> Value {
    match (&spec.arg_type, value) {
        (ArgType::Group(children), Value::Object(map)) => inflate_group(children, map),
        (ArgType::List(inner), Value::Array(items)) => match inner.as_ref() {
            ArgType::Group(children) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => inflate_group(children, map),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn inflate_group(children: &[ArgSpec], map: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    for child in children {
        let Some(value) = map.get(&child.name).filter(|v| !v.is_null()) else {
            continue;
        };
        let disposition = child.disposition.as_deref().unwrap_or("*");
        let segments = body_path(disposition, &child.name);
        insert(&mut out, &segments, shape(child, value));
    }
    Value::Object(out)
}

/// Set `value` at `segments`, creating intermediate objects.
pub fn insert(target: &mut Map<String, Value>, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = target;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.clone(), value);
}

/// Remove the field at a `/`-joined body path, if present.
pub fn remove_path(body: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = body;
    for segment in parents {
        current = match current.get_mut(*segment) {
            Some(next) => next,
            None => return,
        };
    }
    if let Value::Object(map) = current {
        map.remove(*last);
    }
}
