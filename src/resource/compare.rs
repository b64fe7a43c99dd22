//! Desired versus observed comparison.
//!
//! Only what the caller asked for is compared: null desired values are
//! skipped and objects are compared on the desired keys alone, so fields the
//! service fills in (ids, etags, defaults) never register as differences.

use serde::Serialize;
use serde_json::{Map, Value};

use super::schema::{Comparison, FieldPolicies, FieldPolicy, Matcher};

/// One field whose observed value does not match the desired one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difference {
    pub path: String,
    pub desired: Value,
    pub observed: Value,
    /// False when the field cannot be changed on an existing resource
    pub updatable: bool,
}

/// Compare `desired` against `observed` under `policies`.
pub fn diff(desired: &Value, observed: &Value, policies: &FieldPolicies) -> Vec<Difference> {
    let mut out = Vec::new();
    let empty = Map::new();
    match desired {
        Value::Object(map) => {
            let observed = observed.as_object().unwrap_or(&empty);
            diff_object(map, observed, "", FieldPolicy::default(), policies, &mut out);
        }
        _ => {
            if !values_match(desired, observed, Matcher::Exact, policies, "", FieldPolicy::default()) {
                out.push(Difference {
                    path: String::from("/"),
                    desired: desired.clone(),
                    observed: observed.clone(),
                    updatable: true,
                });
            }
        }
    }
    out
}

fn diff_object(
    desired: &Map<String, Value>,
    observed: &Map<String, Value>,
    prefix: &str,
    inherited: FieldPolicy,
    policies: &FieldPolicies,
    out: &mut Vec<Difference>,
) {
    let null = Value::Null;
    for (key, want) in desired {
        if want.is_null() {
            continue;
        }
        let path = format!("{}/{}", prefix, key);
        let policy = effective(&path, inherited, policies);
        if policy.comparison == Comparison::Ignore {
            continue;
        }

        let have = observed.get(key).unwrap_or(&null);
        match want {
            Value::Object(want_map) => {
                let empty = Map::new();
                let have_map = have.as_object().unwrap_or(&empty);
                diff_object(want_map, have_map, &path, policy, policies, out);
            }
            _ => {
                if !values_match(want, have, policy.matcher, policies, &path, policy) {
                    out.push(Difference {
                        path,
                        desired: want.clone(),
                        observed: have.clone(),
                        updatable: policy.updatable,
                    });
                }
            }
        }
    }
}

/// Policy of `path`, falling back to the enclosing field's.
fn effective(path: &str, inherited: FieldPolicy, policies: &FieldPolicies) -> FieldPolicy {
    match policies.find(path) {
        Some(own) => FieldPolicy {
            comparison: if inherited.comparison == Comparison::Ignore {
                Comparison::Ignore
            } else {
                own.comparison
            },
            matcher: own.matcher,
            updatable: own.updatable && inherited.updatable,
        },
        None => inherited,
    }
}

fn values_match(
    want: &Value,
    have: &Value,
    matcher: Matcher,
    policies: &FieldPolicies,
    path: &str,
    policy: FieldPolicy,
) -> bool {
    match (want, have) {
        (Value::Null, _) => true,
        (Value::Object(w), Value::Object(h)) => {
            let mut nested = Vec::new();
            diff_object(w, h, path, policy, policies, &mut nested);
            nested.is_empty()
        }
        (Value::Object(w), _) => w.values().all(Value::is_null),
        (Value::Array(w), Value::Array(h)) => {
            if w.iter().any(Value::is_object) || h.iter().any(Value::is_object) {
                w.len() == h.len()
                    && w.iter()
                        .zip(h)
                        .all(|(a, b)| values_match(a, b, matcher, policies, path, policy))
            } else {
                multiset_eq(w, h, matcher)
            }
        }
        (Value::Array(_), _) | (_, Value::Array(_)) => false,
        _ => scalars_match(want, have, matcher),
    }
}

fn scalars_match(want: &Value, have: &Value, matcher: Matcher) -> bool {
    match (want, have) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::String(a), Value::String(b)) => matcher.matches(a, b),
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (_, Value::Null) => false,
        // "3" against 3, "true" against true
        (Value::String(a), other) | (other, Value::String(a)) => matcher.matches(a, &other.to_string()),
        _ => false,
    }
}

fn multiset_eq(want: &[Value], have: &[Value], matcher: Matcher) -> bool {
    if want.len() != have.len() {
        return false;
    }
    let mut used = vec![false; have.len()];
    for w in want {
        let found = have
            .iter()
            .enumerate()
            .find(|(i, h)| !used[*i] && scalars_match(w, h, matcher));
        match found {
            Some((i, _)) => used[i] = true,
            None => return false,
        }
    }
    true
}

/// Keys of `observed` that `desired` does not mention.
pub fn extra_keys(desired: &Value, observed: &Value) -> Vec<String> {
    match (desired.as_object(), observed.as_object()) {
        (Some(d), Some(o)) => o.keys().filter(|k| !d.contains_key(*k)).cloned().collect(),
        (None, Some(o)) => o.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
