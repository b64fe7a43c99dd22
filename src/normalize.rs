//! Response normalization.

use serde_json::{Map, Value};

/// Shape of a remote read result.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Single(Value),
    Many(Vec<Value>),
}

impl Response {
    pub fn empty() -> Self {
        Response::Many(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            Response::Single(_) => 1,
            Response::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the elements for which `keep` returns true.
    pub fn retain(self, mut keep: impl FnMut(&Value) -> bool) -> Self {
        match self {
            Response::Single(value) => {
                if keep(&value) {
                    Response::Single(value)
                } else {
                    Response::empty()
                }
            }
            Response::Many(mut items) => {
                items.retain(|v| keep(v));
                Response::Many(items)
            }
        }
    }
}

/// Convert a response into a uniform list of mappings.
///
/// A non-object value is wrapped as `{"value": v}`.
pub fn normalize(response: Response) -> Vec<Map<String, Value>> {
    match response {
        Response::Single(value) => vec![to_map(value)],
        Response::Many(items) => items.into_iter().map(to_map).collect(),
    }
}

fn to_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
