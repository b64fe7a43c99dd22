//! Resource addressing.
//!
//! A [`PathTemplate`] such as
//! `/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Sql/servers/{server_name}`
//! is rendered against bound arguments. A template is usable only when
//! every placeholder is bound, which is also how the dispatcher decides
//! which operation applies.

use serde::{Serialize, Serializer};
use std::fmt;

use super::schema::BoundArgs;
use crate::modules::{ModuleError, ModuleResult};

pub const SUBSCRIPTION_ID: &str = "subscription_id";
pub const RESOURCE_GROUP: &str = "resource_group";
pub const NAME: &str = "name";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// ARM path with `{argument}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Placeholder(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Whether every placeholder has a non-empty string value in `args`.
    pub fn is_bound(&self, args: &BoundArgs) -> bool {
        self.placeholders()
            .iter()
            .all(|p| args.str(p).is_some_and(|v| !v.is_empty()))
    }

    /// Render the path, or `None` if a placeholder is unbound.
    pub fn render(&self, args: &BoundArgs) -> Option<String> {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Placeholder(name) => {
                    let value = args.str(name).filter(|v| !v.is_empty())?;
                    path.push_str(&urlencoding::encode(value));
                }
            }
        }
        Some(path)
    }

    /// Template of the enclosing collection (the path minus its last segment).
    pub fn collection(&self) -> PathTemplate {
        let mut segments = self.segments.clone();
        segments.pop();
        let raw = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => format!("/{}", text),
                Segment::Placeholder(name) => format!("/{{{}}}", name),
            })
            .collect();
        Self { raw, segments }
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for PathTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Fully resolved address of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceIdentity {
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    /// Parent resource names, outermost first (`server_name` for a database)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<(String, String)>,
    pub name: String,
    pub path: String,
}

impl ResourceIdentity {
    pub fn resolve(template: &PathTemplate, args: &BoundArgs) -> ModuleResult<Self> {
        let unbound: Vec<&str> = template
            .placeholders()
            .into_iter()
            .filter(|p| args.str(p).map_or(true, str::is_empty))
            .collect();
        if !unbound.is_empty() {
            return Err(ModuleError::MissingParameter(unbound.join(", ")));
        }

        let path = template
            .render(args)
            .ok_or_else(|| ModuleError::MissingParameter(template.to_string()))?;
        let value = |key: &str| args.str(key).unwrap_or_default().to_string();

        let parents = template
            .placeholders()
            .into_iter()
            .filter(|p| ![SUBSCRIPTION_ID, RESOURCE_GROUP, NAME].contains(p))
            .map(|p| (p.to_string(), value(p)))
            .collect();

        Ok(Self {
            subscription_id: value(SUBSCRIPTION_ID),
            resource_group: args.str(RESOURCE_GROUP).map(String::from),
            parents,
            name: value(NAME),
            path,
        })
    }

    /// Path of the resource group holding this resource.
    pub fn resource_group_path(&self) -> Option<String> {
        self.resource_group.as_ref().map(|rg| {
            format!(
                "/subscriptions/{}/resourcegroups/{}",
                urlencoding::encode(&self.subscription_id),
                urlencoding::encode(rg)
            )
        })
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
