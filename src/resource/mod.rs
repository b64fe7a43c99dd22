//! Resource model: argument schemas, addressing, request bodies, comparison
//! and the declarative definitions that tie them together.

pub mod body;
pub mod catalog;
pub mod compare;
pub mod definition;
pub mod identity;
pub mod schema;

pub use compare::{diff, Difference};
pub use definition::{
    DefinitionError, DispatchRule, LocationPolicy, Operation, ResourceDefinition, UpdateMethod,
};
pub use identity::{PathTemplate, ResourceIdentity};
pub use schema::{
    ArgSpec, ArgType, ArgumentSchema, BoundArgs, Comparison, FieldPolicies, FieldPolicy, Matcher,
};
