//! Azure Resource Manager transport.
//!
//! This module owns everything that talks to the service: credentials,
//! cloud endpoints, the REST client with its retry and polling behavior,
//! and the transport error type.

pub mod auth;
pub mod client;
pub mod cloud;
pub mod error;
pub mod poller;

pub use auth::{AccessToken, AuthSource, StaticTokenCredential, TokenCredential};
pub use client::{ArmClient, ArmClientConfig, ClientFactory, ManagementApi, ResourceClient};
pub use cloud::CloudEnvironment;
pub use error::{ArmError, ArmResult};
pub use poller::PollConfig;

#[cfg(test)]
pub use client::MockManagementApi;
