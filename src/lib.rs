//! Remote Resource Provider
//!
//! Typed adapters that let an infrastructure-as-code engine manage entities
//! held by a SaaS REST API: cloud credentials, cloud configurations,
//! configuration variables, templates and projects.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Schema types**: Describe the provider block, resources and data sources
//! - **Attribute sets**: Typed access to the loosely typed state the host sends
//! - **Lookup**: Resolve an entity by id or by name, enforcing uniqueness
//! - **Adapters**: Create, read, update, delete and import with drift detection
//! - **ProviderService trait**: The host-facing contract, implemented by [`Provider`]
//! - **Error types**: One taxonomy for lookup, marshaling and upstream failures
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use remote_resource_provider::testing::{test_config, InMemoryBackend};
//! use remote_resource_provider::{Provider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     remote_resource_provider::init_logging();
//!
//!     let provider = Provider::new(InMemoryBackend::new());
//!     provider.configure(test_config()).await?;
//!
//!     let state = provider
//!         .create("aws_cloud_configuration", json!({
//!             "name": "prod-aws",
//!             "account_id": "123456789012",
//!             "bucket_name": "cur-reports",
//!             "regions": ["us-east-1"],
//!         }))
//!         .await?;
//!     println!("created {}", state["id"]);
//!     Ok(())
//! }
//! ```
//!
//! # Clients
//!
//! Adapters never build their own HTTP clients. A [`ClientFactory`] turns the
//! resolved [`ProviderConfig`] into one [`RemoteApi`] per entity kind at
//! `configure` time; tests hand in [`testing::InMemoryBackend`] instead.
//!
//! # Drift
//!
//! A read that finds the entity gone (404 or soft-deleted) yields no state,
//! which tells the host to plan a recreate. Every other upstream failure is
//! reported as an error naming the operation, entity kind and identifier.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod attributes;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod scope;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use adapter::{DataSourceAdapter, EntityAdapter, LookupDataSource, ReadOutcome, ResourceAdapter};
pub use attributes::{AttributeSet, FromAttributes, ToAttributes};
pub use client::{ApiHandle, ListFilter, RemoteApi, RemoteEntity};
pub use config::ProviderConfig;
pub use error::{ApiError, Operation, ProviderError, Result};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use lookup::{resolve, LookupKey};
pub use provider::{ApiClients, ClientFactory, Provider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
