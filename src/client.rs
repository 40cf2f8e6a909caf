//! The remote API boundary.
//!
//! Adapters never construct clients or reach for a global handle: each one
//! captures an `Arc<dyn RemoteApi<E>>` handed to it at registration time. The
//! HTTP transport behind the trait (auth, retries, timeouts) is owned by the
//! implementor; [`crate::testing::InMemoryApi`] is the in-process double.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::scope::ScopeRef;

/// An entity owned by the remote service.
pub trait RemoteEntity: Clone + Send + Sync + 'static {
    /// Create/update payload accepted by the API for this entity.
    type Payload: Clone + Send + Sync + 'static;

    /// Entity kind used in messages and logs, e.g. `credentials`.
    const KIND: &'static str;

    /// Opaque unique id.
    fn id(&self) -> &str;

    /// Human-readable name, unique only within a scope/type.
    fn name(&self) -> &str;

    /// Subtype discriminator (`type`/`provider`) when the kind has several shapes.
    fn discriminator(&self) -> Option<&str> {
        None
    }

    /// Scope the entity lives in, for scoped kinds.
    fn scope(&self) -> Option<ScopeRef> {
        None
    }

    /// Whether the API still returns the entity but reports it as removed
    /// (soft-deleted or archived).
    fn is_gone(&self) -> bool {
        false
    }
}

/// Pre-filter applied by the API when listing entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only list entities defined in this scope.
    pub scope: Option<ScopeRef>,
}

impl ListFilter {
    /// A filter that lists everything visible to the organization.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter restricted to one scope.
    pub fn in_scope(scope: ScopeRef) -> Self {
        Self { scope: Some(scope) }
    }

    /// Whether `entity` passes this filter.
    pub fn matches<E: RemoteEntity>(&self, entity: &E) -> bool {
        match &self.scope {
            None => true,
            Some(wanted) => entity.scope().is_some_and(|scope| scope.contains(wanted)),
        }
    }
}

/// Typed CRUD access to one kind of remote entity.
#[async_trait]
pub trait RemoteApi<E: RemoteEntity>: Send + Sync {
    /// Create an entity and return it as stored remotely.
    async fn create(&self, payload: &E::Payload) -> Result<E, ApiError>;

    /// Fetch one entity by id. Missing entities yield [`ApiError::NotFound`].
    async fn get(&self, id: &str) -> Result<E, ApiError>;

    /// Replace the mutable fields of an entity.
    async fn update(&self, id: &str, payload: &E::Payload) -> Result<E, ApiError>;

    /// Delete an entity.
    async fn delete(&self, id: &str) -> Result<(), ApiError>;

    /// List entities, optionally pre-filtered by scope.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<E>, ApiError>;
}

/// Shared handle to a [`RemoteApi`].
pub type ApiHandle<E> = Arc<dyn RemoteApi<E>>;

