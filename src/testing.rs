//! Testing utilities.
//!
//! [`InMemoryApi`] is an in-process [`RemoteApi`] double that records calls,
//! injects failures and lets a test change remote state behind the
//! provider's back. [`InMemoryBackend`] bundles one per entity kind and acts
//! as the [`ClientFactory`] of a [`Provider`](crate::provider::Provider).
//! [`ProviderTester`] drives any [`ProviderService`] without a host.
//!
//! # Example
//!
//! ```ignore
//! use remote_resource_provider::provider::Provider;
//! use remote_resource_provider::testing::{test_config, InMemoryBackend, ProviderTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_project() {
//!     let backend = InMemoryBackend::new();
//!     let tester = ProviderTester::new(Provider::new(backend.clone()));
//!     tester.configure(test_config()).await.unwrap();
//!
//!     let state = tester.create("project", json!({"name": "platform"})).await.unwrap();
//!     assert_eq!(backend.projects.len().await, 1);
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::{ListFilter, RemoteApi, RemoteEntity};
use crate::config::ProviderConfig;
use crate::error::{ApiError, ProviderError, Result};
use crate::provider::{ApiClients, ClientFactory, ProviderService};
use crate::resources::cloud_configuration::CloudConfiguration;
use crate::resources::configuration_variable::ConfigurationVariable;
use crate::resources::credentials::Credentials;
use crate::resources::project::Project;
use crate::resources::template::Template;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

// =========================================================================
// In-memory API
// =========================================================================

/// Builds the entity the remote side would store for a payload.
pub trait Materialize: RemoteEntity {
    /// Entity stored for `payload` under `id`; `previous` is set on update.
    fn materialize(id: &str, payload: &Self::Payload, previous: Option<&Self>) -> Self;
}

struct State<E> {
    entities: Vec<E>,
    calls: Vec<String>,
    failures: VecDeque<ApiError>,
    ids: VecDeque<String>,
}

/// In-process [`RemoteApi`] backed by a vector, in insertion order.
pub struct InMemoryApi<E> {
    state: Mutex<State<E>>,
}

impl<E> Default for InMemoryApi<E> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                entities: Vec::new(),
                calls: Vec::new(),
                failures: VecDeque::new(),
                ids: VecDeque::new(),
            }),
        }
    }
}

impl<E: RemoteEntity> InMemoryApi<E> {
    /// An empty API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity directly, bypassing the call log.
    pub async fn insert(&self, entity: E) {
        self.state.lock().await.entities.push(entity);
    }

    /// Delete an entity behind the provider's back.
    pub async fn remove_out_of_band(&self, id: &str) -> Option<E> {
        let mut state = self.state.lock().await;
        let index = state.entities.iter().position(|e| e.id() == id)?;
        Some(state.entities.remove(index))
    }

    /// Modify a stored entity in place, bypassing the call log.
    pub async fn modify(&self, id: &str, f: impl FnOnce(&mut E)) -> bool {
        let mut state = self.state.lock().await;
        match state.entities.iter_mut().find(|e| e.id() == id) {
            Some(entity) => {
                f(entity);
                true
            },
            None => false,
        }
    }

    /// Fail the next call, whatever it is, with `error`.
    pub async fn fail_next(&self, error: ApiError) {
        self.state.lock().await.failures.push_back(error);
    }

    /// Ids handed out by the next creates, before falling back to UUIDs.
    pub async fn queue_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .await
            .ids
            .extend(ids.into_iter().map(Into::into));
    }

    /// Operation names of every call so far (`create`, `get`, ...).
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls so far.
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    /// Forget recorded calls.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Snapshot of the stored entities.
    pub async fn entities(&self) -> Vec<E> {
        self.state.lock().await.entities.clone()
    }

    /// Number of stored entities.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entities.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<E> State<E> {
    fn record(&mut self, operation: &str) -> std::result::Result<(), ApiError> {
        self.calls.push(operation.to_string());
        match self.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<E: Materialize> RemoteApi<E> for InMemoryApi<E> {
    async fn create(&self, payload: &E::Payload) -> std::result::Result<E, ApiError> {
        let mut state = self.state.lock().await;
        state.record("create")?;
        let id = state
            .ids
            .pop_front()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let entity = E::materialize(&id, payload, None);
        state.entities.push(entity.clone());
        Ok(entity)
    }

    async fn get(&self, id: &str) -> std::result::Result<E, ApiError> {
        let mut state = self.state.lock().await;
        state.record("get")?;
        state
            .entities
            .iter()
            .find(|e| e.id() == id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn update(&self, id: &str, payload: &E::Payload) -> std::result::Result<E, ApiError> {
        let mut state = self.state.lock().await;
        state.record("update")?;
        let slot = state
            .entities
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or(ApiError::NotFound)?;
        let updated = E::materialize(id, payload, Some(&*slot));
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), ApiError> {
        let mut state = self.state.lock().await;
        state.record("delete")?;
        let index = state
            .entities
            .iter()
            .position(|e| e.id() == id)
            .ok_or(ApiError::NotFound)?;
        state.entities.remove(index);
        Ok(())
    }

    async fn list(&self, filter: &ListFilter) -> std::result::Result<Vec<E>, ApiError> {
        let mut state = self.state.lock().await;
        state.record("list")?;
        Ok(state
            .entities
            .iter()
            .filter(|e| filter.matches(*e))
            .cloned()
            .collect())
    }
}

impl Materialize for Credentials {
    fn materialize(id: &str, payload: &Self::Payload, previous: Option<&Self>) -> Self {
        Self {
            id: id.to_string(),
            name: payload.name.clone(),
            kind: payload.value.kind().as_str().to_string(),
            organization_id: previous.and_then(|p| p.organization_id.clone()),
        }
    }
}

impl Materialize for CloudConfiguration {
    fn materialize(id: &str, payload: &Self::Payload, _previous: Option<&Self>) -> Self {
        Self {
            id: id.to_string(),
            name: payload.name.clone(),
            provider: payload.config.provider().as_str().to_string(),
            configuration: payload.config.configuration().unwrap_or_default(),
            health: true,
        }
    }
}

impl Materialize for ConfigurationVariable {
    fn materialize(id: &str, payload: &Self::Payload, _previous: Option<&Self>) -> Self {
        Self {
            id: id.to_string(),
            name: payload.name.clone(),
            value: (!payload.is_sensitive).then(|| payload.value.clone()),
            description: payload.description.clone(),
            is_sensitive: payload.is_sensitive,
            is_read_only: payload.is_read_only,
            is_required: payload.is_required,
            kind: payload.kind,
            format: Some(payload.format),
            enum_values: payload.enum_values.clone(),
            scope: payload.scope.scope,
            scope_id: payload.scope.scope_id.clone(),
        }
    }
}

impl Materialize for Template {
    fn materialize(id: &str, payload: &Self::Payload, _previous: Option<&Self>) -> Self {
        Self {
            id: id.to_string(),
            name: payload.name.clone(),
            description: payload.description.clone(),
            repository: payload.repository.clone(),
            path: payload.path.clone(),
            revision: payload.revision.clone(),
            kind: payload.kind.as_str().to_string(),
            terraform_version: payload.terraform_version.clone(),
            ssh_keys: payload.ssh_keys.clone(),
            is_deleted: false,
        }
    }
}

impl Materialize for Project {
    fn materialize(id: &str, payload: &Self::Payload, _previous: Option<&Self>) -> Self {
        Self {
            id: id.to_string(),
            name: payload.name.clone(),
            description: payload.description.clone(),
            parent_project_id: payload.parent_project_id.clone(),
            is_archived: false,
        }
    }
}

/// One [`InMemoryApi`] per entity kind; clones share the same stores.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    /// Cloud credentials.
    pub credentials: Arc<InMemoryApi<Credentials>>,
    /// Cloud configurations.
    pub cloud_configurations: Arc<InMemoryApi<CloudConfiguration>>,
    /// Configuration variables.
    pub configuration_variables: Arc<InMemoryApi<ConfigurationVariable>>,
    /// Templates.
    pub templates: Arc<InMemoryApi<Template>>,
    /// Projects.
    pub projects: Arc<InMemoryApi<Project>>,
}

impl InMemoryBackend {
    /// Empty stores.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientFactory for InMemoryBackend {
    fn connect(&self, _config: &ProviderConfig) -> Result<ApiClients> {
        Ok(ApiClients {
            credentials: self.credentials.clone(),
            cloud_configurations: self.cloud_configurations.clone(),
            configuration_variables: self.configuration_variables.clone(),
            templates: self.templates.clone(),
            projects: self.projects.clone(),
        })
    }
}

/// A provider block that configures successfully.
pub fn test_config() -> Value {
    json!({
        "api_key": "test-key",
        "api_secret": "test-secret",
        "organization_id": "org-test",
    })
}

// =========================================================================
// Provider tester
// =========================================================================

/// A test harness for [`ProviderService`] implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    pub async fn validate_provider_config(&self, config: Value) -> std::result::Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> std::result::Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> std::result::Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(&self, resource_type: &str, proposed_state: Value) -> Result<PlanResult> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> std::result::Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read back. Returns the state after read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await?.ok_or_else(|| {
            ProviderError::InvalidArgument(format!("{} vanished right after create", resource_type))
        })
    }

    /// Plan, update, then read back. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await?.ok_or_else(|| {
            ProviderError::InvalidArgument(format!("{} vanished right after update", resource_type))
        })
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> std::result::Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan changes nothing.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if the plan can be applied in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if the plan has no change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error whose summary contains `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        found,
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
