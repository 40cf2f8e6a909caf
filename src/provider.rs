//! The provider surface the host talks to.
//!
//! [`ProviderService`] is the host-facing contract, in terms of plain JSON
//! states. [`Provider`] implements it by dispatching each call to the adapter
//! registered for the requested type. Clients are created once, at
//! `configure` time, by a [`ClientFactory`] and handed to the adapters.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::adapter::{DataSourceAdapter, ResourceAdapter};
use crate::attributes::AttributeSet;
use crate::client::ApiHandle;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::resources::cloud_configuration::CloudConfiguration;
use crate::resources::configuration_variable::ConfigurationVariable;
use crate::resources::credentials::Credentials;
use crate::resources::project::Project;
use crate::resources::template::Template;
use crate::resources::{data_source_adapters, provider_schema, resource_adapters};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation::validate;

/// Host-facing provider contract.
#[async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state from an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value>;

    /// Read the current state of a resource; `None` means it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()>;

    /// Import existing infrastructure into management.
    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>> {
        let _ = id;
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// One client per remote entity kind.
#[derive(Clone)]
pub struct ApiClients {
    /// Cloud credentials.
    pub credentials: ApiHandle<Credentials>,
    /// Cloud configurations.
    pub cloud_configurations: ApiHandle<CloudConfiguration>,
    /// Configuration variables.
    pub configuration_variables: ApiHandle<ConfigurationVariable>,
    /// Templates.
    pub templates: ApiHandle<Template>,
    /// Projects.
    pub projects: ApiHandle<Project>,
}

/// Builds API clients from the resolved provider configuration.
pub trait ClientFactory: Send + Sync + 'static {
    /// Create the clients. Called once per `configure`.
    fn connect(&self, config: &ProviderConfig) -> Result<ApiClients>;
}

/// Adapters bound to configured clients, keyed by type name.
pub struct Registry {
    resources: HashMap<String, Arc<dyn ResourceAdapter>>,
    data_sources: HashMap<String, Arc<dyn DataSourceAdapter>>,
}

impl Registry {
    /// Bind every adapter to `clients`.
    pub fn new(clients: &ApiClients, organization_id: Option<&str>) -> Self {
        let resources = resource_adapters(clients, organization_id)
            .into_iter()
            .map(|adapter| (adapter.type_name().to_string(), adapter))
            .collect();
        let data_sources = data_source_adapters(clients, organization_id)
            .into_iter()
            .map(|adapter| (adapter.type_name().to_string(), adapter))
            .collect();
        Self {
            resources,
            data_sources,
        }
    }

    /// The adapter for a resource type.
    pub fn resource(&self, resource_type: &str) -> Result<&Arc<dyn ResourceAdapter>> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    /// The adapter for a data source type.
    pub fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSourceAdapter>> {
        self.data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// The provider: schema, configuration and dispatch to adapters.
pub struct Provider<F: ClientFactory> {
    factory: F,
    schema: ProviderSchema,
    registry: RwLock<Option<Arc<Registry>>>,
}

impl<F: ClientFactory> Provider<F> {
    /// A provider that will build its clients with `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            schema: provider_schema(),
            registry: RwLock::new(None),
        }
    }

    /// The client factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    async fn registry(&self) -> Result<Arc<Registry>> {
        self.registry.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider is not configured; call configure first".into())
        })
    }

    fn resource_schema(&self, resource_type: &str) -> Result<&Schema> {
        self.schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }
}

#[async_trait]
impl<F: ClientFactory> ProviderService for Provider<F> {
    fn schema(&self) -> ProviderSchema {
        self.schema.clone()
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>> {
        match ProviderConfig::from_value(config) {
            Ok(_) => Ok(vec![]),
            Err(err) => Ok(err.into_diagnostics()),
        }
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>> {
        let config = match ProviderConfig::from_value(config) {
            Ok(config) => config,
            Err(ProviderError::Validation(diagnostics)) => return Ok(diagnostics),
            Err(err) => return Err(err),
        };

        let clients = self.factory.connect(&config)?;
        let registry = Registry::new(&clients, config.organization_id.as_deref());
        *self.registry.write().await = Some(Arc::new(registry));

        info!(
            organization_id = config.organization_id.as_deref().unwrap_or("-"),
            "Provider configured"
        );
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>> {
        Ok(validate(self.resource_schema(resource_type)?, &config))
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult> {
        let schema = self.resource_schema(resource_type)?;
        if proposed_state.is_null() {
            return Ok(PlanResult::destroy());
        }

        let prior = prior_state.map(AttributeSet::from_value).transpose()?;
        let proposed = AttributeSet::from_value(proposed_state)?;
        let plan = diff(schema, prior.as_ref(), proposed);
        debug!(changes = plan.changes.len(), replace = plan.requires_replace, "Planned");
        Ok(plan)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value> {
        let registry = self.registry().await?;
        let state = registry
            .resource(resource_type)?
            .create(AttributeSet::from_value(planned_state)?)
            .await?;
        Ok(state.into_value())
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>> {
        let registry = self.registry().await?;
        let outcome = registry
            .resource(resource_type)?
            .read(AttributeSet::from_value(current_state)?)
            .await?;
        Ok(outcome.into_state().map(AttributeSet::into_value))
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value> {
        let registry = self.registry().await?;
        let state = registry
            .resource(resource_type)?
            .update(
                AttributeSet::from_value(prior_state)?,
                AttributeSet::from_value(planned_state)?,
            )
            .await?;
        Ok(state.into_value())
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<()> {
        let registry = self.registry().await?;
        registry
            .resource(resource_type)?
            .delete(AttributeSet::from_value(current_state)?)
            .await
    }

    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>> {
        let registry = self.registry().await?;
        let state = registry.resource(resource_type)?.import(id).await?;
        Ok(vec![ImportedResource::new(resource_type, state.into_value())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>> {
        let schema = self
            .schema
            .data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))?;
        Ok(validate(schema, &config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value> {
        let registry = self.registry().await?;
        let state = registry
            .data_source(data_source_type)?
            .read(AttributeSet::from_value(config)?)
            .await?;
        Ok(state.into_value())
    }
}

/// Compare prior and proposed state attribute by attribute.
///
/// Computed attributes the proposal leaves unset keep their prior value and
/// never count as changes.
fn diff(schema: &Schema, prior: Option<&AttributeSet>, proposed: AttributeSet) -> PlanResult {
    let mut planned = proposed;
    if let Some(prior) = prior {
        for name in schema.computed_attributes() {
            if let (false, Some(value)) = (planned.is_set(name), prior.get(name)) {
                planned.set(name, value.clone());
            }
        }
    }

    let block = &schema.block;
    let names: BTreeSet<&str> = block
        .attributes
        .iter()
        .filter(|(_, attr)| !attr.flags.is_read_only())
        .map(|(name, _)| name.as_str())
        .chain(block.blocks.keys().map(String::as_str))
        .collect();

    let empty = AttributeSet::new();
    let before_state = prior.unwrap_or(&empty);
    let mut changes = Vec::new();
    for name in names {
        let before = before_state.get(name).cloned();
        let after = planned.get(name).cloned();
        if before == after {
            continue;
        }
        let force_new = block
            .attributes
            .get(name)
            .is_some_and(|attr| attr.force_new);
        let change = AttributeChange::new(name, before, after);
        changes.push(if force_new && prior.is_some() {
            change.forcing_replace()
        } else {
            change
        });
    }

    let planned_state = Value::Object(Map::from_iter(
        planned.iter().map(|(k, v)| (k.to_string(), v.clone())),
    ));
    PlanResult::from_changes(planned_state, changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("health", Attribute::computed_bool())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("account_id", Attribute::required_string().with_force_new())
            .with_attribute("prefix", Attribute::optional_string())
    }

    fn attrs(value: Value) -> AttributeSet {
        AttributeSet::from_value(value).unwrap()
    }

    #[test]
    fn test_diff_create() {
        let plan = diff(&schema(), None, attrs(json!({"name": "a", "account_id": "1"})));
        assert_eq!(plan.changes.len(), 2);
        assert!(!plan.requires_replace);
        assert!(plan.changes.iter().all(|c| c.before.is_none()));
    }

    #[test]
    fn test_diff_carries_computed() {
        let prior = attrs(json!({"id": "x", "health": true, "name": "a", "account_id": "1"}));
        let plan = diff(&schema(), Some(&prior), attrs(json!({"name": "a", "account_id": "1"})));
        assert!(plan.is_empty());
        assert_eq!(plan.planned_state["id"], "x");
        assert_eq!(plan.planned_state["health"], true);
    }

    #[test]
    fn test_diff_force_new() {
        let prior = attrs(json!({"id": "x", "name": "a", "account_id": "1"}));
        let plan = diff(
            &schema(),
            Some(&prior),
            attrs(json!({"name": "b", "account_id": "2", "prefix": null})),
        );
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.requires_replace);
        assert!(!plan.planned_state.as_object().unwrap().contains_key("prefix"));
    }
}
