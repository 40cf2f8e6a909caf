//! Concrete resources and data sources.
//!
//! Each submodule holds the entity, payload and mapping types for one remote
//! kind. [`resource_adapters`] and [`data_source_adapters`] bind the mappings
//! to the clients produced at configure time.

use std::sync::Arc;

use crate::adapter::{
    DataSourceAdapter, EntityAdapter, EntityMapping, LookupDataSource, ResourceAdapter,
};
use crate::config::ProviderConfig;
use crate::provider::ApiClients;
use crate::schema::{Attribute, ProviderSchema, Schema};

pub mod cloud_configuration;
pub mod configuration_variable;
pub mod credentials;
pub mod project;
pub mod template;

use cloud_configuration::{CloudConfigurationResource, CloudProvider};
use configuration_variable::{ConfigurationVariableDataSource, ConfigurationVariableResource};
use credentials::{CredentialKind, CredentialsDataSource, CredentialsResource};
use project::{ProjectDataSource, ProjectResource};
use template::{TemplateDataSource, TemplateResource};

/// Data source schema skeleton: exactly one of `id` or `name`.
pub(crate) fn lookup_schema(description: &str) -> Schema {
    Schema::v0()
        .with_description(description)
        .with_attribute(
            "id",
            Attribute::optional_computed_string().with_exactly_one_of(["id", "name"]),
        )
        .with_attribute(
            "name",
            Attribute::optional_computed_string().with_exactly_one_of(["id", "name"]),
        )
}

/// Schemas of the provider block, every resource and every data source.
///
/// Available before the provider is configured.
pub fn provider_schema() -> ProviderSchema {
    fn entry<M: EntityMapping>(mapping: M) -> (String, Schema) {
        (mapping.type_name().to_string(), mapping.schema())
    }

    let mut resources: Vec<(String, Schema)> = CredentialKind::ALL
        .into_iter()
        .map(|kind| entry(CredentialsResource::new(kind)))
        .collect();
    resources.extend(
        [CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp]
            .into_iter()
            .map(|provider| entry(CloudConfigurationResource::new(provider))),
    );
    resources.push(entry(ConfigurationVariableResource::default()));
    resources.push(entry(TemplateResource));
    resources.push(entry(ProjectResource));

    let data_sources = [
        entry(CredentialsDataSource),
        entry(ConfigurationVariableDataSource::default()),
        entry(TemplateDataSource),
        entry(ProjectDataSource),
    ];

    let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
    let schema = resources
        .into_iter()
        .fold(schema, |schema, (name, s)| schema.with_resource(name, s));
    data_sources
        .into_iter()
        .fold(schema, |schema, (name, s)| schema.with_data_source(name, s))
}

/// Every resource adapter, bound to `clients`.
pub fn resource_adapters(
    clients: &ApiClients,
    organization_id: Option<&str>,
) -> Vec<Arc<dyn ResourceAdapter>> {
    let mut adapters: Vec<Arc<dyn ResourceAdapter>> = Vec::new();

    for kind in CredentialKind::ALL {
        adapters.push(EntityAdapter::shared(
            CredentialsResource::new(kind),
            clients.credentials.clone(),
        ));
    }
    for provider in [CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp] {
        adapters.push(EntityAdapter::shared(
            CloudConfigurationResource::new(provider),
            clients.cloud_configurations.clone(),
        ));
    }
    adapters.push(EntityAdapter::shared(
        ConfigurationVariableResource::new(organization_id.map(str::to_string)),
        clients.configuration_variables.clone(),
    ));
    adapters.push(EntityAdapter::shared(TemplateResource, clients.templates.clone()));
    adapters.push(EntityAdapter::shared(ProjectResource, clients.projects.clone()));

    adapters
}

/// Every data source adapter, bound to `clients`.
pub fn data_source_adapters(
    clients: &ApiClients,
    organization_id: Option<&str>,
) -> Vec<Arc<dyn DataSourceAdapter>> {
    vec![
        LookupDataSource::shared(CredentialsDataSource, clients.credentials.clone()),
        LookupDataSource::shared(
            ConfigurationVariableDataSource::new(organization_id.map(str::to_string)),
            clients.configuration_variables.clone(),
        ),
        LookupDataSource::shared(TemplateDataSource, clients.templates.clone()),
        LookupDataSource::shared(ProjectDataSource, clients.projects.clone()),
    ]
}
