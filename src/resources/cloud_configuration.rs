//! Cloud configurations (cost and audit log integrations).
//!
//! The remote entity carries a `provider` discriminator and a free-form
//! `configuration` object whose shape depends on it. Reads decode the object
//! through [`CloudProviderConfig::decode`]; a provider this crate does not know
//! is reported rather than silently dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::{EntityMapping, ResourceMapping};
use crate::attributes::{AttributeSet, FromAttributes, ToAttributes, NAME_ATTRIBUTE};
use crate::client::RemoteEntity;
use crate::error::{ProviderError, Result};
use crate::lookup::normalize_discriminator;
use crate::schema::{Attribute, Schema};

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudProvider {
    /// Amazon Web Services.
    Aws,
    /// Microsoft Azure.
    Azure,
    /// Google Cloud.
    Gcp,
}

impl CloudProvider {
    /// Wire value of the discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Azure => "AZURE",
            Self::Gcp => "GCP",
        }
    }

    /// Parse a discriminator in any casing.
    pub fn parse(raw: &str) -> Result<Self> {
        match normalize_discriminator(raw).as_str() {
            "AWS" => Ok(Self::Aws),
            "AZURE" => Ok(Self::Azure),
            "GCP" => Ok(Self::Gcp),
            _ => Err(ProviderError::UnhandledVariant {
                field: "provider",
                value: raw.to_string(),
            }),
        }
    }

    /// Resource type name for this provider.
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::Aws => "aws_cloud_configuration",
            Self::Azure => "azure_cloud_configuration",
            Self::Gcp => "gcp_cloud_configuration",
        }
    }
}

/// A cloud configuration as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfiguration {
    /// Remote id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Discriminator, as the API spells it.
    pub provider: String,
    /// Provider-specific configuration object.
    #[serde(default)]
    pub configuration: Value,
    /// Whether the last connectivity check succeeded.
    #[serde(default)]
    pub health: bool,
}

impl RemoteEntity for CloudConfiguration {
    type Payload = CloudConfigurationPayload;
    const KIND: &'static str = "cloud configuration";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn discriminator(&self) -> Option<&str> {
        Some(&self.provider)
    }
}

/// Create/update body: `{"name": ..., "provider": ..., "configuration": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfigurationPayload {
    /// Display name.
    pub name: String,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: CloudProviderConfig,
}

/// Provider-specific configuration, tagged by `provider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "configuration", rename_all = "UPPERCASE")]
pub enum CloudProviderConfig {
    /// See [`AwsConfiguration`].
    Aws(AwsConfiguration),
    /// See [`AzureConfiguration`].
    Azure(AzureConfiguration),
    /// See [`GcpConfiguration`].
    Gcp(GcpConfiguration),
}

impl CloudProviderConfig {
    /// The discriminator of this configuration.
    pub fn provider(&self) -> CloudProvider {
        match self {
            Self::Aws(_) => CloudProvider::Aws,
            Self::Azure(_) => CloudProvider::Azure,
            Self::Gcp(_) => CloudProvider::Gcp,
        }
    }

    /// Read the configuration for `provider` from attributes.
    pub fn from_attributes(provider: CloudProvider, attrs: &AttributeSet) -> Result<Self> {
        Ok(match provider {
            CloudProvider::Aws => Self::Aws(AwsConfiguration::from_attributes(attrs)?),
            CloudProvider::Azure => Self::Azure(AzureConfiguration::from_attributes(attrs)?),
            CloudProvider::Gcp => Self::Gcp(GcpConfiguration::from_attributes(attrs)?),
        })
    }

    /// Decode the configuration object of a remote entity.
    pub fn decode(provider: &str, configuration: &Value) -> Result<Self> {
        let config = configuration.clone();
        Ok(match CloudProvider::parse(provider)? {
            CloudProvider::Aws => Self::Aws(serde_json::from_value(config)?),
            CloudProvider::Azure => Self::Azure(serde_json::from_value(config)?),
            CloudProvider::Gcp => Self::Gcp(serde_json::from_value(config)?),
        })
    }

    /// The configuration object as sent on the wire.
    pub fn configuration(&self) -> Result<Value> {
        Ok(match self {
            Self::Aws(c) => serde_json::to_value(c)?,
            Self::Azure(c) => serde_json::to_value(c)?,
            Self::Gcp(c) => serde_json::to_value(c)?,
        })
    }
}

impl ToAttributes for CloudProviderConfig {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        match self {
            Self::Aws(c) => c.to_attributes(attrs),
            Self::Azure(c) => c.to_attributes(attrs),
            Self::Gcp(c) => c.to_attributes(attrs),
        }
    }
}

/// AWS cost and usage report export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsConfiguration {
    /// Attribute `account_id`.
    pub account_id: String,
    /// Attribute `bucket_name`.
    pub bucket_name: String,
    /// Attribute `regions`.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Attribute `prefix`; empty when unset.
    #[serde(default)]
    pub prefix: String,
}

impl FromAttributes for AwsConfiguration {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            account_id: attrs.require_str("account_id")?.to_string(),
            bucket_name: attrs.require_str("bucket_name")?.to_string(),
            regions: attrs.string_list("regions")?,
            prefix: attrs.str_or("prefix", ""),
        })
    }
}

impl ToAttributes for AwsConfiguration {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set("account_id", self.account_id.clone());
        attrs.set("bucket_name", self.bucket_name.clone());
        attrs.set("regions", self.regions.clone());
        if self.prefix.is_empty() {
            attrs.remove("prefix");
        } else {
            attrs.set("prefix", self.prefix.clone());
        }
    }
}

/// Azure Log Analytics workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfiguration {
    /// Attribute `tenant_id`.
    pub tenant_id: String,
    /// Attribute `client_id`.
    pub client_id: String,
    /// Attribute `log_analytics_workspace_id`.
    pub log_analytics_workspace_id: String,
}

impl FromAttributes for AzureConfiguration {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            tenant_id: attrs.require_str("tenant_id")?.to_string(),
            client_id: attrs.require_str("client_id")?.to_string(),
            log_analytics_workspace_id: attrs
                .require_str("log_analytics_workspace_id")?
                .to_string(),
        })
    }
}

impl ToAttributes for AzureConfiguration {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set("tenant_id", self.tenant_id.clone());
        attrs.set("client_id", self.client_id.clone());
        attrs.set(
            "log_analytics_workspace_id",
            self.log_analytics_workspace_id.clone(),
        );
    }
}

/// GCP workload identity federation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpConfiguration {
    /// Attribute `gcp_project_id`.
    pub gcp_project_id: String,
    /// Attribute `credential_configuration_file_content`.
    pub credential_configuration_file_content: String,
}

impl FromAttributes for GcpConfiguration {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            gcp_project_id: attrs.require_str("gcp_project_id")?.to_string(),
            credential_configuration_file_content: attrs
                .require_str("credential_configuration_file_content")?
                .to_string(),
        })
    }
}

impl ToAttributes for GcpConfiguration {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set("gcp_project_id", self.gcp_project_id.clone());
        attrs.set(
            "credential_configuration_file_content",
            self.credential_configuration_file_content.clone(),
        );
    }
}

/// Mapping for one cloud provider's configuration resource.
#[derive(Debug, Clone, Copy)]
pub struct CloudConfigurationResource {
    provider: CloudProvider,
}

impl CloudConfigurationResource {
    /// Mapping for `provider`.
    pub fn new(provider: CloudProvider) -> Self {
        Self { provider }
    }
}

impl EntityMapping for CloudConfigurationResource {
    type Entity = CloudConfiguration;

    fn type_name(&self) -> &str {
        self.provider.resource_type()
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description(format!("{} cloud configuration", self.provider.as_str()))
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "health",
                Attribute::computed_bool()
                    .with_description("Whether the last connectivity check succeeded"),
            );

        match self.provider {
            CloudProvider::Aws => schema
                .with_attribute("account_id", Attribute::required_string().with_force_new())
                .with_attribute("bucket_name", Attribute::required_string())
                .with_attribute("regions", Attribute::required_string_list())
                .with_attribute(
                    "prefix",
                    Attribute::optional_string().with_description("Report path prefix"),
                ),
            CloudProvider::Azure => schema
                .with_attribute("tenant_id", Attribute::required_string().with_force_new())
                .with_attribute("client_id", Attribute::required_string())
                .with_attribute("log_analytics_workspace_id", Attribute::required_string()),
            CloudProvider::Gcp => schema
                .with_attribute(
                    "gcp_project_id",
                    Attribute::required_string().with_force_new(),
                )
                .with_attribute(
                    "credential_configuration_file_content",
                    Attribute::required_string(),
                ),
        }
    }

    fn write_entity(&self, entity: &CloudConfiguration, state: &mut AttributeSet) -> Result<()> {
        let config = CloudProviderConfig::decode(&entity.provider, &entity.configuration)?;
        if config.provider() != self.provider {
            return Err(ProviderError::InvalidArgument(format!(
                "cloud configuration {} is for {}, not {}",
                entity.id,
                config.provider().as_str(),
                self.provider.as_str()
            )));
        }

        state.set(NAME_ATTRIBUTE, entity.name.clone());
        state.set("health", entity.health);
        config.to_attributes(state);
        Ok(())
    }

    fn discriminator(&self) -> Option<&str> {
        Some(self.provider.as_str())
    }
}

impl ResourceMapping for CloudConfigurationResource {
    fn to_payload(&self, attrs: &AttributeSet) -> Result<CloudConfigurationPayload> {
        Ok(CloudConfigurationPayload {
            name: attrs.require_str(NAME_ATTRIBUTE)?.to_string(),
            config: CloudProviderConfig::from_attributes(self.provider, attrs)?,
        })
    }
}
