//! Cloud credentials.
//!
//! One remote kind, four shapes: the `type` discriminator picks which value
//! object the API expects. Each shape is exposed as its own resource type;
//! the `cloud_credentials` data source looks up any of them.

use serde::{Deserialize, Serialize};

use crate::adapter::{DataSourceMapping, EntityMapping, ResourceMapping};
use crate::attributes::{AttributeSet, FromAttributes, ToAttributes, NAME_ATTRIBUTE};
use crate::client::RemoteEntity;
use crate::error::{ProviderError, Result};
use crate::lookup::normalize_discriminator;
use crate::schema::{Attribute, Schema};

use super::lookup_schema;

/// Default assumed-role session duration in seconds.
pub const DEFAULT_ROLE_DURATION: i64 = 3600;

/// The shapes a credentials entity can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialKind {
    /// AWS role assumed through STS.
    AwsAssumedRole,
    /// Static AWS access keys.
    AwsAccessKeys,
    /// GCP service account key.
    GcpServiceAccount,
    /// Azure service principal.
    AzureServicePrincipal,
}

impl CredentialKind {
    /// All kinds, in registration order.
    pub const ALL: [CredentialKind; 4] = [
        Self::AwsAssumedRole,
        Self::AwsAccessKeys,
        Self::GcpServiceAccount,
        Self::AzureServicePrincipal,
    ];

    /// Wire value of the discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwsAssumedRole => "AWS_ASSUMED_ROLE",
            Self::AwsAccessKeys => "AWS_ACCESS_KEYS",
            Self::GcpServiceAccount => "GCP_SERVICE_ACCOUNT",
            Self::AzureServicePrincipal => "AZURE_SERVICE_PRINCIPAL",
        }
    }

    /// Parse a discriminator in any casing.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_discriminator(raw);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ProviderError::UnhandledVariant {
                field: "type",
                value: raw.to_string(),
            })
    }

    /// Resource type name for this shape.
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::AwsAssumedRole => "aws_assumed_role_credentials",
            Self::AwsAccessKeys => "aws_access_key_credentials",
            Self::GcpServiceAccount => "gcp_credentials",
            Self::AzureServicePrincipal => "azure_credentials",
        }
    }
}

/// A credentials entity as returned by the API. Secret values never come back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Remote id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Discriminator, as the API spells it.
    #[serde(rename = "type")]
    pub kind: String,
    /// Owning organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl RemoteEntity for Credentials {
    type Payload = CredentialsPayload;
    const KIND: &'static str = "credentials";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn discriminator(&self) -> Option<&str> {
        Some(&self.kind)
    }
}

/// Create/update body: `{"name": ..., "type": ..., "value": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsPayload {
    /// Display name.
    pub name: String,
    /// The typed value.
    #[serde(flatten)]
    pub value: CredentialValue,
}

/// Typed credential value, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialValue {
    /// See [`AwsAssumedRoleValue`].
    AwsAssumedRole(AwsAssumedRoleValue),
    /// See [`AwsAccessKeysValue`].
    AwsAccessKeys(AwsAccessKeysValue),
    /// See [`GcpServiceAccountValue`].
    GcpServiceAccount(GcpServiceAccountValue),
    /// See [`AzureServicePrincipalValue`].
    AzureServicePrincipal(AzureServicePrincipalValue),
}

impl CredentialValue {
    /// The discriminator of this value.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::AwsAssumedRole(_) => CredentialKind::AwsAssumedRole,
            Self::AwsAccessKeys(_) => CredentialKind::AwsAccessKeys,
            Self::GcpServiceAccount(_) => CredentialKind::GcpServiceAccount,
            Self::AzureServicePrincipal(_) => CredentialKind::AzureServicePrincipal,
        }
    }

    /// Read the value for `kind` from attributes.
    pub fn from_attributes(kind: CredentialKind, attrs: &AttributeSet) -> Result<Self> {
        Ok(match kind {
            CredentialKind::AwsAssumedRole => {
                Self::AwsAssumedRole(AwsAssumedRoleValue::from_attributes(attrs)?)
            },
            CredentialKind::AwsAccessKeys => {
                Self::AwsAccessKeys(AwsAccessKeysValue::from_attributes(attrs)?)
            },
            CredentialKind::GcpServiceAccount => {
                Self::GcpServiceAccount(GcpServiceAccountValue::from_attributes(attrs)?)
            },
            CredentialKind::AzureServicePrincipal => {
                Self::AzureServicePrincipal(AzureServicePrincipalValue::from_attributes(attrs)?)
            },
        })
    }
}

impl ToAttributes for CredentialValue {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        match self {
            Self::AwsAssumedRole(v) => v.to_attributes(attrs),
            Self::AwsAccessKeys(v) => v.to_attributes(attrs),
            Self::GcpServiceAccount(v) => v.to_attributes(attrs),
            Self::AzureServicePrincipal(v) => v.to_attributes(attrs),
        }
    }
}

/// AWS assumed role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsAssumedRoleValue {
    /// Role ARN (attribute `arn`).
    pub role_arn: String,
    /// Session duration in seconds (attribute `duration`).
    pub duration: i64,
}

impl FromAttributes for AwsAssumedRoleValue {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            role_arn: attrs.require_str("arn")?.to_string(),
            duration: attrs.get_i64("duration").unwrap_or(DEFAULT_ROLE_DURATION),
        })
    }
}

impl ToAttributes for AwsAssumedRoleValue {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set("arn", self.role_arn.clone());
        attrs.set("duration", self.duration);
    }
}

/// Static AWS access keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsAccessKeysValue {
    /// Attribute `access_key_id`.
    pub access_key_id: String,
    /// Attribute `secret_access_key`.
    pub secret_access_key: String,
}

impl FromAttributes for AwsAccessKeysValue {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            access_key_id: attrs.require_str("access_key_id")?.to_string(),
            secret_access_key: attrs.require_str("secret_access_key")?.to_string(),
        })
    }
}

impl ToAttributes for AwsAccessKeysValue {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set("access_key_id", self.access_key_id.clone());
        attrs.set("secret_access_key", self.secret_access_key.clone());
    }
}

/// GCP service account key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpServiceAccountValue {
    /// Attribute `project_id`; optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Attribute `service_account_key`.
    pub service_account_key: String,
}

impl FromAttributes for GcpServiceAccountValue {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            project_id: attrs.get_str("project_id").map(str::to_string),
            service_account_key: attrs.require_str("service_account_key")?.to_string(),
        })
    }
}

impl ToAttributes for GcpServiceAccountValue {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set_opt("project_id", self.project_id.clone());
        attrs.set("service_account_key", self.service_account_key.clone());
    }
}

/// Azure service principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureServicePrincipalValue {
    /// Attribute `client_id`.
    pub client_id: String,
    /// Attribute `client_secret`.
    pub client_secret: String,
    /// Attribute `subscription_id`.
    pub subscription_id: String,
    /// Attribute `tenant_id`.
    pub tenant_id: String,
}

impl FromAttributes for AzureServicePrincipalValue {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            client_id: attrs.require_str("client_id")?.to_string(),
            client_secret: attrs.require_str("client_secret")?.to_string(),
            subscription_id: attrs.require_str("subscription_id")?.to_string(),
            tenant_id: attrs.require_str("tenant_id")?.to_string(),
        })
    }
}

impl ToAttributes for AzureServicePrincipalValue {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set("client_id", self.client_id.clone());
        attrs.set("client_secret", self.client_secret.clone());
        attrs.set("subscription_id", self.subscription_id.clone());
        attrs.set("tenant_id", self.tenant_id.clone());
    }
}

fn credentials_schema(kind: CredentialKind) -> Schema {
    let schema = Schema::v0()
        .with_description(format!("Cloud credentials of type {}", kind.as_str()))
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name for the credentials"),
        );

    match kind {
        CredentialKind::AwsAssumedRole => schema
            .with_attribute(
                "arn",
                Attribute::required_string().with_description("ARN of the role to assume"),
            )
            .with_attribute(
                "duration",
                Attribute::optional_int64()
                    .with_default(serde_json::json!(DEFAULT_ROLE_DURATION))
                    .with_description("Session duration in seconds"),
            ),
        CredentialKind::AwsAccessKeys => schema
            .with_attribute(
                "access_key_id",
                Attribute::secret_string().with_description("AWS access key id"),
            )
            .with_attribute(
                "secret_access_key",
                Attribute::secret_string().with_description("AWS secret access key"),
            ),
        CredentialKind::GcpServiceAccount => schema
            .with_attribute("project_id", Attribute::optional_string())
            .with_attribute(
                "service_account_key",
                Attribute::secret_string().with_description("Service account key JSON"),
            ),
        CredentialKind::AzureServicePrincipal => schema
            .with_attribute("client_id", Attribute::required_string())
            .with_attribute("client_secret", Attribute::secret_string())
            .with_attribute("subscription_id", Attribute::required_string())
            .with_attribute("tenant_id", Attribute::required_string()),
    }
}

/// Mapping for one credentials shape.
#[derive(Debug, Clone, Copy)]
pub struct CredentialsResource {
    kind: CredentialKind,
}

impl CredentialsResource {
    /// Mapping for `kind`.
    pub fn new(kind: CredentialKind) -> Self {
        Self { kind }
    }
}

impl EntityMapping for CredentialsResource {
    type Entity = Credentials;

    fn type_name(&self) -> &str {
        self.kind.resource_type()
    }

    fn schema(&self) -> Schema {
        credentials_schema(self.kind)
    }

    fn write_entity(&self, entity: &Credentials, state: &mut AttributeSet) -> Result<()> {
        let kind = CredentialKind::parse(&entity.kind)?;
        if kind != self.kind {
            return Err(ProviderError::InvalidArgument(format!(
                "credentials {} are of type {}, not {}",
                entity.id,
                kind.as_str(),
                self.kind.as_str()
            )));
        }
        // The value object is write-only; only identity comes back.
        state.set(NAME_ATTRIBUTE, entity.name.clone());
        Ok(())
    }

    fn discriminator(&self) -> Option<&str> {
        Some(self.kind.as_str())
    }
}

impl ResourceMapping for CredentialsResource {
    fn to_payload(&self, attrs: &AttributeSet) -> Result<CredentialsPayload> {
        Ok(CredentialsPayload {
            name: attrs.require_str(NAME_ATTRIBUTE)?.to_string(),
            value: CredentialValue::from_attributes(self.kind, attrs)?,
        })
    }
}

/// The `cloud_credentials` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialsDataSource;

impl EntityMapping for CredentialsDataSource {
    type Entity = Credentials;

    fn type_name(&self) -> &str {
        "cloud_credentials"
    }

    fn schema(&self) -> Schema {
        self.data_source_schema()
    }

    fn write_entity(&self, entity: &Credentials, state: &mut AttributeSet) -> Result<()> {
        state.set(NAME_ATTRIBUTE, entity.name.clone());
        state.set("type", CredentialKind::parse(&entity.kind)?.as_str());
        Ok(())
    }
}

impl DataSourceMapping for CredentialsDataSource {
    fn discriminator_attribute(&self) -> Option<&str> {
        Some("type")
    }

    fn data_source_schema(&self) -> Schema {
        let kinds = CredentialKind::ALL.map(CredentialKind::as_str);
        lookup_schema("Look up cloud credentials by id or by name").with_attribute(
            "type",
            Attribute::optional_computed_string()
                .with_allowed_values(kinds)
                .with_required_with(["name"])
                .with_description("Restrict a name lookup to one credentials type"),
        )
    }
}
