//! Templates: a repository path deployed by one IaC tool.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::{DataSourceMapping, EntityMapping, ResourceMapping};
use crate::attributes::{AttributeSet, FromAttributes, ToAttributes, NAME_ATTRIBUTE};
use crate::client::RemoteEntity;
use crate::error::{ProviderError, Result};
use crate::lookup::normalize_discriminator;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};

use super::lookup_schema;

/// IaC tool a template is deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    /// Terraform.
    #[default]
    Terraform,
    /// Terragrunt.
    Terragrunt,
    /// OpenTofu.
    Opentofu,
    /// Pulumi.
    Pulumi,
    /// Plain Kubernetes manifests.
    K8s,
    /// Helm charts.
    Helm,
    /// CloudFormation.
    Cloudformation,
    /// Ansible playbooks.
    Ansible,
}

impl TemplateType {
    /// All types.
    pub const ALL: [TemplateType; 8] = [
        Self::Terraform,
        Self::Terragrunt,
        Self::Opentofu,
        Self::Pulumi,
        Self::K8s,
        Self::Helm,
        Self::Cloudformation,
        Self::Ansible,
    ];

    /// Attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
            Self::Terragrunt => "terragrunt",
            Self::Opentofu => "opentofu",
            Self::Pulumi => "pulumi",
            Self::K8s => "k8s",
            Self::Helm => "helm",
            Self::Cloudformation => "cloudformation",
            Self::Ansible => "ansible",
        }
    }

    /// Parse in any casing.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_discriminator(raw);
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| ProviderError::UnhandledVariant {
                field: "type",
                value: raw.to_string(),
            })
    }
}

/// An SSH key attached to a template for private module sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    /// Key id.
    pub id: String,
    /// Key name.
    pub name: String,
}

impl FromAttributes for SshKey {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            id: attrs.require_str("id")?.to_string(),
            name: attrs.require_str("name")?.to_string(),
        })
    }
}

impl SshKey {
    fn to_value(&self) -> Value {
        json!({"id": self.id, "name": self.name})
    }
}

/// A template as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Remote id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Git repository URL.
    pub repository: String,
    /// Path inside the repository.
    #[serde(default)]
    pub path: Option<String>,
    /// Branch, tag or commit.
    #[serde(default)]
    pub revision: Option<String>,
    /// IaC tool, as the API spells it.
    #[serde(rename = "type")]
    pub kind: String,
    /// Pinned Terraform version.
    #[serde(default)]
    pub terraform_version: Option<String>,
    /// Attached SSH keys.
    #[serde(default)]
    pub ssh_keys: Vec<SshKey>,
    /// Soft-delete marker.
    #[serde(default)]
    pub is_deleted: bool,
}

impl RemoteEntity for Template {
    type Payload = TemplatePayload;
    const KIND: &'static str = "template";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_gone(&self) -> bool {
        self.is_deleted
    }
}

/// Create/update body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Git repository URL.
    pub repository: String,
    /// Path inside the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Branch, tag or commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// IaC tool.
    #[serde(rename = "type")]
    pub kind: TemplateType,
    /// Pinned Terraform version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    /// Attached SSH keys.
    #[serde(default)]
    pub ssh_keys: Vec<SshKey>,
}

impl FromAttributes for TemplatePayload {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            name: attrs.require_str(NAME_ATTRIBUTE)?.to_string(),
            description: attrs.get_str("description").map(str::to_string),
            repository: attrs.require_str("repository")?.to_string(),
            path: attrs.get_str("path").map(str::to_string),
            revision: attrs.get_str("revision").map(str::to_string),
            kind: attrs
                .get_str("type")
                .map(TemplateType::parse)
                .transpose()?
                .unwrap_or_default(),
            terraform_version: attrs.get_str("terraform_version").map(str::to_string),
            ssh_keys: attrs
                .nested_list("ssh_keys")?
                .iter()
                .map(SshKey::from_attributes)
                .collect::<Result<_>>()?,
        })
    }
}

impl ToAttributes for Template {
    fn to_attributes(&self, attrs: &mut AttributeSet) {
        attrs.set(NAME_ATTRIBUTE, self.name.clone());
        attrs.set_opt("description", self.description.clone());
        attrs.set("repository", self.repository.clone());
        attrs.set_opt("path", self.path.clone());
        attrs.set_opt("revision", self.revision.clone());
        attrs.set_opt("terraform_version", self.terraform_version.clone());
        if !self.ssh_keys.is_empty() || attrs.is_set("ssh_keys") {
            let keys: Vec<Value> = self.ssh_keys.iter().map(SshKey::to_value).collect();
            attrs.set("ssh_keys", keys);
        }
    }
}

fn write_template(entity: &Template, state: &mut AttributeSet) -> Result<()> {
    let kind = TemplateType::parse(&entity.kind)?;
    entity.to_attributes(state);
    state.set("type", kind.as_str());
    Ok(())
}

/// The `template` resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResource;

impl EntityMapping for TemplateResource {
    type Entity = Template;

    fn type_name(&self) -> &str {
        "template"
    }

    fn schema(&self) -> Schema {
        let ssh_key = Block::new()
            .with_attribute("id", Attribute::required_string())
            .with_attribute("name", Attribute::required_string());

        Schema::v0()
            .with_description("A template deployed from a git repository")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("repository", Attribute::required_string())
            .with_attribute("path", Attribute::optional_string())
            .with_attribute("revision", Attribute::optional_string())
            .with_attribute(
                "type",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_allowed_values(TemplateType::ALL.map(TemplateType::as_str))
                    .with_default(json!("terraform")),
            )
            .with_attribute("terraform_version", Attribute::optional_string())
            .with_block("ssh_keys", NestedBlock::list(ssh_key))
    }

    fn write_entity(&self, entity: &Template, state: &mut AttributeSet) -> Result<()> {
        write_template(entity, state)
    }
}

impl ResourceMapping for TemplateResource {
    fn to_payload(&self, attrs: &AttributeSet) -> Result<TemplatePayload> {
        TemplatePayload::from_attributes(attrs)
    }
}

/// The `template` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateDataSource;

impl EntityMapping for TemplateDataSource {
    type Entity = Template;

    fn type_name(&self) -> &str {
        "template"
    }

    fn schema(&self) -> Schema {
        self.data_source_schema()
    }

    fn write_entity(&self, entity: &Template, state: &mut AttributeSet) -> Result<()> {
        write_template(entity, state)
    }
}

impl DataSourceMapping for TemplateDataSource {
    fn data_source_schema(&self) -> Schema {
        lookup_schema("Look up a template by id or by name")
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("repository", Attribute::computed_string())
            .with_attribute("path", Attribute::computed_string())
            .with_attribute("revision", Attribute::computed_string())
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("terraform_version", Attribute::computed_string())
            .with_attribute(
                "ssh_keys",
                Attribute::new(
                    AttributeType::list(AttributeType::Dynamic),
                    AttributeFlags::computed(),
                ),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(value: Value) -> AttributeSet {
        AttributeSet::from_value(value).unwrap()
    }

    fn template(kind: &str) -> Template {
        Template {
            id: "t-1".into(),
            name: "network".into(),
            description: None,
            repository: "https://github.com/acme/infra".into(),
            path: Some("network".into()),
            revision: None,
            kind: kind.into(),
            terraform_version: Some("1.7.5".into()),
            ssh_keys: vec![SshKey {
                id: "k-1".into(),
                name: "deploy".into(),
            }],
            is_deleted: false,
        }
    }

    #[test]
    fn test_payload_from_attributes() {
        let payload = TemplateResource
            .to_payload(&attrs(json!({
                "name": "network",
                "repository": "https://github.com/acme/infra",
                "ssh_keys": [{"id": "k-1", "name": "deploy"}],
            })))
            .unwrap();
        assert_eq!(payload.kind, TemplateType::Terraform);
        assert_eq!(payload.ssh_keys.len(), 1);
        assert!(payload.path.is_none());
    }

    #[test]
    fn test_ssh_key_requires_fields() {
        let err = TemplateResource
            .to_payload(&attrs(json!({
                "name": "network",
                "repository": "r",
                "ssh_keys": [{"id": "k-1"}],
            })))
            .unwrap_err();
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_write_entity() {
        let mut state = AttributeSet::new();
        TemplateResource
            .write_entity(&template("TERRAGRUNT"), &mut state)
            .unwrap();
        assert_eq!(state.get_str("type"), Some("terragrunt"));
        assert_eq!(state.get_str("path"), Some("network"));
        assert!(!state.is_set("revision"));
        assert_eq!(state.get("ssh_keys"), Some(&json!([{"id": "k-1", "name": "deploy"}])));
    }

    #[test]
    fn test_unknown_type_is_unhandled() {
        let err = TemplateResource
            .write_entity(&template("workflow"), &mut AttributeSet::new())
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnhandledVariant { field: "type", .. }));
    }

    #[test]
    fn test_deleted_template_is_gone() {
        let mut t = template("terraform");
        assert!(!t.is_gone());
        t.is_deleted = true;
        assert!(t.is_gone());
    }
}
