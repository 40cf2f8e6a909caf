//! Configuration variables.
//!
//! Variables are scoped: the same name may exist once per scope, so name
//! lookups are always pre-filtered by the scope chosen through the selector
//! attributes (see [`crate::scope`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::{DataSourceMapping, EntityMapping, ResourceMapping};
use crate::attributes::{AttributeSet, NAME_ATTRIBUTE};
use crate::client::{ListFilter, RemoteEntity};
use crate::error::{ProviderError, Result};
use crate::lookup::{discriminators_match, normalize_discriminator, LookupKey};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::scope::{Scope, ScopeRef, SCOPE_SELECTORS};

/// Where the variable is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Exported as an environment variable.
    #[default]
    Environment,
    /// Passed as a Terraform input variable.
    Terraform,
}

impl VariableType {
    /// Attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Terraform => "terraform",
        }
    }

    /// Parse in any casing.
    pub fn parse(raw: &str) -> Result<Self> {
        match normalize_discriminator(raw).as_str() {
            "ENVIRONMENT" => Ok(Self::Environment),
            "TERRAFORM" => Ok(Self::Terraform),
            _ => Err(ProviderError::UnhandledVariant {
                field: "type",
                value: raw.to_string(),
            }),
        }
    }
}

/// How a Terraform variable value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableFormat {
    /// Plain string.
    #[default]
    Text,
    /// HCL expression.
    Hcl,
    /// JSON document.
    Json,
}

impl VariableFormat {
    /// Attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Hcl => "hcl",
            Self::Json => "json",
        }
    }

    /// Parse in any casing.
    pub fn parse(raw: &str) -> Result<Self> {
        match normalize_discriminator(raw).as_str() {
            "TEXT" => Ok(Self::Text),
            "HCL" => Ok(Self::Hcl),
            "JSON" => Ok(Self::Json),
            _ => Err(ProviderError::UnhandledVariant {
                field: "format",
                value: raw.to_string(),
            }),
        }
    }
}

/// A configuration variable as returned by the API.
///
/// Sensitive values come back masked or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationVariable {
    /// Remote id.
    pub id: String,
    /// Variable name.
    pub name: String,
    /// Value, absent for sensitive variables.
    #[serde(default)]
    pub value: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the value is secret.
    #[serde(default)]
    pub is_sensitive: bool,
    /// Whether lower scopes may override the value.
    #[serde(default)]
    pub is_read_only: bool,
    /// Whether a value must be supplied at deploy time.
    #[serde(default)]
    pub is_required: bool,
    /// Injection type.
    #[serde(rename = "type")]
    pub kind: VariableType,
    /// Value format.
    #[serde(default)]
    pub format: Option<VariableFormat>,
    /// Allowed values, empty when unrestricted.
    #[serde(default, rename = "enumValues")]
    pub enum_values: Vec<String>,
    /// Scope level.
    pub scope: Scope,
    /// Owner of the scope.
    #[serde(default)]
    pub scope_id: Option<String>,
}

impl RemoteEntity for ConfigurationVariable {
    type Payload = ConfigurationVariablePayload;
    const KIND: &'static str = "configuration variable";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn discriminator(&self) -> Option<&str> {
        Some(self.kind.as_str())
    }

    fn scope(&self) -> Option<ScopeRef> {
        Some(ScopeRef {
            scope: self.scope,
            scope_id: self.scope_id.clone(),
        })
    }
}

/// Create/update body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationVariablePayload {
    /// Variable name.
    pub name: String,
    /// Value; empty when unset.
    pub value: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the value is secret.
    pub is_sensitive: bool,
    /// Whether lower scopes may override the value.
    pub is_read_only: bool,
    /// Whether a value must be supplied at deploy time.
    pub is_required: bool,
    /// Injection type.
    #[serde(rename = "type")]
    pub kind: VariableType,
    /// Value format.
    pub format: VariableFormat,
    /// Allowed values.
    #[serde(rename = "enumValues", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    /// Scope the variable is defined in.
    #[serde(flatten)]
    pub scope: ScopeRef,
}

impl ConfigurationVariablePayload {
    fn check_value(&self) -> Result<()> {
        if !self.enum_values.is_empty() && !self.enum_values.contains(&self.value) {
            return Err(ProviderError::InvalidArgument(format!(
                "value \"{}\" of variable '{}' is not one of [{}]",
                self.value,
                self.name,
                self.enum_values.join(", ")
            )));
        }
        if self.format == VariableFormat::Json {
            serde_json::from_str::<Value>(&self.value).map_err(|err| {
                ProviderError::InvalidArgument(format!(
                    "value of variable '{}' is not valid JSON: {}",
                    self.name, err
                ))
            })?;
        }
        Ok(())
    }
}

fn optional_computed(attr_type: AttributeType) -> Attribute {
    Attribute::new(attr_type, AttributeFlags::optional_computed())
}

fn selector_attribute(selector: &str) -> Attribute {
    let others: Vec<&str> = SCOPE_SELECTORS
        .iter()
        .copied()
        .filter(|other| *other != selector)
        .collect();
    Attribute::optional_string()
        .with_force_new()
        .with_conflicts_with(others)
}

fn with_selectors(mut schema: Schema) -> Schema {
    for selector in SCOPE_SELECTORS {
        schema = schema.with_attribute(selector, selector_attribute(selector));
    }
    schema
}

/// Keep the configured spelling when it names the same variant.
fn set_discriminator(state: &mut AttributeSet, name: &str, canonical: Option<&'static str>) {
    match (canonical, state.get_str(name)) {
        (Some(canonical), Some(current)) if discriminators_match(canonical, current) => {},
        (canonical, _) => state.set_opt(name, canonical),
    }
}

fn write_variable(entity: &ConfigurationVariable, state: &mut AttributeSet, keep_secret: bool) {
    state.set(NAME_ATTRIBUTE, entity.name.clone());
    if !(keep_secret && entity.is_sensitive) {
        state.set_opt("value", entity.value.clone());
    }
    state.set_opt("description", entity.description.clone());
    state.set("is_sensitive", entity.is_sensitive);
    state.set("is_read_only", entity.is_read_only);
    state.set("is_required", entity.is_required);
    set_discriminator(state, "type", Some(entity.kind.as_str()));
    set_discriminator(state, "format", entity.format.map(VariableFormat::as_str));
    if entity.enum_values.is_empty() {
        state.remove("enum");
    } else {
        state.set("enum", entity.enum_values.clone());
    }
    ScopeRef {
        scope: entity.scope,
        scope_id: entity.scope_id.clone(),
    }
    .write_to(state);
}

/// The `configuration_variable` resource.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationVariableResource {
    organization_id: Option<String>,
}

impl ConfigurationVariableResource {
    /// Mapping whose global scope belongs to `organization_id`.
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }

    fn scope_from_import(&self, raw: &Value) -> Result<(String, ScopeRef)> {
        let field = |name: &str| raw.get(name).and_then(Value::as_str);
        let name = field("name").ok_or_else(|| {
            ProviderError::InvalidArgument("import object must contain 'name'".into())
        })?;
        let scope = Scope::parse(field("scope").unwrap_or("GLOBAL"))?;
        let scope_ref = match (scope, field("scope_id")) {
            (Scope::Global, None) => ScopeRef::global(self.organization_id.as_deref()),
            (_, Some(id)) => ScopeRef::new(scope, id),
            (_, None) => {
                return Err(ProviderError::InvalidArgument(format!(
                    "import of a {} scoped variable requires 'scope_id'",
                    scope
                )))
            },
        };
        Ok((name.to_string(), scope_ref))
    }
}

impl EntityMapping for ConfigurationVariableResource {
    type Entity = ConfigurationVariable;

    fn type_name(&self) -> &str {
        "configuration_variable"
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("A configuration variable at organization, project, template, environment or deployment scope")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "value",
                Attribute::optional_string().with_description("Write-only when is_sensitive is set"),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "is_sensitive",
                optional_computed(AttributeType::Bool).with_force_new(),
            )
            .with_attribute("is_read_only", optional_computed(AttributeType::Bool))
            .with_attribute("is_required", optional_computed(AttributeType::Bool))
            .with_attribute(
                "type",
                optional_computed(AttributeType::String)
                    .with_allowed_values(["environment", "terraform"])
                    .with_force_new(),
            )
            .with_attribute(
                "format",
                optional_computed(AttributeType::String).with_allowed_values(["text", "hcl", "json"]),
            )
            .with_attribute("enum", Attribute::optional_string_list());
        with_selectors(schema)
    }

    fn write_entity(&self, entity: &ConfigurationVariable, state: &mut AttributeSet) -> Result<()> {
        write_variable(entity, state, true);
        Ok(())
    }

    fn list_filter(&self, attrs: &AttributeSet) -> Result<ListFilter> {
        ScopeRef::from_attributes(attrs, self.organization_id.as_deref()).map(ListFilter::in_scope)
    }
}

impl ResourceMapping for ConfigurationVariableResource {
    fn to_payload(&self, attrs: &AttributeSet) -> Result<ConfigurationVariablePayload> {
        let payload = ConfigurationVariablePayload {
            name: attrs.require_str(NAME_ATTRIBUTE)?.to_string(),
            value: attrs.str_or("value", ""),
            description: attrs.get_str("description").map(str::to_string),
            is_sensitive: attrs.bool_or_false("is_sensitive"),
            is_read_only: attrs.bool_or_false("is_read_only"),
            is_required: attrs.bool_or_false("is_required"),
            kind: attrs
                .get_str("type")
                .map(VariableType::parse)
                .transpose()?
                .unwrap_or_default(),
            format: attrs
                .get_str("format")
                .map(VariableFormat::parse)
                .transpose()?
                .unwrap_or_default(),
            enum_values: attrs.string_list("enum")?,
            scope: ScopeRef::from_attributes(attrs, self.organization_id.as_deref())?,
        };
        payload.check_value()?;
        Ok(payload)
    }

    /// Accepts an id, a bare name, or `{"scope": ..., "scope_id": ..., "name": ...}`.
    fn import_key(&self, raw: &str) -> Result<(LookupKey, ListFilter)> {
        let raw = raw.trim();
        if raw.starts_with('{') {
            let value: Value = serde_json::from_str(raw).map_err(|err| {
                ProviderError::InvalidArgument(format!("invalid import object: {}", err))
            })?;
            let (name, scope) = self.scope_from_import(&value)?;
            return Ok((LookupKey::by_name(name), ListFilter::in_scope(scope)));
        }
        Ok((LookupKey::parse_import_id(raw), ListFilter::all()))
    }
}

/// The `configuration_variable` data source.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationVariableDataSource {
    organization_id: Option<String>,
}

impl ConfigurationVariableDataSource {
    /// Data source whose global scope belongs to `organization_id`.
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl EntityMapping for ConfigurationVariableDataSource {
    type Entity = ConfigurationVariable;

    fn type_name(&self) -> &str {
        "configuration_variable"
    }

    fn schema(&self) -> Schema {
        self.data_source_schema()
    }

    fn write_entity(&self, entity: &ConfigurationVariable, state: &mut AttributeSet) -> Result<()> {
        write_variable(entity, state, false);
        Ok(())
    }

    fn list_filter(&self, attrs: &AttributeSet) -> Result<ListFilter> {
        ScopeRef::from_attributes(attrs, self.organization_id.as_deref()).map(ListFilter::in_scope)
    }
}

impl DataSourceMapping for ConfigurationVariableDataSource {
    fn discriminator_attribute(&self) -> Option<&str> {
        Some("type")
    }

    fn data_source_schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_attribute(
                "id",
                Attribute::optional_computed_string().with_exactly_one_of(["id", "name"]),
            )
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_exactly_one_of(["id", "name"]),
            )
            .with_attribute(
                "type",
                optional_computed(AttributeType::String)
                    .with_allowed_values(["environment", "terraform"])
                    .with_required_with(["name"]),
            )
            .with_attribute("value", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("is_sensitive", Attribute::computed_bool())
            .with_attribute("is_read_only", Attribute::computed_bool())
            .with_attribute("is_required", Attribute::computed_bool())
            .with_attribute("format", Attribute::computed_string())
            .with_attribute(
                "enum",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::computed(),
                ),
            );
        with_selectors(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> AttributeSet {
        AttributeSet::from_value(value).unwrap()
    }

    fn mapping() -> ConfigurationVariableResource {
        ConfigurationVariableResource::new(Some("org-1".into()))
    }

    fn entity(sensitive: bool) -> ConfigurationVariable {
        ConfigurationVariable {
            id: "v-1".into(),
            name: "REGION".into(),
            value: (!sensitive).then(|| "eu-west-1".to_string()),
            description: None,
            is_sensitive: sensitive,
            is_read_only: false,
            is_required: false,
            kind: VariableType::Environment,
            format: None,
            enum_values: Vec::new(),
            scope: Scope::Project,
            scope_id: Some("p-1".into()),
        }
    }

    #[test]
    fn test_defaults_to_global_environment_text() {
        let payload = mapping()
            .to_payload(&attrs(json!({"name": "REGION", "value": "eu-west-1"})))
            .unwrap();
        assert_eq!(payload.kind, VariableType::Environment);
        assert_eq!(payload.format, VariableFormat::Text);
        assert_eq!(payload.scope, ScopeRef::global(Some("org-1")));
        assert!(!payload.is_sensitive);
    }

    #[test]
    fn test_scope_selector() {
        let payload = mapping()
            .to_payload(&attrs(json!({"name": "X", "template_id": "t-1", "type": "terraform"})))
            .unwrap();
        assert_eq!(payload.scope, ScopeRef::new(Scope::Template, "t-1"));
        assert_eq!(payload.kind, VariableType::Terraform);
    }

    #[test]
    fn test_enum_membership() {
        let err = mapping()
            .to_payload(&attrs(json!({"name": "SIZE", "value": "xl", "enum": ["s", "m"]})))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));

        assert!(mapping()
            .to_payload(&attrs(json!({"name": "SIZE", "value": "m", "enum": ["s", "m"]})))
            .is_ok());
    }

    #[test]
    fn test_json_format_must_parse() {
        let err = mapping()
            .to_payload(&attrs(json!({"name": "MAP", "value": "{nope", "format": "json"})))
            .unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));

        assert!(mapping()
            .to_payload(&attrs(json!({"name": "MAP", "value": "{\"a\": 1}", "format": "JSON"})))
            .is_ok());
    }

    #[test]
    fn test_sensitive_value_is_write_only() {
        let mut state = attrs(json!({"name": "TOKEN", "value": "s3cr3t", "is_sensitive": true}));
        mapping().write_entity(&entity(true), &mut state).unwrap();
        assert_eq!(state.get_str("value"), Some("s3cr3t"));
        assert_eq!(state.get_str("project_id"), Some("p-1"));
    }

    #[test]
    fn test_plain_value_refreshes() {
        let mut state = attrs(json!({"name": "REGION", "value": "us-east-1"}));
        mapping().write_entity(&entity(false), &mut state).unwrap();
        assert_eq!(state.get_str("value"), Some("eu-west-1"));
        assert_eq!(state.get_str("type"), Some("environment"));
    }

    #[test]
    fn test_refresh_keeps_configured_casing_and_drops_stale_fields() {
        let mut state = attrs(json!({
            "name": "REGION",
            "type": "ENVIRONMENT",
            "format": "hcl",
            "description": "old",
            "enum": ["eu-west-1"],
        }));
        mapping().write_entity(&entity(false), &mut state).unwrap();
        assert_eq!(state.get_str("type"), Some("ENVIRONMENT"));
        assert!(!state.is_set("format"));
        assert!(!state.is_set("description"));
        assert!(!state.is_set("enum"));
    }

    #[test]
    fn test_import_by_scoped_object() {
        let (key, filter) = mapping()
            .import_key(r#"{"scope": "ENVIRONMENT", "scope_id": "env-1", "name": "REGION"}"#)
            .unwrap();
        assert_eq!(key, LookupKey::by_name("REGION"));
        assert_eq!(filter, ListFilter::in_scope(ScopeRef::new(Scope::Environment, "env-1")));

        let (_, filter) = mapping().import_key(r#"{"name": "REGION"}"#).unwrap();
        assert_eq!(filter, ListFilter::in_scope(ScopeRef::global(Some("org-1"))));
    }

    #[test]
    fn test_import_object_requires_scope_id() {
        let err = mapping()
            .import_key(r#"{"scope": "PROJECT", "name": "REGION"}"#)
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));
    }

    #[test]
    fn test_selectors_conflict_in_schema() {
        use crate::validation::validate;
        let diagnostics = validate(
            &mapping().schema(),
            &json!({"name": "X", "project_id": "p", "environment_id": "e"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("conflicts with"));
    }
}
