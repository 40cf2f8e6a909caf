//! The local attribute set and the field-mapping layer.
//!
//! An [`AttributeSet`] is the caller-declared view of one entity: a flat JSON
//! object keyed by attribute name. `null` is treated as "not set" everywhere,
//! matching how the host represents unset optional attributes.
//!
//! Payload structs convert from and to attribute sets through
//! [`FromAttributes`] and [`ToAttributes`]. Implementations are written field
//! by field so that every payload field names the attribute it comes from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};

/// Name of the attribute holding the remote identity.
pub const ID_ATTRIBUTE: &str = "id";

/// Name of the attribute holding the human-readable name.
pub const NAME_ATTRIBUTE: &str = "name";

/// A caller-declared set of attribute values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(Map<String, Value>);

impl AttributeSet {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an attribute set from a host state value.
    ///
    /// `null` yields an empty set; anything other than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ProviderError::InvalidArgument(format!(
                "expected an attribute object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Convert back into a host state value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Get an attribute, treating `null` as absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Whether the attribute is set to a non-null value.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Set an attribute when `value` is `Some`, remove it otherwise.
    pub fn set_opt<V: Into<Value>>(&mut self, name: impl Into<String>, value: Option<V>) {
        let name = name.into();
        match value {
            Some(value) => self.set(name, value),
            None => {
                self.remove(&name);
            },
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Chainable [`set`](Self::set), handy when building fixtures.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// The remote identity, if known.
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_ATTRIBUTE).filter(|id| !id.is_empty())
    }

    /// The remote identity, or an error when the entity was never created.
    pub fn require_id(&self) -> Result<&str> {
        self.id().ok_or_else(|| {
            ProviderError::InvalidArgument("state has no id; the entity was never created".into())
        })
    }

    /// Record the remote identity.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set(ID_ATTRIBUTE, id.into());
    }

    /// Get a string attribute.
    ///
    /// Values of another type are treated as absent; schema validation
    /// reports them before mapping runs.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Get a required string attribute.
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.get_str(name)
            .ok_or_else(|| ProviderError::missing_attribute(name))
    }

    /// Get a string attribute, falling back to `default`.
    pub fn str_or(&self, name: &str, default: &str) -> String {
        self.get_str(name).unwrap_or(default).to_string()
    }

    /// Get an integer attribute.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        })
    }

    /// Get a boolean attribute, defaulting to `false`.
    pub fn bool_or_false(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Get a list of strings; absent means empty.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ProviderError::InvalidArgument(format!(
                            "attribute '{}' must be a list of strings",
                            name
                        ))
                    })
                })
                .collect(),
            Some(other) => Err(ProviderError::InvalidArgument(format!(
                "attribute '{}' must be a list, got {}",
                name,
                type_name(other)
            ))),
        }
    }

    /// Get a list of nested attribute sets (list blocks).
    pub fn nested_list(&self, name: &str) -> Result<Vec<AttributeSet>> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(AttributeSet::from_value)
                .collect(),
            Some(other) => Err(ProviderError::InvalidArgument(format!(
                "block '{}' must be a list, got {}",
                name,
                type_name(other)
            ))),
        }
    }

    /// Project onto a subset of attribute names, dropping unset ones.
    pub fn project<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> AttributeSet {
        let mut out = AttributeSet::new();
        for name in names {
            if let Some(value) = self.get(name) {
                out.set(name, value.clone());
            }
        }
        out
    }

    /// Iterate over set (non-null) attributes.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Map<String, Value>> for AttributeSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Build a payload value from attributes.
pub trait FromAttributes: Sized {
    /// Read every field from its source attribute.
    fn from_attributes(attrs: &AttributeSet) -> Result<Self>;
}

/// Write a payload value back into attributes.
///
/// Implementations only write fields that carry a value; anything the remote
/// side left out stays as it was locally.
pub trait ToAttributes {
    /// Write every known field into its attribute.
    fn to_attributes(&self, attrs: &mut AttributeSet);
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> AttributeSet {
        AttributeSet::from_value(value).unwrap()
    }

    #[test]
    fn test_from_value() {
        assert!(AttributeSet::from_value(Value::Null).unwrap().as_map().is_empty());
        assert!(AttributeSet::from_value(json!("nope")).is_err());
        assert!(AttributeSet::from_value(json!([1])).is_err());
    }

    #[test]
    fn test_null_is_unset() {
        let a = attrs(json!({"name": null, "prefix": ""}));
        assert!(!a.is_set("name"));
        assert!(a.is_set("prefix"));
        assert_eq!(a.iter().count(), 1);
    }

    #[test]
    fn test_identity() {
        let mut a = attrs(json!({"name": "x"}));
        assert!(a.id().is_none());
        assert!(a.require_id().is_err());

        a.set_id("abc");
        assert_eq!(a.require_id().unwrap(), "abc");

        a.remove(ID_ATTRIBUTE);
        assert!(a.id().is_none());

        // An empty id means "not created" as well.
        let a = attrs(json!({"id": ""}));
        assert!(a.id().is_none());
    }

    #[test]
    fn test_set_opt_removes_on_none() {
        let mut a = attrs(json!({"description": "old", "name": "x"}));
        a.set_opt("description", None::<String>);
        assert!(!a.as_map().contains_key("description"));

        a.set_opt("description", Some("new"));
        assert_eq!(a.get_str("description"), Some("new"));
    }

    #[test]
    fn test_typed_getters() {
        let a = attrs(json!({
            "name": "prod",
            "duration": 7200,
            "whole": 3.0,
            "enabled": true,
            "regions": ["us-east-1", "eu-west-1"],
        }));

        assert_eq!(a.require_str("name").unwrap(), "prod");
        assert_eq!(a.get_i64("duration"), Some(7200));
        assert_eq!(a.get_i64("whole"), Some(3));
        assert!(a.bool_or_false("enabled"));
        assert!(!a.bool_or_false("missing"));
        assert_eq!(a.str_or("prefix", ""), "");
        assert_eq!(a.string_list("regions").unwrap().len(), 2);
        assert!(a.string_list("missing").unwrap().is_empty());
    }

    #[test]
    fn test_require_str_names_attribute() {
        let err = attrs(json!({})).require_str("arn").unwrap_err();
        assert!(err.to_string().contains("'arn'"));
    }

    #[test]
    fn test_string_list_rejects_mixed() {
        let a = attrs(json!({"regions": ["a", 1]}));
        assert!(a.string_list("regions").is_err());
        let a = attrs(json!({"regions": "a"}));
        assert!(a.string_list("regions").is_err());
    }

    #[test]
    fn test_nested_list() {
        let a = attrs(json!({"ssh_keys": [{"id": "k1", "name": "deploy"}]}));
        let keys = a.nested_list("ssh_keys").unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].get_str("name"), Some("deploy"));
    }

    #[test]
    fn test_project() {
        let a = attrs(json!({"id": "1", "name": "n", "secret": "s", "gone": null}));
        let p = a.project(["name", "secret", "gone"]);
        assert_eq!(p.into_value(), json!({"name": "n", "secret": "s"}));
    }
}
