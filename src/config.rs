//! Provider block configuration.
//!
//! Every field can be set in the provider block or, when omitted there, through
//! an environment variable:
//!
//! | Attribute         | Environment variable       |
//! |-------------------|----------------------------|
//! | `api_key`         | `PROVIDER_API_KEY`         |
//! | `api_secret`      | `PROVIDER_API_SECRET`      |
//! | `api_endpoint`    | `PROVIDER_API_ENDPOINT`    |
//! | `organization_id` | `PROVIDER_ORGANIZATION_ID` |

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Environment variable for `api_key`.
pub const API_KEY_ENV: &str = "PROVIDER_API_KEY";
/// Environment variable for `api_secret`.
pub const API_SECRET_ENV: &str = "PROVIDER_API_SECRET";
/// Environment variable for `api_endpoint`.
pub const API_ENDPOINT_ENV: &str = "PROVIDER_API_ENDPOINT";
/// Environment variable for `organization_id`.
pub const ORGANIZATION_ID_ENV: &str = "PROVIDER_ORGANIZATION_ID";

/// Raw provider block, before environment fallback.
#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderBlock {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    api_secret: Option<String>,
    #[serde(default)]
    api_endpoint: Option<String>,
    #[serde(default)]
    organization_id: Option<String>,
}

/// Resolved provider configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// API key id.
    pub api_key: String,
    /// API key secret.
    pub api_secret: String,
    /// Base URL override; the client's default when unset.
    pub api_endpoint: Option<String>,
    /// Organization that owns global-scope entities.
    pub organization_id: Option<String>,
}

impl ProviderConfig {
    /// Resolve the provider block against the process environment.
    pub fn from_value(value: Value) -> Result<Self> {
        Self::from_value_with_env(value, |name| std::env::var(name).ok())
    }

    /// Resolve the provider block against an arbitrary variable lookup.
    pub fn from_value_with_env<F>(value: Value, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let block: ProviderBlock = match value {
            Value::Null => ProviderBlock::default(),
            other => serde_json::from_value(other)?,
        };

        let pick = |configured: Option<String>, var: &str| {
            configured
                .filter(|v| !v.is_empty())
                .or_else(|| env(var).filter(|v| !v.is_empty()))
        };

        let api_key = pick(block.api_key, API_KEY_ENV);
        let api_secret = pick(block.api_secret, API_SECRET_ENV);
        let api_endpoint = pick(block.api_endpoint, API_ENDPOINT_ENV);
        let organization_id = pick(block.organization_id, ORGANIZATION_ID_ENV);

        let mut missing = Vec::new();
        if api_key.is_none() {
            missing.push(Diagnostic::error("Missing API key").with_attribute("api_key").with_detail(
                format!("Set 'api_key' in the provider block or {}", API_KEY_ENV),
            ));
        }
        if api_secret.is_none() {
            missing.push(
                Diagnostic::error("Missing API secret")
                    .with_attribute("api_secret")
                    .with_detail(format!(
                        "Set 'api_secret' in the provider block or {}",
                        API_SECRET_ENV
                    )),
            );
        }

        match (api_key, api_secret) {
            (Some(api_key), Some(api_secret)) => Ok(Self {
                api_key,
                api_secret,
                api_endpoint,
                organization_id,
            }),
            _ => Err(ProviderError::Validation(missing)),
        }
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "api_key",
                Attribute::optional_string()
                    .with_description(format!("API key id. Defaults to ${}", API_KEY_ENV)),
            )
            .with_attribute(
                "api_secret",
                Attribute::new(AttributeType::String, AttributeFlags::optional().sensitive())
                    .with_description(format!("API key secret. Defaults to ${}", API_SECRET_ENV)),
            )
            .with_attribute(
                "api_endpoint",
                Attribute::optional_string()
                    .with_description(format!("API base URL. Defaults to ${}", API_ENDPOINT_ENV)),
            )
            .with_attribute(
                "organization_id",
                Attribute::optional_string().with_description(format!(
                    "Organization owning global-scope entities. Defaults to ${}",
                    ORGANIZATION_ID_ENV
                )),
            )
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_endpoint", &self.api_endpoint)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_block_wins_over_env() {
        let config = ProviderConfig::from_value_with_env(
            json!({"api_key": "block-key", "api_secret": "block-secret"}),
            env(&[(API_KEY_ENV, "env-key"), (ORGANIZATION_ID_ENV, "org-1")]),
        )
        .unwrap();
        assert_eq!(config.api_key, "block-key");
        assert_eq!(config.api_secret, "block-secret");
        assert_eq!(config.organization_id.as_deref(), Some("org-1"));
        assert!(config.api_endpoint.is_none());
    }

    #[test]
    fn test_env_fallback() {
        let config = ProviderConfig::from_value_with_env(
            Value::Null,
            env(&[(API_KEY_ENV, "k"), (API_SECRET_ENV, "s")]),
        )
        .unwrap();
        assert_eq!(config.api_key, "k");
    }

    #[test]
    fn test_missing_credentials_report_each_attribute() {
        let err = ProviderConfig::from_value_with_env(json!({"api_key": ""}), env(&[])).unwrap_err();
        let diagnostics = err.into_diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("api_key"));
        assert_eq!(diagnostics[1].attribute.as_deref(), Some("api_secret"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ProviderConfig::from_value_with_env(
            json!({"api_key": "k", "api_secret": "hunter2"}),
            env(&[]),
        )
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_malformed_block() {
        let err = ProviderConfig::from_value_with_env(json!({"api_key": 5}), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }
}
