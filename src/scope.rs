//! Scopes for variable-like entities.
//!
//! A configuration variable lives at exactly one level: the organization
//! (global), a project, a template, an environment or a single deployment
//! log. The level is chosen by setting at most one selector attribute; the
//! selector's value becomes the scope id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeSet;
use crate::error::{ProviderError, Result};
use crate::lookup::normalize_discriminator;

/// The namespace level an entity is defined at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Organization-wide.
    Global,
    /// A single project.
    Project,
    /// A single template.
    Template,
    /// A single environment.
    Environment,
    /// A single deployment run.
    DeploymentLog,
}

/// Selector attributes, in the order they are checked.
pub const SCOPE_SELECTORS: [&str; 4] = [
    "project_id",
    "template_id",
    "environment_id",
    "deployment_log_id",
];

impl Scope {
    /// Wire name of the scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Project => "PROJECT",
            Self::Template => "TEMPLATE",
            Self::Environment => "ENVIRONMENT",
            Self::DeploymentLog => "DEPLOYMENT_LOG",
        }
    }

    /// Parse a scope name, ignoring case and `-`/`_` differences.
    pub fn parse(raw: &str) -> Result<Self> {
        match normalize_discriminator(raw).as_str() {
            "GLOBAL" => Ok(Self::Global),
            "PROJECT" => Ok(Self::Project),
            "TEMPLATE" => Ok(Self::Template),
            "ENVIRONMENT" => Ok(Self::Environment),
            "DEPLOYMENT_LOG" => Ok(Self::DeploymentLog),
            _ => Err(ProviderError::UnhandledVariant {
                field: "scope",
                value: raw.to_string(),
            }),
        }
    }

    /// The attribute that selects this scope (none for global).
    pub fn selector_attribute(self) -> Option<&'static str> {
        match self {
            Self::Global => None,
            Self::Project => Some("project_id"),
            Self::Template => Some("template_id"),
            Self::Environment => Some("environment_id"),
            Self::DeploymentLog => Some("deployment_log_id"),
        }
    }

    fn from_selector(attribute: &str) -> Option<Self> {
        match attribute {
            "project_id" => Some(Self::Project),
            "template_id" => Some(Self::Template),
            "environment_id" => Some(Self::Environment),
            "deployment_log_id" => Some(Self::DeploymentLog),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scope together with the id of the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRef {
    /// The scope level.
    pub scope: Scope,
    /// Id of the owning object; for global scope, the organization id if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
}

impl ScopeRef {
    /// Build a scope reference.
    pub fn new(scope: Scope, scope_id: impl Into<String>) -> Self {
        Self {
            scope,
            scope_id: Some(scope_id.into()),
        }
    }

    /// The organization-wide scope.
    pub fn global(organization_id: Option<&str>) -> Self {
        Self {
            scope: Scope::Global,
            scope_id: organization_id.map(str::to_string),
        }
    }

    /// Whether this scope satisfies `wanted`.
    ///
    /// A wanted scope without an id matches any id at that level.
    pub fn contains(&self, wanted: &ScopeRef) -> bool {
        self.scope == wanted.scope
            && match (&wanted.scope_id, &self.scope_id) {
                (None, _) => true,
                (Some(want), Some(have)) => want == have,
                (Some(_), None) => false,
            }
    }

    /// Resolve the scope from selector attributes.
    ///
    /// At most one selector may be set; none means global scope.
    pub fn from_attributes(attrs: &AttributeSet, organization_id: Option<&str>) -> Result<Self> {
        let selected: Vec<&str> = SCOPE_SELECTORS
            .iter()
            .copied()
            .filter(|name| attrs.is_set(name))
            .collect();

        match selected.as_slice() {
            [] => Ok(Self::global(organization_id)),
            [selector] => {
                let scope_id = attrs.require_str(selector)?;
                let scope = Scope::from_selector(selector).ok_or_else(|| {
                    ProviderError::InvalidArgument(format!("unknown scope selector '{}'", selector))
                })?;
                Ok(Self::new(scope, scope_id))
            },
            many => Err(ProviderError::InvalidArgument(format!(
                "at most one of [{}] may be set, got [{}]",
                SCOPE_SELECTORS.join(", "),
                many.join(", ")
            ))),
        }
    }

    /// Write the selector attribute for this scope, clearing the others.
    pub fn write_to(&self, attrs: &mut AttributeSet) {
        for selector in SCOPE_SELECTORS {
            attrs.remove(selector);
        }
        if let (Some(selector), Some(id)) = (self.scope.selector_attribute(), &self.scope_id) {
            attrs.set(selector, id.clone());
        }
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope_id {
            Some(id) => write!(f, "{}/{}", self.scope, id),
            None => write!(f, "{}", self.scope),
        }
    }
}
