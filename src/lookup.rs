//! Lookup-and-disambiguate.
//!
//! Resolves a caller-supplied id or name to exactly one remote entity. A name
//! is only unique within a scope and type, so name lookups list candidates
//! and refuse to guess when more than one matches.

use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::attributes::{AttributeSet, ID_ATTRIBUTE, NAME_ATTRIBUTE};
use crate::client::{ListFilter, RemoteApi, RemoteEntity};
use crate::error::{Operation, ProviderError, Result};

/// How an entity is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// By opaque unique id.
    Id(String),
    /// By human-readable name.
    Name(String),
}

/// A resolved lookup request: an identifier plus an optional type filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    /// The id or name to look for.
    pub ident: Identifier,
    /// Required discriminator of the match, if any.
    pub discriminator: Option<String>,
}

impl LookupKey {
    /// Look up by id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            ident: Identifier::Id(id.into()),
            discriminator: None,
        }
    }

    /// Look up by name.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            ident: Identifier::Name(name.into()),
            discriminator: None,
        }
    }

    /// Restrict matches to a discriminator value.
    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    /// Build a key from caller attributes.
    ///
    /// Exactly one of `id` and `name` must be set. `discriminator_attr`, when
    /// given and set, filters name lookups; setting it without a name is a
    /// usage error.
    pub fn from_attributes(attrs: &AttributeSet, discriminator_attr: Option<&str>) -> Result<Self> {
        let id = attrs.get_str(ID_ATTRIBUTE).filter(|s| !s.is_empty());
        let name = attrs.get_str(NAME_ATTRIBUTE).filter(|s| !s.is_empty());
        let discriminator = discriminator_attr.and_then(|attr| attrs.get_str(attr));

        let key = match (id, name) {
            (Some(_), Some(_)) => {
                return Err(ProviderError::InvalidArgument(
                    "'id' and 'name' are mutually exclusive; set exactly one".into(),
                ))
            },
            (None, None) => {
                return Err(ProviderError::InvalidArgument(
                    "one of 'id' or 'name' must be set".into(),
                ))
            },
            (Some(id), None) => {
                if let (Some(attr), Some(_)) = (discriminator_attr, discriminator) {
                    return Err(ProviderError::InvalidArgument(format!(
                        "'{}' can only be used together with 'name'",
                        attr
                    )));
                }
                Self::by_id(id)
            },
            (None, Some(name)) => Self::by_name(name),
        };

        Ok(match discriminator {
            Some(d) => key.with_discriminator(d),
            None => key,
        })
    }

    /// Interpret an import identifier: UUIDs are ids, anything else is a name.
    pub fn parse_import_id(raw: &str) -> Self {
        let raw = raw.trim();
        if Uuid::parse_str(raw).is_ok() {
            Self::by_id(raw)
        } else {
            Self::by_name(raw)
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ident {
            Identifier::Id(id) => write!(f, "id \"{}\"", id)?,
            Identifier::Name(name) => write!(f, "name \"{}\"", name)?,
        }
        if let Some(d) = &self.discriminator {
            write!(f, " and type \"{}\"", d)?;
        }
        Ok(())
    }
}

/// Canonical form of a discriminator for comparison.
///
/// Trims, uppercases and treats `-` as `_`, so `aws_assumed_role`,
/// `AWS-ASSUMED-ROLE` and `AWS_ASSUMED_ROLE` compare equal.
pub fn normalize_discriminator(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}

/// Compare two discriminators in canonical form.
pub fn discriminators_match(a: &str, b: &str) -> bool {
    normalize_discriminator(a) == normalize_discriminator(b)
}

/// Pick the single candidate whose name (and discriminator) matches.
pub fn select_unique<E: RemoteEntity>(candidates: Vec<E>, key: &LookupKey) -> Result<E> {
    let name = match &key.ident {
        Identifier::Name(name) => name,
        Identifier::Id(id) => {
            return candidates
                .into_iter()
                .find(|e| e.id() == id)
                .ok_or_else(|| not_found::<E>(key))
        },
    };

    let mut matches: Vec<E> = candidates
        .into_iter()
        .filter(|e| e.name() == name)
        .filter(|e| match &key.discriminator {
            None => true,
            Some(want) => e
                .discriminator()
                .is_some_and(|have| discriminators_match(have, want)),
        })
        .collect();

    match matches.len() {
        0 => Err(not_found::<E>(key)),
        1 => Ok(matches.remove(0)),
        count => Err(ProviderError::AmbiguousResult {
            kind: E::KIND,
            key: key.to_string(),
            count,
        }),
    }
}

/// Resolve a key to exactly one remote entity.
pub async fn resolve<E: RemoteEntity>(
    api: &dyn RemoteApi<E>,
    key: &LookupKey,
    filter: &ListFilter,
) -> Result<E> {
    debug!(kind = E::KIND, key = %key, "Resolving entity");

    match &key.ident {
        Identifier::Id(id) => {
            let entity = api.get(id).await.map_err(|err| {
                if err.is_not_found() {
                    not_found::<E>(key)
                } else {
                    ProviderError::upstream(Operation::Read, E::KIND, id.clone(), err)
                }
            })?;
            if entity.is_gone() {
                return Err(not_found::<E>(key));
            }
            check_discriminator(&entity, key)?;
            Ok(entity)
        },
        Identifier::Name(name) => {
            let candidates = api
                .list(filter)
                .await
                .map_err(|err| ProviderError::upstream(Operation::List, E::KIND, name.clone(), err))?;
            let live: Vec<E> = candidates
                .into_iter()
                .filter(|e| !e.is_gone() && filter.matches(e))
                .collect();
            debug!(kind = E::KIND, candidates = live.len(), "Listed candidates");
            select_unique(live, key)
        },
    }
}

fn check_discriminator<E: RemoteEntity>(entity: &E, key: &LookupKey) -> Result<()> {
    let Some(want) = &key.discriminator else {
        return Ok(());
    };
    match entity.discriminator() {
        Some(have) if discriminators_match(have, want) => Ok(()),
        have => Err(ProviderError::InvalidArgument(format!(
            "{} {} has type \"{}\", expected \"{}\"",
            E::KIND,
            entity.id(),
            have.unwrap_or(""),
            want
        ))),
    }
}

fn not_found<E: RemoteEntity>(key: &LookupKey) -> ProviderError {
    ProviderError::NotFound {
        kind: E::KIND,
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::InMemoryApi;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Cred {
        id: String,
        name: String,
        kind: String,
    }

    impl RemoteEntity for Cred {
        type Payload = (String, String);
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

    impl crate::testing::Materialize for Cred {
        fn materialize(id: &str, payload: &(String, String), _previous: Option<&Self>) -> Self {
            cred(id, &payload.0, &payload.1)
        }
    }

    fn cred(id: &str, name: &str, kind: &str) -> Cred {
        Cred {
            id: id.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }

    fn attrs(value: serde_json::Value) -> AttributeSet {
        AttributeSet::from_value(value).unwrap()
    }

    #[test]
    fn test_key_requires_exactly_one_of_id_and_name() {
        let err = LookupKey::from_attributes(&attrs(json!({"id": "1", "name": "n"})), None)
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));

        let err = LookupKey::from_attributes(&attrs(json!({})), None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));

        let key = LookupKey::from_attributes(&attrs(json!({"id": "1", "name": null})), None).unwrap();
        assert_eq!(key, LookupKey::by_id("1"));
    }

    #[test]
    fn test_empty_name_counts_as_unset() {
        let key = LookupKey::from_attributes(&attrs(json!({"id": "1", "name": ""})), None).unwrap();
        assert_eq!(key, LookupKey::by_id("1"));

        let err = LookupKey::from_attributes(&attrs(json!({"id": "", "name": ""})), None)
            .unwrap_err();
        assert!(err.to_string().contains("one of 'id' or 'name' must be set"));
    }

    #[test]
    fn test_type_filter_without_name_is_usage_error() {
        let err = LookupKey::from_attributes(
            &attrs(json!({"id": "1", "type": "AWS_ASSUMED_ROLE"})),
            Some("type"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'type' can only be used together with 'name'"));

        let key = LookupKey::from_attributes(
            &attrs(json!({"name": "prod-aws", "type": "AWS_ASSUMED_ROLE"})),
            Some("type"),
        )
        .unwrap();
        assert_eq!(key.discriminator.as_deref(), Some("AWS_ASSUMED_ROLE"));
    }

    #[test]
    fn test_parse_import_id() {
        let id = "3c7f3ef4-1f8b-4c1b-9f0e-6b7c2f1d2a10";
        assert_eq!(LookupKey::parse_import_id(id), LookupKey::by_id(id));
        assert_eq!(
            LookupKey::parse_import_id(" prod-aws "),
            LookupKey::by_name("prod-aws")
        );
    }

    #[test]
    fn test_normalize_discriminator() {
        assert!(discriminators_match("AWS_ASSUMED_ROLE", "aws_assumed_role"));
        assert!(discriminators_match("aws-assumed-role", " AWS_ASSUMED_ROLE "));
        assert!(!discriminators_match("AWS_ASSUMED_ROLE", "AWS_ACCESS_KEYS"));
    }

    #[test]
    fn test_select_unique_filters_by_type() {
        let candidates = vec![
            cred("1", "prod-aws", "GCP_SERVICE_ACCOUNT"),
            cred("2", "prod-aws", "AWS_ASSUMED_ROLE"),
            cred("3", "staging", "AWS_ASSUMED_ROLE"),
        ];
        let key = LookupKey::by_name("prod-aws").with_discriminator("AWS_ASSUMED_ROLE");
        assert_eq!(select_unique(candidates, &key).unwrap().id, "2");
    }

    #[test]
    fn test_select_unique_type_comparison_is_normalized() {
        let candidates = vec![cred("1", "prod-aws", "aws_assumed_role")];
        let key = LookupKey::by_name("prod-aws").with_discriminator("AWS_ASSUMED_ROLE");
        assert_eq!(select_unique(candidates, &key).unwrap().id, "1");
    }

    #[test]
    fn test_select_unique_zero_and_many() {
        let key = LookupKey::by_name("dup").with_discriminator("X");

        let err = select_unique(Vec::<Cred>::new(), &key).unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
        assert!(err.to_string().contains("\"dup\""));

        let err = select_unique(vec![cred("1", "dup", "X"), cred("2", "dup", "x")], &key)
            .unwrap_err();
        match err {
            ProviderError::AmbiguousResult { count, ref key, .. } => {
                assert_eq!(count, 2);
                assert!(key.contains("dup"));
            },
            other => panic!("expected ambiguous result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_by_id_maps_not_found() {
        let api = InMemoryApi::<Cred>::new();
        let err = resolve::<Cred>(&api, &LookupKey::by_id("missing"), &ListFilter::all())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { kind: "credentials", .. }));
    }

    #[tokio::test]
    async fn test_resolve_by_id_checks_type() {
        let api = InMemoryApi::<Cred>::new();
        api.insert(cred("1", "prod", "GCP_SERVICE_ACCOUNT")).await;

        let key = LookupKey::by_id("1").with_discriminator("AWS_ASSUMED_ROLE");
        let err = resolve::<Cred>(&api, &key, &ListFilter::all()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_resolve_by_name_uses_list() {
        let api = InMemoryApi::<Cred>::new();
        api.insert(cred("1", "prod-aws", "AWS_ASSUMED_ROLE")).await;
        api.insert(cred("2", "other", "AWS_ASSUMED_ROLE")).await;

        let found = resolve::<Cred>(&api, &LookupKey::by_name("prod-aws"), &ListFilter::all())
            .await
            .unwrap();
        assert_eq!(found.id, "1");
        assert_eq!(api.calls().await, vec!["list".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_wraps_list_failure() {
        let api = InMemoryApi::<Cred>::new();
        api.fail_next(ApiError::Transport("connection reset".into())).await;

        let err = resolve::<Cred>(&api, &LookupKey::by_name("prod"), &ListFilter::all())
            .await
            .unwrap_err();
        match err {
            ProviderError::Upstream {
                operation,
                identifier,
                ..
            } => {
                assert_eq!(operation, Operation::List);
                assert_eq!(identifier, "prod");
            },
            other => panic!("expected upstream failure, got {:?}", other),
        }
    }
}
