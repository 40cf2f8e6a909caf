//! The typed remote-resource adapter.
//!
//! A concrete resource only describes its mapping ([`ResourceMapping`]):
//! schema, attribute↔payload marshaling and how to write an entity back.
//! [`EntityAdapter`] supplies the reconciliation lifecycle on top of it:
//!
//! ```text
//! Absent --create--> Present --update--> Present --delete--> Absent
//!                       |
//!                       +--read finds 404 / soft delete--> Absent (drift)
//! ```
//!
//! Data sources reuse the same mapping through [`LookupDataSource`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::attributes::AttributeSet;
use crate::client::{ApiHandle, ListFilter, RemoteApi, RemoteEntity};
use crate::error::{Operation, ProviderError, Result};
use crate::lookup::{discriminators_match, resolve, LookupKey};
use crate::schema::Schema;
use crate::validation::validate_result;

/// Everything that maps one entity kind onto an attribute set.
pub trait EntityMapping: Send + Sync + 'static {
    /// The remote entity this mapping targets.
    type Entity: RemoteEntity;

    /// Host-facing type name, e.g. `aws_cloud_configuration`.
    fn type_name(&self) -> &str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Write the entity's fields into `state` (remote→local).
    ///
    /// Must leave write-only attributes alone and skip fields the entity does
    /// not carry.
    fn write_entity(&self, entity: &Self::Entity, state: &mut AttributeSet) -> Result<()>;

    /// Discriminator every entity handled by this mapping must carry.
    fn discriminator(&self) -> Option<&str> {
        None
    }

    /// List pre-filter for name lookups, derived from caller attributes.
    fn list_filter(&self, attrs: &AttributeSet) -> Result<ListFilter> {
        let _ = attrs;
        Ok(ListFilter::all())
    }
}

/// A mapping that can also create and update entities.
pub trait ResourceMapping: EntityMapping {
    /// Build the API payload from caller attributes (local→remote).
    fn to_payload(
        &self,
        attrs: &AttributeSet,
    ) -> Result<<Self::Entity as RemoteEntity>::Payload>;

    /// Turn an import identifier into a lookup key and list filter.
    fn import_key(&self, raw: &str) -> Result<(LookupKey, ListFilter)> {
        let key = LookupKey::parse_import_id(raw);
        let key = match self.discriminator() {
            Some(d) => key.with_discriminator(d),
            None => key,
        };
        Ok((key, ListFilter::all()))
    }
}

/// A mapping usable as a lookup data source.
pub trait DataSourceMapping: EntityMapping {
    /// Attribute that filters name lookups by discriminator, if any.
    fn discriminator_attribute(&self) -> Option<&str> {
        None
    }

    /// Data source schema.
    fn data_source_schema(&self) -> Schema;
}

/// Outcome of reading a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The entity exists; here is its refreshed state.
    Present(AttributeSet),
    /// The entity is gone; the host should drop it from state.
    Absent,
}

impl ReadOutcome {
    /// The refreshed state, if the entity still exists.
    pub fn into_state(self) -> Option<AttributeSet> {
        match self {
            Self::Present(state) => Some(state),
            Self::Absent => None,
        }
    }

    /// Whether the entity disappeared.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Object-safe lifecycle of one resource type.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Host-facing type name.
    fn type_name(&self) -> &str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Create the remote entity and return the new state.
    async fn create(&self, planned: AttributeSet) -> Result<AttributeSet>;

    /// Refresh state from the remote entity.
    async fn read(&self, current: AttributeSet) -> Result<ReadOutcome>;

    /// Update the remote entity in place.
    async fn update(&self, prior: AttributeSet, planned: AttributeSet) -> Result<AttributeSet>;

    /// Delete the remote entity.
    async fn delete(&self, current: AttributeSet) -> Result<()>;

    /// Adopt an existing remote entity, addressed by id or name.
    async fn import(&self, raw_id: &str) -> Result<AttributeSet>;
}

/// Object-safe lookup of one data source type.
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    /// Host-facing type name.
    fn type_name(&self) -> &str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Resolve the configured id or name and return the entity's attributes.
    async fn read(&self, config: AttributeSet) -> Result<AttributeSet>;
}

/// Generic [`ResourceAdapter`] driven by a [`ResourceMapping`].
pub struct EntityAdapter<M: ResourceMapping> {
    mapping: M,
    api: ApiHandle<M::Entity>,
}

impl<M: ResourceMapping> EntityAdapter<M> {
    /// Bind a mapping to the client it talks to.
    pub fn new(mapping: M, api: ApiHandle<M::Entity>) -> Self {
        Self { mapping, api }
    }

    /// Wrap in an `Arc` for registration.
    pub fn shared(mapping: M, api: ApiHandle<M::Entity>) -> Arc<dyn ResourceAdapter> {
        Arc::new(Self::new(mapping, api))
    }

    /// The mapping.
    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    fn kind(&self) -> &'static str {
        <M::Entity as RemoteEntity>::KIND
    }

    fn api(&self) -> &dyn RemoteApi<M::Entity> {
        self.api.as_ref()
    }

    fn prepare(&self, planned: &AttributeSet) -> Result<<M::Entity as RemoteEntity>::Payload> {
        validate_result(&self.mapping.schema(), &Value::Object(planned.as_map().clone()))?;
        self.mapping.to_payload(planned)
    }

    fn check_discriminator(&self, entity: &M::Entity) -> Result<()> {
        match (self.mapping.discriminator(), entity.discriminator()) {
            (Some(want), Some(have)) if !discriminators_match(want, have) => {
                Err(ProviderError::InvalidArgument(format!(
                    "{} {} has type \"{}\" and cannot be managed as {}",
                    self.kind(),
                    entity.id(),
                    have,
                    self.mapping.type_name()
                )))
            },
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<M: ResourceMapping> ResourceAdapter for EntityAdapter<M> {
    fn type_name(&self) -> &str {
        self.mapping.type_name()
    }

    fn schema(&self) -> Schema {
        self.mapping.schema()
    }

    #[instrument(skip_all, fields(resource_type = %self.mapping.type_name()))]
    async fn create(&self, planned: AttributeSet) -> Result<AttributeSet> {
        let payload = self.prepare(&planned)?;
        let label = planned.get_str("name").unwrap_or_default().to_string();

        let entity = self
            .api()
            .create(&payload)
            .await
            .map_err(|err| ProviderError::upstream(Operation::Create, self.kind(), label, err))?;

        let mut state = planned;
        state.set_id(entity.id());
        self.mapping.write_entity(&entity, &mut state)?;
        info!(id = %entity.id(), "Created {}", self.kind());
        Ok(state)
    }

    #[instrument(skip_all, fields(resource_type = %self.mapping.type_name()))]
    async fn read(&self, current: AttributeSet) -> Result<ReadOutcome> {
        let id = current.require_id()?.to_string();

        let entity = match self.api().get(&id).await {
            Ok(entity) if entity.is_gone() => {
                warn!(id = %id, "{} was removed outside of the provider", self.kind());
                return Ok(ReadOutcome::Absent);
            },
            Ok(entity) => entity,
            Err(err) if err.is_not_found() => {
                warn!(id = %id, "{} no longer exists, dropping from state", self.kind());
                return Ok(ReadOutcome::Absent);
            },
            Err(err) => {
                return Err(ProviderError::upstream(Operation::Read, self.kind(), id, err));
            },
        };

        let mut state = current;
        self.mapping.write_entity(&entity, &mut state)?;
        debug!(id = %id, "Refreshed {}", self.kind());
        Ok(ReadOutcome::Present(state))
    }

    #[instrument(skip_all, fields(resource_type = %self.mapping.type_name()))]
    async fn update(&self, prior: AttributeSet, planned: AttributeSet) -> Result<AttributeSet> {
        let id = prior.require_id()?.to_string();
        let payload = self.prepare(&planned)?;

        let entity = self
            .api()
            .update(&id, &payload)
            .await
            .map_err(|err| ProviderError::upstream(Operation::Update, self.kind(), id.clone(), err))?;

        let mut state = planned;
        state.set_id(id);
        self.mapping.write_entity(&entity, &mut state)?;
        info!(id = %entity.id(), "Updated {}", self.kind());
        Ok(state)
    }

    #[instrument(skip_all, fields(resource_type = %self.mapping.type_name()))]
    async fn delete(&self, current: AttributeSet) -> Result<()> {
        let id = current.require_id()?;
        self.api()
            .delete(id)
            .await
            .map_err(|err| ProviderError::upstream(Operation::Delete, self.kind(), id, err))?;
        info!(id = %id, "Deleted {}", self.kind());
        Ok(())
    }

    #[instrument(skip_all, fields(resource_type = %self.mapping.type_name(), import_id = %raw_id))]
    async fn import(&self, raw_id: &str) -> Result<AttributeSet> {
        let (key, filter) = self.mapping.import_key(raw_id)?;
        let entity = resolve(self.api(), &key, &filter).await.map_err(|err| match err {
            ProviderError::Upstream { kind, identifier, source, .. } => ProviderError::Upstream {
                operation: Operation::Import,
                kind,
                identifier,
                source,
            },
            other => other,
        })?;
        self.check_discriminator(&entity)?;

        let mut state = AttributeSet::new();
        state.set_id(entity.id());
        self.mapping.write_entity(&entity, &mut state)?;
        info!(id = %entity.id(), "Imported {}", self.kind());
        Ok(state)
    }
}

/// Generic [`DataSourceAdapter`] driven by a [`DataSourceMapping`].
pub struct LookupDataSource<M: DataSourceMapping> {
    mapping: M,
    api: ApiHandle<M::Entity>,
}

impl<M: DataSourceMapping> LookupDataSource<M> {
    /// Bind a mapping to the client it talks to.
    pub fn new(mapping: M, api: ApiHandle<M::Entity>) -> Self {
        Self { mapping, api }
    }

    /// Wrap in an `Arc` for registration.
    pub fn shared(mapping: M, api: ApiHandle<M::Entity>) -> Arc<dyn DataSourceAdapter> {
        Arc::new(Self::new(mapping, api))
    }
}

#[async_trait]
impl<M: DataSourceMapping> DataSourceAdapter for LookupDataSource<M> {
    fn type_name(&self) -> &str {
        self.mapping.type_name()
    }

    fn schema(&self) -> Schema {
        self.mapping.data_source_schema()
    }

    #[instrument(skip_all, fields(data_source_type = %self.mapping.type_name()))]
    async fn read(&self, config: AttributeSet) -> Result<AttributeSet> {
        // Argument checks come first so a bad lookup never reaches the API.
        let key = LookupKey::from_attributes(&config, self.mapping.discriminator_attribute())?;
        let filter = self.mapping.list_filter(&config)?;

        let entity = resolve(self.api.as_ref(), &key, &filter).await?;

        let mut state = config;
        state.set_id(entity.id());
        self.mapping.write_entity(&entity, &mut state)?;
        debug!(id = %entity.id(), "Resolved data source");
        Ok(state)
    }
}
