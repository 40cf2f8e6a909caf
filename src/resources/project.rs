//! Projects.

use serde::{Deserialize, Serialize};

use crate::adapter::{DataSourceMapping, EntityMapping, ResourceMapping};
use crate::attributes::{AttributeSet, FromAttributes, NAME_ATTRIBUTE};
use crate::client::RemoteEntity;
use crate::error::Result;
use crate::schema::{Attribute, Schema};

use super::lookup_schema;

/// A project as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Remote id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Parent project for nested projects.
    #[serde(default)]
    pub parent_project_id: Option<String>,
    /// Archived projects are kept remotely but no longer usable.
    #[serde(default)]
    pub is_archived: bool,
}

impl RemoteEntity for Project {
    type Payload = ProjectPayload;
    const KIND: &'static str = "project";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_gone(&self) -> bool {
        self.is_archived
    }
}

/// Create/update body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parent project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_project_id: Option<String>,
}

impl FromAttributes for ProjectPayload {
    fn from_attributes(attrs: &AttributeSet) -> Result<Self> {
        Ok(Self {
            name: attrs.require_str(NAME_ATTRIBUTE)?.to_string(),
            description: attrs.get_str("description").map(str::to_string),
            parent_project_id: attrs.get_str("parent_project_id").map(str::to_string),
        })
    }
}

fn write_project(entity: &Project, state: &mut AttributeSet) {
    state.set(NAME_ATTRIBUTE, entity.name.clone());
    state.set_opt("description", entity.description.clone());
    state.set_opt("parent_project_id", entity.parent_project_id.clone());
}

/// The `project` resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectResource;

impl EntityMapping for ProjectResource {
    type Entity = Project;

    fn type_name(&self) -> &str {
        "project"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "parent_project_id",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Makes this a sub-project of the given project"),
            )
    }

    fn write_entity(&self, entity: &Project, state: &mut AttributeSet) -> Result<()> {
        write_project(entity, state);
        Ok(())
    }
}

impl ResourceMapping for ProjectResource {
    fn to_payload(&self, attrs: &AttributeSet) -> Result<ProjectPayload> {
        ProjectPayload::from_attributes(attrs)
    }
}

/// The `project` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectDataSource;

impl EntityMapping for ProjectDataSource {
    type Entity = Project;

    fn type_name(&self) -> &str {
        "project"
    }

    fn schema(&self) -> Schema {
        self.data_source_schema()
    }

    fn write_entity(&self, entity: &Project, state: &mut AttributeSet) -> Result<()> {
        write_project(entity, state);
        Ok(())
    }
}

impl DataSourceMapping for ProjectDataSource {
    fn data_source_schema(&self) -> Schema {
        lookup_schema("Look up a project by id or by name")
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("parent_project_id", Attribute::computed_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_from_attributes() {
        let attrs = AttributeSet::from_value(json!({"name": "platform", "description": null}))
            .unwrap();
        let payload = ProjectResource.to_payload(&attrs).unwrap();
        assert_eq!(
            payload,
            ProjectPayload {
                name: "platform".into(),
                description: None,
                parent_project_id: None,
            }
        );
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({"name": "platform"}));
    }

    #[test]
    fn test_archived_project_is_gone() {
        let project = Project {
            id: "p-1".into(),
            name: "platform".into(),
            description: None,
            parent_project_id: None,
            is_archived: true,
        };
        assert!(project.is_gone());
    }

    #[test]
    fn test_write_keeps_unset_fields_unset() {
        let project = Project {
            id: "p-1".into(),
            name: "platform".into(),
            description: None,
            parent_project_id: Some("root".into()),
            is_archived: false,
        };
        let mut state = AttributeSet::new();
        ProjectResource.write_entity(&project, &mut state).unwrap();
        assert_eq!(
            state.into_value(),
            json!({"name": "platform", "parent_project_id": "root"})
        );
    }
}
