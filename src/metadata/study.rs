//! JSON study documents.
//!
//! A study document nests child entities under their parents:
//!
//! ```json
//! {
//!   "id": "malaria_cohort",
//!   "rootEntity": {
//!     "id": "household",
//!     "idColumn": "household_id",
//!     "variables": [{ "id": "income", "type": "number", "dataShape": "continuous" }],
//!     "children": [{ "id": "participant", "idColumn": "participant_id" }]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::reference::ReferenceMetadata;
use super::types::{DataShape, EntityDef, VariableDef, VariableSpec, VariableType};
use crate::error::MergeResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyDefinition {
    pub id: String,
    pub root_entity: EntityDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub id: String,
    pub id_column: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub children: Vec<EntityDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    pub id: String,
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default)]
    pub data_shape: DataShape,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub vocabulary: Option<Vec<String>>,
    #[serde(default)]
    pub impute_zero: bool,
}

impl StudyDefinition {
    pub fn from_json(json: &str) -> MergeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flatten the nested document into a [`ReferenceMetadata`].
    pub fn into_metadata(self) -> MergeResult<ReferenceMetadata> {
        let StudyDefinition { id, root_entity } = self;
        let (root, children) = root_entity.split();
        let mut metadata = ReferenceMetadata::new(id, root);
        let mut pending: Vec<(String, EntityDefinition)> = children
            .into_iter()
            .map(|child| (metadata.root().id.clone(), child))
            .collect();
        while let Some((parent_id, definition)) = pending.pop() {
            let (entity, children) = definition.split();
            let entity_id = entity.id.clone();
            metadata.add_entity(&parent_id, entity)?;
            pending.extend(children.into_iter().map(|c| (entity_id.clone(), c)));
        }
        Ok(metadata)
    }
}

impl EntityDefinition {
    fn split(self) -> (EntityDef, Vec<EntityDefinition>) {
        let mut entity = EntityDef::new(&self.id, &self.id_column);
        if let Some(name) = self.display_name {
            entity = entity.with_display_name(name);
        }
        for variable in self.variables {
            entity = entity.with_variable(variable.into_def(&self.id));
        }
        (entity, self.children)
    }
}

impl VariableDefinition {
    fn into_def(self, entity_id: &str) -> VariableDef {
        VariableDef {
            spec: VariableSpec::new(entity_id, self.id),
            var_type: self.var_type,
            data_shape: self.data_shape,
            source: Default::default(),
            display_name: self.display_name,
            units: self.units,
            vocabulary: self.vocabulary,
            impute_zero: self.impute_zero,
        }
    }
}
