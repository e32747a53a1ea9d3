//! The study's entity tree and variable catalog.

use std::collections::HashMap;

use log::debug;

use super::types::{EntityDef, VariableDef, VariableSource, VariableSpec};
use crate::error::{MergeError, MergeResult};

/// Read-mostly view of one study's schema.
///
/// Entities form a tree rooted at a single entity. Derived and computed
/// variables are added after construction, before any entity tree is built.
#[derive(Debug, Clone)]
pub struct ReferenceMetadata {
    study_id: String,
    entities: Vec<EntityDef>,
    index: HashMap<String, usize>,
    parents: HashMap<String, String>,
}

impl ReferenceMetadata {
    pub fn new(study_id: impl Into<String>, root: EntityDef) -> Self {
        let mut index = HashMap::new();
        index.insert(root.id.clone(), 0);
        Self {
            study_id: study_id.into(),
            entities: vec![root],
            index,
            parents: HashMap::new(),
        }
    }

    /// Builder form of [`add_entity`](Self::add_entity).
    pub fn with_entity(mut self, parent_id: &str, entity: EntityDef) -> MergeResult<Self> {
        self.add_entity(parent_id, entity)?;
        Ok(self)
    }

    /// Attach `entity` as a child of `parent_id`.
    pub fn add_entity(&mut self, parent_id: &str, entity: EntityDef) -> MergeResult<()> {
        if !self.index.contains_key(parent_id) {
            return Err(MergeError::UnknownEntity(parent_id.to_string()));
        }
        if self.index.contains_key(&entity.id) {
            return Err(MergeError::DuplicateEntity(entity.id));
        }
        self.parents.insert(entity.id.clone(), parent_id.to_string());
        self.index.insert(entity.id.clone(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    pub fn study_id(&self) -> &str {
        &self.study_id
    }

    pub fn root(&self) -> &EntityDef {
        &self.entities[0]
    }

    /// All entities, root first, in insertion order.
    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    pub fn find_entity(&self, entity_id: &str) -> Option<&EntityDef> {
        self.index.get(entity_id).map(|&i| &self.entities[i])
    }

    pub fn entity(&self, entity_id: &str) -> MergeResult<&EntityDef> {
        self.find_entity(entity_id)
            .ok_or_else(|| MergeError::UnknownEntity(entity_id.to_string()))
    }

    pub fn find_variable(&self, spec: &VariableSpec) -> Option<&VariableDef> {
        self.find_entity(&spec.entity_id)?.variable(&spec.variable_id)
    }

    pub fn variable(&self, spec: &VariableSpec) -> MergeResult<&VariableDef> {
        self.entity(&spec.entity_id)?;
        self.find_variable(spec)
            .ok_or_else(|| MergeError::UnknownVariable(spec.dot_notation()))
    }

    /// Resolve a list of specs, failing on the first unknown one.
    pub fn variables(&self, specs: &[VariableSpec]) -> MergeResult<Vec<&VariableDef>> {
        specs.iter().map(|spec| self.variable(spec)).collect()
    }

    pub fn parent(&self, entity_id: &str) -> Option<&EntityDef> {
        self.parents
            .get(entity_id)
            .and_then(|parent| self.find_entity(parent))
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, entity_id: &str) -> MergeResult<Vec<&EntityDef>> {
        self.entity(entity_id)?;
        let mut ancestors = Vec::new();
        let mut current = entity_id;
        while let Some(parent) = self.parent(current) {
            ancestors.push(parent);
            current = &parent.id;
        }
        Ok(ancestors)
    }

    pub fn ancestor_ids(&self, entity_id: &str) -> MergeResult<Vec<String>> {
        Ok(self
            .ancestors(entity_id)?
            .into_iter()
            .map(|e| e.id.clone())
            .collect())
    }

    /// True if `ancestor_id` is a strict ancestor of `descendant_id`.
    pub fn is_ancestor_of(&self, ancestor_id: &str, descendant_id: &str) -> bool {
        let mut current = descendant_id;
        while let Some(parent) = self.parents.get(current) {
            if parent == ancestor_id {
                return true;
            }
            current = parent;
        }
        false
    }

    pub fn children(&self, entity_id: &str) -> Vec<&EntityDef> {
        self.entities
            .iter()
            .filter(|e| self.parents.get(&e.id).map(String::as_str) == Some(entity_id))
            .collect()
    }

    /// All descendants, depth first.
    pub fn descendants(&self, entity_id: &str) -> Vec<&EntityDef> {
        let mut result = Vec::new();
        let mut stack: Vec<&EntityDef> = self.children(entity_id).into_iter().rev().collect();
        while let Some(entity) = stack.pop() {
            result.push(entity);
            stack.extend(self.children(&entity.id).into_iter().rev());
        }
        result
    }

    /// Columns every tabular stream of `entity_id` carries: the entity's id
    /// column, then ancestor id columns (nearest first), then `requested`.
    pub fn tabular_columns(
        &self,
        entity_id: &str,
        requested: &[VariableSpec],
    ) -> MergeResult<Vec<VariableDef>> {
        let entity = self.entity(entity_id)?;
        let mut columns = vec![entity.id_column().clone()];
        for ancestor in self.ancestors(entity_id)? {
            columns.push(ancestor.id_column().clone());
        }
        for spec in requested {
            columns.push(self.variable(spec)?.clone());
        }
        Ok(columns)
    }

    /// Add a derived variable to its entity. Must be called in dependency order.
    pub fn incorporate_derived(&mut self, variable: VariableDef) -> MergeResult<()> {
        debug!("Incorporating derived variable {}", variable);
        self.insert_variable(variable)
    }

    /// Add computed variables. All must belong to the same entity.
    pub fn incorporate_computed(&mut self, variables: &[VariableDef]) -> MergeResult<()> {
        let Some(first) = variables.first() else {
            return Ok(());
        };
        let entity_id = first.entity_id().to_string();
        for variable in variables {
            if variable.entity_id() != entity_id {
                return Err(MergeError::VariableNotAvailable {
                    variable: variable.spec.dot_notation(),
                    entity: entity_id,
                });
            }
            self.insert_variable(variable.clone().with_source(VariableSource::Computed))?;
        }
        Ok(())
    }

    fn insert_variable(&mut self, variable: VariableDef) -> MergeResult<()> {
        let &i = self
            .index
            .get(variable.entity_id())
            .ok_or_else(|| MergeError::UnknownEntity(variable.entity_id().to_string()))?;
        if self.entities[i].variable(variable.variable_id()).is_some() {
            return Err(MergeError::VariableAlreadyExists(variable.column_name()));
        }
        self.entities[i].push_variable(variable);
        Ok(())
    }
}
