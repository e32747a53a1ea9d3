//! Named stream requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::VariableSpec;

/// An opaque subset filter, forwarded untouched to whatever serves the stream.
pub type Filter = serde_json::Value;

/// One named request for an entity's tabular data.
///
/// Stream names are unique within a merge; the tree uses them to route each
/// opened stream to the node that asked for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSpec {
    pub name: String,
    pub entity_id: String,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters_override: Option<Vec<Filter>>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_id: entity_id.into(),
            variables: Vec::new(),
            filters_override: None,
        }
    }

    /// A spec with a fresh random name.
    pub fn with_random_name(entity_id: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), entity_id)
    }

    pub fn with_variables(mut self, variables: impl IntoIterator<Item = VariableSpec>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_filters_override(mut self, filters: Option<Vec<Filter>>) -> Self {
        self.filters_override = filters;
        self
    }

    pub fn add_variable(&mut self, variable: VariableSpec) {
        self.variables.push(variable);
    }

    /// Filters to apply when fetching: the override if present, else `default`.
    pub fn effective_filters<'a>(&'a self, default: &'a [Filter]) -> &'a [Filter] {
        self.filters_override.as_deref().unwrap_or(default)
    }

    /// Multi-line description used when logging tree layouts.
    pub fn describe(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let variables = self
            .variables
            .iter()
            .map(VariableSpec::dot_notation)
            .collect::<Vec<_>>()
            .join(", ");
        let filters = match &self.filters_override {
            Some(filters) => serde_json::to_string(filters).unwrap_or_else(|_| "?".to_string()),
            None => "none".to_string(),
        };
        format!(
            "{pad}{{\n{pad}  name: {}\n{pad}  entityId: {}\n{pad}  variables: [ {} ]\n{pad}  filtersOverride: {}\n{pad}}}",
            self.name, self.entity_id, variables, filters
        )
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(0))
    }
}
