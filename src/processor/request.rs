//! The merge request document.

use serde::{Deserialize, Serialize};

use crate::derived::DerivedVariableSpec;
use crate::error::MergeResult;
use crate::metadata::{VariableDef, VariableSpec};
use crate::stream::Filter;

/// One tabular merge: which entity, which columns, and any derived or
/// computed variables those columns need.
///
/// ```json
/// {
///   "studyId": "cohort",
///   "entityId": "sample",
///   "outputVariables": [{ "entityId": "household", "variableId": "region" }],
///   "filters": [],
///   "derivedVariables": [],
///   "computedVariables": []
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub study_id: String,
    /// Target entity; one output row per row of its stream.
    pub entity_id: String,
    /// Requested columns, after the target and ancestor id columns.
    pub output_variables: Vec<VariableSpec>,
    /// Subset filters applied to every stream without its own override.
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub derived_variables: Vec<DerivedVariableSpec>,
    /// Variables produced by an external compute job, appended to the output.
    #[serde(default)]
    pub computed_variables: Vec<VariableDef>,
}

impl MergeRequest {
    pub fn new(
        study_id: impl Into<String>,
        entity_id: impl Into<String>,
        output_variables: Vec<VariableSpec>,
    ) -> Self {
        Self {
            study_id: study_id.into(),
            entity_id: entity_id.into(),
            output_variables,
            filters: Vec::new(),
            derived_variables: Vec::new(),
            computed_variables: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> MergeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_derived_variable(mut self, spec: DerivedVariableSpec) -> Self {
        self.derived_variables.push(spec);
        self
    }

    pub fn with_computed_variable(mut self, variable: VariableDef) -> Self {
        self.computed_variables.push(variable);
        self
    }

    pub fn computed_specs(&self) -> Vec<VariableSpec> {
        self.computed_variables.iter().map(|v| v.spec.clone()).collect()
    }
}
