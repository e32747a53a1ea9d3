//! Derived variable traits and the state every plugin shares.

use std::fmt;

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validation;
use crate::error::{MergeError, MergeResult};
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::stream::{Filter, Row, StreamSpec};

/// Value written for missing data.
pub const EMPTY_VALUE: &str = "";

/// A request for one derived variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedVariableSpec {
    pub entity_id: String,
    pub variable_id: String,
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub config: Value,
}

impl DerivedVariableSpec {
    pub fn new(
        entity_id: impl Into<String>,
        variable_id: impl Into<String>,
        function_name: impl Into<String>,
        config: Value,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            variable_id: variable_id.into(),
            function_name: function_name.into(),
            display_name: None,
            config,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn variable_spec(&self) -> VariableSpec {
        VariableSpec::new(&self.entity_id, &self.variable_id)
    }
}

/// Identity and naming shared by every plugin instance.
#[derive(Debug, Clone)]
pub struct DerivedVariableBase {
    function_name: &'static str,
    spec: VariableSpec,
    display_name: String,
    column_name: String,
}

impl DerivedVariableBase {
    pub fn new(function_name: &'static str, spec: &DerivedVariableSpec) -> Self {
        let variable = spec.variable_spec();
        Self {
            function_name,
            display_name: spec
                .display_name
                .clone()
                .unwrap_or_else(|| spec.variable_id.clone()),
            column_name: variable.dot_notation(),
            spec: variable,
        }
    }

    /// Deserialize a plugin's JSON config into its typed form.
    pub fn convert_config<T: DeserializeOwned>(&self, config: &Value) -> MergeResult<T> {
        if !config.is_object() {
            return Err(MergeError::invalid_config(
                self.function_name,
                "config property must be an object",
            ));
        }
        debug!(
            "Converting config for {} ({}): {}",
            self.column_name, self.function_name, config
        );
        serde_json::from_value(config.clone()).map_err(|e| {
            MergeError::invalid_config(
                self.function_name,
                format!("could not coerce config object: {}", e),
            )
        })
    }

    pub fn invalid(&self, message: impl Into<String>) -> MergeError {
        MergeError::invalid_config(self.function_name, message)
    }

    pub fn function_name(&self) -> &'static str {
        self.function_name
    }

    pub fn spec(&self) -> &VariableSpec {
        &self.spec
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl fmt::Display for DerivedVariableBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ functionName: {}, variable: {} }}",
            self.function_name, self.column_name
        )
    }
}

/// Behavior common to transforms and reductions.
///
/// Instances are built from a [`DerivedVariableSpec`] by a registered
/// builder, validated once against the metadata, then shared read-only by
/// the entity tree.
pub trait DerivedVariable: Send + Sync + fmt::Debug {
    fn base(&self) -> &DerivedVariableBase;

    /// Variables this instance reads (may include other derived variables).
    fn required_input_vars(&self) -> Vec<VariableSpec>;

    fn variable_type(&self, metadata: &ReferenceMetadata) -> MergeResult<VariableType>;

    fn data_shape(&self, metadata: &ReferenceMetadata) -> MergeResult<DataShape>;

    fn vocabulary(&self) -> Option<Vec<String>> {
        None
    }

    fn units(&self) -> Option<String> {
        None
    }

    /// Helper derived variables this instance needs generated alongside it.
    fn depended_derived_specs(&self) -> Vec<DerivedVariableSpec> {
        Vec::new()
    }

    /// Plugin-specific checks run after location validation. Plugins may
    /// cache metadata-derived state (units, id columns) here.
    fn validate_supplemental(&mut self, _metadata: &ReferenceMetadata) -> MergeResult<()> {
        Ok(())
    }

    fn function_name(&self) -> &str {
        self.base().function_name()
    }

    fn spec(&self) -> &VariableSpec {
        self.base().spec()
    }

    fn entity_id(&self) -> &str {
        &self.base().spec().entity_id
    }

    fn column_name(&self) -> &str {
        self.base().column_name()
    }

    fn display_name(&self) -> &str {
        self.base().display_name()
    }
}

/// A pure per-row function writing one column.
pub trait Transform: DerivedVariable {
    /// Compute this variable for `row`. The row is not modified.
    fn value(&self, row: &Row) -> MergeResult<String>;

    /// Inputs must live on this transform's entity or an ancestor.
    fn validate_locations(&self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        validation::transform_locations(
            metadata,
            self.function_name(),
            self.entity_id(),
            &self.required_input_vars(),
        )
    }
}

/// Aggregates descendant rows into one value per row of its entity.
pub trait Reduction: DerivedVariable {
    /// A fresh reducer for one parent row.
    fn create_reducer(&self) -> Box<dyn Reducer + '_>;

    /// Filters for the descendant stream; the request's filters if `None`.
    fn filters_override(&self) -> Option<Vec<Filter>> {
        None
    }

    /// Inputs must share one branch whose lowest entity is this entity or a
    /// descendant of it.
    fn validate_locations(&self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        validation::reduction_locations(
            metadata,
            self.function_name(),
            self.entity_id(),
            &self.required_input_vars(),
        )
    }

    /// The descendant stream this reduction reads: the lowest input entity,
    /// inputs minus id columns, and any filter override.
    fn input_stream_spec(&self, metadata: &ReferenceMetadata) -> MergeResult<StreamSpec> {
        let inputs = self.required_input_vars();
        let entity_id = validation::reduction_entity_id(metadata, self.function_name(), &inputs)?;
        let id_columns: Vec<VariableSpec> = metadata
            .tabular_columns(&entity_id, &[])?
            .into_iter()
            .map(|def| def.spec)
            .collect();
        Ok(StreamSpec::with_random_name(entity_id)
            .with_variables(inputs.into_iter().filter(|v| !id_columns.contains(v)))
            .with_filters_override(self.filters_override()))
    }
}

/// Accumulates matching descendant rows for one parent row.
pub trait Reducer {
    fn add_row(&mut self, row: &Row) -> MergeResult<()>;

    /// Final value. May be called with zero rows added.
    fn finish(self: Box<Self>) -> MergeResult<String>;
}
