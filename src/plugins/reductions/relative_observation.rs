use serde::{Deserialize, Serialize};

use crate::derived::validation::check_variable;
use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Reducer, Reduction};
use crate::error::MergeResult;
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::transforms::OBSERVATION_SEPARATOR;
use crate::plugins::true_values_or_default;
use crate::stream::{Filter, Row, RowExt};

/// Config written by the relative observation calculator for its helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorConfig {
    pub var_description: String,
    pub variable: VariableSpec,
    pub timestamp_variable: VariableSpec,
    #[serde(default)]
    pub true_values: Option<Vec<String>>,
    #[serde(default)]
    pub filters_override: Option<Vec<Filter>>,
}

/// Collects `id\ttimestamp` of every descendant row whose variable holds a
/// true value, as a JSON array of strings.
#[derive(Debug)]
pub struct RelativeObservationAggregator {
    base: DerivedVariableBase,
    description: String,
    variable: VariableSpec,
    variable_column: String,
    timestamp_variable: VariableSpec,
    timestamp_column: String,
    true_values: Vec<String>,
    filters_override: Option<Vec<Filter>>,
    id_column: String,
}

impl RelativeObservationAggregator {
    pub const FUNCTION_NAME: &'static str = "relativeObservationAggregator";

    pub fn build(
        metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Reduction>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: AggregatorConfig = base.convert_config(&spec.config)?;
        if config.variable.entity_id != config.timestamp_variable.entity_id {
            return Err(base.invalid(format!(
                "{0} variable must have the same entity as {0} timestamp variable",
                config.var_description
            )));
        }
        Ok(Box::new(Self {
            id_column: metadata.entity(&config.variable.entity_id)?.id_column_name(),
            variable_column: config.variable.dot_notation(),
            timestamp_column: config.timestamp_variable.dot_notation(),
            description: config.var_description,
            variable: config.variable,
            timestamp_variable: config.timestamp_variable,
            true_values: true_values_or_default(config.true_values),
            filters_override: config.filters_override,
            base,
        }))
    }
}

impl DerivedVariable for RelativeObservationAggregator {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.variable.clone(), self.timestamp_variable.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::String)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Continuous)
    }

    fn validate_supplemental(&mut self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        check_variable(
            metadata,
            self.function_name(),
            &format!("{} timestamp", self.description),
            &self.timestamp_variable,
            Some(&[VariableType::Date]),
            None,
        )?;
        Ok(())
    }
}

impl Reduction for RelativeObservationAggregator {
    fn create_reducer(&self) -> Box<dyn Reducer + '_> {
        Box::new(ObservationReducer {
            reduction: self,
            observations: Vec::new(),
        })
    }

    fn filters_override(&self) -> Option<Vec<Filter>> {
        self.filters_override.clone()
    }
}

struct ObservationReducer<'a> {
    reduction: &'a RelativeObservationAggregator,
    observations: Vec<String>,
}

impl Reducer for ObservationReducer<'_> {
    fn add_row(&mut self, row: &Row) -> MergeResult<()> {
        let reduction = self.reduction;
        let value = row.value(&reduction.variable_column)?;
        if reduction.true_values.iter().any(|v| v == value) {
            self.observations.push(format!(
                "{}{}{}",
                row.value(&reduction.id_column)?,
                OBSERVATION_SEPARATOR,
                row.value(&reduction.timestamp_column)?
            ));
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> MergeResult<String> {
        Ok(serde_json::to_string(&self.observations)?)
    }
}
