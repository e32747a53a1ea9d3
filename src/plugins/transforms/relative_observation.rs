//! Time from an anchor observation to the nearest later target observation.
//!
//! Anchor and target observations may live on different entities. The
//! computation is split across three plugins that the tree wires together:
//!
//! ```text
//!   lowest common ancestor  <var>_calc      (calculator transform)
//!        │                    ├─ <var>_calc_anchor (aggregator reduction)
//!        │                    └─ <var>_calc_target (aggregator reduction)
//!        ▼
//!   anchor entity           <var>           (reads its own id in <var>_calc)
//! ```
//!
//! The aggregators collect `id\ttimestamp` pairs of qualifying descendant
//! rows, the calculator turns them into a JSON object of anchor id to day
//! interval, and the requested variable looks its own row id up in that
//! object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Transform, EMPTY_VALUE};
use crate::error::{MergeError, MergeResult};
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::parse_epoch_day;
use crate::plugins::reductions::{AggregatorConfig, RelativeObservationAggregator};
use crate::stream::{Filter, Row, RowExt};

/// Separates the id and timestamp of one aggregated observation.
pub(crate) const OBSERVATION_SEPARATOR: char = '\t';

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelativeObservationConfig {
    anchor_variable: VariableSpec,
    anchor_timestamp_variable: VariableSpec,
    #[serde(default)]
    anchor_variable_true_values: Option<Vec<String>>,
    target_variable: VariableSpec,
    target_timestamp_variable: VariableSpec,
    #[serde(default)]
    target_variable_true_values: Option<Vec<String>>,
    #[serde(default)]
    minimum_time_interval_days: Option<i64>,
    #[serde(default)]
    related_observations_subset: Option<Vec<Filter>>,
}

// =============================================================================
// Requested variable
// =============================================================================

#[derive(Debug)]
pub struct RelativeObservationMinTimeInterval {
    base: DerivedVariableBase,
    calculator: DerivedVariableSpec,
    calculator_column: String,
    id_column: String,
}

impl RelativeObservationMinTimeInterval {
    pub const FUNCTION_NAME: &'static str = "relativeObservationMinTimeInterval";

    pub fn build(
        metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: RelativeObservationConfig = base.convert_config(&spec.config)?;

        if config.anchor_variable.entity_id != spec.entity_id {
            return Err(base.invalid(
                "anchor variable must be a member of the relative observation derived variable's entity",
            ));
        }

        let target_ancestors = metadata.ancestor_ids(&config.target_variable.entity_id)?;
        let common_ancestor = metadata
            .ancestor_ids(&spec.entity_id)?
            .into_iter()
            .find(|id| target_ancestors.contains(id))
            .ok_or_else(|| {
                base.invalid(
                    "there is no ancestor entity shared by the anchor and target variables' entities",
                )
            })?;

        let calculator_id = format!("{}_calc", spec.variable_id);
        let calculator = DerivedVariableSpec::new(
            common_ancestor,
            calculator_id.clone(),
            RelativeObservationCalculator::FUNCTION_NAME,
            spec.config.clone(),
        )
        .with_display_name(calculator_id);

        Ok(Box::new(Self {
            calculator_column: calculator.variable_spec().dot_notation(),
            calculator,
            id_column: metadata.entity(&spec.entity_id)?.id_column_name(),
            base,
        }))
    }
}

impl DerivedVariable for RelativeObservationMinTimeInterval {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.calculator.variable_spec()]
    }

    fn depended_derived_specs(&self) -> Vec<DerivedVariableSpec> {
        vec![self.calculator.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::Integer)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Continuous)
    }
}

impl Transform for RelativeObservationMinTimeInterval {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let shared: Map<String, Value> = serde_json::from_str(row.value(&self.calculator_column)?)?;
        let id = row.value(&self.id_column)?;
        Ok(shared
            .get(id)
            .and_then(Value::as_i64)
            .map_or_else(|| EMPTY_VALUE.to_string(), |days| days.to_string()))
    }
}

// =============================================================================
// Calculator on the common ancestor
// =============================================================================

#[derive(Debug)]
pub struct RelativeObservationCalculator {
    base: DerivedVariableBase,
    min_interval_days: i64,
    anchor: DerivedVariableSpec,
    anchor_column: String,
    target: DerivedVariableSpec,
    target_column: String,
}

impl RelativeObservationCalculator {
    pub const FUNCTION_NAME: &'static str = "relativeObservationCalculator";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: RelativeObservationConfig = base.convert_config(&spec.config)?;

        let anchor = aggregator_spec(
            spec,
            "anchor",
            &config.anchor_variable,
            &config.anchor_timestamp_variable,
            &config.anchor_variable_true_values,
            &config.related_observations_subset,
        )?;
        let target = aggregator_spec(
            spec,
            "target",
            &config.target_variable,
            &config.target_timestamp_variable,
            &config.target_variable_true_values,
            &config.related_observations_subset,
        )?;

        Ok(Box::new(Self {
            base,
            min_interval_days: config.minimum_time_interval_days.unwrap_or(0).max(0),
            anchor_column: anchor.variable_spec().dot_notation(),
            anchor,
            target_column: target.variable_spec().dot_notation(),
            target,
        }))
    }

    fn observations(&self, row: &Row, column: &str) -> MergeResult<Vec<(String, i64)>> {
        let encoded: Vec<String> = serde_json::from_str(row.value(column)?)?;
        encoded
            .into_iter()
            .map(|observation| {
                let (id, timestamp) = observation
                    .split_once(OBSERVATION_SEPARATOR)
                    .ok_or_else(|| {
                        MergeError::invalid_value(column, &observation, "expected id and timestamp")
                    })?;
                Ok((id.to_string(), parse_epoch_day(column, timestamp)?))
            })
            .collect()
    }
}

fn aggregator_spec(
    calculator: &DerivedVariableSpec,
    suffix: &str,
    variable: &VariableSpec,
    timestamp_variable: &VariableSpec,
    true_values: &Option<Vec<String>>,
    filters: &Option<Vec<Filter>>,
) -> MergeResult<DerivedVariableSpec> {
    let variable_id = format!("{}_{}", calculator.variable_id, suffix);
    let config = AggregatorConfig {
        var_description: suffix.to_string(),
        variable: variable.clone(),
        timestamp_variable: timestamp_variable.clone(),
        true_values: true_values.clone(),
        filters_override: filters.clone(),
    };
    Ok(DerivedVariableSpec::new(
        &calculator.entity_id,
        variable_id.clone(),
        RelativeObservationAggregator::FUNCTION_NAME,
        serde_json::to_value(config)?,
    )
    .with_display_name(variable_id))
}

impl DerivedVariable for RelativeObservationCalculator {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.anchor.variable_spec(), self.target.variable_spec()]
    }

    fn depended_derived_specs(&self) -> Vec<DerivedVariableSpec> {
        vec![self.anchor.clone(), self.target.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::String)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Continuous)
    }
}

impl Transform for RelativeObservationCalculator {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let mut targets: Vec<i64> = self
            .observations(row, &self.target_column)?
            .into_iter()
            .map(|(_, day)| day)
            .collect();
        targets.sort_unstable();

        let mut intervals = Map::new();
        for (id, anchor_day) in self.observations(row, &self.anchor_column)? {
            if let Some(days) = targets
                .iter()
                .map(|target_day| target_day - anchor_day)
                .find(|&days| days > self.min_interval_days)
            {
                intervals.insert(id, Value::from(days));
            }
        }
        Ok(Value::Object(intervals).to_string())
    }
}
