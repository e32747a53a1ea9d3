//! Single-variable numeric aggregates and true-value counts.

use serde::Deserialize;

use crate::derived::validation::check_variable;
use crate::derived::{
    DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Reducer, Reduction, EMPTY_VALUE,
};
use crate::error::MergeResult;
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::{format_number, parse_number, true_values_or_default};
use crate::stream::{Row, RowExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Mean,
    Sum,
    Min,
    Max,
}

impl NumericKind {
    pub fn function_name(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NumericConfig {
    input_variable: VariableSpec,
    #[serde(default)]
    impute_zero: bool,
}

/// Mean, sum, min, or max of one numeric descendant variable.
///
/// Blank values are skipped unless `imputeZero` is set, in which case they
/// count as zero. A parent with no values gets an empty result.
#[derive(Debug)]
pub struct NumericReduction {
    base: DerivedVariableBase,
    kind: NumericKind,
    input_variable: VariableSpec,
    input_column: String,
    impute_zero: bool,
}

impl NumericReduction {
    pub fn build(
        kind: NumericKind,
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Reduction>> {
        let base = DerivedVariableBase::new(kind.function_name(), spec);
        let config: NumericConfig = base.convert_config(&spec.config)?;
        Ok(Box::new(Self {
            base,
            kind,
            input_column: config.input_variable.dot_notation(),
            input_variable: config.input_variable,
            impute_zero: config.impute_zero,
        }))
    }
}

impl DerivedVariable for NumericReduction {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.input_variable.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::Number)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Continuous)
    }

    fn validate_supplemental(&mut self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        check_variable(
            metadata,
            self.function_name(),
            "Input",
            &self.input_variable,
            Some(&[VariableType::Integer, VariableType::Number]),
            None,
        )?;
        Ok(())
    }
}

impl Reduction for NumericReduction {
    fn create_reducer(&self) -> Box<dyn Reducer + '_> {
        Box::new(NumericReducer {
            reduction: self,
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }
}

struct NumericReducer<'a> {
    reduction: &'a NumericReduction,
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Reducer for NumericReducer<'_> {
    fn add_row(&mut self, row: &Row) -> MergeResult<()> {
        let column = &self.reduction.input_column;
        let raw = row.value(column)?;
        let value = if raw.trim().is_empty() {
            if !self.reduction.impute_zero {
                return Ok(());
            }
            0.0
        } else {
            parse_number(column, raw)?
        };
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    fn finish(self: Box<Self>) -> MergeResult<String> {
        if self.count == 0 {
            return Ok(EMPTY_VALUE.to_string());
        }
        let result = match self.reduction.kind {
            NumericKind::Mean => self.sum / self.count as f64,
            NumericKind::Sum => self.sum,
            NumericKind::Min => self.min,
            NumericKind::Max => self.max,
        };
        Ok(format_number(result))
    }
}

// =============================================================================
// Count matching
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountMatchingConfig {
    input_variable: VariableSpec,
    #[serde(default)]
    true_values: Option<Vec<String>>,
}

/// Number of descendant rows whose input value is one of the true values.
#[derive(Debug)]
pub struct CountMatching {
    base: DerivedVariableBase,
    input_variable: VariableSpec,
    input_column: String,
    true_values: Vec<String>,
}

impl CountMatching {
    pub const FUNCTION_NAME: &'static str = "countMatching";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Reduction>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: CountMatchingConfig = base.convert_config(&spec.config)?;
        Ok(Box::new(Self {
            base,
            input_column: config.input_variable.dot_notation(),
            input_variable: config.input_variable,
            true_values: true_values_or_default(config.true_values),
        }))
    }
}

impl DerivedVariable for CountMatching {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.input_variable.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::Integer)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Continuous)
    }
}

impl Reduction for CountMatching {
    fn create_reducer(&self) -> Box<dyn Reducer + '_> {
        Box::new(CountReducer {
            reduction: self,
            count: 0,
        })
    }
}

struct CountReducer<'a> {
    reduction: &'a CountMatching,
    count: u64,
}

impl Reducer for CountReducer<'_> {
    fn add_row(&mut self, row: &Row) -> MergeResult<()> {
        let value = row.value(&self.reduction.input_column)?;
        if self.reduction.true_values.iter().any(|v| v == value) {
            self.count += 1;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> MergeResult<String> {
        Ok(self.count.to_string())
    }
}
