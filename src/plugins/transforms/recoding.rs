//! Value recodings: categorical relabeling and numeric range binning.

use serde::Deserialize;

use crate::derived::validation::check_variable;
use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Transform, EMPTY_VALUE};
use crate::error::MergeResult;
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::parse_number;
use crate::stream::{Row, RowExt};

// =============================================================================
// Categorical recoding
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoricalRule {
    input_values: Vec<String>,
    output_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoricalRecodingConfig {
    input_variable: VariableSpec,
    rules: Vec<CategoricalRule>,
    #[serde(default)]
    unmapped_value: Option<String>,
}

/// Maps each input category to the output value of the first rule listing it.
#[derive(Debug)]
pub struct CategoricalRecoding {
    base: DerivedVariableBase,
    input_variable: VariableSpec,
    input_column: String,
    rules: Vec<CategoricalRule>,
    unmapped_value: String,
}

impl CategoricalRecoding {
    pub const FUNCTION_NAME: &'static str = "categoricalRecoding";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: CategoricalRecodingConfig = base.convert_config(&spec.config)?;
        Ok(Box::new(Self {
            base,
            input_column: config.input_variable.dot_notation(),
            input_variable: config.input_variable,
            rules: config.rules,
            unmapped_value: config
                .unmapped_value
                .unwrap_or_else(|| EMPTY_VALUE.to_string()),
        }))
    }
}

impl DerivedVariable for CategoricalRecoding {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.input_variable.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::String)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Categorical)
    }

    fn vocabulary(&self) -> Option<Vec<String>> {
        let mut vocabulary: Vec<String> =
            self.rules.iter().map(|r| r.output_value.clone()).collect();
        vocabulary.push(self.unmapped_value.clone());
        Some(vocabulary)
    }

    fn validate_supplemental(&mut self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        check_variable(
            metadata,
            self.function_name(),
            "Input",
            &self.input_variable,
            None,
            Some(&[DataShape::Categorical, DataShape::Binary]),
        )?;
        Ok(())
    }
}

impl Transform for CategoricalRecoding {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let input = row.value(&self.input_column)?;
        let output = self
            .rules
            .iter()
            .find(|rule| rule.input_values.iter().any(|v| v == input))
            .map_or(&self.unmapped_value, |rule| &rule.output_value);
        Ok(output.clone())
    }
}

// =============================================================================
// Continuous to ordinal
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeRule {
    #[serde(default)]
    min_inclusive: Option<f64>,
    #[serde(default)]
    max_exclusive: Option<f64>,
    output_value: String,
}

impl RangeRule {
    /// Unbounded ends cover every finite value.
    fn matches(&self, value: f64) -> bool {
        value >= self.min_inclusive.unwrap_or(f64::NEG_INFINITY)
            && value < self.max_exclusive.unwrap_or(f64::INFINITY)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContinuousToOrdinalConfig {
    input_variable: VariableSpec,
    rules: Vec<RangeRule>,
    #[serde(default)]
    unmapped_value: Option<String>,
}

/// Bins a continuous numeric variable into labeled ranges; first match wins.
#[derive(Debug)]
pub struct ContinuousToOrdinal {
    base: DerivedVariableBase,
    input_variable: VariableSpec,
    input_column: String,
    rules: Vec<RangeRule>,
    unmapped_value: String,
    impute_zero: bool,
}

impl ContinuousToOrdinal {
    pub const FUNCTION_NAME: &'static str = "continuousToOrdinal";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: ContinuousToOrdinalConfig = base.convert_config(&spec.config)?;
        Ok(Box::new(Self {
            base,
            input_column: config.input_variable.dot_notation(),
            input_variable: config.input_variable,
            rules: config.rules,
            unmapped_value: config
                .unmapped_value
                .unwrap_or_else(|| EMPTY_VALUE.to_string()),
            impute_zero: false,
        }))
    }
}

impl DerivedVariable for ContinuousToOrdinal {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.input_variable.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::String)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Ordinal)
    }

    fn vocabulary(&self) -> Option<Vec<String>> {
        Some(self.rules.iter().map(|r| r.output_value.clone()).collect())
    }

    fn validate_supplemental(&mut self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        let input = check_variable(
            metadata,
            self.function_name(),
            "Input",
            &self.input_variable,
            Some(&[VariableType::Integer, VariableType::Number]),
            Some(&[DataShape::Continuous]),
        )?;
        self.impute_zero = input.impute_zero;
        Ok(())
    }
}

impl Transform for ContinuousToOrdinal {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let raw = row.value(&self.input_column)?;
        let value = if raw.is_empty() {
            if !self.impute_zero {
                return Ok(EMPTY_VALUE.to_string());
            }
            0.0
        } else {
            parse_number(&self.input_column, raw)?
        };
        let output = self
            .rules
            .iter()
            .find(|rule| rule.matches(value))
            .map_or(&self.unmapped_value, |rule| &rule.output_value);
        Ok(output.clone())
    }
}
