//! Converts a numeric variable into other units of the same dimension.

use serde::Deserialize;

use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Transform, EMPTY_VALUE};
use crate::error::{MergeError, MergeResult};
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::units::Unit;
use crate::plugins::{format_number, parse_number};
use crate::stream::{Row, RowExt};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitConversionConfig {
    input_variable: VariableSpec,
    output_units: String,
}

#[derive(Debug)]
pub struct UnitConversion {
    base: DerivedVariableBase,
    input_variable: VariableSpec,
    input_column: String,
    output_label: String,
    output_unit: Unit,
    /// Resolved from the input variable's metadata during validation.
    input_unit: Option<Unit>,
}

impl UnitConversion {
    pub const FUNCTION_NAME: &'static str = "unitConversion";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: UnitConversionConfig = base.convert_config(&spec.config)?;
        let output_unit = Unit::find(&config.output_units).ok_or_else(|| {
            base.invalid(format!(
                "output unit '{}' is not a valid unit",
                config.output_units
            ))
        })?;
        Ok(Box::new(Self {
            input_column: config.input_variable.dot_notation(),
            input_variable: config.input_variable,
            output_label: config.output_units,
            output_unit,
            input_unit: None,
            base,
        }))
    }
}

impl DerivedVariable for UnitConversion {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.input_variable.clone()]
    }

    fn variable_type(&self, metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(metadata.variable(&self.input_variable)?.var_type)
    }

    fn data_shape(&self, metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(metadata.variable(&self.input_variable)?.data_shape)
    }

    fn units(&self) -> Option<String> {
        Some(self.output_label.clone())
    }

    fn validate_supplemental(&mut self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        let variable = metadata.variable(&self.input_variable)?;
        let label = variable.units.as_deref().ok_or_else(|| {
            self.base
                .invalid("input variable must have convertible units to convert to different units")
        })?;
        let input_unit = Unit::find(label).ok_or_else(|| {
            self.base.invalid(format!(
                "variable '{}' has a unit '{}' that is not convertible to other units",
                self.input_column, label
            ))
        })?;
        if !input_unit.is_compatible_with(self.output_unit) {
            return Err(self.base.invalid(format!(
                "output unit {} is not compatible with input variable's unit {}",
                self.output_unit, input_unit
            )));
        }
        self.input_unit = Some(input_unit);
        Ok(())
    }
}

impl Transform for UnitConversion {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let raw = row.value(&self.input_column)?;
        if raw.is_empty() {
            return Ok(EMPTY_VALUE.to_string());
        }
        let input_unit = self
            .input_unit
            .ok_or_else(|| MergeError::invalid_config(Self::FUNCTION_NAME, "input unit not resolved"))?;
        let value = parse_number(&self.input_column, raw)?;
        Ok(format_number(input_unit.convert_to(self.output_unit, value)))
    }
}
