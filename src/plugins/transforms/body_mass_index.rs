//! Body-mass index (kg/m²) from a height and a weight variable.

use serde::Deserialize;

use crate::derived::validation::check_variable;
use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Transform, EMPTY_VALUE};
use crate::error::{MergeError, MergeResult};
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::units::Unit;
use crate::plugins::{format_number, parse_number};
use crate::stream::{Row, RowExt};

const NUMERIC_TYPES: [VariableType; 2] = [VariableType::Integer, VariableType::Number];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BodyMassIndexConfig {
    height_variable: VariableSpec,
    weight_variable: VariableSpec,
}

#[derive(Debug)]
pub struct BodyMassIndex {
    base: DerivedVariableBase,
    height_variable: VariableSpec,
    height_column: String,
    weight_variable: VariableSpec,
    weight_column: String,
    units: Option<(Unit, Unit)>,
}

impl BodyMassIndex {
    pub const FUNCTION_NAME: &'static str = "bodyMassIndex";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: BodyMassIndexConfig = base.convert_config(&spec.config)?;
        Ok(Box::new(Self {
            height_column: config.height_variable.dot_notation(),
            height_variable: config.height_variable,
            weight_column: config.weight_variable.dot_notation(),
            weight_variable: config.weight_variable,
            units: None,
            base,
        }))
    }

    fn variable_unit(
        &self,
        metadata: &ReferenceMetadata,
        variable: &VariableSpec,
        description: &str,
        compatible_with: Unit,
    ) -> MergeResult<Unit> {
        metadata
            .variable(variable)?
            .units
            .as_deref()
            .and_then(Unit::find)
            .filter(|unit| unit.is_compatible_with(compatible_with))
            .ok_or_else(|| {
                self.base.invalid(format!(
                    "selected {} variable must have a unit compatible with {}",
                    description, compatible_with
                ))
            })
    }
}

impl DerivedVariable for BodyMassIndex {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.height_variable.clone(), self.weight_variable.clone()]
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::Number)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Continuous)
    }

    fn validate_supplemental(&mut self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        let name = self.function_name();
        check_variable(metadata, name, "Height", &self.height_variable, Some(&NUMERIC_TYPES), None)?;
        let height = self.variable_unit(metadata, &self.height_variable, "height", Unit::Meter)?;
        check_variable(metadata, name, "Weight", &self.weight_variable, Some(&NUMERIC_TYPES), None)?;
        let weight = self.variable_unit(metadata, &self.weight_variable, "weight", Unit::Kilogram)?;
        self.units = Some((height, weight));
        Ok(())
    }
}

impl Transform for BodyMassIndex {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let raw_height = row.value(&self.height_column)?;
        let raw_weight = row.value(&self.weight_column)?;
        if raw_height.trim().is_empty() || raw_weight.trim().is_empty() {
            return Ok(EMPTY_VALUE.to_string());
        }
        let (height_unit, weight_unit) = self
            .units
            .ok_or_else(|| MergeError::invalid_config(Self::FUNCTION_NAME, "units not resolved"))?;
        let height = Unit::Meter.convert_from(height_unit, parse_number(&self.height_column, raw_height)?);
        let weight =
            Unit::Kilogram.convert_from(weight_unit, parse_number(&self.weight_column, raw_weight)?);
        Ok(format_number(weight / height.powi(2)))
    }
}
