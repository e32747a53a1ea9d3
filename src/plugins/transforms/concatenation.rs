use serde::Deserialize;

use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Transform};
use crate::error::MergeResult;
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::stream::{Row, RowExt};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConcatenationConfig {
    input_variables: Vec<VariableSpec>,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    delimiter: String,
    #[serde(default)]
    suffix: String,
}

/// `prefix + join(inputs, delimiter) + suffix`.
#[derive(Debug)]
pub struct Concatenation {
    base: DerivedVariableBase,
    input_variables: Vec<VariableSpec>,
    input_columns: Vec<String>,
    prefix: String,
    delimiter: String,
    suffix: String,
}

impl Concatenation {
    pub const FUNCTION_NAME: &'static str = "concatenation";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: ConcatenationConfig = base.convert_config(&spec.config)?;
        if config.input_variables.is_empty() {
            return Err(base.invalid("at least one input variable is required"));
        }
        Ok(Box::new(Self {
            base,
            input_columns: config
                .input_variables
                .iter()
                .map(VariableSpec::dot_notation)
                .collect(),
            input_variables: config.input_variables,
            prefix: config.prefix,
            delimiter: config.delimiter,
            suffix: config.suffix,
        }))
    }
}

impl DerivedVariable for Concatenation {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        self.input_variables.clone()
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::String)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Categorical)
    }
}

impl Transform for Concatenation {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let values = self
            .input_columns
            .iter()
            .map(|column| row.value(column))
            .collect::<MergeResult<Vec<_>>>()?;
        Ok(format!(
            "{}{}{}",
            self.prefix,
            values.join(self.delimiter.as_str()),
            self.suffix
        ))
    }
}
