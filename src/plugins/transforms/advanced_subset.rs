//! Binary membership computed from a tree of set operations over variable
//! predicates.
//!
//! Each step combines a left and a right operand with `intersect`, `union`,
//! or `minus`. An operand is either another step (by key) or a variable whose
//! value counts as true when it is in the operand's true-value list. The
//! steps must form exactly one tree rooted at `rootStepKey`: every step is
//! used once and no key is referenced twice.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Transform};
use crate::error::MergeResult;
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::{binary_vocabulary, true_values_or_default, FALSE_VALUE, TRUE_VALUE};
use crate::stream::{Row, RowExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SetOperation {
    Intersect,
    Union,
    Minus,
}

impl SetOperation {
    fn apply(self, left: bool, right: bool) -> bool {
        match self {
            Self::Intersect => left && right,
            Self::Union => left || right,
            Self::Minus => left && !right,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Step {
    key: String,
    operation: Option<SetOperation>,
    left_step_key: Option<String>,
    left_variable: Option<VariableSpec>,
    left_variable_true_values: Option<Vec<String>>,
    right_step_key: Option<String>,
    right_variable: Option<VariableSpec>,
    right_variable_true_values: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdvancedSubsetConfig {
    root_step_key: String,
    steps: Vec<Step>,
}

#[derive(Debug)]
enum Operand {
    Step(Box<OperationNode>),
    Variable {
        column: String,
        true_values: Vec<String>,
    },
}

impl Operand {
    fn test(&self, row: &Row) -> MergeResult<bool> {
        match self {
            Self::Step(node) => node.test(row),
            Self::Variable {
                column,
                true_values,
            } => {
                let value = row.value(column)?;
                Ok(true_values.iter().any(|v| v == value))
            }
        }
    }
}

#[derive(Debug)]
struct OperationNode {
    operation: SetOperation,
    left: Operand,
    right: Operand,
}

impl OperationNode {
    fn test(&self, row: &Row) -> MergeResult<bool> {
        let left = self.left.test(row)?;
        let right = self.right.test(row)?;
        Ok(self.operation.apply(left, right))
    }
}

/// Builds the operation tree, consuming steps from `steps` as they are used.
struct TreeBuilder<'a> {
    base: &'a DerivedVariableBase,
    steps: HashMap<String, Step>,
    required: BTreeMap<String, VariableSpec>,
}

impl TreeBuilder<'_> {
    fn node(&mut self, key: &str) -> MergeResult<OperationNode> {
        let step = self.steps.remove(key).ok_or_else(|| {
            self.base.invalid(format!(
                "step key '{}' does not correspond to any step's key or is referenced more than once",
                key
            ))
        })?;
        let operation = step
            .operation
            .ok_or_else(|| self.base.invalid("operation is required"))?;
        let left = self.operand(
            "left",
            step.left_step_key,
            step.left_variable,
            step.left_variable_true_values,
        )?;
        let right = self.operand(
            "right",
            step.right_step_key,
            step.right_variable,
            step.right_variable_true_values,
        )?;
        Ok(OperationNode {
            operation,
            left,
            right,
        })
    }

    fn operand(
        &mut self,
        side: &str,
        step_key: Option<String>,
        variable: Option<VariableSpec>,
        true_values: Option<Vec<String>>,
    ) -> MergeResult<Operand> {
        match (step_key, variable) {
            (Some(key), None) => Ok(Operand::Step(Box::new(self.node(&key)?))),
            (None, Some(variable)) => {
                let column = variable.dot_notation();
                self.required.insert(column.clone(), variable);
                Ok(Operand::Variable {
                    column,
                    true_values: true_values_or_default(true_values),
                })
            }
            _ => Err(self.base.invalid(format!(
                "each step must contain exactly one of: a {side} step key or {side} variable spec"
            ))),
        }
    }
}

#[derive(Debug)]
pub struct AdvancedSubset {
    base: DerivedVariableBase,
    root: OperationNode,
    required_vars: Vec<VariableSpec>,
}

impl AdvancedSubset {
    pub const FUNCTION_NAME: &'static str = "advancedSubset";

    pub fn build(
        _metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Transform>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: AdvancedSubsetConfig = base.convert_config(&spec.config)?;

        let step_count = config.steps.len();
        let steps: HashMap<String, Step> = config
            .steps
            .into_iter()
            .map(|step| (step.key.clone(), step))
            .collect();
        if steps.len() != step_count {
            return Err(base.invalid("steps must have unique keys within this request"));
        }

        let mut builder = TreeBuilder {
            base: &base,
            steps,
            required: BTreeMap::new(),
        };
        let root = builder.node(&config.root_step_key)?;
        if !builder.steps.is_empty() {
            return Err(base.invalid("all submitted steps must be used"));
        }
        let required_vars = builder.required.into_values().collect();

        Ok(Box::new(Self {
            base,
            root,
            required_vars,
        }))
    }
}

impl DerivedVariable for AdvancedSubset {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        self.required_vars.clone()
    }

    fn variable_type(&self, _metadata: &ReferenceMetadata) -> MergeResult<VariableType> {
        Ok(VariableType::Integer)
    }

    fn data_shape(&self, _metadata: &ReferenceMetadata) -> MergeResult<DataShape> {
        Ok(DataShape::Binary)
    }

    fn vocabulary(&self) -> Option<Vec<String>> {
        Some(binary_vocabulary())
    }
}

impl Transform for AdvancedSubset {
    fn value(&self, row: &Row) -> MergeResult<String> {
        let member = self.root.test(row)?;
        Ok(if member { TRUE_VALUE } else { FALSE_VALUE }.to_string())
    }
}
