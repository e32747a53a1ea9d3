//! Checks on where a derived variable's inputs live and what they are.

use crate::error::{MergeError, MergeResult};
use crate::metadata::{DataShape, ReferenceMetadata, VariableDef, VariableSpec, VariableType};

/// Every input exists and sits on `entity_id` or one of its ancestors.
pub fn transform_locations(
    metadata: &ReferenceMetadata,
    function_name: &str,
    entity_id: &str,
    inputs: &[VariableSpec],
) -> MergeResult<()> {
    let ancestors = metadata.ancestor_ids(entity_id)?;
    for input in inputs {
        check_exists(metadata, function_name, "transform", input)?;
        if input.entity_id != entity_id && !ancestors.contains(&input.entity_id) {
            return Err(MergeError::invalid_config(
                function_name,
                format!(
                    "transform derived vars can only use input variables on the same entity on which they are declared or on an ancestor; {} is not",
                    input
                ),
            ));
        }
    }
    Ok(())
}

/// The lowest input entity is `entity_id` or a descendant of it.
pub fn reduction_locations(
    metadata: &ReferenceMetadata,
    function_name: &str,
    entity_id: &str,
    inputs: &[VariableSpec],
) -> MergeResult<()> {
    let input_entity = reduction_entity_id(metadata, function_name, inputs)?;
    if input_entity != entity_id && !metadata.is_ancestor_of(entity_id, &input_entity) {
        return Err(MergeError::invalid_config(
            function_name,
            format!(
                "input vars are on entity {}, which is not the target or a descendant entity",
                input_entity
            ),
        ));
    }
    Ok(())
}

/// The lowest (farthest from root) entity among `inputs`, which must all lie
/// on one branch of the entity tree.
pub fn reduction_entity_id(
    metadata: &ReferenceMetadata,
    function_name: &str,
    inputs: &[VariableSpec],
) -> MergeResult<String> {
    let mut lowest: Option<&str> = None;
    for input in inputs {
        let variable = check_exists(metadata, function_name, "reduction", input)?;
        let entity = variable.entity_id();
        lowest = match lowest {
            None => Some(entity),
            Some(current) if current == entity || metadata.is_ancestor_of(entity, current) => {
                Some(current)
            }
            Some(current) if metadata.is_ancestor_of(current, entity) => Some(entity),
            Some(_) => {
                return Err(MergeError::invalid_config(
                    function_name,
                    "not all input variables are in the same branch of the entity tree",
                ))
            }
        };
    }
    lowest
        .map(str::to_string)
        .ok_or_else(|| MergeError::invalid_config(function_name, "no required input vars specified"))
}

fn check_exists<'a>(
    metadata: &'a ReferenceMetadata,
    function_name: &str,
    kind: &str,
    input: &VariableSpec,
) -> MergeResult<&'a VariableDef> {
    metadata.find_variable(input).ok_or_else(|| {
        MergeError::invalid_config(
            function_name,
            format!("input variable {} for {} derived var does not exist", input, kind),
        )
    })
}

/// Resolve `spec` and restrict its type and shape.
pub fn check_variable<'a>(
    metadata: &'a ReferenceMetadata,
    function_name: &str,
    input_name: &str,
    spec: &VariableSpec,
    allowed_types: Option<&[VariableType]>,
    allowed_shapes: Option<&[DataShape]>,
) -> MergeResult<&'a VariableDef> {
    let variable = metadata.variable(spec)?;
    if let Some(types) = allowed_types {
        if !types.contains(&variable.var_type) {
            return Err(MergeError::invalid_config(
                function_name,
                format!("{} variable must be of type: [{}]", input_name, join(types)),
            ));
        }
    }
    if let Some(shapes) = allowed_shapes {
        if !shapes.contains(&variable.data_shape) {
            return Err(MergeError::invalid_config(
                function_name,
                format!("{} variable must be of shape: [{}]", input_name, join(shapes)),
            ));
        }
    }
    Ok(variable)
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
