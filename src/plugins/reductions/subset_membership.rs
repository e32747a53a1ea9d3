use serde::Deserialize;

use crate::derived::{DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Reducer, Reduction};
use crate::error::MergeResult;
use crate::metadata::{DataShape, ReferenceMetadata, VariableSpec, VariableType};
use crate::plugins::{binary_vocabulary, FALSE_VALUE, TRUE_VALUE};
use crate::stream::{Filter, Row};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubsetMembershipConfig {
    #[serde(default)]
    subset_filters: Vec<Filter>,
}

/// `1` when the entity's own row survives `subsetFilters`, else `0`.
///
/// Reads a second stream of this entity's ids fetched with the subset
/// filters; a row is a member if that stream has a matching id.
#[derive(Debug)]
pub struct SubsetMembership {
    base: DerivedVariableBase,
    id_variable: VariableSpec,
    subset_filters: Vec<Filter>,
}

impl SubsetMembership {
    pub const FUNCTION_NAME: &'static str = "subsetMembership";

    pub fn build(
        metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<Box<dyn Reduction>> {
        let base = DerivedVariableBase::new(Self::FUNCTION_NAME, spec);
        let config: SubsetMembershipConfig = base.convert_config(&spec.config)?;
        Ok(Box::new(Self {
            id_variable: metadata.entity(&spec.entity_id)?.id_column().spec.clone(),
            subset_filters: config.subset_filters,
            base,
        }))
    }
}

impl DerivedVariable for SubsetMembership {
    fn base(&self) -> &DerivedVariableBase {
        &self.base
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        vec![self.id_variable.clone()]
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

impl Reduction for SubsetMembership {
    fn create_reducer(&self) -> Box<dyn Reducer + '_> {
        Box::new(MembershipReducer { member: false })
    }

    fn filters_override(&self) -> Option<Vec<Filter>> {
        Some(self.subset_filters.clone())
    }
}

struct MembershipReducer {
    member: bool,
}

impl Reducer for MembershipReducer {
    fn add_row(&mut self, _row: &Row) -> MergeResult<()> {
        self.member = true;
        Ok(())
    }

    fn finish(self: Box<Self>) -> MergeResult<String> {
        Ok(if self.member { TRUE_VALUE } else { FALSE_VALUE }.to_string())
    }
}
