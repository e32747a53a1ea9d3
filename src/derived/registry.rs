//! Function-name to plugin-builder lookup.

use std::collections::HashMap;
use std::fmt;

use super::variable::{DerivedVariableSpec, Reduction, Transform};
use crate::error::{MergeError, MergeResult};
use crate::metadata::ReferenceMetadata;

pub type TransformBuilder = Box<
    dyn Fn(&ReferenceMetadata, &DerivedVariableSpec) -> MergeResult<Box<dyn Transform>>
        + Send
        + Sync,
>;

pub type ReductionBuilder = Box<
    dyn Fn(&ReferenceMetadata, &DerivedVariableSpec) -> MergeResult<Box<dyn Reduction>>
        + Send
        + Sync,
>;

/// A freshly built, not yet validated plugin instance.
#[derive(Debug)]
pub enum PluginInstance {
    Transform(Box<dyn Transform>),
    Reduction(Box<dyn Reduction>),
}

/// Builders for every known derived variable function.
///
/// Lookups check transforms before reductions, so a name registered as both
/// always resolves to the transform.
#[derive(Default)]
pub struct PluginRegistry {
    transforms: HashMap<String, TransformBuilder>,
    reductions: HashMap<String, ReductionBuilder>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_transform<F>(&mut self, function_name: impl Into<String>, builder: F)
    where
        F: Fn(&ReferenceMetadata, &DerivedVariableSpec) -> MergeResult<Box<dyn Transform>>
            + Send
            + Sync
            + 'static,
    {
        self.transforms.insert(function_name.into(), Box::new(builder));
    }

    pub fn register_reduction<F>(&mut self, function_name: impl Into<String>, builder: F)
    where
        F: Fn(&ReferenceMetadata, &DerivedVariableSpec) -> MergeResult<Box<dyn Reduction>>
            + Send
            + Sync
            + 'static,
    {
        self.reductions.insert(function_name.into(), Box::new(builder));
    }

    pub fn with_transform<F>(mut self, function_name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&ReferenceMetadata, &DerivedVariableSpec) -> MergeResult<Box<dyn Transform>>
            + Send
            + Sync
            + 'static,
    {
        self.register_transform(function_name, builder);
        self
    }

    pub fn with_reduction<F>(mut self, function_name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&ReferenceMetadata, &DerivedVariableSpec) -> MergeResult<Box<dyn Reduction>>
            + Send
            + Sync
            + 'static,
    {
        self.register_reduction(function_name, builder);
        self
    }

    pub fn contains(&self, function_name: &str) -> bool {
        self.transforms.contains_key(function_name) || self.reductions.contains_key(function_name)
    }

    /// Sorted names of every registered function.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .transforms
            .keys()
            .chain(self.reductions.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Build the plugin named by `spec.function_name`.
    pub fn build(
        &self,
        metadata: &ReferenceMetadata,
        spec: &DerivedVariableSpec,
    ) -> MergeResult<PluginInstance> {
        if let Some(builder) = self.transforms.get(&spec.function_name) {
            return builder(metadata, spec).map(PluginInstance::Transform);
        }
        if let Some(builder) = self.reductions.get(&spec.function_name) {
            return builder(metadata, spec).map(PluginInstance::Reduction);
        }
        Err(MergeError::UnrecognizedFunction(spec.function_name.clone()))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("functions", &self.function_names())
            .finish()
    }
}
