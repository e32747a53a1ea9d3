//! Derived variables: per-row transforms and descendant reductions.
//!
//! A request names derived variables by function name and JSON config. The
//! [`PluginRegistry`] maps each name to a builder; the
//! [`DerivedVariableFactory`] builds every instance, orders them by
//! dependency, validates them, and records their metadata so the entity
//! tree can treat them like any other variable.

mod factory;
mod registry;
pub mod validation;
mod variable;

pub use factory::{DerivedVar, DerivedVariableFactory};
pub use registry::{PluginInstance, PluginRegistry, ReductionBuilder, TransformBuilder};
pub use variable::{
    DerivedVariable, DerivedVariableBase, DerivedVariableSpec, Reducer, Reduction, Transform,
    EMPTY_VALUE,
};
