//! Builds, orders, validates, and registers every derived variable of one
//! request.
//!
//! # Process
//!
//! 1. Resolve each requested spec through the [`PluginRegistry`], adding the
//!    helper specs each plugin declares (recursively).
//! 2. Order all instances so each follows the derived variables it reads,
//!    rejecting cycles.
//! 3. In that order, validate each instance and incorporate its metadata, so
//!    later instances can see the variables earlier ones define.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use super::registry::{PluginInstance, PluginRegistry};
use super::variable::{DerivedVariableSpec, Reduction, Transform};
use crate::error::{MergeError, MergeResult};
use crate::metadata::{
    DataShape, ReferenceMetadata, VariableDef, VariableSource, VariableSpec, VariableType,
};

macro_rules! dispatch {
    ($value:expr, $var:ident => $body:expr) => {
        match $value {
            Self::Transform($var) => $body,
            Self::Reduction($var) => $body,
        }
    };
}

impl PluginInstance {
    pub fn spec(&self) -> &VariableSpec {
        dispatch!(self, v => v.spec())
    }

    fn required_input_vars(&self) -> Vec<VariableSpec> {
        dispatch!(self, v => v.required_input_vars())
    }

    fn depended_derived_specs(&self) -> Vec<DerivedVariableSpec> {
        dispatch!(self, v => v.depended_derived_specs())
    }

    fn validate(&mut self, metadata: &ReferenceMetadata) -> MergeResult<()> {
        match self {
            Self::Transform(t) => {
                t.validate_locations(metadata)?;
                t.validate_supplemental(metadata)
            }
            Self::Reduction(r) => {
                r.validate_locations(metadata)?;
                r.validate_supplemental(metadata)
            }
        }
    }

    fn to_variable_def(&self, metadata: &ReferenceMetadata) -> MergeResult<VariableDef> {
        let (source, var_type, data_shape, units, vocabulary, display_name): (
            VariableSource,
            VariableType,
            DataShape,
            Option<String>,
            Option<Vec<String>>,
            String,
        ) = match self {
            Self::Transform(v) => (
                VariableSource::DerivedTransform,
                v.variable_type(metadata)?,
                v.data_shape(metadata)?,
                v.units(),
                v.vocabulary(),
                v.display_name().to_string(),
            ),
            Self::Reduction(v) => (
                VariableSource::DerivedReduction,
                v.variable_type(metadata)?,
                v.data_shape(metadata)?,
                v.units(),
                v.vocabulary(),
                v.display_name().to_string(),
            ),
        };
        let mut def = VariableDef::new(self.spec().clone(), var_type, data_shape)
            .with_source(source)
            .with_display_name(display_name);
        def.units = units;
        def.vocabulary = vocabulary;
        Ok(def)
    }

    fn into_shared(self) -> DerivedVar {
        match self {
            Self::Transform(t) => DerivedVar::Transform(Arc::from(t)),
            Self::Reduction(r) => DerivedVar::Reduction(Arc::from(r)),
        }
    }
}

/// A validated derived variable, shared with the entity tree.
#[derive(Debug, Clone)]
pub enum DerivedVar {
    Transform(Arc<dyn Transform>),
    Reduction(Arc<dyn Reduction>),
}

impl DerivedVar {
    pub fn spec(&self) -> &VariableSpec {
        dispatch!(self, v => v.spec())
    }

    pub fn function_name(&self) -> &str {
        dispatch!(self, v => v.function_name())
    }

    pub fn as_transform(&self) -> Option<&Arc<dyn Transform>> {
        match self {
            Self::Transform(t) => Some(t),
            Self::Reduction(_) => None,
        }
    }

    pub fn as_reduction(&self) -> Option<&Arc<dyn Reduction>> {
        match self {
            Self::Transform(_) => None,
            Self::Reduction(r) => Some(r),
        }
    }
}

/// All derived variables of one request, in dependency order.
#[derive(Debug, Default)]
pub struct DerivedVariableFactory {
    ordered: Vec<DerivedVar>,
    index: HashMap<VariableSpec, usize>,
}

impl DerivedVariableFactory {
    /// A factory with no derived variables.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build every instance named by `specs` (plus declared helpers), order
    /// them, validate them, and incorporate them into `metadata`.
    pub fn new(
        metadata: &mut ReferenceMetadata,
        specs: &[DerivedVariableSpec],
        registry: &PluginRegistry,
    ) -> MergeResult<Self> {
        let mut requested = HashSet::new();
        for spec in specs {
            if !requested.insert(spec.variable_spec()) {
                return Err(MergeError::DuplicateDerivedVariable(
                    spec.variable_spec().dot_notation(),
                ));
            }
        }

        let mut instances = Vec::new();
        let mut seen = HashSet::new();
        add_instances(metadata, specs, registry, &mut instances, &mut seen)?;

        let order = dependency_order(&instances)?;
        let mut slots: Vec<Option<PluginInstance>> = instances.into_iter().map(Some).collect();

        let mut ordered = Vec::with_capacity(slots.len());
        let mut index = HashMap::new();
        for i in order {
            let Some(mut instance) = slots[i].take() else {
                continue;
            };
            instance.validate(metadata)?;
            let def = instance.to_variable_def(metadata)?;
            metadata.incorporate_derived(def)?;
            index.insert(instance.spec().clone(), ordered.len());
            ordered.push(instance.into_shared());
        }

        info!(
            "Prepared {} derived variable(s): {}",
            ordered.len(),
            ordered
                .iter()
                .map(|v| v.spec().dot_notation())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { ordered, index })
    }

    /// Every derived variable; each appears after those it depends on.
    pub fn ordered(&self) -> &[DerivedVar] {
        &self.ordered
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn get(&self, spec: &VariableSpec) -> Option<&DerivedVar> {
        self.index.get(spec).map(|&i| &self.ordered[i])
    }

    pub fn transform(&self, spec: &VariableSpec) -> MergeResult<Arc<dyn Transform>> {
        self.get(spec)
            .and_then(DerivedVar::as_transform)
            .cloned()
            .ok_or_else(|| MergeError::UnknownVariable(spec.dot_notation()))
    }

    pub fn reduction(&self, spec: &VariableSpec) -> MergeResult<Arc<dyn Reduction>> {
        self.get(spec)
            .and_then(DerivedVar::as_reduction)
            .cloned()
            .ok_or_else(|| MergeError::UnknownVariable(spec.dot_notation()))
    }
}

fn add_instances(
    metadata: &ReferenceMetadata,
    specs: &[DerivedVariableSpec],
    registry: &PluginRegistry,
    instances: &mut Vec<PluginInstance>,
    seen: &mut HashSet<VariableSpec>,
) -> MergeResult<()> {
    for spec in specs {
        let instance = registry.build(metadata, spec)?;
        // helpers may be declared by more than one plugin
        if !seen.insert(instance.spec().clone()) {
            debug!("Derived variable {} already declared", instance.spec());
            continue;
        }
        let helpers = instance.depended_derived_specs();
        instances.push(instance);
        add_instances(metadata, &helpers, registry, instances, seen)?;
    }
    Ok(())
}

/// Indices of `instances` with dependencies first.
fn dependency_order(instances: &[PluginInstance]) -> MergeResult<Vec<usize>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..instances.len()).map(|i| graph.add_node(i)).collect();
    let by_spec: HashMap<&VariableSpec, NodeIndex> = instances
        .iter()
        .zip(nodes.iter())
        .map(|(instance, &node)| (instance.spec(), node))
        .collect();

    for (instance, &node) in instances.iter().zip(nodes.iter()) {
        let depended = instance
            .depended_derived_specs()
            .into_iter()
            .map(|spec| spec.variable_spec())
            .chain(instance.required_input_vars());
        for dependency in depended {
            if let Some(&from) = by_spec.get(&dependency) {
                graph.update_edge(from, node, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(sorted) => Ok(sorted.into_iter().map(|node| graph[node]).collect()),
        Err(_) => {
            let cycle = tarjan_scc(&graph)
                .into_iter()
                .find(|component| {
                    component.len() > 1
                        || graph.contains_edge(component[0], component[0])
                })
                .unwrap_or_default();
            let mut names: Vec<String> = cycle
                .iter()
                .rev()
                .map(|&node| instances[graph[node]].spec().dot_notation())
                .collect();
            if let Some(first) = names.first().cloned() {
                names.push(first);
            }
            Err(MergeError::CyclicDependency(names))
        }
    }
}
