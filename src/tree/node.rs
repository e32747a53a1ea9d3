//! Entity stream nodes: one per entity stream the merge reads.
//!
//! # Construction
//!
//! A node is built from the variables requested of its entity. Each one is
//! classified by source:
//!
//! | Source | Handling |
//! |--------|----------|
//! | id | nothing; every stream carries its id columns |
//! | native | added to this node's own stream spec |
//! | transform | its inputs are queued for classification |
//! | reduction | a child node is built for its descendant stream |
//! | ancestor's variable | queued for that ancestor's node |
//!
//! Inputs of transforms are classified the same way, so dependencies are
//! resolved transitively. Each entity that ends up with pending variables
//! gets its own ancestor node.
//!
//! # Enrichment
//!
//! Rows are enriched as the node's stream caches them: ancestor columns
//! first, then reductions, then transforms in dependency order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use super::grouping::GroupingGuard;
use super::TreeContext;
use crate::derived::{DerivedVar, Reduction, Transform};
use crate::error::{MergeError, MergeResult};
use crate::metadata::{VariableSource, VariableSpec};
use crate::stream::{Enrich, LookaheadStream, Row, RowExt, StreamMap, StreamSpec};

/// A node of the entity stream tree.
///
/// Owns the lookahead stream for its entity plus every ancestor and
/// reduction node that stream's rows are enriched from. Dropping a node
/// closes all of them.
pub struct EntityStreamNode {
    entity_id: String,
    id_column: String,
    spec: StreamSpec,
    stream: LookaheadStream<NodeEnrichment>,
}

struct AncestorLink {
    node: EntityStreamNode,
    guard: Option<GroupingGuard>,
}

struct ReductionLink {
    reduction: Arc<dyn Reduction>,
    node: EntityStreamNode,
    guard: Option<GroupingGuard>,
}

struct NodeEnrichment {
    id_column: String,
    ancestors: Vec<AncestorLink>,
    reductions: Vec<ReductionLink>,
    transforms: Vec<Arc<dyn Transform>>,
}

impl EntityStreamNode {
    /// Build the node for `request.entity_id` and, recursively, every node
    /// it reads from.
    ///
    /// `request` names the stream and carries the requested variables and
    /// filter override; only the natives among those variables stay on this
    /// node's own stream spec.
    pub fn build(ctx: &TreeContext<'_>, request: StreamSpec, depth: usize) -> MergeResult<Self> {
        let max_depth = ctx.settings.max_dependency_depth;
        if depth > max_depth {
            return Err(MergeError::DependencyDepthExceeded(max_depth));
        }

        let metadata = ctx.metadata;
        let entity = metadata.entity(&request.entity_id)?;
        let id_column = entity.id_column_name();
        let strict = ctx.settings.strict_grouping;

        let mut pending: Vec<(String, Vec<VariableSpec>)> = metadata
            .ancestor_ids(&entity.id)?
            .into_iter()
            .map(|id| (id, Vec::new()))
            .collect();

        let StreamSpec {
            name,
            entity_id,
            variables: requested,
            filters_override,
        } = request;
        let mut spec = StreamSpec::new(name, entity_id).with_filters_override(filters_override);

        let mut worklist = requested;
        let mut seen: HashSet<VariableSpec> = HashSet::new();
        let mut reductions = Vec::new();
        let mut i = 0;
        while i < worklist.len() {
            let var = worklist[i].clone();
            i += 1;
            if !seen.insert(var.clone()) {
                continue;
            }

            let def = metadata.variable(&var)?;
            if def.entity_id() == entity.id {
                match def.source {
                    VariableSource::Id => {}
                    VariableSource::Native => spec.add_variable(var),
                    VariableSource::DerivedTransform => {
                        let transform = ctx.factory.transform(&var)?;
                        worklist.extend(transform.required_input_vars());
                    }
                    VariableSource::DerivedReduction => {
                        let reduction = ctx.factory.reduction(&var)?;
                        let mut child_spec = reduction.input_stream_spec(metadata)?;
                        if child_spec.filters_override.is_none() {
                            child_spec.filters_override = spec.filters_override.clone();
                        }
                        let node = Self::build(ctx, child_spec, depth + 1)?;
                        let guard = strict.then(|| GroupingGuard::new(node.stream_name(), &id_column));
                        reductions.push(ReductionLink {
                            reduction,
                            node,
                            guard,
                        });
                    }
                    other => {
                        return Err(MergeError::IllegalVariableSource {
                            variable: var.dot_notation(),
                            source_kind: other.to_string(),
                        })
                    }
                }
            } else if let Some((_, vars)) = pending
                .iter_mut()
                .find(|(ancestor_id, _)| ancestor_id.as_str() == def.entity_id())
            {
                if def.source != VariableSource::Id {
                    vars.push(var);
                }
            } else {
                return Err(MergeError::VariableNotAvailable {
                    variable: var.dot_notation(),
                    entity: entity.id.clone(),
                });
            }
        }

        let mut ancestors = Vec::new();
        for (ancestor_id, vars) in pending {
            if vars.is_empty() {
                continue;
            }
            let ancestor_spec = StreamSpec::with_random_name(&ancestor_id)
                .with_variables(vars)
                .with_filters_override(spec.filters_override.clone());
            let node = Self::build(ctx, ancestor_spec, depth + 1)?;
            let guard = strict.then(|| GroupingGuard::new(node.stream_name(), node.id_column()));
            ancestors.push(AncestorLink { node, guard });
        }

        let transforms: Vec<Arc<dyn Transform>> = ctx
            .factory
            .ordered()
            .iter()
            .filter_map(DerivedVar::as_transform)
            .filter(|t| t.entity_id() == entity.id && seen.contains(t.spec()))
            .cloned()
            .collect();

        info!(
            "Built stream node for entity {} (depth {}): {} native var(s), {} ancestor stream(s), {} reduction(s), {} transform(s)",
            entity.id,
            depth,
            spec.variables.len(),
            ancestors.len(),
            reductions.len(),
            transforms.len()
        );

        let enrichment = NodeEnrichment {
            id_column: id_column.clone(),
            ancestors,
            reductions,
            transforms,
        };
        Ok(Self {
            entity_id: entity.id.clone(),
            id_column,
            stream: LookaheadStream::new(spec.name.clone(), enrichment),
            spec,
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Dot-notation name of this entity's id column.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn stream_name(&self) -> &str {
        &self.spec.name
    }

    /// The stream this node reads directly.
    pub fn stream_spec(&self) -> &StreamSpec {
        &self.spec
    }

    /// This node's stream followed by every stream its ancestor and
    /// reduction nodes read.
    pub fn required_stream_specs(&self) -> Vec<StreamSpec> {
        let enrichment = self.stream.enricher();
        let mut specs = vec![self.spec.clone()];
        for link in &enrichment.ancestors {
            specs.extend(link.node.required_stream_specs());
        }
        for link in &enrichment.reductions {
            specs.extend(link.node.required_stream_specs());
        }
        specs
    }

    /// True when rows of this node's stream need no enrichment at all.
    pub fn requires_no_data_manipulation(&self) -> bool {
        let enrichment = self.stream.enricher();
        enrichment.ancestors.is_empty()
            && enrichment.reductions.is_empty()
            && enrichment.transforms.is_empty()
    }

    /// Claim this node's streams from `streams`, deepest nodes first.
    pub fn accept_streams(&mut self, streams: &mut StreamMap) -> MergeResult<()> {
        self.stream.accept_streams(streams)
    }

    pub fn has_next(&self) -> bool {
        self.stream.has_next()
    }

    /// The next fully enriched row, without consuming it.
    pub fn peek(&self) -> Option<&Row> {
        self.stream.peek()
    }

    pub fn next_row(&mut self) -> MergeResult<Option<Row>> {
        self.stream.next_row()
    }

    /// Close this node's stream and every stream below it.
    pub fn close(&mut self) {
        self.stream.close();
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }

    pub(crate) fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = " ".repeat(indent);
        let enrichment = self.stream.enricher();
        writeln!(f, "{pad}{{")?;
        writeln!(f, "{pad}  entityIdColName: {}", self.id_column)?;
        writeln!(f, "{pad}  streamSpec:")?;
        writeln!(f, "{}", self.spec.describe(indent + 4))?;
        writeln!(f, "{pad}  ancestorStreams: [")?;
        for link in &enrichment.ancestors {
            link.node.fmt_indented(f, indent + 4)?;
            writeln!(f)?;
        }
        writeln!(f, "{pad}  ]")?;
        writeln!(f, "{pad}  transforms: [")?;
        for transform in &enrichment.transforms {
            writeln!(f, "{pad}    {}", transform.base())?;
        }
        writeln!(f, "{pad}  ]")?;
        writeln!(f, "{pad}  reductions: [")?;
        for link in &enrichment.reductions {
            writeln!(f, "{pad}    {{")?;
            writeln!(f, "{pad}      reduction: {}", link.reduction.base())?;
            writeln!(f, "{pad}      stream:")?;
            link.node.fmt_indented(f, indent + 6)?;
            writeln!(f)?;
            writeln!(f, "{pad}    }}")?;
        }
        writeln!(f, "{pad}  ]")?;
        write!(f, "{pad}}}")
    }
}

impl fmt::Display for EntityStreamNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl Enrich for NodeEnrichment {
    // ancestor and reduction rows must be cached before this node reads
    // its first row
    fn accept_streams(&mut self, streams: &mut StreamMap) -> MergeResult<()> {
        for link in &mut self.ancestors {
            link.node.accept_streams(streams)?;
        }
        for link in &mut self.reductions {
            link.node.accept_streams(streams)?;
        }
        Ok(())
    }

    fn enrich(&mut self, row: &mut Row) -> MergeResult<()> {
        for link in &mut self.ancestors {
            let node = &mut link.node;
            apply_ancestor_vars(
                &mut node.stream,
                &node.entity_id,
                &node.id_column,
                link.guard.as_mut(),
                row,
            )?;
        }

        if !self.reductions.is_empty() {
            let id = row.value(&self.id_column)?.to_string();
            for link in &mut self.reductions {
                let mut reducer = link.reduction.create_reducer();
                let id_column = self.id_column.as_str();
                while let Some(child) = link
                    .node
                    .stream
                    .take_if(|child| child.get(id_column) == Some(&id))?
                {
                    reducer.add_row(&child)?;
                }
                let value = reducer.finish()?;

                if let Some(guard) = link.guard.as_mut() {
                    guard.retire(&id);
                    if let Some(next_parent) = link.node.peek().and_then(|r| r.get(id_column)) {
                        guard.check(next_parent)?;
                    }
                }
                row.insert(link.reduction.column_name().to_string(), value);
            }
        }

        for transform in &self.transforms {
            let value = transform.value(row)?;
            row.insert(transform.column_name().to_string(), value);
        }
        Ok(())
    }

    fn close(&mut self) {
        for link in &mut self.ancestors {
            link.node.close();
        }
        for link in &mut self.reductions {
            link.node.close();
        }
    }
}

/// Copy the columns of the ancestor row matching `row` into `row`.
///
/// Ancestor rows are grouped in the same order as the rows that inherit
/// from them, so the cached ancestor row either matches or belongs to an
/// earlier group and can be skipped. Running out of ancestor rows is an
/// upstream contract violation.
pub(crate) fn apply_ancestor_vars<E: Enrich>(
    ancestor: &mut LookaheadStream<E>,
    entity_id: &str,
    id_column: &str,
    mut guard: Option<&mut GroupingGuard>,
    row: &mut Row,
) -> MergeResult<()> {
    let id = row.value(id_column)?.to_string();
    if let Some(guard) = guard.as_deref() {
        guard.check(&id)?;
    }

    loop {
        if let Some(matched) = ancestor.peek_if(|r| r.get(id_column) == Some(&id)) {
            row.extend(matched.iter().map(|(k, v)| (k.clone(), v.clone())));
            return Ok(());
        }
        match ancestor.next_row()? {
            Some(skipped) => {
                debug!("Skipping {} row of {} while looking for {}", entity_id, id_column, id);
                if let (Some(guard), Some(value)) = (guard.as_deref_mut(), skipped.get(id_column)) {
                    guard.retire(value);
                }
            }
            None => {
                return Err(MergeError::AncestorRowMissing {
                    entity: entity_id.to_string(),
                    column: id_column.to_string(),
                    value: id,
                })
            }
        }
    }
}
