//! The root of an entity stream tree.

use std::collections::HashSet;
use std::fmt;

use log::info;

use super::grouping::GroupingGuard;
use super::node::{apply_ancestor_vars, EntityStreamNode};
use super::{TreeContext, COMPUTED_VAR_STREAM_NAME};
use crate::error::{MergeError, MergeResult};
use crate::metadata::VariableSpec;
use crate::stream::{close_all, LookaheadStream, NoEnrichment, Row, RowExt, StreamMap, StreamSpec};

/// Rows of externally computed variables merged in at the root.
struct ComputedStream {
    spec: StreamSpec,
    id_column: String,
    /// Computed rows line up 1:1 with target rows.
    zipped: bool,
    stream: LookaheadStream,
    guard: Option<GroupingGuard>,
}

impl ComputedStream {
    fn apply(&mut self, row: &mut Row) -> MergeResult<()> {
        if !self.zipped {
            return apply_ancestor_vars(
                &mut self.stream,
                &self.spec.entity_id,
                &self.id_column,
                self.guard.as_mut(),
                row,
            );
        }

        let computed = self
            .stream
            .next_row()?
            .ok_or(MergeError::ComputedStreamShort)?;
        let expected = row.value(&self.id_column)?;
        let found = computed.value(&self.id_column)?;
        if expected != found {
            return Err(MergeError::ComputedRowMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        row.extend(computed);
        Ok(())
    }
}

/// Tree root: the target entity's node plus an optional computed stream,
/// producing rows in the requested column order.
///
/// ```text
/// target row ──▶ computed columns ──▶ output buffer (output_columns order)
///   (node)        (zip or inherit)
/// ```
pub struct RootEntityStreamNode {
    node: EntityStreamNode,
    computed: Option<ComputedStream>,
    output_columns: Vec<String>,
    output: Vec<String>,
}

impl RootEntityStreamNode {
    /// Build the tree for `target_entity_id`.
    ///
    /// Output columns are `output_vars` followed by `computed_vars`. Computed
    /// variables must all belong to the target entity or one ancestor.
    pub fn build(
        ctx: &TreeContext<'_>,
        target_entity_id: &str,
        output_vars: &[VariableSpec],
        computed_vars: &[VariableSpec],
    ) -> MergeResult<Self> {
        let output_columns: Vec<String> = output_vars
            .iter()
            .chain(computed_vars)
            .map(VariableSpec::dot_notation)
            .collect();
        let mut distinct = HashSet::new();
        for column in &output_columns {
            if !distinct.insert(column.as_str()) {
                return Err(MergeError::DuplicateOutputColumn(column.clone()));
            }
        }

        let computed = match computed_vars.first() {
            None => None,
            Some(first) => Some(Self::computed_stream(
                ctx,
                target_entity_id,
                &first.entity_id,
                computed_vars,
            )?),
        };

        let request =
            StreamSpec::with_random_name(target_entity_id).with_variables(output_vars.to_vec());
        let node = EntityStreamNode::build(ctx, request, 0)?;

        info!("Output columns: {}", output_columns.join(", "));
        Ok(Self {
            output: Vec::with_capacity(output_columns.len()),
            node,
            computed,
            output_columns,
        })
    }

    fn computed_stream(
        ctx: &TreeContext<'_>,
        target_entity_id: &str,
        entity_id: &str,
        computed_vars: &[VariableSpec],
    ) -> MergeResult<ComputedStream> {
        for var in computed_vars {
            if var.entity_id != entity_id {
                return Err(MergeError::VariableNotAvailable {
                    variable: var.dot_notation(),
                    entity: entity_id.to_string(),
                });
            }
        }
        let zipped = entity_id == target_entity_id;
        if !zipped && !ctx.metadata.is_ancestor_of(entity_id, target_entity_id) {
            return Err(MergeError::VariableNotAvailable {
                variable: computed_vars[0].dot_notation(),
                entity: target_entity_id.to_string(),
            });
        }
        let id_column = ctx.metadata.entity(entity_id)?.id_column_name();
        let spec = StreamSpec::new(COMPUTED_VAR_STREAM_NAME, entity_id)
            .with_variables(computed_vars.to_vec());
        Ok(ComputedStream {
            guard: (ctx.settings.strict_grouping && !zipped)
                .then(|| GroupingGuard::new(COMPUTED_VAR_STREAM_NAME, &id_column)),
            stream: LookaheadStream::new(COMPUTED_VAR_STREAM_NAME, NoEnrichment),
            spec,
            id_column,
            zipped,
        })
    }

    pub fn target_entity_id(&self) -> &str {
        self.node.entity_id()
    }

    /// Dot-notation names of the columns every row carries, in order.
    pub fn output_columns(&self) -> &[String] {
        &self.output_columns
    }

    /// The target node's stream spec.
    pub fn target_stream_spec(&self) -> &StreamSpec {
        self.node.stream_spec()
    }

    /// Every stream the tree reads, the computed stream last.
    pub fn required_stream_specs(&self) -> Vec<StreamSpec> {
        let mut specs = self.node.required_stream_specs();
        if let Some(computed) = &self.computed {
            specs.push(computed.spec.clone());
        }
        info!(
            "Tree requires {} stream(s):\n{}",
            specs.len(),
            specs
                .iter()
                .map(|s| s.describe(2))
                .collect::<Vec<_>>()
                .join("\n")
        );
        specs
    }

    /// True when the target stream can be copied straight to the output.
    pub fn requires_no_data_manipulation(&self) -> bool {
        self.computed.is_none() && self.node.requires_no_data_manipulation()
    }

    /// Hand every opened stream to the node that asked for it.
    ///
    /// All of `streams` must be claimed. Leftover streams are closed and
    /// reported.
    pub fn accept_streams(&mut self, mut streams: StreamMap) -> MergeResult<()> {
        info!("Distributing {} stream(s) to the entity tree", streams.len());
        let claimed = self.claim(&mut streams);
        if let Err(e) = claimed {
            close_all(streams);
            return Err(e);
        }
        if !streams.is_empty() {
            let mut names: Vec<String> = streams.keys().cloned().collect();
            names.sort();
            close_all(streams);
            return Err(MergeError::UnclaimedStreams(names));
        }
        Ok(())
    }

    fn claim(&mut self, streams: &mut StreamMap) -> MergeResult<()> {
        if let Some(computed) = &mut self.computed {
            computed.stream.accept_streams(streams)?;
        }
        self.node.accept_streams(streams)
    }

    pub fn has_next(&self) -> bool {
        self.node.has_next()
    }

    /// The next output row, values in [`output_columns`](Self::output_columns)
    /// order. The slice is reused by the following call.
    pub fn next_row(&mut self) -> MergeResult<Option<&[String]>> {
        let Some(mut row) = self.node.next_row()? else {
            return Ok(None);
        };
        if let Some(computed) = &mut self.computed {
            computed.apply(&mut row)?;
        }

        self.output.clear();
        for column in &self.output_columns {
            let value = row.value(column)?;
            self.output.push(value.to_string());
        }
        Ok(Some(self.output.as_slice()))
    }

    /// Close every stream in the tree. Idempotent.
    pub fn close(&mut self) {
        if let Some(computed) = &mut self.computed {
            computed.stream.close();
        }
        self.node.close();
    }

    pub fn is_closed(&self) -> bool {
        self.node.is_closed()
    }
}

impl fmt::Display for RootEntityStreamNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "  outputVars: [ {} ]", self.output_columns.join(", "))?;
        match &self.computed {
            None => writeln!(f, "  computedStream: none")?,
            Some(computed) => {
                writeln!(f, "  computedEntityIsTarget: {}", computed.zipped)?;
                writeln!(f, "  computedStream:")?;
                writeln!(f, "{}", computed.spec.describe(4))?;
            }
        }
        writeln!(f, "  targetNode:")?;
        self.node.fmt_indented(f, 4)?;
        write!(f, "\n}}")
    }
}
