//! Shared fixture: a three-level study with small per-entity tables.
//!
//! ```text
//! household   H1 ─┬─ P1 ── S1, S2, S3
//!                 └─ P2    (no samples)
//!             H2 ─── P3 ── S4
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tabmerge::config::TreeSettings;
use tabmerge::derived::{DerivedVariableFactory, DerivedVariableSpec};
use tabmerge::error::MergeResult;
use tabmerge::metadata::{DataShape, EntityDef, ReferenceMetadata, VariableDef, VariableSpec, VariableType};
use tabmerge::plugins::standard_registry;
use tabmerge::stream::{BoxedRowSource, MemorySource, Row, RowSource, StreamMap, StreamSpec};
use tabmerge::tree::{RootEntityStreamNode, TreeContext};

pub const STUDY_ID: &str = "cohort";

pub fn study() -> ReferenceMetadata {
    let household = EntityDef::new("household", "household_id")
        .with_variable(VariableDef::native("", "income", VariableType::Number, DataShape::Continuous))
        .with_variable(VariableDef::native("", "region", VariableType::String, DataShape::Categorical));
    let participant = EntityDef::new("participant", "participant_id")
        .with_variable(
            VariableDef::native("", "height", VariableType::Number, DataShape::Continuous).with_units("m"),
        )
        .with_variable(
            VariableDef::native("", "weight", VariableType::Number, DataShape::Continuous).with_units("kg"),
        )
        .with_variable(VariableDef::native("", "sex", VariableType::String, DataShape::Categorical));
    let sample = EntityDef::new("sample", "sample_id")
        .with_variable(
            VariableDef::native("", "length", VariableType::Number, DataShape::Continuous).with_units("m"),
        )
        .with_variable(VariableDef::native("", "positive", VariableType::String, DataShape::Binary))
        .with_variable(VariableDef::native("", "collection_date", VariableType::Date, DataShape::Continuous));
    ReferenceMetadata::new(STUDY_ID, household)
        .with_entity("household", participant)
        .and_then(|md| md.with_entity("participant", sample))
        .unwrap()
}

/// Column names and rows of one entity's table.
pub fn table(entity_id: &str) -> (Vec<&'static str>, Vec<Vec<&'static str>>) {
    match entity_id {
        "household" => (
            vec!["household.household_id", "household.income", "household.region"],
            vec![vec!["H1", "100", "north"], vec!["H2", "250", "south"]],
        ),
        "participant" => (
            vec![
                "participant.participant_id",
                "household.household_id",
                "participant.height",
                "participant.weight",
                "participant.sex",
            ],
            vec![
                vec!["P1", "H1", "2", "80", "female"],
                vec!["P2", "H1", "1.5", "45", "male"],
                vec!["P3", "H2", "1.6", "64", "female"],
            ],
        ),
        "sample" => (
            vec![
                "sample.sample_id",
                "participant.participant_id",
                "household.household_id",
                "sample.length",
                "sample.positive",
                "sample.collection_date",
            ],
            vec![
                vec!["S1", "P1", "H1", "2", "yes", "2020-01-01"],
                vec!["S2", "P1", "H1", "3", "no", "2020-01-05"],
                vec!["S3", "P1", "H1", "1", "yes", "2020-01-09"],
                vec!["S4", "P3", "H2", "4", "yes", "2020-02-01"],
            ],
        ),
        other => panic!("no table for entity {}", other),
    }
}

pub fn rows(columns: &[&str], values: &[Vec<&str>]) -> Vec<Row> {
    values
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(c, v)| (c.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

pub fn entity_rows(entity_id: &str) -> Vec<Row> {
    let (columns, values) = table(entity_id);
    rows(&columns, &values)
}

pub fn vars(pairs: &[(&str, &str)]) -> Vec<VariableSpec> {
    pairs.iter().map(|(e, v)| VariableSpec::new(*e, *v)).collect()
}

// =============================================================================
// Close tracking
// =============================================================================

/// Close calls per stream name.
#[derive(Clone, Default)]
pub struct CloseLog(Arc<Mutex<HashMap<String, usize>>>);

impl CloseLog {
    pub fn record(&self, name: &str) {
        *self.0.lock().unwrap().entry(name.to_string()).or_default() += 1;
    }

    pub fn count(&self, name: &str) -> usize {
        self.0.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.lock().unwrap().values().sum()
    }
}

/// In-memory rows that record their close calls.
pub struct TrackedSource {
    name: String,
    inner: MemorySource,
    log: CloseLog,
}

impl TrackedSource {
    pub fn new(name: &str, rows: Vec<Row>, log: &CloseLog) -> Self {
        Self {
            name: name.to_string(),
            inner: MemorySource::new(rows),
            log: log.clone(),
        }
    }
}

impl RowSource for TrackedSource {
    fn next_row(&mut self) -> Option<MergeResult<Row>> {
        self.inner.next_row()
    }

    fn close(&mut self) {
        self.log.record(&self.name);
    }
}

/// One tracked stream per spec, filled from the fixture tables.
pub fn streams_for(specs: &[StreamSpec], log: &CloseLog) -> StreamMap {
    specs
        .iter()
        .map(|spec| {
            let source = TrackedSource::new(&spec.name, entity_rows(&spec.entity_id), log);
            (spec.name.clone(), Box::new(source) as BoxedRowSource)
        })
        .collect()
}

// =============================================================================
// Tree harness
// =============================================================================

pub struct Fixture {
    pub metadata: ReferenceMetadata,
    pub factory: DerivedVariableFactory,
    pub settings: TreeSettings,
}

impl Fixture {
    pub fn new(derived: &[DerivedVariableSpec]) -> MergeResult<Self> {
        Self::with_metadata(study(), derived)
    }

    pub fn with_metadata(
        mut metadata: ReferenceMetadata,
        derived: &[DerivedVariableSpec],
    ) -> MergeResult<Self> {
        let factory = DerivedVariableFactory::new(&mut metadata, derived, &standard_registry())?;
        Ok(Self {
            metadata,
            factory,
            settings: TreeSettings::default(),
        })
    }

    pub fn strict(mut self) -> Self {
        self.settings.strict_grouping = true;
        self
    }

    pub fn ctx(&self) -> TreeContext<'_> {
        TreeContext {
            metadata: &self.metadata,
            factory: &self.factory,
            settings: &self.settings,
        }
    }

    /// Root for `entity_id` whose output is its id columns plus `outputs`.
    pub fn root(&self, entity_id: &str, outputs: &[(&str, &str)]) -> MergeResult<RootEntityStreamNode> {
        let output_vars: Vec<VariableSpec> = self
            .metadata
            .tabular_columns(entity_id, &vars(outputs))?
            .into_iter()
            .map(|def| def.spec)
            .collect();
        RootEntityStreamNode::build(&self.ctx(), entity_id, &output_vars, &[])
    }
}

/// Pull every row from `root`.
pub fn drain(root: &mut RootEntityStreamNode) -> MergeResult<Vec<Vec<String>>> {
    let mut out = Vec::new();
    while let Some(row) = root.next_row()? {
        out.push(row.to_vec());
    }
    Ok(out)
}

/// Build, feed from the fixture tables, and drain.
pub fn merge(fixture: &Fixture, entity_id: &str, outputs: &[(&str, &str)]) -> MergeResult<Vec<Vec<String>>> {
    let mut root = fixture.root(entity_id, outputs)?;
    let log = CloseLog::default();
    root.accept_streams(streams_for(&root.required_stream_specs(), &log))?;
    drain(&mut root)
}

/// The column of `rows` at `index`.
pub fn column(rows: &[Vec<String>], index: usize) -> Vec<&str> {
    rows.iter().map(|r| r[index].as_str()).collect()
}
