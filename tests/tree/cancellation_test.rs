//! Closing a tree early releases every stream exactly once.

#[path = "../common/mod.rs"]
mod common;

use common::{drain, rows, streams_for, study, vars, CloseLog, Fixture, TrackedSource};
use serde_json::json;
use tabmerge::derived::DerivedVariableSpec;
use tabmerge::metadata::{DataShape, VariableDef, VariableSpec, VariableType};
use tabmerge::stream::StreamSpec;
use tabmerge::tree::{RootEntityStreamNode, COMPUTED_VAR_STREAM_NAME};

fn fixture() -> Fixture {
    let mut metadata = study();
    metadata
        .incorporate_computed(&[VariableDef::native(
            "participant",
            "score",
            VariableType::Number,
            DataShape::Continuous,
        )])
        .unwrap();
    let positives = DerivedVariableSpec::new(
        "participant",
        "positives",
        "countMatching",
        json!({"inputVariable": {"entityId": "sample", "variableId": "positive"}}),
    );
    Fixture::with_metadata(metadata, &[positives]).unwrap()
}

/// A participant tree reading its own stream, an ancestor stream, a
/// reduction stream, and the computed stream.
fn accepted_tree(fixture: &Fixture, log: &CloseLog) -> (RootEntityStreamNode, Vec<StreamSpec>) {
    let output: Vec<VariableSpec> = fixture
        .metadata
        .tabular_columns(
            "participant",
            &vars(&[("household", "region"), ("participant", "positives")]),
        )
        .unwrap()
        .into_iter()
        .map(|def| def.spec)
        .collect();
    let mut root = RootEntityStreamNode::build(
        &fixture.ctx(),
        "participant",
        &output,
        &vars(&[("participant", "score")]),
    )
    .unwrap();

    let specs = root.required_stream_specs();
    let data_specs: Vec<StreamSpec> = specs
        .iter()
        .filter(|s| s.name != COMPUTED_VAR_STREAM_NAME)
        .cloned()
        .collect();
    let mut streams = streams_for(&data_specs, log);
    let computed = rows(
        &["participant.participant_id", "participant.score"],
        &[vec!["P1", "1"], vec!["P2", "2"], vec!["P3", "3"]],
    );
    streams.insert(
        COMPUTED_VAR_STREAM_NAME.to_string(),
        Box::new(TrackedSource::new(COMPUTED_VAR_STREAM_NAME, computed, log)) as _,
    );
    root.accept_streams(streams).unwrap();
    (root, specs)
}

fn assert_each_closed_once(log: &CloseLog, specs: &[StreamSpec]) {
    for spec in specs {
        assert_eq!(log.count(&spec.name), 1, "stream of {} ({})", spec.entity_id, spec.name);
    }
    assert_eq!(log.total(), specs.len());
}

#[test]
fn test_tree_reads_four_streams() {
    let fixture = fixture();
    let log = CloseLog::default();
    let (mut root, specs) = accepted_tree(&fixture, &log);
    assert_eq!(specs.len(), 4);
    let first = root.next_row().unwrap().unwrap().to_vec();
    assert_eq!(first, ["P1", "H1", "north", "2", "1"]);
}

#[test]
fn test_close_after_one_row() {
    let fixture = fixture();
    let log = CloseLog::default();
    let (mut root, specs) = accepted_tree(&fixture, &log);
    assert!(root.next_row().unwrap().is_some());
    assert_eq!(log.total(), 0);

    root.close();
    assert!(root.is_closed());
    assert_each_closed_once(&log, &specs);

    root.close();
    assert!(root.next_row().unwrap().is_none());
    drop(root);
    assert_each_closed_once(&log, &specs);
}

#[test]
fn test_drop_after_one_row() {
    let fixture = fixture();
    let log = CloseLog::default();
    let (mut root, specs) = accepted_tree(&fixture, &log);
    assert!(root.next_row().unwrap().is_some());
    drop(root);
    assert_each_closed_once(&log, &specs);
}

#[test]
fn test_close_after_full_drain() {
    let fixture = fixture();
    let log = CloseLog::default();
    let (mut root, specs) = accepted_tree(&fixture, &log);
    let out = drain(&mut root).unwrap();
    assert_eq!(out.len(), 3);
    root.close();
    assert_each_closed_once(&log, &specs);
}
