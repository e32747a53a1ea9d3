//! Ancestor variables copied onto descendant rows.

#[path = "../common/mod.rs"]
mod common;

use common::{column, drain, entity_rows, merge, rows, CloseLog, Fixture, TrackedSource};
use tabmerge::error::{ErrorKind, MergeError};
use tabmerge::stream::{BoxedRowSource, Row, StreamMap, StreamSpec};

const OUTPUTS: [(&str, &str); 3] = [
    ("household", "region"),
    ("participant", "sex"),
    ("sample", "length"),
];

#[test]
fn test_sample_rows_inherit_from_every_ancestor() {
    let fixture = Fixture::new(&[]).unwrap();
    let root = fixture.root("sample", &OUTPUTS).unwrap();
    assert_eq!(
        root.output_columns(),
        [
            "sample.sample_id",
            "participant.participant_id",
            "household.household_id",
            "household.region",
            "participant.sex",
            "sample.length",
        ]
    );

    let out = merge(&fixture, "sample", &OUTPUTS).unwrap();
    assert_eq!(
        out,
        [
            ["S1", "P1", "H1", "north", "female", "2"],
            ["S2", "P1", "H1", "north", "female", "3"],
            ["S3", "P1", "H1", "north", "female", "1"],
            ["S4", "P3", "H2", "south", "female", "4"],
        ]
    );
}

#[test]
fn test_inherited_values_match_the_ancestor_row() {
    let fixture = Fixture::new(&[]).unwrap();
    let out = merge(&fixture, "participant", &[("household", "income")]).unwrap();
    let households = entity_rows("household");
    for row in &out {
        let household = households
            .iter()
            .find(|h| h["household.household_id"] == row[1])
            .unwrap();
        assert_eq!(row[2], household["household.income"]);
    }
    assert_eq!(column(&out, 2), ["100", "100", "250"]);
}

#[test]
fn test_each_ancestor_gets_its_own_stream() {
    let fixture = Fixture::new(&[]).unwrap();
    let root = fixture.root("sample", &OUTPUTS).unwrap();
    let specs = root.required_stream_specs();
    let mut entities: Vec<&str> = specs.iter().map(|s| s.entity_id.as_str()).collect();
    assert_eq!(entities[0], "sample");
    entities.sort();
    assert_eq!(entities, ["household", "participant", "sample"]);
}

/// Streams for `root` where `entity_id` serves `replacement` instead of
/// its fixture table.
fn streams_with(
    specs: &[StreamSpec],
    entity_id: &str,
    replacement: Vec<Row>,
    log: &CloseLog,
) -> StreamMap {
    let mut replacement = Some(replacement);
    specs
        .iter()
        .map(|spec| {
            let data = if spec.entity_id == entity_id {
                replacement.take().unwrap_or_default()
            } else {
                entity_rows(&spec.entity_id)
            };
            (
                spec.name.clone(),
                Box::new(TrackedSource::new(&spec.name, data, log)) as BoxedRowSource,
            )
        })
        .collect()
}

#[test]
fn test_missing_ancestor_row_is_an_internal_error() {
    let fixture = Fixture::new(&[]).unwrap();
    let mut root = fixture.root("sample", &[("participant", "sex")]).unwrap();
    let participants = rows(
        &["participant.participant_id", "household.household_id", "participant.sex"],
        &[vec!["P1", "H1", "female"], vec!["P2", "H1", "male"]],
    );
    let log = CloseLog::default();
    root.accept_streams(streams_with(&root.required_stream_specs(), "participant", participants, &log))
        .unwrap();

    // S4 is enriched as it is cached, while S3 is being returned
    for _ in 0..2 {
        assert!(root.next_row().unwrap().is_some());
    }
    let err = root.next_row().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    match err {
        MergeError::AncestorRowMissing { entity, column, value } => {
            assert_eq!(entity, "participant");
            assert_eq!(column, "participant.participant_id");
            assert_eq!(value, "P3");
        }
        other => panic!("unexpected error: {}", other),
    }
}

fn interleaved_samples() -> Vec<Row> {
    rows(
        &["sample.sample_id", "participant.participant_id", "household.household_id", "sample.length"],
        &[
            vec!["S1", "P1", "H1", "2"],
            vec!["S4", "P3", "H2", "4"],
            vec!["S2", "P1", "H1", "3"],
        ],
    )
}

#[test]
fn test_ungrouped_descendants_without_strict_grouping() {
    let fixture = Fixture::new(&[]).unwrap();
    let mut root = fixture.root("sample", &[("participant", "sex")]).unwrap();
    let log = CloseLog::default();
    root.accept_streams(streams_with(&root.required_stream_specs(), "sample", interleaved_samples(), &log))
        .unwrap();

    assert!(root.next_row().unwrap().is_some());
    assert!(matches!(
        root.next_row(),
        Err(MergeError::AncestorRowMissing { ref value, .. }) if value == "P1"
    ));
}

#[test]
fn test_strict_grouping_names_the_reappearing_id() {
    let fixture = Fixture::new(&[]).unwrap().strict();
    let mut root = fixture.root("sample", &[("participant", "sex")]).unwrap();
    let log = CloseLog::default();
    root.accept_streams(streams_with(&root.required_stream_specs(), "sample", interleaved_samples(), &log))
        .unwrap();

    assert!(root.next_row().unwrap().is_some());
    match root.next_row().unwrap_err() {
        MergeError::GroupingViolation { column, value, .. } => {
            assert_eq!(column, "participant.participant_id");
            assert_eq!(value, "P1");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_drain_after_exhaustion_stays_empty() {
    let fixture = Fixture::new(&[]).unwrap();
    let mut root = fixture.root("household", &[("household", "region")]).unwrap();
    let log = CloseLog::default();
    root.accept_streams(common::streams_for(&root.required_stream_specs(), &log))
        .unwrap();
    assert_eq!(drain(&mut root).unwrap().len(), 2);
    assert!(!root.has_next());
    assert!(root.next_row().unwrap().is_none());
}
