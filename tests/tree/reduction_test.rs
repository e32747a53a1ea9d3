//! Descendant rows aggregated onto their parent.

#[path = "../common/mod.rs"]
mod common;

use common::{column, merge, rows, streams_for, CloseLog, Fixture, TrackedSource};
use serde_json::json;
use tabmerge::derived::DerivedVariableSpec;
use tabmerge::error::MergeError;
use tabmerge::stream::StreamMap;

fn count_positive() -> DerivedVariableSpec {
    DerivedVariableSpec::new(
        "participant",
        "positives",
        "countMatching",
        json!({"inputVariable": {"entityId": "sample", "variableId": "positive"}}),
    )
}

fn mean_length() -> DerivedVariableSpec {
    DerivedVariableSpec::new(
        "participant",
        "mean_length",
        "mean",
        json!({"inputVariable": {"entityId": "sample", "variableId": "length"}}),
    )
}

#[test]
fn test_count_per_parent_including_childless() {
    let fixture = Fixture::new(&[count_positive()]).unwrap();
    let out = merge(&fixture, "participant", &[("participant", "positives")]).unwrap();
    assert_eq!(column(&out, 0), ["P1", "P2", "P3"]);
    assert_eq!(column(&out, 2), ["2", "0", "1"]);
}

#[test]
fn test_mean_of_no_rows_is_empty() {
    let fixture = Fixture::new(&[mean_length()]).unwrap();
    let out = merge(&fixture, "participant", &[("participant", "mean_length")]).unwrap();
    assert_eq!(column(&out, 2), ["2.0", "", "4.0"]);
}

#[test]
fn test_each_reduction_reads_its_own_stream() {
    let fixture = Fixture::new(&[count_positive(), mean_length()]).unwrap();
    let root = fixture
        .root(
            "participant",
            &[("participant", "positives"), ("participant", "mean_length")],
        )
        .unwrap();
    let specs = root.required_stream_specs();
    let samples: Vec<_> = specs.iter().filter(|s| s.entity_id == "sample").collect();
    assert_eq!(samples.len(), 2);
    assert_ne!(samples[0].name, samples[1].name);

    let out = merge(
        &fixture,
        "participant",
        &[("participant", "positives"), ("participant", "mean_length")],
    )
    .unwrap();
    assert_eq!(out[0], ["P1", "H1", "2", "2.0"]);
    assert_eq!(out[1], ["P2", "H1", "0", ""]);
    assert_eq!(out[2], ["P3", "H2", "1", "4.0"]);
}

#[test]
fn test_reduction_on_ancestor_seen_from_descendant() {
    let fixture = Fixture::new(&[count_positive()]).unwrap();
    let out = merge(&fixture, "sample", &[("participant", "positives")]).unwrap();
    assert_eq!(column(&out, 3), ["2", "2", "2", "1"]);
}

#[test]
fn test_household_reduction_over_grandchildren() {
    let spec = DerivedVariableSpec::new(
        "household",
        "total_length",
        "sum",
        json!({"inputVariable": {"entityId": "sample", "variableId": "length"}}),
    );
    let fixture = Fixture::new(&[spec]).unwrap();
    let out = merge(&fixture, "household", &[("household", "total_length")]).unwrap();
    assert_eq!(column(&out, 1), ["6.0", "4.0"]);
}

#[test]
fn test_strict_grouping_rejects_reappearing_parent() {
    let fixture = Fixture::new(&[count_positive()]).unwrap().strict();
    let mut root = fixture.root("participant", &[("participant", "positives")]).unwrap();
    let log = CloseLog::default();
    let mut streams: StreamMap = streams_for(&root.required_stream_specs(), &log);
    let sample_stream = root
        .required_stream_specs()
        .into_iter()
        .find(|s| s.entity_id == "sample")
        .unwrap();
    let interleaved = rows(
        &["sample.sample_id", "participant.participant_id", "household.household_id", "sample.positive"],
        &[
            vec!["S1", "P1", "H1", "yes"],
            vec!["S4", "P3", "H2", "yes"],
            vec!["S2", "P1", "H1", "yes"],
        ],
    );
    streams.insert(
        sample_stream.name.clone(),
        Box::new(TrackedSource::new(&sample_stream.name, interleaved, &log)) as _,
    );
    root.accept_streams(streams).unwrap();

    assert!(root.next_row().unwrap().is_some());
    match root.next_row().unwrap_err() {
        MergeError::GroupingViolation { stream, column, value } => {
            assert_eq!(stream, sample_stream.name);
            assert_eq!(column, "participant.participant_id");
            assert_eq!(value, "P1");
        }
        other => panic!("unexpected error: {}", other),
    }
}
