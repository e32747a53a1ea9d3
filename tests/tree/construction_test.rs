//! Tree construction: classification, validation, and layout.

#[path = "../common/mod.rs"]
mod common;

use common::{study, vars, Fixture};
use serde_json::json;
use tabmerge::derived::DerivedVariableSpec;
use tabmerge::error::{ErrorKind, MergeError};
use tabmerge::metadata::{DataShape, VariableDef, VariableType};
use tabmerge::tree::RootEntityStreamNode;

fn positives() -> DerivedVariableSpec {
    DerivedVariableSpec::new(
        "participant",
        "positives",
        "countMatching",
        json!({"inputVariable": {"entityId": "sample", "variableId": "positive"}}),
    )
}

#[test]
fn test_descendant_variable_not_available() {
    let fixture = Fixture::new(&[]).unwrap();
    let err = fixture.root("participant", &[("sample", "length")]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Validation);
    match err {
        MergeError::VariableNotAvailable { variable, entity } => {
            assert_eq!(variable, "sample.length");
            assert_eq!(entity, "participant");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_computed_variable_cannot_be_requested_directly() {
    let mut metadata = study();
    metadata
        .incorporate_computed(&[VariableDef::native(
            "sample",
            "score",
            VariableType::Number,
            DataShape::Continuous,
        )])
        .unwrap();
    let fixture = Fixture::with_metadata(metadata, &[]).unwrap();
    let err = fixture.root("sample", &[("sample", "score")]).err().unwrap();
    assert!(matches!(
        err,
        MergeError::IllegalVariableSource { ref variable, .. } if variable == "sample.score"
    ));
    assert!(err.is_validation());
}

#[test]
fn test_unknown_names_rejected() {
    let fixture = Fixture::new(&[]).unwrap();
    assert!(fixture.root("sample", &[("sample", "nope")]).err().unwrap().is_validation());
    assert!(matches!(
        fixture.root("plot", &[]).err().unwrap(),
        MergeError::UnknownEntity(e) if e == "plot"
    ));
}

#[test]
fn test_duplicate_output_column() {
    let fixture = Fixture::new(&[]).unwrap();
    let err = fixture
        .root("sample", &[("sample", "length"), ("sample", "length")])
        .err()
        .unwrap();
    assert!(matches!(err, MergeError::DuplicateOutputColumn(c) if c == "sample.length"));
}

#[test]
fn test_dependency_depth_limit() {
    let mut fixture = Fixture::new(&[positives()]).unwrap();
    // sample -> participant (ancestor) -> sample (reduction input)
    fixture.settings.max_dependency_depth = 1;
    let err = fixture.root("sample", &[("participant", "positives")]).err().unwrap();
    assert!(matches!(err, MergeError::DependencyDepthExceeded(1)));

    fixture.settings.max_dependency_depth = 2;
    let root = fixture.root("sample", &[("participant", "positives")]).unwrap();
    assert_eq!(root.required_stream_specs().len(), 3);
}

#[test]
fn test_passthrough_detection() {
    let fixture = Fixture::new(&[positives()]).unwrap();

    let natives = fixture.root("sample", &[("sample", "length")]).unwrap();
    assert!(natives.requires_no_data_manipulation());
    assert_eq!(natives.required_stream_specs().len(), 1);

    let inherited = fixture.root("sample", &[("household", "region")]).unwrap();
    assert!(!inherited.requires_no_data_manipulation());

    let reduced = fixture.root("participant", &[("participant", "positives")]).unwrap();
    assert!(!reduced.requires_no_data_manipulation());
}

#[test]
fn test_ancestor_ids_do_not_open_ancestor_streams() {
    let fixture = Fixture::new(&[]).unwrap();
    let root = fixture.root("sample", &[]).unwrap();
    let specs = root.required_stream_specs();
    assert_eq!(specs.len(), 1);
    assert!(specs[0].variables.is_empty());
    assert_eq!(
        root.output_columns(),
        ["sample.sample_id", "participant.participant_id", "household.household_id"]
    );
}

#[test]
fn test_display_describes_the_tree() {
    let fixture = Fixture::new(&[positives()]).unwrap();
    let root = RootEntityStreamNode::build(
        &fixture.ctx(),
        "participant",
        &vars(&[("participant", "participant_id"), ("participant", "positives")]),
        &[],
    )
    .unwrap();
    let rendered = root.to_string();
    assert!(rendered.contains("outputVars: [ participant.participant_id, participant.positives ]"));
    assert!(rendered.contains("computedStream: none"));
    assert!(rendered.contains("targetNode:"));
    assert!(rendered.contains("functionName: countMatching"));
    assert!(rendered.contains("entityId: sample"));
}
