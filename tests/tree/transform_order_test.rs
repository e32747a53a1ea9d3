//! Transforms applied after the transforms they read.

#[path = "../common/mod.rs"]
mod common;

use common::{column, merge, Fixture};
use serde_json::json;
use tabmerge::derived::DerivedVariableSpec;
use tabmerge::metadata::VariableSpec;

fn height_cm() -> DerivedVariableSpec {
    DerivedVariableSpec::new(
        "participant",
        "height_cm",
        "unitConversion",
        json!({
            "inputVariable": {"entityId": "participant", "variableId": "height"},
            "outputUnits": "cm",
        }),
    )
}

fn label() -> DerivedVariableSpec {
    DerivedVariableSpec::new(
        "participant",
        "label",
        "concatenation",
        json!({
            "inputVariables": [
                {"entityId": "participant", "variableId": "height_cm"},
                {"entityId": "participant", "variableId": "sex"},
            ],
            "delimiter": "/",
        }),
    )
}

fn height_back_to_m() -> DerivedVariableSpec {
    DerivedVariableSpec::new(
        "participant",
        "height_m",
        "unitConversion",
        json!({
            "inputVariable": {"entityId": "participant", "variableId": "height_cm"},
            "outputUnits": "m",
        }),
    )
}

#[test]
fn test_dependency_declared_after_its_reader() {
    // label reads height_cm but is declared first
    let fixture = Fixture::new(&[label(), height_cm()]).unwrap();
    let order: Vec<String> = fixture
        .factory
        .ordered()
        .iter()
        .map(|v| v.spec().dot_notation())
        .collect();
    assert_eq!(order, ["participant.height_cm", "participant.label"]);

    let out = merge(
        &fixture,
        "participant",
        &[("participant", "label"), ("participant", "height_cm")],
    )
    .unwrap();
    assert_eq!(column(&out, 2), ["200.0/female", "150.0/male", "160.0/female"]);
    assert_eq!(column(&out, 3), ["200.0", "150.0", "160.0"]);
}

#[test]
fn test_only_the_dependent_is_requested() {
    let fixture = Fixture::new(&[label(), height_cm()]).unwrap();
    let out = merge(&fixture, "participant", &[("participant", "label")]).unwrap();
    assert_eq!(out[0], ["P1", "H1", "200.0/female"]);
}

#[test]
fn test_conversion_round_trip() {
    let fixture = Fixture::new(&[height_back_to_m(), height_cm()]).unwrap();
    assert_eq!(
        fixture
            .metadata
            .variable(&VariableSpec::new("participant", "height_cm"))
            .unwrap()
            .units
            .as_deref(),
        Some("cm")
    );
    let out = merge(&fixture, "participant", &[("participant", "height_m")]).unwrap();
    assert_eq!(out[0][2], "2.0");
    assert_eq!(out[1][2], "1.5");
}

#[test]
fn test_descendant_reads_ancestor_transform() {
    let per_sample = DerivedVariableSpec::new(
        "sample",
        "tag",
        "concatenation",
        json!({
            "inputVariables": [
                {"entityId": "sample", "variableId": "sample_id"},
                {"entityId": "participant", "variableId": "height_cm"},
            ],
            "delimiter": "@",
        }),
    );
    let fixture = Fixture::new(&[per_sample, height_cm()]).unwrap();
    let out = merge(&fixture, "sample", &[("sample", "tag")]).unwrap();
    assert_eq!(column(&out, 3), ["S1@200.0", "S2@200.0", "S3@200.0", "S4@160.0"]);
}

#[test]
fn test_transform_only_tree_reads_one_stream() {
    let fixture = Fixture::new(&[label(), height_cm()]).unwrap();
    let root = fixture.root("participant", &[("participant", "label")]).unwrap();
    let specs = root.required_stream_specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(
        specs[0].variables,
        [VariableSpec::new("participant", "sex"), VariableSpec::new("participant", "height")]
    );
    // transforms still have to run, so the stream cannot be copied through
    assert!(!root.requires_no_data_manipulation());
}
