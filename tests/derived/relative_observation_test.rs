//! Relative observation intervals through a full entity tree.

#[path = "../common/mod.rs"]
mod common;

use common::{column, merge, Fixture};
use serde_json::{json, Value};
use tabmerge::derived::DerivedVariableSpec;
use tabmerge::metadata::{VariableSource, VariableSpec};

fn next_positive(min_days: i64, subset: Option<Value>) -> DerivedVariableSpec {
    let mut config = json!({
        "anchorVariable": {"entityId": "sample", "variableId": "positive"},
        "anchorTimestampVariable": {"entityId": "sample", "variableId": "collection_date"},
        "targetVariable": {"entityId": "sample", "variableId": "positive"},
        "targetTimestampVariable": {"entityId": "sample", "variableId": "collection_date"},
        "minimumTimeIntervalDays": min_days,
    });
    if let Some(subset) = subset {
        config["relatedObservationsSubset"] = subset;
    }
    DerivedVariableSpec::new("sample", "next_positive", "relativeObservationMinTimeInterval", config)
}

#[test]
fn test_helpers_are_registered_on_the_common_ancestor() {
    let fixture = Fixture::new(&[next_positive(0, None)]).unwrap();
    let names: Vec<String> = fixture
        .factory
        .ordered()
        .iter()
        .map(|v| v.spec().dot_notation())
        .collect();
    assert_eq!(names.len(), 4);
    assert_eq!(names.last().unwrap(), "sample.next_positive");
    assert!(names.contains(&"participant.next_positive_calc".to_string()));

    for helper in ["next_positive_calc_anchor", "next_positive_calc_target"] {
        let def = fixture
            .metadata
            .variable(&VariableSpec::new("participant", helper))
            .unwrap();
        assert_eq!(def.source, VariableSource::DerivedReduction);
    }
}

#[test]
fn test_interval_to_next_positive_sample() {
    let fixture = Fixture::new(&[next_positive(0, None)]).unwrap();
    let out = merge(&fixture, "sample", &[("sample", "next_positive")]).unwrap();
    assert_eq!(column(&out, 0), ["S1", "S2", "S3", "S4"]);
    // S2 is negative; S3 and S4 have no later positive sample
    assert_eq!(column(&out, 3), ["8", "", "", ""]);
}

#[test]
fn test_minimum_interval_excludes_close_targets() {
    let fixture = Fixture::new(&[next_positive(8, None)]).unwrap();
    let out = merge(&fixture, "sample", &[("sample", "next_positive")]).unwrap();
    assert_eq!(column(&out, 3), ["", "", "", ""]);
}

#[test]
fn test_tree_layout() {
    let fixture = Fixture::new(&[next_positive(0, None)]).unwrap();
    let root = fixture.root("sample", &[("sample", "next_positive")]).unwrap();
    let specs = root.required_stream_specs();
    let entities: Vec<&str> = specs.iter().map(|s| s.entity_id.as_str()).collect();
    // target, calculator's ancestor stream, then one stream per aggregator
    assert_eq!(entities, ["sample", "participant", "sample", "sample"]);
    assert!(specs[0].variables.is_empty());
    for aggregator in &specs[2..] {
        assert_eq!(
            aggregator.variables,
            [
                VariableSpec::new("sample", "positive"),
                VariableSpec::new("sample", "collection_date"),
            ]
        );
    }
}

#[test]
fn test_related_subset_overrides_aggregator_filters() {
    let subset = json!([{"type": "stringSet", "variableId": "positive", "stringSet": ["yes"]}]);
    let fixture = Fixture::new(&[next_positive(0, Some(subset.clone()))]).unwrap();
    let root = fixture.root("sample", &[("sample", "next_positive")]).unwrap();
    let specs = root.required_stream_specs();
    let expected = subset.as_array().cloned();
    assert_eq!(specs[2].filters_override, expected);
    assert_eq!(specs[3].filters_override, expected);
    assert_eq!(specs[0].filters_override, None);
}
