//! Built-in derived variable functions.
//!
//! | Function | Kind | Output |
//! |----------|------|--------|
//! | `unitConversion` | transform | input converted to other units |
//! | `bodyMassIndex` | transform | kg/m² from height and weight |
//! | `advancedSubset` | transform | `1`/`0` from a set-operation tree |
//! | `categoricalRecoding` | transform | categories mapped to new labels |
//! | `continuousToOrdinal` | transform | numeric ranges mapped to labels |
//! | `concatenation` | transform | joined input values |
//! | `relativeObservationMinTimeInterval` | transform | days to the nearest later target observation |
//! | `subsetMembership` | reduction | `1` if any descendant passes the filters |
//! | `mean` / `sum` / `min` / `max` | reduction | numeric aggregate of descendants |
//! | `countMatching` | reduction | number of descendants with a true value |
//!
//! `relativeObservationCalculator` and `relativeObservationAggregator` are
//! also registered; they are the helpers `relativeObservationMinTimeInterval`
//! declares and are not meant to be requested directly.

pub mod reductions;
pub mod transforms;
pub mod units;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::derived::PluginRegistry;
use crate::error::{MergeError, MergeResult};

use reductions::{
    CountMatching, NumericKind, NumericReduction, RelativeObservationAggregator, SubsetMembership,
};
use transforms::{
    AdvancedSubset, BodyMassIndex, CategoricalRecoding, Concatenation, ContinuousToOrdinal,
    RelativeObservationCalculator, RelativeObservationMinTimeInterval, UnitConversion,
};

/// Value written for a true binary result.
pub const TRUE_VALUE: &str = "1";

/// Value written for a false binary result.
pub const FALSE_VALUE: &str = "0";

/// Input values treated as true when a config does not list its own.
pub const DEFAULT_TRUE_VALUES: [&str; 3] = ["1", "true", "yes"];

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A registry holding every built-in function.
pub fn standard_registry() -> PluginRegistry {
    PluginRegistry::new()
        .with_transform(UnitConversion::FUNCTION_NAME, UnitConversion::build)
        .with_transform(BodyMassIndex::FUNCTION_NAME, BodyMassIndex::build)
        .with_transform(AdvancedSubset::FUNCTION_NAME, AdvancedSubset::build)
        .with_transform(CategoricalRecoding::FUNCTION_NAME, CategoricalRecoding::build)
        .with_transform(ContinuousToOrdinal::FUNCTION_NAME, ContinuousToOrdinal::build)
        .with_transform(Concatenation::FUNCTION_NAME, Concatenation::build)
        .with_transform(
            RelativeObservationMinTimeInterval::FUNCTION_NAME,
            RelativeObservationMinTimeInterval::build,
        )
        .with_transform(
            RelativeObservationCalculator::FUNCTION_NAME,
            RelativeObservationCalculator::build,
        )
        .with_reduction(SubsetMembership::FUNCTION_NAME, SubsetMembership::build)
        .with_reduction(CountMatching::FUNCTION_NAME, CountMatching::build)
        .with_reduction(
            RelativeObservationAggregator::FUNCTION_NAME,
            RelativeObservationAggregator::build,
        )
        .with_reduction(NumericKind::Mean.function_name(), |md, spec| {
            NumericReduction::build(NumericKind::Mean, md, spec)
        })
        .with_reduction(NumericKind::Sum.function_name(), |md, spec| {
            NumericReduction::build(NumericKind::Sum, md, spec)
        })
        .with_reduction(NumericKind::Min.function_name(), |md, spec| {
            NumericReduction::build(NumericKind::Min, md, spec)
        })
        .with_reduction(NumericKind::Max.function_name(), |md, spec| {
            NumericReduction::build(NumericKind::Max, md, spec)
        })
}

/// Shortest decimal form that reads back to `value`, always with a
/// fractional part or exponent (`200.0`, `1e-7`).
pub fn format_number(value: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    buffer.format(value).to_string()
}

/// Parse a numeric cell.
pub fn parse_number(column: &str, value: &str) -> MergeResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| MergeError::invalid_value(column, value, e))
}

/// Days since 1970-01-01 for a date or date-time cell.
pub fn parse_epoch_day(column: &str, value: &str) -> MergeResult<i64> {
    let value = value.trim();
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date())
        })
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|e| MergeError::invalid_value(column, value, e))?;
    Ok(i64::from(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE))
}

/// `configured` if given, else [`DEFAULT_TRUE_VALUES`].
pub fn true_values_or_default(configured: Option<Vec<String>>) -> Vec<String> {
    configured.unwrap_or_else(|| DEFAULT_TRUE_VALUES.iter().map(|v| v.to_string()).collect())
}

pub(crate) fn binary_vocabulary() -> Vec<String> {
    vec![TRUE_VALUE.to_string(), FALSE_VALUE.to_string()]
}
