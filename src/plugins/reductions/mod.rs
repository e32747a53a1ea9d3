//! Derived variables aggregated from descendant rows.

mod numeric;
mod relative_observation;
mod subset_membership;

pub use numeric::{CountMatching, NumericKind, NumericReduction};
pub use relative_observation::{AggregatorConfig, RelativeObservationAggregator};
pub use subset_membership::SubsetMembership;
