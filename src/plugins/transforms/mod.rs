//! Per-row derived variable functions.

mod advanced_subset;
mod body_mass_index;
mod concatenation;
mod recoding;
mod relative_observation;
mod unit_conversion;

pub use advanced_subset::AdvancedSubset;
pub use body_mass_index::BodyMassIndex;
pub use concatenation::Concatenation;
pub use recoding::{CategoricalRecoding, ContinuousToOrdinal};
pub use relative_observation::{RelativeObservationCalculator, RelativeObservationMinTimeInterval};
pub(crate) use relative_observation::OBSERVATION_SEPARATOR;
pub use unit_conversion::UnitConversion;
