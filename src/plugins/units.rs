//! Measurement units and conversion between units of one dimension.
//!
//! Each dimension has a baseline unit. A value is converted by taking it to
//! the baseline and then out to the target unit, so every unit only needs a
//! pair of formulas.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

/// The dimension a unit measures. Only units of one dimension convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    Length,
    Mass,
    Volume,
    Temperature,
    LargeTime,
    SmallTime,
    MassProportion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Millimeter,
    Centimeter,
    Feet,
    Meter,
    Kilometer,
    Microgram,
    Milligram,
    Gram,
    Kilogram,
    Milliliter,
    Liter,
    Celsius,
    Fahrenheit,
    Month,
    Year,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    MicrogramPerGram,
    MilligramPerGram,
}

const ALL_UNITS: [Unit; 23] = [
    Unit::Millimeter,
    Unit::Centimeter,
    Unit::Feet,
    Unit::Meter,
    Unit::Kilometer,
    Unit::Microgram,
    Unit::Milligram,
    Unit::Gram,
    Unit::Kilogram,
    Unit::Milliliter,
    Unit::Liter,
    Unit::Celsius,
    Unit::Fahrenheit,
    Unit::Month,
    Unit::Year,
    Unit::Millisecond,
    Unit::Second,
    Unit::Minute,
    Unit::Hour,
    Unit::Day,
    Unit::Week,
    Unit::MicrogramPerGram,
    Unit::MilligramPerGram,
];

static UNITS_BY_LABEL: Lazy<HashMap<&'static str, Unit>> = Lazy::new(|| {
    ALL_UNITS
        .iter()
        .flat_map(|&unit| unit.labels().iter().map(move |&label| (label, unit)))
        .collect()
});

impl Unit {
    /// Look up a unit by its catalog label (case sensitive).
    pub fn find(label: &str) -> Option<Unit> {
        UNITS_BY_LABEL.get(label).copied()
    }

    /// Labels this unit appears under in study metadata.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Millimeter => &["mm"],
            Self::Centimeter => &["cm"],
            Self::Feet => &["feet"],
            Self::Meter => &["m"],
            Self::Kilometer => &["km"],
            Self::Microgram => &["ug"],
            Self::Milligram => &["mg"],
            Self::Gram => &["g"],
            Self::Kilogram => &["kg"],
            Self::Milliliter => &["mL", "ml"],
            Self::Liter => &["L"],
            Self::Celsius => &["C"],
            Self::Fahrenheit => &["F"],
            Self::Month => &["months"],
            Self::Year => &["years", "Years"],
            Self::Millisecond => &["ms"],
            Self::Second => &["sec"],
            Self::Minute => &["min", "minutes"],
            Self::Hour => &["hours"],
            Self::Day => &["days"],
            Self::Week => &["weeks"],
            Self::MicrogramPerGram => &["ug/g"],
            Self::MilligramPerGram => &["mg/g"],
        }
    }

    pub fn unit_type(self) -> UnitType {
        match self {
            Self::Millimeter | Self::Centimeter | Self::Feet | Self::Meter | Self::Kilometer => {
                UnitType::Length
            }
            Self::Microgram | Self::Milligram | Self::Gram | Self::Kilogram => UnitType::Mass,
            Self::Milliliter | Self::Liter => UnitType::Volume,
            Self::Celsius | Self::Fahrenheit => UnitType::Temperature,
            Self::Month | Self::Year => UnitType::LargeTime,
            Self::Millisecond
            | Self::Second
            | Self::Minute
            | Self::Hour
            | Self::Day
            | Self::Week => UnitType::SmallTime,
            Self::MicrogramPerGram | Self::MilligramPerGram => UnitType::MassProportion,
        }
    }

    pub fn is_compatible_with(self, other: Unit) -> bool {
        self.unit_type() == other.unit_type()
    }

    fn to_baseline(self, n: f64) -> f64 {
        match self {
            Self::Millimeter => n * 0.001,
            Self::Centimeter => n * 0.01,
            Self::Feet => n * 0.3048,
            Self::Kilometer => n * 1000.0,
            Self::Microgram => n * 0.000001,
            Self::Milligram => n * 0.001,
            Self::Kilogram => n * 1000.0,
            Self::Milliliter => n * 0.001,
            Self::Fahrenheit => (n - 32.0) * 5.0 / 9.0,
            Self::Month => n / 12.0,
            Self::Millisecond => n / 60000.0,
            Self::Second => n / 60.0,
            Self::Hour => n * 60.0,
            Self::Day => n * 60.0 * 24.0,
            Self::Week => n * 60.0 * 24.0 * 7.0,
            Self::MicrogramPerGram => n * 0.001,
            Self::Meter
            | Self::Gram
            | Self::Liter
            | Self::Celsius
            | Self::Year
            | Self::Minute
            | Self::MilligramPerGram => n,
        }
    }

    fn from_baseline(self, n: f64) -> f64 {
        match self {
            Self::Millimeter => n * 1000.0,
            Self::Centimeter => n * 100.0,
            Self::Feet => n * 3.280839895,
            Self::Kilometer => n * 0.001,
            Self::Microgram => n * 1000000.0,
            Self::Milligram => n * 1000.0,
            Self::Kilogram => n * 0.001,
            Self::Milliliter => n * 1000.0,
            Self::Fahrenheit => n * 9.0 / 5.0 + 32.0,
            Self::Month => n * 12.0,
            Self::Millisecond => n * 60000.0,
            Self::Second => n * 60.0,
            Self::Hour => n / 60.0,
            Self::Day => n / 60.0 / 24.0,
            Self::Week => n / 60.0 / 24.0 / 7.0,
            Self::MicrogramPerGram => n * 1000.0,
            Self::Meter
            | Self::Gram
            | Self::Liter
            | Self::Celsius
            | Self::Year
            | Self::Minute
            | Self::MilligramPerGram => n,
        }
    }

    /// Convert `value`, expressed in this unit, into `output`.
    pub fn convert_to(self, output: Unit, value: f64) -> f64 {
        output.from_baseline(self.to_baseline(value))
    }

    /// Convert `value`, expressed in `input`, into this unit.
    pub fn convert_from(self, input: Unit, value: f64) -> f64 {
        self.from_baseline(input.to_baseline(value))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.labels()[0])
    }
}
