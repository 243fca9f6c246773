//! Numeric coercion and change measurement.
//!
//! Every numeric comparison in the reduce path goes through [`to_decimal`],
//! so heterogeneous observation types sort and deviate on a single scale.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use ocr3_values::{Decimal, Value};
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, NumericError};

/// How change between two consecutive values is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    /// `|old - new| / |old|`, as a ratio (`0.1` is ten percent).
    Percent,
    /// `|old - new|`.
    Absolute,
}

impl DeviationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Percent => "percent",
            Self::Absolute => "absolute",
        }
    }
}

impl fmt::Display for DeviationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviationKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent" => Ok(Self::Percent),
            "absolute" => Ok(Self::Absolute),
            other => Err(ConfigError::UnsupportedDeviationType(other.to_string())),
        }
    }
}

/// Coerce a value to a decimal.
///
/// Strings are parsed (plain or scientific notation), integers and big
/// integers keep their exact integral value, timestamps become whole seconds
/// since the Unix epoch, floats are converted approximately. Every other
/// variant is rejected.
pub fn to_decimal(value: &Value) -> Result<Decimal, NumericError> {
    match value {
        Value::String(s) => Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map_err(|_| NumericError::Unparseable { input: s.clone() }),
        Value::Decimal(d) => Ok(*d),
        Value::Int64(i) => Ok(Decimal::from(*i)),
        Value::BigInt(b) => bigint_to_decimal(b),
        Value::Time(t) => Ok(Decimal::from(t.timestamp())),
        Value::Float64(f) => Decimal::from_f64(*f).ok_or_else(|| NumericError::Unparseable {
            input: f.to_string(),
        }),
        other => Err(NumericError::Unsupported { kind: other.kind() }),
    }
}

// Exact integral value at scale zero; magnitudes beyond 96 bits overflow.
fn bigint_to_decimal(b: &BigInt) -> Result<Decimal, NumericError> {
    Decimal::from_str(&b.to_string()).map_err(|_| NumericError::Overflow("converting bigint"))
}

/// Measure the change from `old` to `new`.
///
/// Changes too large to represent saturate at [`Decimal::MAX`], as does a
/// percent change away from a zero baseline, so any configured threshold
/// trips.
pub fn deviation(kind: DeviationKind, old: Decimal, new: Decimal) -> Decimal {
    let Some(diff) = old.checked_sub(new) else {
        return Decimal::MAX;
    };
    let diff = diff.abs();
    match kind {
        DeviationKind::Absolute => diff,
        DeviationKind::Percent => {
            if old.is_zero() {
                return if new.is_zero() { Decimal::ZERO } else { Decimal::MAX };
            }
            diff.checked_div(old.abs()).unwrap_or(Decimal::MAX)
        }
    }
}
