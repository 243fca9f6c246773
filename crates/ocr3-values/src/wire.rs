//! Wire representation of [`Value`].
//!
//! Each variant maps to a stable snake_case tag in an adjacently tagged
//! object (`{"kind": ..., "value": ...}`). Decimals travel as a coefficient
//! string plus a base-10 exponent, big integers as sign plus big-endian
//! magnitude. [`encode`] always emits the canonical form, so encoded bytes
//! are byte-identical across nodes for equal values.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::{BigInt, Sign};
use rust_decimal::Decimal;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::canonical::canonical_json;
use crate::error::{Result, ValueError};
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub(crate) enum WireValue {
    String(String),
    Bool(bool),
    Bytes(String),
    Map(BTreeMap<String, WireValue>),
    List(Vec<WireValue>),
    Decimal {
        coefficient: String,
        exponent: i32,
    },
    Int64(i64),
    #[serde(rename = "bigint")]
    BigInt {
        negative: bool,
        magnitude: String,
    },
    Time(String),
    Float64(f64),
    Nil,
    Error(String),
}

pub(crate) fn to_wire(value: &Value) -> Result<WireValue> {
    Ok(match value {
        Value::String(s) => WireValue::String(s.clone()),
        Value::Bool(b) => WireValue::Bool(*b),
        Value::Bytes(b) => WireValue::Bytes(hex::encode(b)),
        Value::Map(m) => WireValue::Map(
            m.iter()
                .map(|(k, v)| Ok((k.clone(), to_wire(v)?)))
                .collect::<Result<_>>()?,
        ),
        Value::List(l) => WireValue::List(l.iter().map(to_wire).collect::<Result<_>>()?),
        Value::Decimal(d) => WireValue::Decimal {
            coefficient: d.mantissa().to_string(),
            exponent: -(d.scale() as i32),
        },
        Value::Int64(i) => WireValue::Int64(*i),
        Value::BigInt(b) => {
            let (sign, magnitude) = b.to_bytes_be();
            WireValue::BigInt {
                negative: sign == Sign::Minus,
                magnitude: hex::encode(magnitude),
            }
        }
        Value::Time(t) => WireValue::Time(t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        Value::Float64(f) => {
            if !f.is_finite() {
                return Err(ValueError::NonFiniteFloat);
            }
            WireValue::Float64(*f)
        }
        Value::Nil => WireValue::Nil,
        Value::Error(e) => WireValue::Error(e.clone()),
    })
}

fn from_wire(wire: WireValue) -> Result<Value> {
    Ok(match wire {
        WireValue::String(s) => Value::String(s),
        WireValue::Bool(b) => Value::Bool(b),
        WireValue::Bytes(h) => Value::Bytes(
            hex::decode(&h).map_err(|e| ValueError::InvalidEncoding(format!("bytes: {e}")))?,
        ),
        WireValue::Map(m) => Value::Map(
            m.into_iter()
                .map(|(k, v)| Ok((k, from_wire(v)?)))
                .collect::<Result<_>>()?,
        ),
        WireValue::List(l) => Value::List(l.into_iter().map(from_wire).collect::<Result<_>>()?),
        WireValue::Decimal {
            coefficient,
            exponent,
        } => Value::Decimal(decimal_from_parts(&coefficient, exponent)?),
        WireValue::Int64(i) => Value::Int64(i),
        WireValue::BigInt {
            negative,
            magnitude,
        } => {
            let bytes = hex::decode(&magnitude)
                .map_err(|e| ValueError::InvalidEncoding(format!("bigint: {e}")))?;
            let sign = if negative { Sign::Minus } else { Sign::Plus };
            Value::BigInt(BigInt::from_bytes_be(sign, &bytes))
        }
        WireValue::Time(t) => Value::Time(
            DateTime::parse_from_rfc3339(&t)
                .map_err(|e| ValueError::InvalidEncoding(format!("time {t:?}: {e}")))?
                .with_timezone(&Utc),
        ),
        WireValue::Float64(f) => Value::Float64(f),
        WireValue::Nil => Value::Nil,
        WireValue::Error(e) => Value::Error(e),
    })
}

fn decimal_from_parts(coefficient: &str, exponent: i32) -> Result<Decimal> {
    let invalid = |reason: &str| {
        ValueError::InvalidEncoding(format!(
            "decimal {coefficient}e{exponent}: {reason}"
        ))
    };
    let mut mantissa: i128 = coefficient
        .parse()
        .map_err(|_| invalid("coefficient is not an integer"))?;
    let scale = if exponent <= 0 {
        exponent.unsigned_abs()
    } else {
        for _ in 0..exponent {
            mantissa = mantissa
                .checked_mul(10)
                .ok_or_else(|| invalid("magnitude out of range"))?;
        }
        0
    };
    Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|e| invalid(&e.to_string()))
}

/// Encode a value into its canonical wire bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(canonical_json(value)?.into_bytes())
}

/// Decode wire bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let wire: WireValue = serde_json::from_slice(bytes)?;
    from_wire(wire)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        to_wire(self)
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = WireValue::deserialize(deserializer)?;
        from_wire(wire).map_err(de::Error::custom)
    }
}
