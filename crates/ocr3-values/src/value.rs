//! The tagged value model exchanged between nodes.
//!
//! [`Value`] is a closed sum type: every consumer matches it exhaustively
//! instead of probing types at runtime. Maps are `BTreeMap`s so iteration
//! order is a function of the keys alone.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use rust_decimal::Decimal;

use crate::error::{Result, ValueError};

/// A single observation value, report field, or state entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Int64(i64),
    BigInt(BigInt),
    Time(DateTime<Utc>),
    Float64(f64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Nil,
    /// An error carried as data, e.g. a failed upstream fetch.
    Error(String),
}

impl Value {
    /// Stable lower-case name of the variant, matching its wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::Decimal(_) => "decimal",
            Self::Int64(_) => "int64",
            Self::BigInt(_) => "bigint",
            Self::Time(_) => "time",
            Self::Float64(_) => "float64",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Nil => "nil",
            Self::Error(_) => "error",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Build the mismatch error for a caller that wanted `expected`.
    pub fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }

    /// Unwrap a map value, failing with a type mismatch otherwise.
    pub fn try_as_map(&self) -> Result<&BTreeMap<String, Value>> {
        self.as_map().ok_or_else(|| self.mismatch("map"))
    }

    /// Unwrap a list value, failing with a type mismatch otherwise.
    pub fn try_as_list(&self) -> Result<&[Value]> {
        self.as_list().ok_or_else(|| self.mismatch("list"))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int64(i64::from(v))
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Self::BigInt(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

/// JSON is the schema-free input used for configs and test fixtures.
///
/// Integers that fit `i64` become `Int64`, larger unsigned integers become
/// `BigInt`, every other number becomes `Float64`.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Nil,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Self::BigInt(BigInt::from(u))
                } else {
                    n.as_f64().map(Self::Float64).unwrap_or(Self::Nil)
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::List(arr.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(obj) => {
                Self::Map(obj.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl TryFrom<&Value> for String {
    type Error = ValueError;

    fn try_from(v: &Value) -> Result<Self> {
        v.as_str().map(str::to_string).ok_or_else(|| v.mismatch("string"))
    }
}

impl TryFrom<&Value> for bool {
    type Error = ValueError;

    fn try_from(v: &Value) -> Result<Self> {
        match v {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl TryFrom<&Value> for i64 {
    type Error = ValueError;

    fn try_from(v: &Value) -> Result<Self> {
        match v {
            Value::Int64(i) => Ok(*i),
            other => Err(other.mismatch("int64")),
        }
    }
}

impl TryFrom<&Value> for Decimal {
    type Error = ValueError;

    fn try_from(v: &Value) -> Result<Self> {
        match v {
            Value::Decimal(d) => Ok(*d),
            other => Err(other.mismatch("decimal")),
        }
    }
}
