//! Aggregator configuration: typed structs plus validating parsers.
//!
//! Configs arrive as a schema-free [`Value::Map`] (usually converted from
//! JSON). Parsing is explicit per struct and fails fast: an aggregator is
//! never built from a config that has not passed `validate()`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ocr3_values::{Decimal, Value};

use crate::error::{ConfigError, ConfigResult};
use crate::numeric::{to_decimal, DeviationKind};

/// Default key the reduce report is wrapped under.
pub const DEFAULT_OUTPUT_FIELD_NAME: &str = "Reports";

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// How a field's extracted values are reduced to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMethod {
    Median,
    Mode,
}

impl FromStr for AggregationMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "median" => Ok(Self::Median),
            "mode" => Ok(Self::Mode),
            other => Err(ConfigError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Median => "median",
            Self::Mode => "mode",
        })
    }
}

/// Shape of the reduce report under the output field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// `{name: {..report..}}`
    #[default]
    Map,
    /// `{name: [{..report..}]}`
    Array,
}

impl FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "map" => Ok(Self::Map),
            "array" => Ok(Self::Array),
            other => Err(ConfigError::UnsupportedReportFormat(other.to_string())),
        }
    }
}

/// Minimum agreement a mode result needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeQuorum {
    /// The most frequent value wins, however few nodes back it.
    #[default]
    Any,
    /// The most frequent value needs at least `f + 1` votes, so at least one
    /// honest node reported it.
    Ocr,
}

impl ModeQuorum {
    /// Votes required for a given fault bound.
    pub fn required(self, f: u32) -> usize {
        match self {
            Self::Any => 1,
            Self::Ocr => f as usize + 1,
        }
    }
}

impl FromStr for ModeQuorum {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(Self::Any),
            "ocr" => Ok(Self::Ocr),
            other => Err(ConfigError::UnsupportedModeQuorum(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Reduce aggregator config
// ---------------------------------------------------------------------------

/// Threshold a field's change must exceed to request a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deviation {
    pub kind: DeviationKind,
    pub magnitude: Decimal,
}

/// One reduced field of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationField {
    pub input_key: String,
    /// Report key; falls back to `input_key` when empty.
    pub output_key: String,
    pub method: AggregationMethod,
    pub deviation: Option<Deviation>,
    pub mode_quorum: ModeQuorum,
}

impl AggregationField {
    pub fn new(input_key: impl Into<String>, method: AggregationMethod) -> Self {
        Self {
            input_key: input_key.into(),
            output_key: String::new(),
            method,
            deviation: None,
            mode_quorum: ModeQuorum::default(),
        }
    }

    pub fn with_output_key(mut self, output_key: impl Into<String>) -> Self {
        self.output_key = output_key.into();
        self
    }

    pub fn with_deviation(mut self, kind: DeviationKind, magnitude: Decimal) -> Self {
        self.deviation = Some(Deviation { kind, magnitude });
        self
    }

    pub fn with_mode_quorum(mut self, quorum: ModeQuorum) -> Self {
        self.mode_quorum = quorum;
        self
    }

    /// Key this field is written under in the report.
    pub fn report_key(&self) -> &str {
        if self.output_key.is_empty() {
            &self.input_key
        } else {
            &self.output_key
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if let Some(d) = &self.deviation {
            if d.magnitude.is_sign_negative() {
                return Err(ConfigError::InvalidDeviation {
                    input_key: self.input_key.clone(),
                    value: d.magnitude.to_string(),
                });
            }
        }
        if self.method == AggregationMethod::Median && self.mode_quorum != ModeQuorum::Any {
            return Err(ConfigError::ModeQuorumOnMedian {
                input_key: self.input_key.clone(),
            });
        }
        Ok(())
    }

    fn from_value(index: usize, value: &Value) -> ConfigResult<Self> {
        let field_path = |key: &str| format!("fields[{index}].{key}");
        let map = value.as_map().ok_or_else(|| ConfigError::InvalidField {
            field: format!("fields[{index}]"),
            reason: format!("expected map, got {}", value.kind()),
        })?;

        let input_key = optional_string(map, "inputKey", &field_path)?.unwrap_or_default();
        let output_key = optional_string(map, "outputKey", &field_path)?.unwrap_or_default();
        let method: AggregationMethod = optional_string(map, "method", &field_path)?
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ConfigError::MissingField(field_path("method")))?
            .parse()?;

        let kind = optional_string(map, "deviationType", &field_path)?
            .filter(|t| !t.is_empty() && t != "none");
        let magnitude = match map.get("deviation") {
            None | Some(Value::Nil) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(raw) => Some(to_decimal(raw).map_err(|_| ConfigError::InvalidDeviation {
                input_key: input_key.clone(),
                value: describe(raw),
            })?),
        };
        let deviation = match (kind, magnitude) {
            (None, None) => None,
            (Some(kind), Some(magnitude)) => Some(Deviation {
                kind: kind.parse()?,
                magnitude,
            }),
            _ => return Err(ConfigError::IncompleteDeviation { input_key }),
        };

        let mode_quorum = match optional_string(map, "modeQuorum", &field_path)? {
            Some(q) if !q.is_empty() => q.parse()?,
            _ => ModeQuorum::default(),
        };

        Ok(Self {
            input_key,
            output_key,
            method,
            deviation,
            mode_quorum,
        })
    }
}

/// Configuration of the reduce aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceAggregatorConfig {
    pub fields: Vec<AggregationField>,
    pub output_field_name: String,
    pub report_format: ReportFormat,
}

impl ReduceAggregatorConfig {
    /// Config with the given fields and default output settings.
    pub fn new(fields: Vec<AggregationField>) -> Self {
        Self {
            fields,
            output_field_name: DEFAULT_OUTPUT_FIELD_NAME.to_string(),
            report_format: ReportFormat::default(),
        }
    }

    pub fn with_output_field_name(mut self, name: impl Into<String>) -> Self {
        self.output_field_name = name.into();
        self
    }

    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    /// Whether any field gates reporting on deviation.
    pub fn has_deviation(&self) -> bool {
        self.fields.iter().any(|f| f.deviation.is_some())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.fields.is_empty() {
            return Err(ConfigError::NoFields);
        }
        self.fields.iter().try_for_each(AggregationField::validate)
    }

    /// Parse and validate a config map.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let map = value.try_as_map()?;
        let top = |key: &str| key.to_string();

        let fields = match map.get("fields") {
            None | Some(Value::Nil) => Vec::new(),
            Some(raw) => raw
                .try_as_list()?
                .iter()
                .enumerate()
                .map(|(i, v)| AggregationField::from_value(i, v))
                .collect::<ConfigResult<Vec<_>>>()?,
        };

        let output_field_name = optional_string(map, "outputFieldName", &top)?
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_OUTPUT_FIELD_NAME.to_string());
        let report_format = match optional_string(map, "reportFormat", &top)? {
            Some(f) if !f.is_empty() => f.parse()?,
            _ => ReportFormat::default(),
        };

        let config = Self {
            fields,
            output_field_name,
            report_format,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<&Value> for ReduceAggregatorConfig {
    type Error = ConfigError;

    fn try_from(value: &Value) -> ConfigResult<Self> {
        Self::from_value(value)
    }
}

// ---------------------------------------------------------------------------
// Identical aggregator config
// ---------------------------------------------------------------------------

/// Configuration of the identical-consensus aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdenticalAggregatorConfig {
    /// Number of observations every node must contribute.
    pub expected_observations_len: usize,
    /// Report keys per position; stringified indices when empty.
    pub key_overrides: Vec<String>,
}

impl IdenticalAggregatorConfig {
    pub fn new(expected_observations_len: usize) -> Self {
        Self {
            expected_observations_len,
            key_overrides: Vec::new(),
        }
    }

    pub fn with_key_overrides<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_overrides = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Report key for the observation at `index`.
    pub fn key_for(&self, index: usize) -> String {
        self.key_overrides
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.expected_observations_len == 0 {
            return Err(ConfigError::ZeroObservationsLen);
        }
        if !self.key_overrides.is_empty()
            && self.key_overrides.len() != self.expected_observations_len
        {
            return Err(ConfigError::KeyOverridesLength {
                expected: self.expected_observations_len,
                actual: self.key_overrides.len(),
            });
        }
        Ok(())
    }

    /// Parse and validate a config map.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let map = value.try_as_map()?;

        let expected_observations_len = match map.get("expectedObservationsLen") {
            None | Some(Value::Nil) => {
                return Err(ConfigError::MissingField(
                    "expectedObservationsLen".to_string(),
                ))
            }
            Some(Value::Int64(n)) => usize::try_from(*n).map_err(|_| ConfigError::InvalidField {
                field: "expectedObservationsLen".to_string(),
                reason: format!("{n} is negative"),
            })?,
            Some(other) => {
                return Err(ConfigError::InvalidField {
                    field: "expectedObservationsLen".to_string(),
                    reason: format!("expected int64, got {}", other.kind()),
                })
            }
        };

        let key_overrides = match map.get("keyOverrides") {
            None | Some(Value::Nil) => Vec::new(),
            Some(raw) => raw
                .try_as_list()?
                .iter()
                .map(String::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        };

        let config = Self {
            expected_observations_len,
            key_overrides,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<&Value> for IdenticalAggregatorConfig {
    type Error = ConfigError;

    fn try_from(value: &Value) -> ConfigResult<Self> {
        Self::from_value(value)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn optional_string(
    map: &BTreeMap<String, Value>,
    key: &str,
    path: &dyn Fn(&str) -> String,
) -> ConfigResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Nil) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigError::InvalidField {
            field: path(key),
            reason: format!("expected string, got {}", other.kind()),
        }),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.kind().to_string(),
    }
}
