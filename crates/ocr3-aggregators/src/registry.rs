//! Constructing aggregators by name from their config.

use std::fmt;
use std::str::FromStr;

use ocr3_values::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::identical::IdenticalAggregator;
use crate::outcome::Aggregator;
use crate::reduce::ReduceAggregator;

/// The aggregators a consensus capability can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorKind {
    Identical,
    Reduce,
}

impl AggregatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identical => "identical",
            Self::Reduce => "reduce",
        }
    }
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identical" => Ok(Self::Identical),
            "reduce" => Ok(Self::Reduce),
            other => Err(ConfigError::UnknownAggregator(other.to_string())),
        }
    }
}

/// Build a validated aggregator of `kind` from a config map.
pub fn new_aggregator(kind: AggregatorKind, config: &Value) -> ConfigResult<Box<dyn Aggregator>> {
    let aggregator: Box<dyn Aggregator> = match kind {
        AggregatorKind::Identical => Box::new(IdenticalAggregator::from_value(config)?),
        AggregatorKind::Reduce => Box::new(ReduceAggregator::from_value(config)?),
    };
    Ok(aggregator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in [AggregatorKind::Identical, AggregatorKind::Reduce] {
            assert_eq!(kind.as_str().parse::<AggregatorKind>().unwrap(), kind);
        }
        assert!(matches!(
            "data_feeds".parse::<AggregatorKind>(),
            Err(ConfigError::UnknownAggregator(_))
        ));
    }

    #[test]
    fn test_new_aggregator_validates_config() {
        let bad = Value::from(serde_json::json!({ "fields": [] }));
        assert!(new_aggregator(AggregatorKind::Reduce, &bad).is_err());

        let good = Value::from(serde_json::json!({ "expectedObservationsLen": 1 }));
        assert!(new_aggregator(AggregatorKind::Identical, &good).is_ok());
    }
}
