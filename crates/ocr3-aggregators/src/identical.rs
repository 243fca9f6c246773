//! Identical-consensus aggregator.
//!
//! Every node reports the same fixed-length list of observations. For each
//! position the value backed by at least `2f + 1` nodes is emitted; if any
//! position falls short the whole round fails.

use std::collections::BTreeMap;

use ocr3_values::Value;

use crate::config::IdenticalAggregatorConfig;
use crate::counter::Tally;
use crate::error::{AggregationError, ConfigResult, Result};
use crate::obs::{
    emit_consensus_failed, emit_observation_skipped, emit_round_aggregated, emit_round_failed,
    RoundSpan,
};
use crate::outcome::{quorum, AggregationOutcome, Aggregator, Observations};

const NAME: &str = "identical";

/// Stateless aggregator requiring exact agreement per observation position.
#[derive(Debug, Clone)]
pub struct IdenticalAggregator {
    config: IdenticalAggregatorConfig,
}

impl IdenticalAggregator {
    /// Build from a validated config.
    pub fn new(config: IdenticalAggregatorConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Parse, validate and build from a config map.
    pub fn from_value(config: &Value) -> ConfigResult<Self> {
        Self::new(IdenticalAggregatorConfig::from_value(config)?)
    }

    pub fn config(&self) -> &IdenticalAggregatorConfig {
        &self.config
    }

    fn collect_tallies(&self, observations: &Observations) -> Result<Vec<Tally>> {
        let expected = self.config.expected_observations_len;
        let mut tallies: Vec<Tally> = (0..expected).map(|_| Tally::new()).collect();
        for (&oracle, contribution) in observations {
            if contribution.is_empty() {
                emit_observation_skipped(oracle, "", "node contributed no observations");
                continue;
            }
            if contribution.len() != expected {
                let reason = format!(
                    "expected {expected} observations, got {}",
                    contribution.len()
                );
                emit_observation_skipped(oracle, "", &reason);
                continue;
            }
            for (tally, value) in tallies.iter_mut().zip(contribution) {
                tally.add(value)?;
            }
        }
        Ok(tallies)
    }

    fn try_aggregate(&self, observations: &Observations, f: u32) -> Result<AggregationOutcome> {
        let want = quorum(f);
        let tallies = self.collect_tallies(observations)?;

        let mut report = BTreeMap::new();
        for (index, tally) in tallies.iter().enumerate() {
            let leader = tally.leader_entry();
            let highest = leader.map_or(0, |(_, c)| c.count);
            let Some((_, winner)) = leader.filter(|_| highest >= want) else {
                emit_consensus_failed(
                    index,
                    leader.map(|(fp, _)| fp),
                    tally.distinct(),
                    highest,
                    want,
                );
                return Err(AggregationError::NoConsensus {
                    index,
                    highest,
                    want,
                });
            };
            report.insert(self.config.key_for(index), winner.representative_value.clone());
        }

        Ok(AggregationOutcome {
            encodable_outcome: report,
            metadata: Vec::new(),
            should_report: true,
        })
    }
}

impl Aggregator for IdenticalAggregator {
    fn aggregate(
        &self,
        _previous: Option<&AggregationOutcome>,
        observations: &Observations,
        f: u32,
    ) -> Result<AggregationOutcome> {
        let _span = RoundSpan::enter(NAME, f);
        match self.try_aggregate(observations, f) {
            Ok(outcome) => {
                emit_round_aggregated(NAME, outcome.encodable_outcome.len(), outcome.should_report);
                Ok(outcome)
            }
            Err(e) => {
                emit_round_failed(NAME, &e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OracleId;

    fn observations(entries: Vec<(OracleId, Vec<&str>)>) -> Observations {
        entries
            .into_iter()
            .map(|(id, vals)| (id, vals.into_iter().map(Value::from).collect()))
            .collect()
    }

    #[test]
    fn test_unanimous_single_position() {
        let agg = IdenticalAggregator::new(IdenticalAggregatorConfig::new(1)).unwrap();
        let obs = observations(vec![(1, vec!["a"]), (2, vec!["a"]), (3, vec!["a"]), (4, vec!["a"])]);
        let outcome = agg.aggregate(None, &obs, 1).unwrap();
        assert!(outcome.should_report);
        assert!(outcome.metadata.is_empty());
        assert_eq!(outcome.encodable_outcome.get("0"), Some(&Value::from("a")));
    }

    #[test]
    fn test_wrong_length_node_is_excluded_from_every_position() {
        let agg = IdenticalAggregator::new(IdenticalAggregatorConfig::new(2)).unwrap();
        let obs = observations(vec![
            (1, vec!["a", "x"]),
            (2, vec!["a", "x"]),
            (3, vec!["a"]),
            (4, vec!["a", "y"]),
        ]);
        // Position 0 has only three eligible "a" votes once node 3 is dropped,
        // position 1 has "x" twice: below 2f+1 = 3.
        let err = agg.aggregate(None, &obs, 1).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::NoConsensus {
                index: 1,
                highest: 2,
                want: 3
            }
        ));
    }

    #[test]
    fn test_no_observations_fails_first_position() {
        let agg = IdenticalAggregator::new(IdenticalAggregatorConfig::new(1)).unwrap();
        let err = agg.aggregate(None, &Observations::new(), 0).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::NoConsensus {
                index: 0,
                highest: 0,
                want: 1
            }
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = IdenticalAggregatorConfig::new(2).with_key_overrides(["only"]);
        assert!(IdenticalAggregator::new(config).is_err());
    }
}
