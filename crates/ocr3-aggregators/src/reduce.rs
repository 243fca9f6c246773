//! Reduce aggregator: per-field median or mode with deviation-gated reporting.
//!
//! Each configured field is extracted from every node's single observation
//! and reduced to one value. The reduced values become the report and the
//! carry-over state; the state of round *k* is the deviation baseline of
//! round *k + 1*.
//!
//! Nothing in this path depends on the order in which nodes are visited:
//! median sorts by value and breaks ties by fingerprint, mode breaks ties
//! by fingerprint.

use std::collections::{BTreeMap, BTreeSet};

use ocr3_values::{decode, encode, fingerprint, Decimal, Fingerprint, Value};
use tracing::debug;

use crate::config::{AggregationField, AggregationMethod, ReduceAggregatorConfig, ReportFormat};
use crate::counter::Tally;
use crate::error::{AggregationError, ConfigResult, NumericError, Result};
use crate::extract::extract_with_origin;
use crate::numeric::{deviation, to_decimal};
use crate::obs::{emit_observation_skipped, emit_round_aggregated, emit_round_failed, RoundSpan};
use crate::outcome::{quorum, AggregationOutcome, Aggregator, Observations, OracleId};

const NAME: &str = "reduce";

/// Carry-over state: last reduced value per input key.
pub type CurrentState = BTreeMap<String, Value>;

/// Aggregator reducing each configured field to a single value.
#[derive(Debug, Clone)]
pub struct ReduceAggregator {
    config: ReduceAggregatorConfig,
}

impl ReduceAggregator {
    /// Build from a validated config.
    pub fn new(config: ReduceAggregatorConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Parse, validate and build from a config map.
    pub fn from_value(config: &Value) -> ConfigResult<Self> {
        Self::new(ReduceAggregatorConfig::from_value(config)?)
    }

    pub fn config(&self) -> &ReduceAggregatorConfig {
        &self.config
    }

    /// Decode the previous state and seed missing fields with zero.
    ///
    /// Returns the state together with the keys that were seeded.
    fn initial_state(
        &self,
        previous: Option<&AggregationOutcome>,
    ) -> Result<(CurrentState, BTreeSet<String>)> {
        let mut state = match previous {
            Some(p) if !p.metadata.is_empty() => decode_state(&p.metadata)?,
            _ => CurrentState::new(),
        };

        let mut seeded = BTreeSet::new();
        for field in &self.config.fields {
            if !state.contains_key(&field.input_key) {
                state.insert(field.input_key.clone(), Value::Decimal(Decimal::ZERO));
                seeded.insert(field.input_key.clone());
            }
        }
        Ok((state, seeded))
    }

    fn reduce_field(
        &self,
        field: &AggregationField,
        observations: &Observations,
        f: u32,
    ) -> Result<Value> {
        let want = quorum(f);
        let extracted = extract_with_origin(observations, &field.input_key);
        ensure_enough(&field.input_key, extracted.len(), want)?;

        match field.method {
            AggregationMethod::Median => median(field, extracted, want),
            AggregationMethod::Mode => mode(field, &extracted, f),
        }
    }

    fn try_aggregate(
        &self,
        previous: Option<&AggregationOutcome>,
        observations: &Observations,
        f: u32,
    ) -> Result<AggregationOutcome> {
        let want = quorum(f);
        let contributing = observations.values().filter(|o| !o.is_empty()).count();
        if contributing < want {
            return Err(AggregationError::NotEnoughObservations {
                have: contributing,
                want,
            });
        }

        let (mut state, seeded) = self.initial_state(previous)?;
        let mut report = BTreeMap::new();
        let mut should_report = false;

        for field in &self.config.fields {
            let reduced = self.reduce_field(field, observations, f)?;

            if let Some(threshold) = &field.deviation {
                let numeric = |source: NumericError| AggregationError::Numeric {
                    input_key: field.input_key.clone(),
                    source,
                };
                let old = state
                    .get(&field.input_key)
                    .map(to_decimal)
                    .transpose()
                    .map_err(numeric)?
                    .unwrap_or(Decimal::ZERO);
                let new = to_decimal(&reduced).map_err(numeric)?;
                let change = deviation(threshold.kind, old, new);
                let fresh = seeded.contains(&field.input_key);
                debug!(
                    input_key = %field.input_key,
                    old = %old,
                    new = %new,
                    deviation = %change,
                    threshold = %threshold.magnitude,
                    fresh = fresh,
                    "field deviation"
                );
                if fresh || change > threshold.magnitude {
                    should_report = true;
                }
            }

            // State advances every round, reported or not.
            state.insert(field.input_key.clone(), reduced.clone());
            report.insert(field.report_key().to_string(), reduced);
        }

        if !self.config.has_deviation() {
            should_report = true;
        }

        let payload = match self.config.report_format {
            ReportFormat::Map => Value::Map(report),
            ReportFormat::Array => Value::List(vec![Value::Map(report)]),
        };
        let mut encodable_outcome = BTreeMap::new();
        encodable_outcome.insert(self.config.output_field_name.clone(), payload);

        Ok(AggregationOutcome {
            encodable_outcome,
            metadata: encode(&Value::Map(state))?,
            should_report,
        })
    }
}

impl Aggregator for ReduceAggregator {
    fn aggregate(
        &self,
        previous: Option<&AggregationOutcome>,
        observations: &Observations,
        f: u32,
    ) -> Result<AggregationOutcome> {
        let _span = RoundSpan::enter(NAME, f);
        match self.try_aggregate(previous, observations, f) {
            Ok(outcome) => {
                emit_round_aggregated(NAME, self.config.fields.len(), outcome.should_report);
                Ok(outcome)
            }
            Err(e) => {
                emit_round_failed(NAME, &e);
                Err(e)
            }
        }
    }
}

/// Decode carry-over state from outcome metadata.
pub fn decode_state(metadata: &[u8]) -> Result<CurrentState> {
    match decode(metadata).map_err(|e| AggregationError::MalformedState(e.to_string()))? {
        Value::Map(state) => Ok(state),
        other => Err(AggregationError::MalformedState(format!(
            "expected map, got {}",
            other.kind()
        ))),
    }
}

fn ensure_enough(input_key: &str, have: usize, want: usize) -> Result<()> {
    if have < want {
        return Err(AggregationError::NotEnoughFieldObservations {
            input_key: input_key.to_string(),
            have,
            want,
        });
    }
    Ok(())
}

/// Element at index `(len - 1) / 2` of the values sorted descending.
///
/// Values that cannot be read as decimals are dropped as per-node anomalies
/// before the quorum is re-checked.
fn median(
    field: &AggregationField,
    extracted: Vec<(OracleId, Value)>,
    want: usize,
) -> Result<Value> {
    let mut ranked: Vec<(Decimal, Fingerprint, Value)> = Vec::with_capacity(extracted.len());
    for (oracle, value) in extracted {
        match to_decimal(&value) {
            Ok(d) => ranked.push((d, fingerprint(&value)?, value)),
            Err(e) => emit_observation_skipped(oracle, &field.input_key, &e.to_string()),
        }
    }
    ensure_enough(&field.input_key, ranked.len(), want)?;

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    let middle = (ranked.len() - 1) / 2;
    Ok(ranked.swap_remove(middle).2)
}

/// Most frequent value, smallest fingerprint among ties.
fn mode(field: &AggregationField, extracted: &[(OracleId, Value)], f: u32) -> Result<Value> {
    let tally = Tally::from_values(extracted.iter().map(|(_, v)| v))?;
    let required = field.mode_quorum.required(f);
    match tally.leader_entry() {
        Some((fp, leader)) if leader.count >= required => {
            debug!(
                input_key = %field.input_key,
                leader = %fp.short(),
                votes = leader.count,
                distinct = tally.distinct(),
                "mode selected"
            );
            Ok(leader.representative_value.clone())
        }
        leader => Err(AggregationError::ModeQuorumNotMet {
            input_key: field.input_key.clone(),
            highest: leader.map_or(0, |(_, c)| c.count),
            want: required,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeQuorum;
    use crate::numeric::DeviationKind;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn price_obs(prices: &[i64]) -> Observations {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut m = BTreeMap::new();
                m.insert("Price".to_string(), Value::Int64(*p));
                (i as OracleId, vec![Value::Map(m)])
            })
            .collect()
    }

    fn median_agg() -> ReduceAggregator {
        ReduceAggregator::new(ReduceAggregatorConfig::new(vec![AggregationField::new(
            "Price",
            AggregationMethod::Median,
        )]))
        .unwrap()
    }

    fn reported(outcome: &AggregationOutcome, key: &str) -> Value {
        outcome.encodable_outcome["Reports"]
            .as_map()
            .and_then(|m| m.get(key))
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_median_odd_count() {
        let outcome = median_agg().aggregate(None, &price_obs(&[3, 1, 2]), 1).unwrap();
        assert_eq!(reported(&outcome, "Price"), Value::Int64(2));
    }

    #[test]
    fn test_median_even_count_takes_index_len_minus_one_over_two() {
        // Sorted descending: 4, 3, 2, 1 → index 1.
        let outcome = median_agg()
            .aggregate(None, &price_obs(&[1, 4, 2, 3]), 1)
            .unwrap();
        assert_eq!(reported(&outcome, "Price"), Value::Int64(3));
    }

    #[test]
    fn test_median_mixed_numeric_types() {
        let mut obs = Observations::new();
        for (id, v) in [
            (1u8, Value::from("10.5")),
            (2, Value::Int64(10)),
            (3, Value::Decimal(dec("11"))),
        ] {
            let mut m = BTreeMap::new();
            m.insert("Price".to_string(), v);
            obs.insert(id, vec![Value::Map(m)]);
        }
        let outcome = median_agg().aggregate(None, &obs, 1).unwrap();
        assert_eq!(reported(&outcome, "Price"), Value::from("10.5"));
    }

    #[test]
    fn test_median_equal_values_tie_break_is_stable() {
        let mut obs = Observations::new();
        for (id, v) in [
            (1u8, Value::from("5")),
            (2, Value::Int64(5)),
            (3, Value::Decimal(dec("5.0"))),
        ] {
            let mut m = BTreeMap::new();
            m.insert("Price".to_string(), v);
            obs.insert(id, vec![Value::Map(m)]);
        }
        let first = median_agg().aggregate(None, &obs, 1).unwrap();
        let mut reversed = Observations::new();
        for (id, v) in &obs {
            reversed.insert(10 - id, v.clone());
        }
        let second = median_agg().aggregate(None, &reversed, 1).unwrap();
        assert_eq!(first.encodable_outcome, second.encodable_outcome);
    }

    #[test]
    fn test_median_drops_non_numeric_then_rechecks_quorum() {
        let mut obs = price_obs(&[1, 2, 3]);
        let mut m = BTreeMap::new();
        m.insert("Price".to_string(), Value::Bool(true));
        obs.insert(3, vec![Value::Map(m)]);
        let outcome = median_agg().aggregate(None, &obs, 1).unwrap();
        assert_eq!(reported(&outcome, "Price"), Value::Int64(2));

        let mut short = price_obs(&[1, 2]);
        let mut m = BTreeMap::new();
        m.insert("Price".to_string(), Value::from("n/a"));
        short.insert(2, vec![Value::Map(m)]);
        let err = median_agg().aggregate(None, &short, 1).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::NotEnoughFieldObservations { have: 2, want: 3, .. }
        ));
    }

    #[test]
    fn test_mode_picks_majority() {
        let agg = ReduceAggregator::new(ReduceAggregatorConfig::new(vec![AggregationField::new(
            "Price",
            AggregationMethod::Mode,
        )]))
        .unwrap();
        let outcome = agg.aggregate(None, &price_obs(&[7, 9, 7, 7]), 1).unwrap();
        assert_eq!(reported(&outcome, "Price"), Value::Int64(7));
    }

    #[test]
    fn test_mode_ocr_quorum_not_met() {
        let agg = ReduceAggregator::new(ReduceAggregatorConfig::new(vec![AggregationField::new(
            "Price",
            AggregationMethod::Mode,
        )
        .with_mode_quorum(ModeQuorum::Ocr)]))
        .unwrap();
        let err = agg.aggregate(None, &price_obs(&[1, 2, 3, 4]), 1).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::ModeQuorumNotMet { highest: 1, want: 2, .. }
        ));
    }

    #[test]
    fn test_not_enough_nodes() {
        let err = median_agg().aggregate(None, &price_obs(&[1, 2]), 1).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::NotEnoughObservations { have: 2, want: 3 }
        ));
    }

    #[test]
    fn test_field_missing_on_some_nodes() {
        let agg = ReduceAggregator::new(ReduceAggregatorConfig::new(vec![AggregationField::new(
            "Volume",
            AggregationMethod::Median,
        )]))
        .unwrap();
        let err = agg.aggregate(None, &price_obs(&[1, 2, 3]), 1).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::NotEnoughFieldObservations { ref input_key, have: 0, want: 3 }
                if input_key == "Volume"
        ));
    }

    #[test]
    fn test_heartbeat_without_deviation_always_reports() {
        let agg = median_agg();
        let first = agg.aggregate(None, &price_obs(&[5, 5, 5]), 1).unwrap();
        let second = agg
            .aggregate(Some(&first), &price_obs(&[5, 5, 5]), 1)
            .unwrap();
        assert!(first.should_report);
        assert!(second.should_report);
    }

    #[test]
    fn test_absolute_deviation_gate() {
        let agg = ReduceAggregator::new(ReduceAggregatorConfig::new(vec![AggregationField::new(
            "Price",
            AggregationMethod::Median,
        )
        .with_deviation(DeviationKind::Absolute, dec("5"))]))
        .unwrap();

        let first = agg.aggregate(None, &price_obs(&[0, 0, 0]), 1).unwrap();
        assert!(first.should_report, "seeded baseline always reports");

        let small = agg.aggregate(Some(&first), &price_obs(&[5, 5, 5]), 1).unwrap();
        assert!(!small.should_report, "change equal to threshold does not report");

        let large = agg.aggregate(Some(&small), &price_obs(&[11, 11, 11]), 1).unwrap();
        assert!(large.should_report);
    }

    #[test]
    fn test_state_advances_without_report() {
        let agg = ReduceAggregator::new(ReduceAggregatorConfig::new(vec![AggregationField::new(
            "Price",
            AggregationMethod::Median,
        )
        .with_deviation(DeviationKind::Percent, dec("0.1"))]))
        .unwrap();
        let first = agg.aggregate(None, &price_obs(&[100, 100, 100]), 1).unwrap();
        let second = agg.aggregate(Some(&first), &price_obs(&[105, 105, 105]), 1).unwrap();
        assert!(!second.should_report);
        let state = decode_state(&second.metadata).unwrap();
        assert_eq!(state.get("Price"), Some(&Value::Int64(105)));
    }

    #[test]
    fn test_malformed_metadata_fails_round() {
        let previous = AggregationOutcome {
            encodable_outcome: BTreeMap::new(),
            metadata: b"not json".to_vec(),
            should_report: false,
        };
        let err = median_agg()
            .aggregate(Some(&previous), &price_obs(&[1, 2, 3]), 1)
            .unwrap_err();
        assert!(matches!(err, AggregationError::MalformedState(_)));
    }

    #[test]
    fn test_non_map_metadata_fails_round() {
        let previous = AggregationOutcome {
            encodable_outcome: BTreeMap::new(),
            metadata: encode(&Value::Int64(1)).unwrap(),
            should_report: false,
        };
        let err = median_agg()
            .aggregate(Some(&previous), &price_obs(&[1, 2, 3]), 1)
            .unwrap_err();
        assert!(matches!(err, AggregationError::MalformedState(ref m) if m.contains("int64")));
    }

    #[test]
    fn test_empty_metadata_is_empty_state() {
        let previous = AggregationOutcome {
            encodable_outcome: BTreeMap::new(),
            metadata: Vec::new(),
            should_report: false,
        };
        let outcome = median_agg()
            .aggregate(Some(&previous), &price_obs(&[1, 2, 3]), 1)
            .unwrap();
        assert_eq!(reported(&outcome, "Price"), Value::Int64(2));
    }

    #[test]
    fn test_deviation_on_non_numeric_mode_fails() {
        let agg = ReduceAggregator::new(ReduceAggregatorConfig::new(vec![AggregationField::new(
            "Status",
            AggregationMethod::Mode,
        )
        .with_deviation(DeviationKind::Absolute, dec("1"))]))
        .unwrap();
        let obs: Observations = (0..3u8)
            .map(|i| {
                let mut m = BTreeMap::new();
                m.insert("Status".to_string(), Value::from("open"));
                (i, vec![Value::Map(m)])
            })
            .collect();
        let err = agg.aggregate(None, &obs, 1).unwrap_err();
        assert!(matches!(err, AggregationError::Numeric { ref input_key, .. } if input_key == "Status"));
    }
}
