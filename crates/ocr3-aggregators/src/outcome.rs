//! The aggregator contract shared with the round driver.

use std::collections::{BTreeMap, HashMap};

use ocr3_values::Value;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier of an oracle node within the DON.
pub type OracleId = u8;

/// Per-round observations, one ordered list per contributing node.
///
/// Iteration order over nodes is unspecified; aggregators must not depend on it.
pub type Observations = HashMap<OracleId, Vec<Value>>;

/// The result of one aggregation round.
///
/// `metadata` from round *k* is handed back unmodified as the previous
/// outcome of round *k + 1*.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationOutcome {
    /// Report payload.
    pub encodable_outcome: BTreeMap<String, Value>,
    /// Opaque carry-over state, as wire-encoded bytes.
    #[serde(with = "hex")]
    pub metadata: Vec<u8>,
    /// Whether the driver should transmit this report.
    pub should_report: bool,
}

impl AggregationOutcome {
    /// The report payload as a single map value.
    pub fn encodable_outcome_value(&self) -> Value {
        Value::Map(self.encodable_outcome.clone())
    }
}

/// Combines one round of observations into an outcome.
///
/// Implementations are pure: for identical `(previous, observations, f)`
/// every honest node must compute a byte-identical outcome. Per-node
/// anomalies are logged through `tracing` and shrink the sample; they never
/// fail the round on their own.
pub trait Aggregator: Send + Sync {
    fn aggregate(
        &self,
        previous: Option<&AggregationOutcome>,
        observations: &Observations,
        f: u32,
    ) -> Result<AggregationOutcome>;
}

/// Byzantine quorum: `2f + 1`.
pub fn quorum(f: u32) -> usize {
    2 * f as usize + 1
}
