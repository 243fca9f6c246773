//! Structured observability hooks for aggregation rounds.
//!
//! This module provides:
//! - Round-scoped tracing spans via the `RoundSpan` RAII guard
//! - Emission functions for per-node anomalies and round results
//!
//! Per-node anomalies are emitted at `warn!` level and never affect control
//! flow. Set `RUST_LOG` to filter.

use ocr3_values::Fingerprint;
use tracing::{info, warn};

use crate::metrics::METRICS;
use crate::outcome::OracleId;

/// RAII guard that enters a round-scoped span for one `aggregate` call.
///
/// # Example
///
/// ```ignore
/// let _span = RoundSpan::enter("reduce", 1);
/// // every event below is tagged with aggregator = "reduce", f = 1
/// ```
pub struct RoundSpan {
    _span: tracing::span::EnteredSpan,
}

impl RoundSpan {
    /// Create and enter a span tagged with the aggregator name and fault bound.
    pub fn enter(aggregator: &str, f: u32) -> Self {
        let span = tracing::info_span!("ocr3.aggregate", aggregator = %aggregator, f = f);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a node's contribution was dropped from the sample.
pub fn emit_observation_skipped(oracle: OracleId, key: &str, reason: &str) {
    METRICS.inc_observations_skipped();
    warn!(
        event = "observation.skipped",
        oracle = oracle,
        key = %key,
        reason = %reason,
    );
}

/// Emit event: no value at a position reached the quorum.
///
/// `leader` is the short fingerprint of the best-supported value, if any.
pub fn emit_consensus_failed(
    index: usize,
    leader: Option<&Fingerprint>,
    distinct: usize,
    highest: usize,
    want: usize,
) {
    warn!(
        event = "consensus.failed",
        index = index,
        leader = %leader.map(Fingerprint::short).unwrap_or_default(),
        distinct = distinct,
        highest = highest,
        want = want,
    );
}

/// Emit event: a round produced an outcome.
pub fn emit_round_aggregated(aggregator: &str, entries: usize, should_report: bool) {
    METRICS.inc_rounds_aggregated();
    if should_report {
        METRICS.inc_reports_requested();
    }
    info!(
        event = "round.aggregated",
        aggregator = %aggregator,
        entries = entries,
        should_report = should_report,
    );
}

/// Emit event: a round failed and returns no outcome.
pub fn emit_round_failed(aggregator: &str, error: &dyn std::fmt::Display) {
    METRICS.inc_rounds_failed();
    warn!(event = "round.failed", aggregator = %aggregator, error = %error);
}
