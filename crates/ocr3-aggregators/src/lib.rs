//! OCR3 aggregation core
//!
//! Deterministically combines one round of per-node observations into a
//! single report and decides whether it should be transmitted:
//! - `IdenticalAggregator`: exact agreement among `2f + 1` nodes per position
//! - `ReduceAggregator`: per-field median/mode with deviation-gated reporting
//!
//! Every honest node given the same `(previous, observations, f)` computes a
//! byte-identical outcome; no result depends on node iteration order.

pub mod config;
pub mod counter;
pub mod error;
pub mod extract;
pub mod identical;
pub mod metrics;
pub mod numeric;
pub mod obs;
pub mod outcome;
pub mod reduce;
pub mod registry;
pub mod telemetry;

pub use config::{
    AggregationField, AggregationMethod, Deviation, IdenticalAggregatorConfig, ModeQuorum,
    ReduceAggregatorConfig, ReportFormat, DEFAULT_OUTPUT_FIELD_NAME,
};
pub use counter::{Counter, Tally};
pub use error::{AggregationError, ConfigError, ConfigResult, NumericError, Result};
pub use extract::{extract, extract_with_origin};
pub use identical::IdenticalAggregator;
pub use metrics::METRICS;
pub use numeric::{deviation, to_decimal, DeviationKind};
pub use obs::RoundSpan;
pub use outcome::{quorum, AggregationOutcome, Aggregator, Observations, OracleId};
pub use reduce::{decode_state, CurrentState, ReduceAggregator};
pub use registry::{new_aggregator, AggregatorKind};
pub use telemetry::init_tracing;

pub use ocr3_values::{Decimal, Value};

/// ocr3-aggregators version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
