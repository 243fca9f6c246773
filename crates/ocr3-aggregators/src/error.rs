//! Error taxonomy for aggregator construction and per-round aggregation.

use ocr3_values::ValueError;

/// Construction-time failures. An aggregator that fails here is unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config field: {0}")]
    MissingField(String),

    #[error("invalid config field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("reduce aggregator must contain at least one field")]
    NoFields,

    #[error("unsupported aggregation method: {0}")]
    UnsupportedMethod(String),

    #[error("unsupported deviation type: {0}")]
    UnsupportedDeviationType(String),

    #[error("field {input_key}: deviation and deviationType must be set together")]
    IncompleteDeviation { input_key: String },

    #[error("field {input_key}: invalid deviation {value:?}")]
    InvalidDeviation { input_key: String, value: String },

    #[error("field {input_key}: modeQuorum applies only to mode fields")]
    ModeQuorumOnMedian { input_key: String },

    #[error("unsupported mode quorum: {0}")]
    UnsupportedModeQuorum(String),

    #[error("unsupported report format: {0}")]
    UnsupportedReportFormat(String),

    #[error("expectedObservationsLen must be greater than zero")]
    ZeroObservationsLen,

    #[error("keyOverrides has {actual} entries, expected {expected}")]
    KeyOverridesLength { expected: usize, actual: usize },

    #[error("unknown aggregator: {0}")]
    UnknownAggregator(String),

    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// Failures while coercing values to decimals or measuring change.
#[derive(Debug, thiserror::Error)]
pub enum NumericError {
    #[error("cannot convert {kind} to decimal")]
    Unsupported { kind: &'static str },

    #[error("cannot parse {input:?} as decimal")]
    Unparseable { input: String },

    #[error("decimal overflow while {0}")]
    Overflow(&'static str),
}

/// Per-round failures. The round produces no outcome.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("not enough observations, have {have} want {want}")]
    NotEnoughObservations { have: usize, want: usize },

    #[error("not enough observations provided for {input_key}, have {have} want {want}")]
    NotEnoughFieldObservations {
        input_key: String,
        have: usize,
        want: usize,
    },

    #[error("cannot reach consensus on observations at index {index}, highest count {highest} want {want}")]
    NoConsensus {
        index: usize,
        highest: usize,
        want: usize,
    },

    #[error("mode quorum not met for {input_key}, highest count {highest} want {want}")]
    ModeQuorumNotMet {
        input_key: String,
        highest: usize,
        want: usize,
    },

    #[error("malformed previous outcome metadata: {0}")]
    MalformedState(String),

    #[error("field {input_key}: {source}")]
    Numeric {
        input_key: String,
        #[source]
        source: NumericError,
    },

    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// Result type for aggregation rounds.
pub type Result<T> = std::result::Result<T, AggregationError>;

/// Result type for config parsing.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
