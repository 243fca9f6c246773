//! OCR3 value model
//!
//! The tagged union exchanged by oracle nodes, with:
//! - `Value`: closed sum type over strings, numbers, time, bytes, lists and maps
//! - `wire`: stable, canonical wire encoding (`encode` / `decode`)
//! - `canonical`: SHA-256 fingerprints used to group structurally equal values

pub mod canonical;
pub mod error;
pub mod value;
pub mod wire;

pub use canonical::{canonical_json, fingerprint, Fingerprint};
pub use error::{Result, ValueError};
pub use value::Value;
pub use wire::{decode, encode};

pub use num_bigint::BigInt;
pub use rust_decimal::Decimal;

/// ocr3-values version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
