//! Pulling one field out of every node's observation.
//!
//! Each node is expected to contribute exactly one observation per round.
//! Anything else is logged and dropped; the caller decides whether what
//! remains is enough.

use ocr3_values::Value;

use crate::obs::emit_observation_skipped;
use crate::outcome::{Observations, OracleId};

/// Extract `input_key` from each node's single observation.
///
/// The result order is unspecified.
pub fn extract(observations: &Observations, input_key: &str) -> Vec<Value> {
    extract_with_origin(observations, input_key)
        .into_iter()
        .map(|(_, v)| v)
        .collect()
}

/// Like [`extract`], keeping the contributing node next to each value.
pub fn extract_with_origin(observations: &Observations, input_key: &str) -> Vec<(OracleId, Value)> {
    let mut extracted = Vec::with_capacity(observations.len());
    for (&oracle, contribution) in observations {
        match lookup(contribution, input_key) {
            Ok(v) => extracted.push((oracle, v.clone())),
            Err(reason) => emit_observation_skipped(oracle, input_key, &reason),
        }
    }
    extracted
}

fn lookup<'a>(contribution: &'a [Value], input_key: &str) -> Result<&'a Value, String> {
    let first = match contribution {
        [] => return Err("node contributed no observations".to_string()),
        [first, ..] if first.is_nil() => return Err("first observation is nil".to_string()),
        [only] => only,
        more => {
            return Err(format!(
                "expected exactly one observation, got {}",
                more.len()
            ))
        }
    };

    match first {
        Value::Map(map) => map
            .get(input_key)
            .ok_or_else(|| "key missing from map observation".to_string()),
        Value::List(list) => {
            let index: usize = input_key
                .parse()
                .map_err(|_| "key is not a list index".to_string())?;
            list.get(index)
                .ok_or_else(|| format!("index {index} out of range for {} elements", list.len()))
        }
        scalar if input_key.is_empty() => Ok(scalar),
        scalar => Err(format!(
            "{} observation cannot be indexed by a key",
            scalar.kind()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn obs(entries: Vec<(OracleId, Vec<Value>)>) -> Observations {
        entries.into_iter().collect()
    }

    fn json(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_extract_map_key() {
        let o = obs(vec![
            (1, vec![json(serde_json::json!({ "Price": 10 }))]),
            (2, vec![json(serde_json::json!({ "Price": 12, "Other": 1 }))]),
        ]);
        let mut got = extract(&o, "Price");
        got.sort_by_key(|v| i64::try_from(v).unwrap());
        assert_eq!(got, vec![Value::Int64(10), Value::Int64(12)]);
    }

    #[test]
    fn test_extract_list_index() {
        let o = obs(vec![(1, vec![json(serde_json::json!(["a", "b"]))])]);
        assert_eq!(extract(&o, "1"), vec![Value::from("b")]);
    }

    #[test]
    fn test_extract_scalar_requires_empty_key() {
        let o = obs(vec![(1, vec![Value::Int64(5)])]);
        assert_eq!(extract(&o, ""), vec![Value::Int64(5)]);
        assert!(extract(&o, "Price").is_empty());
    }

    #[traced_test]
    #[test]
    fn test_extract_skips_malformed_nodes() {
        let o = obs(vec![
            (1, vec![]),
            (2, vec![Value::Nil]),
            (3, vec![json(serde_json::json!({ "Price": 1 })), json(serde_json::json!({ "Price": 2 }))]),
            (4, vec![json(serde_json::json!({ "Volume": 1 }))]),
            (5, vec![json(serde_json::json!([1]))]),
            (6, vec![json(serde_json::json!({ "Price": 9 }))]),
        ]);
        assert_eq!(extract(&o, "Price"), vec![Value::Int64(9)]);
        assert!(logs_contain("node contributed no observations"));
        assert!(logs_contain("first observation is nil"));
        assert!(logs_contain("expected exactly one observation, got 2"));
        assert!(logs_contain("key missing from map observation"));
        assert!(logs_contain("key is not a list index"));
    }

    #[traced_test]
    #[test]
    fn test_extract_list_index_out_of_range() {
        let o = obs(vec![(1, vec![json(serde_json::json!(["a"]))])]);
        assert!(extract(&o, "3").is_empty());
        assert!(logs_contain("index 3 out of range"));
    }

    #[test]
    fn test_extract_with_origin_keeps_oracle() {
        let o = obs(vec![(7, vec![json(serde_json::json!({ "k": true }))])]);
        assert_eq!(extract_with_origin(&o, "k"), vec![(7, Value::Bool(true))]);
    }
}
