//! Majority counting over fingerprinted values.

use std::collections::BTreeMap;

use ocr3_values::{fingerprint, Fingerprint, Result, Value};

/// Votes for one distinct value within a single aggregation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub representative_value: Value,
    pub count: usize,
}

/// Buckets of structurally equal values, keyed by fingerprint.
///
/// Iteration is in fingerprint order, never in arrival order.
#[derive(Debug, Default)]
pub struct Tally {
    buckets: BTreeMap<Fingerprint, Counter>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more occurrence of `value`.
    pub fn add(&mut self, value: &Value) -> Result<()> {
        let fp = fingerprint(value)?;
        self.buckets
            .entry(fp)
            .and_modify(|c| c.count += 1)
            .or_insert_with(|| Counter {
                representative_value: value.clone(),
                count: 1,
            });
        Ok(())
    }

    /// Build a tally from a sequence of values.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Result<Self> {
        let mut tally = Self::new();
        for v in values {
            tally.add(v)?;
        }
        Ok(tally)
    }

    /// The bucket with the highest count and its fingerprint. Among equal
    /// counts the smallest fingerprint wins.
    pub fn leader_entry(&self) -> Option<(&Fingerprint, &Counter)> {
        let mut best: Option<(&Fingerprint, &Counter)> = None;
        for (fp, counter) in &self.buckets {
            if best.map_or(true, |(_, b)| counter.count > b.count) {
                best = Some((fp, counter));
            }
        }
        best
    }

    pub fn leader(&self) -> Option<&Counter> {
        self.leader_entry().map(|(_, counter)| counter)
    }

    /// Number of distinct values seen.
    pub fn distinct(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_is_highest_count() {
        let values = [Value::from("a"), Value::from("b"), Value::from("b")];
        let tally = Tally::from_values(&values).unwrap();
        let leader = tally.leader().unwrap();
        assert_eq!(leader.representative_value, Value::from("b"));
        assert_eq!(leader.count, 2);
        assert_eq!(tally.distinct(), 2);
    }

    #[test]
    fn test_tie_broken_by_smallest_fingerprint() {
        let a = Value::from("a");
        let b = Value::from("b");
        let expected = if fingerprint(&a).unwrap() < fingerprint(&b).unwrap() {
            a.clone()
        } else {
            b.clone()
        };

        let forward = Tally::from_values([&a, &b]).unwrap();
        let backward = Tally::from_values([&b, &a]).unwrap();
        assert_eq!(forward.leader().unwrap().representative_value, expected);
        assert_eq!(backward.leader().unwrap().representative_value, expected);
    }

    #[test]
    fn test_empty_tally_has_no_leader() {
        let tally = Tally::new();
        assert_eq!(tally.distinct(), 0);
        assert!(tally.leader().is_none());
    }

    #[test]
    fn test_leader_entry_carries_value_fingerprint() {
        let values = [Value::Int64(7), Value::Int64(7), Value::Int64(8)];
        let tally = Tally::from_values(&values).unwrap();
        let (fp, counter) = tally.leader_entry().unwrap();
        assert_eq!(*fp, fingerprint(&Value::Int64(7)).unwrap());
        assert_eq!(counter.count, 2);
    }

    #[test]
    fn test_non_finite_value_fails_tally() {
        assert!(Tally::from_values([&Value::Float64(f64::NAN)]).is_err());
    }
}
