use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// Last two observed prices of one coin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    pub change_percent: f64,
    pub samples: u64,
}

impl PriceSnapshot {
    /// First observation: previous equals current, so no implied change.
    pub fn first(price: f64) -> Self {
        Self {
            current: price,
            previous: price,
            change: 0.0,
            change_percent: 0.0,
            samples: 1,
        }
    }

    pub fn next(&self, price: f64) -> Self {
        let previous = self.current;
        let change_percent = if previous > 0.0 {
            (price - previous) / previous * 100.0
        } else {
            0.0
        };

        Self {
            current: price,
            previous,
            change: price - previous,
            change_percent,
            samples: self.samples.saturating_add(1),
        }
    }

    /// The move since the previous check, if there was a usable previous check.
    pub fn percent_change(&self) -> Option<f64> {
        if self.samples < 2 || self.previous <= 0.0 {
            None
        } else {
            Some(self.change_percent)
        }
    }
}

/// Per-coin snapshots, lost on restart.
#[derive(Debug, Default)]
pub struct PriceHistory {
    snapshots: HashMap<String, PriceSnapshot>,
}

impl PriceHistory {
    pub fn record(&mut self, coin_id: &str, price: f64) -> PriceSnapshot {
        let snapshot = match self.snapshots.get(coin_id) {
            Some(prior) => prior.next(price),
            None => PriceSnapshot::first(price),
        };
        self.snapshots.insert(coin_id.to_string(), snapshot);
        snapshot
    }

    /// Sorted copy for status output.
    pub fn to_map(&self) -> BTreeMap<String, PriceSnapshot> {
        self.snapshots
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_record_has_zero_change_and_no_percent() {
        let mut h = PriceHistory::default();
        let s = h.record("bitcoin", 100.0);
        assert_eq!(s.previous, 100.0);
        assert_eq!(s.change, 0.0);
        assert_eq!(s.percent_change(), None);
        assert_eq!(h.to_map().len(), 1);
    }

    #[test]
    fn second_record_shifts_current_into_previous() {
        let mut h = PriceHistory::default();
        h.record("bitcoin", 100.0);
        let s = h.record("bitcoin", 115.0);
        assert_eq!(s.previous, 100.0);
        assert_eq!(s.current, 115.0);
        assert_eq!(s.change, 15.0);
        assert_eq!(s.percent_change(), Some(15.0));
        assert_eq!(s.samples, 2);

        let s = h.record("bitcoin", 115.0);
        assert_eq!(s.percent_change(), Some(0.0));
    }

    #[test]
    fn coins_are_tracked_independently() {
        let mut h = PriceHistory::default();
        h.record("bitcoin", 100.0);
        h.record("ethereum", 10.0);
        h.record("ethereum", 5.0);

        let map = h.to_map();
        assert_eq!(map["bitcoin"].percent_change(), None);
        assert_eq!(map["ethereum"].percent_change(), Some(-50.0));
        assert_eq!(
            map.keys().cloned().collect::<Vec<_>>(),
            vec!["bitcoin", "ethereum"]
        );
    }
}
