//! Range filtering and domain statistics.
//!
//! Filters always read the caller's full record set and return a fresh
//! subset; nothing here narrows data in place, so successive brushes never
//! compound.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Record, RecordSet, TimeAxis, TimeWindow};

/// `[min, max]` of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub min: f64,
    pub max: f64,
}

impl Domain {
    fn widen(self, v: f64) -> Self {
        Self {
            min: self.min.min(v),
            max: self.max.max(v),
        }
    }
}

/// Records whose `field` lies in `[low, high]`, in their original order.
/// Records where the field is absent or missing never match.
pub fn filter_by_range(records: &[Record], field: &str, low: f64, high: f64) -> RecordSet {
    records
        .iter()
        .filter(|r| r.number(field).is_some_and(|v| low <= v && v <= high))
        .cloned()
        .collect()
}

/// Records whose time coordinate falls inside `window`.
pub fn filter_window(records: &[Record], window: &TimeWindow) -> RecordSet {
    within_window(records, window).into_iter().cloned().collect()
}

/// Anything carrying time coordinates.
pub trait Sampled {
    fn time(&self, axis: TimeAxis) -> Option<f64>;
}

impl Sampled for Record {
    fn time(&self, axis: TimeAxis) -> Option<f64> {
        self.number(axis.field())
    }
}

/// Borrow the samples inside `window`, in their original order.
pub fn within_window<'a, T: Sampled>(samples: &'a [T], window: &TimeWindow) -> Vec<&'a T> {
    samples
        .iter()
        .filter(|s| s.time(window.axis).is_some_and(|t| window.contains(t)))
        .collect()
}

/// `[min, max]` of each named field, skipping missing values. Fields with no
/// present value at all are left out of the result.
pub fn domains(records: &[Record], fields: &[&str]) -> BTreeMap<String, Domain> {
    let mut out = BTreeMap::new();
    for field in fields {
        let domain = records
            .iter()
            .filter_map(|r| r.number(field))
            .fold(None, |acc: Option<Domain>, v| {
                Some(match acc {
                    None => Domain { min: v, max: v },
                    Some(d) => d.widen(v),
                })
            });
        if let Some(d) = domain {
            out.insert(field.to_string(), d);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    fn samples() -> RecordSet {
        vec![
            Record::new().with("RT", 0.5).with("GVT", 10.0),
            Record::new().with("RT", 1.0).with("GVT", Field::Missing),
            Record::new().with("RT", 1.5).with("GVT", 30.0),
            Record::new().with("RT", 2.0).with("GVT", 20.0),
            Record::new().with("RT", 3.0).with("GVT", 50.0),
        ]
    }

    #[test]
    fn test_filter_inclusive_and_ordered() {
        let data = samples();
        let hit = filter_by_range(&data, "RT", 1.0, 2.0);
        assert_eq!(hit.len(), 3);
        let rts: Vec<f64> = hit.iter().filter_map(|r| r.number("RT")).collect();
        assert_eq!(rts, vec![1.0, 1.5, 2.0]);
        assert!(hit.iter().all(|r| data.contains(r)));
    }

    #[test]
    fn test_filter_skips_missing_and_inverted_range() {
        let data = samples();
        assert_eq!(filter_by_range(&data, "GVT", 0.0, 100.0).len(), 4);
        assert!(filter_by_range(&data, "RT", 2.0, 1.0).is_empty());
        assert!(filter_by_range(&data, "nope", 0.0, 1.0).is_empty());
    }

    #[test]
    fn test_filter_is_non_destructive() {
        let data = samples();
        let narrow = filter_by_range(&data, "RT", 0.0, 1.0);
        let wide = filter_by_range(&data, "RT", 0.0, 3.0);
        assert_eq!(narrow.len(), 2);
        assert_eq!(wide.len(), data.len());
    }

    #[test]
    fn test_window_left_open() {
        let data = samples();
        let window = TimeWindow::left_open(TimeAxis::Gvt, 10.0, 30.0);
        let hit = filter_window(&data, &window);
        let gvts: Vec<f64> = hit.iter().filter_map(|r| r.number("GVT")).collect();
        assert_eq!(gvts, vec![30.0, 20.0]);
    }

    #[test]
    fn test_domains_skip_missing() {
        let data = samples();
        let d = domains(&data[..4], &["GVT", "RT", "absent"]);
        assert_eq!(d["GVT"], Domain { min: 10.0, max: 30.0 });
        assert_eq!(d["RT"], Domain { min: 0.5, max: 2.0 });
        assert!(!d.contains_key("absent"));
    }
}
