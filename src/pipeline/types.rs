//! Data types used by the rent trend pipeline.

use serde::Serialize;
use std::collections::BTreeMap;

/// One (structure type, unit type, value) observation inside a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub structure: String,
    pub unit: String,
    pub value: f64,
}

/// A normalized (city, province, year) observation with its nested entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub city: String,
    pub province: String,
    pub year: i32,
    pub population: Option<f64>,
    pub entries: Vec<Entry>,
}

/// Records of one category and year folded together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    pub category: String,
    pub year: i32,
    /// Sum over contributors that reported a population.
    pub population: Option<f64>,
    /// Mean of the contributors' filtered averages.
    pub value: f64,
    pub contributors: usize,
}

/// An aggregated record with its change against the category's earliest year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    #[serde(flatten)]
    pub record: AggregatedRecord,
    pub population_change_pct: Option<f64>,
    pub value_change_pct: Option<f64>,
}

/// Mean value change of one category inside one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BucketCell {
    /// `None` when no record of the category fell into the bucket.
    pub mean_value_change: Option<f64>,
    pub samples: usize,
}

/// A population-change interval of the stacked chart's x-axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
    pub cells: BTreeMap<String, BucketCell>,
}

impl Bucket {
    /// Intervals are `(lower, upper]`; the first one also admits `lower`.
    pub fn contains(&self, value: f64) -> bool {
        let above = if self.index == 0 {
            value >= self.lower
        } else {
            value > self.lower
        };
        above && value <= self.upper
    }
}
