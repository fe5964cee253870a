use serde::Serialize;

use crate::pipeline::filters::FilterSet;
use crate::pipeline::types::CanonicalRecord;

/// Number of population-change buckets on the stacked chart.
pub const DEFAULT_BUCKET_COUNT: usize = 11;

/// Which category records are rolled up into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RollupMode {
    /// One category per province.
    Province,
    /// One category per city of the selected province.
    City { province: String },
}

impl RollupMode {
    /// Category a record belongs to, or `None` if the mode excludes it.
    pub fn category_of<'a>(&self, record: &'a CanonicalRecord) -> Option<&'a str> {
        match self {
            RollupMode::Province => Some(record.province.as_str()),
            RollupMode::City { province } if record.province == *province => {
                Some(record.city.as_str())
            }
            RollupMode::City { .. } => None,
        }
    }
}

/// How bucket boundaries are laid out over the population-change range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrategy {
    /// `bucket_count` intervals of equal width.
    #[default]
    EqualWidth,
    /// Intervals aligned on a 1, 2 or 5 x 10^k step.
    Nice,
}

/// Everything one pipeline run depends on besides the records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub structures: FilterSet,
    pub units: FilterSet,
    pub mode: RollupMode,
    pub bucket_count: usize,
    pub boundaries: BoundaryStrategy,
}

impl PipelineConfig {
    /// Province rollup with every structure and unit type observed in `records`.
    pub fn for_records(records: &[CanonicalRecord]) -> Self {
        let entries = records.iter().flat_map(|r| r.entries.iter());
        PipelineConfig {
            structures: FilterSet::all_enabled(entries.clone().map(|e| e.structure.clone())),
            units: FilterSet::all_enabled(entries.map(|e| e.unit.clone())),
            mode: RollupMode::Province,
            bucket_count: DEFAULT_BUCKET_COUNT,
            boundaries: BoundaryStrategy::default(),
        }
    }

    pub fn with_structure(&self, kind: &str, include: bool) -> Self {
        PipelineConfig {
            structures: self.structures.with(kind, include),
            ..self.clone()
        }
    }

    pub fn with_unit(&self, kind: &str, include: bool) -> Self {
        PipelineConfig {
            units: self.units.with(kind, include),
            ..self.clone()
        }
    }

    pub fn with_mode(&self, mode: RollupMode) -> Self {
        PipelineConfig {
            mode,
            ..self.clone()
        }
    }

    /// Bucket count is clamped to at least one.
    pub fn with_bucket_count(&self, bucket_count: usize) -> Self {
        PipelineConfig {
            bucket_count: bucket_count.max(1),
            ..self.clone()
        }
    }

    pub fn with_boundaries(&self, boundaries: BoundaryStrategy) -> Self {
        PipelineConfig {
            boundaries,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Entry;

    fn record(city: &str, province: &str, unit: &str) -> CanonicalRecord {
        CanonicalRecord {
            city: city.to_string(),
            province: province.to_string(),
            year: 2001,
            population: None,
            entries: vec![Entry {
                structure: "A3P".to_string(),
                unit: unit.to_string(),
                value: 1.0,
            }],
        }
    }

    #[test]
    fn test_for_records_enables_observed_types() {
        let records = vec![
            record("Toronto", "Ontario", "Bachelor units"),
            record("Halifax", "Nova Scotia", "One bedroom units"),
        ];
        let config = PipelineConfig::for_records(&records);

        assert!(config.structures.allows("A3P"));
        assert!(config.units.allows("Bachelor units"));
        assert!(config.units.allows("One bedroom units"));
        assert_eq!(config.mode, RollupMode::Province);
        assert_eq!(config.bucket_count, DEFAULT_BUCKET_COUNT);
    }

    #[test]
    fn test_category_of() {
        let r = record("Toronto", "Ontario", "Bachelor units");
        assert_eq!(RollupMode::Province.category_of(&r), Some("Ontario"));
        let ontario = RollupMode::City {
            province: "Ontario".to_string(),
        };
        assert_eq!(ontario.category_of(&r), Some("Toronto"));
        let quebec = RollupMode::City {
            province: "Quebec".to_string(),
        };
        assert_eq!(quebec.category_of(&r), None);
    }

    #[test]
    fn test_bucket_count_is_clamped() {
        let config = PipelineConfig::for_records(&[]).with_bucket_count(0);
        assert_eq!(config.bucket_count, 1);
    }
}
