use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::normalize::{LocationFormat, NormalizeReport, RawRecord, normalize};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::binning::bin;
use crate::pipeline::change::compute_changes;
use crate::pipeline::config::{PipelineConfig, RollupMode};
use crate::pipeline::types::{AggregatedRecord, Bucket, CanonicalRecord, ChangeRecord};

/// Derived series for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub mode: RollupMode,
    pub categories: Vec<String>,
    pub aggregated: Vec<AggregatedRecord>,
    pub changes: Vec<ChangeRecord>,
    pub buckets: Vec<Bucket>,
}

/// Canonical records normalized once, rerun against any [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    records: Vec<CanonicalRecord>,
    cities: BTreeMap<String, Vec<String>>,
    structure_types: Vec<String>,
    unit_types: Vec<String>,
}

impl Pipeline {
    pub fn new(records: Vec<CanonicalRecord>) -> Self {
        let mut cities: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut structures = BTreeSet::new();
        let mut units = BTreeSet::new();

        for record in &records {
            cities
                .entry(record.province.clone())
                .or_default()
                .insert(record.city.clone());
            for entry in &record.entries {
                structures.insert(entry.structure.clone());
                units.insert(entry.unit.clone());
            }
        }

        Pipeline {
            records,
            cities: cities
                .into_iter()
                .map(|(province, set)| (province, set.into_iter().collect()))
                .collect(),
            structure_types: structures.into_iter().collect(),
            unit_types: units.into_iter().collect(),
        }
    }

    /// Normalizes `raws` and builds a pipeline over the result.
    pub fn from_raw(raws: &[RawRecord], format: LocationFormat) -> (Self, NormalizeReport) {
        let (records, report) = normalize(raws, format);
        (Self::new(records), report)
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn provinces(&self) -> impl Iterator<Item = &str> {
        self.cities.keys().map(String::as_str)
    }

    /// Cities of `province`, sorted; empty for an unknown province.
    pub fn cities(&self, province: &str) -> &[String] {
        self.cities.get(province).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn structure_types(&self) -> &[String] {
        &self.structure_types
    }

    pub fn unit_types(&self) -> &[String] {
        &self.unit_types
    }

    /// Province rollup with every observed type enabled.
    pub fn default_config(&self) -> PipelineConfig {
        PipelineConfig::for_records(&self.records)
    }

    /// Chart categories for `mode`.
    pub fn categories(&self, mode: &RollupMode) -> Vec<String> {
        match mode {
            RollupMode::Province => self.provinces().map(str::to_string).collect(),
            RollupMode::City { province } => self.cities(province).to_vec(),
        }
    }

    /// Drills down into the cities of `province`.
    pub fn select_province(&self, config: &PipelineConfig, province: &str) -> Result<PipelineConfig> {
        if !self.cities.contains_key(province) {
            bail!("unknown province: {}", province);
        }
        Ok(config.with_mode(RollupMode::City {
            province: province.to_string(),
        }))
    }

    /// Returns to the province rollup.
    pub fn back(&self, config: &PipelineConfig) -> PipelineConfig {
        config.with_mode(RollupMode::Province)
    }

    /// Click on a chart category: a province drills down, a city goes back up.
    pub fn toggle(&self, config: &PipelineConfig, category: &str) -> Result<PipelineConfig> {
        match &config.mode {
            RollupMode::Province => self.select_province(config, category),
            RollupMode::City { province } => {
                if !self.cities(province).iter().any(|c| c == category) {
                    bail!("{} is not a city of {}", category, province);
                }
                Ok(self.back(config))
            }
        }
    }

    /// Runs aggregation, change calculation and binning from scratch.
    #[tracing::instrument(skip_all, fields(mode = ?config.mode, buckets = config.bucket_count))]
    pub fn run(&self, config: &PipelineConfig) -> PipelineOutput {
        let aggregated = aggregate(&self.records, config);
        debug!(aggregated = aggregated.len(), "Records aggregated");

        let changes = compute_changes(&aggregated);
        let buckets = bin(&changes, config.bucket_count, config.boundaries);

        info!(
            records = self.records.len(),
            aggregated = aggregated.len(),
            buckets = buckets.len(),
            "Pipeline run complete"
        );

        PipelineOutput {
            mode: config.mode.clone(),
            categories: self.categories(&config.mode),
            aggregated,
            changes,
            buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Cell;

    fn raw(location: &str, year: f64, unit: &str, value: f64, population: f64) -> RawRecord {
        RawRecord {
            location: location.to_string(),
            year: Cell::Number(year),
            population: Cell::Number(population),
            structure: "Apartment structures of three units and over".to_string(),
            unit: unit.to_string(),
            value: Cell::Number(value),
        }
    }

    fn pipeline() -> Pipeline {
        let raws = vec![
            raw("Toronto, Ontario", 2001.0, "Bachelor units", 700.0, 4000.0),
            raw("Toronto, Ontario", 2002.0, "Bachelor units", 770.0, 4100.0),
            raw("Ottawa, Ontario", 2001.0, "Bachelor units", 500.0, 800.0),
            raw("Ottawa, Ontario", 2002.0, "Bachelor units", 520.0, 820.0),
            raw("Halifax, Nova Scotia", 2001.0, "One bedroom units", 600.0, 350.0),
            raw("Halifax, Nova Scotia", 2002.0, "One bedroom units", 630.0, 360.0),
        ];
        Pipeline::from_raw(&raws, LocationFormat::default()).0
    }

    #[test]
    fn test_catalog() {
        let p = pipeline();
        assert_eq!(p.provinces().collect::<Vec<_>>(), vec!["Nova Scotia", "Ontario"]);
        assert_eq!(p.cities("Ontario"), &["Ottawa".to_string(), "Toronto".to_string()]);
        assert!(p.cities("Yukon").is_empty());
        assert_eq!(p.unit_types().len(), 2);
        assert_eq!(p.structure_types().len(), 1);
    }

    #[test]
    fn test_province_run() {
        let p = pipeline();
        let out = p.run(&p.default_config());

        assert_eq!(out.categories, vec!["Nova Scotia", "Ontario"]);
        assert_eq!(out.aggregated.len(), 4);
        assert_eq!(out.changes.len(), 4);
        assert_eq!(out.buckets.len(), 11);

        let ontario_2002 = out
            .changes
            .iter()
            .find(|c| c.record.category == "Ontario" && c.record.year == 2002)
            .unwrap();
        // (645 - 600) / 600
        assert!((ontario_2002.value_change_pct.unwrap() - 7.5).abs() < 1e-9);
        // (4920 - 4800) / 4800
        assert!((ontario_2002.population_change_pct.unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_drill_down_and_back() {
        let p = pipeline();
        let config = p.default_config();

        let city = p.toggle(&config, "Ontario").unwrap();
        let out = p.run(&city);
        assert_eq!(out.categories, vec!["Ottawa", "Toronto"]);
        assert!(out.aggregated.iter().all(|r| r.category != "Nova Scotia"));

        let back = p.toggle(&city, "Toronto").unwrap();
        assert_eq!(back.mode, RollupMode::Province);
        assert_eq!(p.run(&back), p.run(&config));
    }

    #[test]
    fn test_toggle_rejects_unknown_categories() {
        let p = pipeline();
        let config = p.default_config();
        assert!(p.toggle(&config, "Atlantis").is_err());

        let city = p.select_province(&config, "Nova Scotia").unwrap();
        assert!(p.toggle(&city, "Toronto").is_err());
    }
}
