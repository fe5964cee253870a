//! Quarterly mortgage payments per province and metro area, rated against a
//! household income.
//!
//! The timeseries is a JSON document:
//! ```json
//! {
//!   "quarters": ["2024Q4", "2025Q1"],
//!   "provinces": {
//!     "ON": { "name": "Ontario", "fullName": "Ontario", "quarters": { "2025Q1": 3120 } }
//!   },
//!   "cmas": [
//!     { "name": "Toronto", "province": "ON", "lat": 43.65, "lon": -79.38, "quarters": { "2025Q1": 3900 } }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::compare::affordability::Affordability;
use crate::pipeline::utility::mean;

/// Annual household income the map starts from.
pub const DEFAULT_ANNUAL_INCOME: f64 = 75_000.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceSeries {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub quarters: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CmaSeries {
    pub name: String,
    pub province: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub quarters: BTreeMap<String, Option<f64>>,
}

/// Average monthly payment per quarter, keyed by province code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MortgageTimeseries {
    pub quarters: Vec<String>,
    pub provinces: BTreeMap<String, ProvinceSeries>,
    #[serde(default)]
    pub cmas: Vec<CmaSeries>,
}

impl MortgageTimeseries {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let series: Self = serde_json::from_slice(bytes).context("Invalid mortgage timeseries")?;
        debug!(
            quarters = series.quarters.len(),
            provinces = series.provinces.len(),
            cmas = series.cmas.len(),
            "Mortgage timeseries loaded"
        );
        Ok(series)
    }

    pub fn latest(&self) -> Option<usize> {
        self.quarters.len().checked_sub(1)
    }

    /// Finds a quarter written as `2025Q2` or `2025 Q2`.
    pub fn quarter_index(&self, quarter: &str) -> Option<usize> {
        let wanted: String = quarter.chars().filter(|c| !c.is_whitespace()).collect();
        self.quarters.iter().position(|q| q.eq_ignore_ascii_case(&wanted))
    }

    /// Quarter after `index`, wrapping back to the first.
    pub fn next_quarter(&self, index: usize) -> usize {
        match self.quarters.len() {
            0 => 0,
            len => (index + 1) % len,
        }
    }

    /// Payments of every province and metro area for one quarter. A quarter
    /// missing from a series reads as `None`.
    pub fn snapshot(&self, index: usize) -> Option<QuarterSnapshot> {
        let quarter = self.quarters.get(index)?;
        let payment = |quarters: &BTreeMap<String, Option<f64>>| quarters.get(quarter).copied().flatten();

        let provinces = self
            .provinces
            .iter()
            .map(|(code, series)| ProvincePayment {
                code: code.clone(),
                name: series.name.clone(),
                full_name: series.full_name.clone(),
                payment: payment(&series.quarters),
            })
            .collect();

        let cmas = self
            .cmas
            .iter()
            .map(|cma| CmaPayment {
                name: cma.name.clone(),
                province: cma.province.clone(),
                payment: payment(&cma.quarters),
            })
            .collect();

        Some(QuarterSnapshot {
            quarter: quarter.clone(),
            provinces,
            cmas,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvincePayment {
    pub code: String,
    pub name: String,
    pub full_name: String,
    pub payment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CmaPayment {
    pub name: String,
    pub province: String,
    pub payment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterSnapshot {
    pub quarter: String,
    pub provinces: Vec<ProvincePayment>,
    pub cmas: Vec<CmaPayment>,
}

/// A payment with its share of income.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedPayment {
    pub name: String,
    pub region: String,
    pub payment: f64,
    pub affordability: Affordability,
}

impl QuarterSnapshot {
    /// Mean province payment, rounded to whole dollars. Provinces without a
    /// payment this quarter are left out.
    pub fn national_payment(&self) -> Option<f64> {
        let payments: Vec<f64> = self.provinces.iter().filter_map(|p| p.payment).collect();
        mean(&payments).map(f64::round)
    }

    /// Provinces with a payment, most affordable first.
    pub fn rank_provinces(&self, annual_income: f64) -> Vec<RatedPayment> {
        let mut ranked: Vec<RatedPayment> = self
            .provinces
            .iter()
            .filter_map(|p| {
                let payment = p.payment?;
                Some(RatedPayment {
                    name: p.full_name.clone(),
                    region: p.code.clone(),
                    payment,
                    affordability: Affordability::annual(payment, annual_income)?,
                })
            })
            .collect();
        ranked.sort_by(|a, b| a.affordability.percent.total_cmp(&b.affordability.percent));
        ranked
    }

    /// Metro areas with a payment, in series order.
    pub fn rate_cmas(&self, annual_income: f64) -> Vec<RatedPayment> {
        self.cmas
            .iter()
            .filter_map(|c| {
                let payment = c.payment?;
                Some(RatedPayment {
                    name: c.name.clone(),
                    region: c.province.clone(),
                    payment,
                    affordability: Affordability::annual(payment, annual_income)?,
                })
            })
            .collect()
    }
}

/// National average payment and its share of income.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalSummary {
    pub quarter: String,
    pub payment: f64,
    pub affordability: Affordability,
}

/// Everything the affordability map shows for one quarter and income.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffordabilityReport {
    pub quarter: String,
    pub annual_income: f64,
    pub national: Option<NationalSummary>,
    pub most_affordable: Option<RatedPayment>,
    pub least_affordable: Option<RatedPayment>,
    pub provinces: Vec<RatedPayment>,
    pub cmas: Vec<RatedPayment>,
}

impl AffordabilityReport {
    pub fn new(snapshot: &QuarterSnapshot, annual_income: f64) -> Self {
        let provinces = snapshot.rank_provinces(annual_income);
        AffordabilityReport {
            quarter: snapshot.quarter.clone(),
            annual_income,
            national: national_summary(snapshot, annual_income),
            most_affordable: provinces.first().cloned(),
            least_affordable: provinces.last().cloned(),
            cmas: snapshot.rate_cmas(annual_income),
            provinces,
        }
    }
}

fn national_summary(snapshot: &QuarterSnapshot, annual_income: f64) -> Option<NationalSummary> {
    let payment = snapshot.national_payment()?;
    Some(NationalSummary {
        quarter: snapshot.quarter.clone(),
        payment,
        affordability: Affordability::annual(payment, annual_income)?,
    })
}

/// National summary for every quarter that has province payments.
pub fn national_series(series: &MortgageTimeseries, annual_income: f64) -> Vec<NationalSummary> {
    (0..series.quarters.len())
        .filter_map(|index| series.snapshot(index))
        .filter_map(|snapshot| national_summary(&snapshot, annual_income))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::affordability::AffordabilityStatus;

    const SERIES: &str = r#"{
        "quarters": ["2024Q4", "2025Q1", "2025Q2"],
        "provinces": {
            "AB": { "name": "Alberta", "fullName": "Alberta", "quarters": { "2024Q4": 1800, "2025Q1": 1900, "2025Q2": 2000 } },
            "BC": { "name": "B.C.", "fullName": "British Columbia", "quarters": { "2025Q1": 3600, "2025Q2": 3500 } },
            "ON": { "name": "Ontario", "fullName": "Ontario", "quarters": { "2024Q4": 2900, "2025Q1": 3000, "2025Q2": null } }
        },
        "cmas": [
            { "name": "Toronto", "province": "ON", "lat": 43.65, "lon": -79.38, "quarters": { "2025Q1": 3900 } },
            { "name": "Calgary", "province": "AB", "quarters": { "2025Q1": 2100 } }
        ]
    }"#;

    fn series() -> MortgageTimeseries {
        MortgageTimeseries::from_json(SERIES.as_bytes()).unwrap()
    }

    #[test]
    fn test_quarter_lookup() {
        let series = series();
        assert_eq!(series.latest(), Some(2));
        assert_eq!(series.quarter_index("2025 Q1"), Some(1));
        assert_eq!(series.quarter_index("2025q2"), Some(2));
        assert_eq!(series.quarter_index("2026Q1"), None);
        assert_eq!(series.next_quarter(1), 2);
        assert_eq!(series.next_quarter(2), 0);
        assert!(series.snapshot(3).is_none());
    }

    #[test]
    fn test_missing_quarters_are_none() {
        let snapshot = series().snapshot(0).unwrap();
        let bc = snapshot.provinces.iter().find(|p| p.code == "BC").unwrap();
        assert_eq!(bc.payment, None);
        assert!(snapshot.cmas.iter().all(|c| c.payment.is_none()));

        // only AB and ON report in 2024Q4
        assert_eq!(snapshot.national_payment(), Some(2350.0));
        assert_eq!(snapshot.rank_provinces(DEFAULT_ANNUAL_INCOME).len(), 2);
    }

    #[test]
    fn test_report() {
        let snapshot = series().snapshot(1).unwrap();
        let report = AffordabilityReport::new(&snapshot, 60_000.0);

        assert_eq!(report.quarter, "2025Q1");
        let national = report.national.as_ref().unwrap();
        // (1900 + 3600 + 3000) / 3
        assert_eq!(national.payment, 2833.0);
        assert_eq!(national.affordability.status, AffordabilityStatus::VeryUnaffordable);

        let order: Vec<_> = report.provinces.iter().map(|p| p.region.as_str()).collect();
        assert_eq!(order, vec!["AB", "ON", "BC"]);
        assert_eq!(report.most_affordable.as_ref().unwrap().name, "Alberta");
        assert_eq!(report.least_affordable.as_ref().unwrap().name, "British Columbia");
        assert_eq!(report.provinces[0].affordability.percent, 38.0);

        assert_eq!(report.cmas.len(), 2);
        assert_eq!(report.cmas[1].region, "AB");
    }

    #[test]
    fn test_report_without_income() {
        let snapshot = series().snapshot(1).unwrap();
        let report = AffordabilityReport::new(&snapshot, 0.0);
        assert!(report.national.is_none());
        assert!(report.provinces.is_empty());
        assert!(report.most_affordable.is_none());
    }

    #[test]
    fn test_national_series() {
        let points = national_series(&series(), DEFAULT_ANNUAL_INCOME);
        let quarters: Vec<_> = points.iter().map(|p| p.quarter.as_str()).collect();
        assert_eq!(quarters, vec!["2024Q4", "2025Q1", "2025Q2"]);
        // ON has no 2025Q2 payment
        assert_eq!(points[2].payment, 2750.0);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(MortgageTimeseries::from_json(b"{\"quarters\": 3}").is_err());
    }
}
