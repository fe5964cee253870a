use std::collections::BTreeMap;

use crate::pipeline::types::{AggregatedRecord, ChangeRecord};
use crate::pipeline::utility::pct_change;

fn change_against(current: Option<f64>, baseline: Option<f64>, is_baseline: bool) -> Option<f64> {
    let baseline = baseline.filter(|b| b.is_finite())?;
    if is_baseline {
        return Some(0.0);
    }
    pct_change(current?, baseline)
}

/// Computes population and value change of every record against the earliest
/// year of its category.
///
/// The baseline itself reports `0`. Later years report `None` when the baseline
/// is zero, missing or not a number.
pub fn compute_changes(aggregated: &[AggregatedRecord]) -> Vec<ChangeRecord> {
    let mut by_category: BTreeMap<&str, Vec<&AggregatedRecord>> = BTreeMap::new();
    for record in aggregated {
        by_category.entry(record.category.as_str()).or_default().push(record);
    }

    let mut out = Vec::with_capacity(aggregated.len());
    for (_, mut series) in by_category {
        series.sort_by_key(|r| r.year);
        let Some(baseline) = series.first().copied() else {
            continue;
        };

        for record in series {
            let is_baseline = record.year == baseline.year;
            out.push(ChangeRecord {
                record: record.clone(),
                population_change_pct: change_against(record.population, baseline.population, is_baseline),
                value_change_pct: change_against(Some(record.value), Some(baseline.value), is_baseline),
            });
        }
    }
    out
}
