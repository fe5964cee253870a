use crate::pipeline::config::PipelineConfig;
use crate::pipeline::filters::FilterSet;
use crate::pipeline::types::{AggregatedRecord, CanonicalRecord};
use crate::pipeline::utility::mean;

/// Mean value over the entries of `record` that both filters let through.
///
/// Returns `None` when no entry passes.
pub fn record_mean(record: &CanonicalRecord, structures: &FilterSet, units: &FilterSet) -> Option<f64> {
    let values: Vec<f64> = record
        .entries
        .iter()
        .filter(|e| structures.allows(&e.structure) && units.allows(&e.unit))
        .map(|e| e.value)
        .collect();
    mean(&values)
}

fn add_population(acc: Option<f64>, population: Option<f64>) -> Option<f64> {
    match (acc, population) {
        (Some(a), Some(p)) => Some(a + p),
        (a, p) => a.or(p),
    }
}

/// Folds canonical records into one [`AggregatedRecord`] per (category, year).
///
/// Records whose entries are all filtered out do not contribute. Population is
/// summed across contributors, values are averaged. Output is ordered by
/// category, then year.
pub fn aggregate(records: &[CanonicalRecord], config: &PipelineConfig) -> Vec<AggregatedRecord> {
    let mut selected: Vec<(&str, i32, Option<f64>, f64)> = records
        .iter()
        .filter_map(|r| {
            let category = config.mode.category_of(r)?;
            let avg = record_mean(r, &config.structures, &config.units)?;
            Some((category, r.year, r.population, avg))
        })
        .collect();

    selected.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    let mut out: Vec<AggregatedRecord> = Vec::new();
    for (category, year, population, avg) in selected {
        match out.last_mut() {
            Some(last) if last.category == category && last.year == year => {
                last.population = add_population(last.population, population);
                last.value += avg;
                last.contributors += 1;
            }
            _ => out.push(AggregatedRecord {
                category: category.to_string(),
                year,
                population,
                value: avg,
                contributors: 1,
            }),
        }
    }

    for record in &mut out {
        record.value /= record.contributors as f64;
    }

    out.sort_by(|a, b| a.category.cmp(&b.category).then(a.year.cmp(&b.year)));
    out
}
