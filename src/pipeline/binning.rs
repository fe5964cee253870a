use std::collections::{BTreeMap, BTreeSet};

use crate::pipeline::config::BoundaryStrategy;
use crate::pipeline::types::{Bucket, BucketCell, ChangeRecord};
use crate::pipeline::utility::mean;

/// Tick step for `count` intervals over `span`: 1, 2 or 5 times a power of ten.
pub fn nice_step(span: f64, count: usize) -> f64 {
    let raw = span / count.max(1) as f64;
    let power = raw.log10().floor();
    let magnitude = 10f64.powf(power);
    let error = raw / magnitude;

    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    factor * magnitude
}

/// Widening attempts before the last boundary is clamped to `max`.
const MAX_STEP_WIDENING: usize = 6;

/// Next step up the 1, 2, 5 ladder.
fn next_nice(step: f64) -> f64 {
    let magnitude = 10f64.powf((step.log10() + 1e-9).floor());
    let mantissa = (step / magnitude).round();
    let factor = if mantissa < 2.0 {
        2.0
    } else if mantissa < 5.0 {
        5.0
    } else {
        10.0
    };
    factor * magnitude
}

/// Boundary values `b0 <= b1 <= ... <= bn` covering `[min, max]`, with
/// exactly `count` intervals.
///
/// Equal-width boundaries start at `min` and end at `max` exactly. Nice
/// boundaries start at a multiple of the smallest 1/2/5 step whose `count`
/// intervals reach `max`, so the outer boundaries may enclose the range.
pub fn boundaries(min: f64, max: f64, count: usize, strategy: BoundaryStrategy) -> Vec<f64> {
    let count = count.max(1);
    let span = max - min;

    if strategy == BoundaryStrategy::Nice && span > 0.0 {
        let mut step = nice_step(span, count);
        let mut start = (min / step).floor() * step;
        for _ in 0..MAX_STEP_WIDENING {
            if start + step * count as f64 >= max {
                break;
            }
            step = next_nice(step);
            start = (min / step).floor() * step;
        }

        let mut bounds: Vec<f64> = (0..=count).map(|i| start + step * i as f64).collect();
        bounds[0] = bounds[0].min(min);
        bounds[count] = bounds[count].max(max);
        return bounds;
    }

    let width = span / count as f64;
    let mut bounds: Vec<f64> = (0..count).map(|i| min + width * i as f64).collect();
    bounds.push(max);
    bounds
}

/// Buckets categories by population change and averages value change per cell.
///
/// Every record with a defined population change lands in exactly one bucket.
/// Cells without samples carry `None`. Categories come from `changes`, so every
/// bucket lists the same keys.
pub fn bin(changes: &[ChangeRecord], count: usize, strategy: BoundaryStrategy) -> Vec<Bucket> {
    let categories: BTreeSet<&str> = changes.iter().map(|c| c.record.category.as_str()).collect();

    let defined: Vec<f64> = changes.iter().filter_map(|c| c.population_change_pct).collect();
    let (min, max) = defined
        .iter()
        .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0));

    let bounds = boundaries(min, max, count, strategy);

    let mut buckets: Vec<Bucket> = bounds
        .windows(2)
        .enumerate()
        .map(|(index, w)| Bucket {
            index,
            lower: w[0],
            upper: w[1],
            cells: BTreeMap::new(),
        })
        .collect();

    let mut samples: Vec<BTreeMap<&str, Vec<f64>>> = vec![BTreeMap::new(); buckets.len()];
    for change in changes {
        let Some(pop) = change.population_change_pct else {
            continue;
        };
        let Some(slot) = buckets.iter().position(|b| b.contains(pop)) else {
            continue;
        };
        let cell = samples[slot].entry(change.record.category.as_str()).or_default();
        if let Some(v) = change.value_change_pct {
            cell.push(v);
        }
    }

    for (bucket, cell_samples) in buckets.iter_mut().zip(samples) {
        for category in &categories {
            let values = cell_samples.get(category).map(Vec::as_slice).unwrap_or(&[]);
            bucket.cells.insert(
                category.to_string(),
                BucketCell {
                    mean_value_change: mean(values),
                    samples: values.len(),
                },
            );
        }
    }

    buckets
}

/// Index of the bucket holding `population_change`, if any.
pub fn bucket_for(buckets: &[Bucket], population_change: f64) -> Option<usize> {
    buckets.iter().position(|b| b.contains(population_change))
}
