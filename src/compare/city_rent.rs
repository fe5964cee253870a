use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::compare::income::label;
use crate::normalize::MappedRow;
use crate::pipeline::utility::mean;
use crate::schema;

/// Average rent per city and year, across housing types.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CityRentTrend {
    by_city: BTreeMap<String, BTreeMap<i32, f64>>,
    range: Option<(f64, f64)>,
}

/// One (city, year) point of the trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityRentPoint {
    pub city: String,
    pub year: i32,
    pub average_rent: f64,
    /// Position within the overall rent range, 0 cheapest and 1 dearest.
    pub shade: f64,
}

impl CityRentTrend {
    /// Rents of one (city, year, housing type) are averaged first. The
    /// positive housing-type means are then averaged per (city, year).
    pub fn from_rows(rows: &[MappedRow]) -> Self {
        let mut samples: BTreeMap<String, BTreeMap<i32, BTreeMap<String, Vec<f64>>>> = BTreeMap::new();
        for row in rows {
            let (Some(city), Some(year), Some(kind)) = (
                label(row, schema::LOCATION),
                row.get(schema::YEAR).year(),
                label(row, schema::UNIT),
            ) else {
                continue;
            };
            let Some(rent) = row.get(schema::VALUE).as_f64() else {
                continue;
            };
            samples
                .entry(city)
                .or_default()
                .entry(year)
                .or_default()
                .entry(kind)
                .or_default()
                .push(rent);
        }

        let by_city: BTreeMap<String, BTreeMap<i32, f64>> = samples
            .into_iter()
            .map(|(city, years)| {
                let years = years
                    .into_iter()
                    .filter_map(|(year, kinds)| {
                        let means: Vec<f64> = kinds
                            .values()
                            .filter_map(|rents| mean(rents))
                            .filter(|m| *m > 0.0)
                            .collect();
                        mean(&means).map(|avg| (year, avg))
                    })
                    .collect::<BTreeMap<_, _>>();
                (city, years)
            })
            .filter(|(_, years)| !years.is_empty())
            .collect();

        let range = by_city
            .values()
            .flat_map(|years| years.values().copied())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            });

        debug!(cities = by_city.len(), ?range, "City rent trend built");
        CityRentTrend { by_city, range }
    }

    pub fn get(&self, city: &str, year: i32) -> Option<f64> {
        self.by_city.get(city)?.get(&year).copied()
    }

    /// Lowest and highest (city, year) average, shared by every year.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.by_city.keys().map(String::as_str)
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.by_city.values().flat_map(|years| years.keys().copied()).collect()
    }

    /// `None` when the city has no rent for `year`.
    pub fn shade(&self, city: &str, year: i32) -> Option<f64> {
        let rent = self.get(city, year)?;
        let (lo, hi) = self.range?;
        if hi > lo {
            Some((rent - lo) / (hi - lo))
        } else {
            Some(0.0)
        }
    }

    /// Every point, by city then year.
    pub fn points(&self) -> Vec<CityRentPoint> {
        self.by_city
            .iter()
            .flat_map(|(city, years)| {
                years.iter().map(move |(&year, &average_rent)| CityRentPoint {
                    city: city.clone(),
                    year,
                    average_rent,
                    shade: self.shade(city, year).unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Cell;

    fn row(city: &str, year: f64, kind: &str, rent: f64) -> MappedRow {
        MappedRow::new([
            (schema::LOCATION, Cell::Text(city.to_string())),
            (schema::YEAR, Cell::Number(year)),
            (schema::UNIT, Cell::Text(kind.to_string())),
            (schema::VALUE, Cell::Number(rent)),
        ])
    }

    fn trend() -> CityRentTrend {
        CityRentTrend::from_rows(&[
            row("Calgary", 2022.0, "Bachelor", 1000.0),
            row("Calgary", 2022.0, "Bachelor", 1200.0),
            row("Calgary", 2022.0, "2 Bedroom", 1700.0),
            row("Calgary", 2023.0, "2 Bedroom", 1900.0),
            row("Calgary", 2023.0, "3 Bedroom +", 0.0),
            row("Regina", 2022.0, "Bachelor", 0.0),
            row("Regina", 2023.0, "Bachelor", 800.0),
        ])
    }

    #[test]
    fn test_average_across_housing_types() {
        let trend = trend();
        // bachelor mean 1100, two bedroom 1700
        assert_eq!(trend.get("Calgary", 2022), Some(1400.0));
        // zero rents do not pull the average down
        assert_eq!(trend.get("Calgary", 2023), Some(1900.0));
        assert_eq!(trend.get("Regina", 2022), None);
        assert_eq!(trend.get("Regina", 2023), Some(800.0));
        assert_eq!(trend.years().into_iter().collect::<Vec<_>>(), vec![2022, 2023]);
    }

    #[test]
    fn test_range_and_shade() {
        let trend = trend();
        assert_eq!(trend.range(), Some((800.0, 1900.0)));
        assert_eq!(trend.shade("Regina", 2023), Some(0.0));
        assert_eq!(trend.shade("Calgary", 2023), Some(1.0));
        assert_eq!(trend.shade("Calgary", 2022), Some(600.0 / 1100.0));
        assert_eq!(trend.shade("Regina", 2022), None);

        let points = trend.points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].city, "Calgary");
        assert_eq!(points[2].average_rent, 800.0);
    }

    #[test]
    fn test_empty() {
        let trend = CityRentTrend::from_rows(&[]);
        assert_eq!(trend.range(), None);
        assert!(trend.points().is_empty());
    }
}
