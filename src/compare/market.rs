//! Vacancy rates and average rents per urban centre, joined with metro
//! populations.

use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::compare::income::label;
use crate::normalize::{Cell, MappedRow, is_aggregate_geo, metro_key};
use crate::schema;

static QUALITY_MARKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\$,%a-zA-Z\s]").expect("valid regex"));

/// Label of the rows that total every dwelling type or subdivision.
pub const TOTAL: &str = "Total";
pub const TOTAL_GENDER: &str = "Total - gender";
pub const ALL_AGES: &str = "All ages";

/// Vacancy rate (percent) above which a centre counts as high vacancy.
pub const HIGH_VACANCY_RATE: f64 = 2.0;

/// Reads a survey cell such as `"2.3 a"` or `"$1,450 b"`.
///
/// Currency, percent and reliability letters are stripped. Suppressed cells
/// (`**`, `--`) and anything left unparseable read as `None`.
pub fn survey_measure(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(text) => {
            let text = text.trim();
            if text == "**" || text == "--" {
                return None;
            }
            QUALITY_MARKS
                .replace_all(text, "")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
        }
        Cell::Missing => None,
    }
}

/// A row passes when `field` holds `expected` or the table has no such column.
fn is_total(row: &MappedRow, field: &str, expected: &str) -> bool {
    label(row, field).is_none_or(|value| value == expected)
}

/// Metro population for one reference year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationIndex {
    by_metro: BTreeMap<String, f64>,
}

impl PopulationIndex {
    /// Keeps the all-genders, all-ages rows of `year`, keyed by
    /// [`metro_key`]. National and catch-all geographies and non-positive
    /// values are skipped.
    pub fn from_rows(rows: &[MappedRow], year: i32) -> Self {
        let mut by_metro = BTreeMap::new();
        for row in rows {
            if row.get(schema::YEAR).year() != Some(year)
                || !is_total(row, schema::GENDER, TOTAL_GENDER)
                || !is_total(row, schema::AGE_GROUP, ALL_AGES)
            {
                continue;
            }
            let Some(geo) = label(row, schema::LOCATION) else {
                continue;
            };
            if is_aggregate_geo(&geo) {
                continue;
            }
            if let Some(value) = row.get(schema::VALUE).as_f64().filter(|v| *v > 0.0) {
                by_metro.insert(metro_key(&geo), value);
            }
        }

        debug!(metros = by_metro.len(), year, "Population index built");
        PopulationIndex { by_metro }
    }

    pub fn get(&self, city: &str) -> Option<f64> {
        self.by_metro.get(city).copied()
    }

    pub fn len(&self) -> usize {
        self.by_metro.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_metro.is_empty()
    }
}

/// Centre-level totals keyed by (city, province). The first row wins.
fn centre_totals(rows: &[MappedRow]) -> BTreeMap<(String, String), Option<f64>> {
    let mut totals = BTreeMap::new();
    for row in rows {
        if label(row, schema::DWELLING).as_deref() != Some(TOTAL)
            || label(row, schema::SUBDIVISION).as_deref() != Some(TOTAL)
        {
            continue;
        }
        let (Some(city), Some(province)) = (label(row, schema::LOCATION), label(row, schema::PROVINCE))
        else {
            continue;
        };
        totals
            .entry((city, province))
            .or_insert_with(|| survey_measure(row.get(schema::VALUE)));
    }
    totals
}

/// Rental market summary of one urban centre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityMarket {
    pub city: String,
    pub province: String,
    pub vacancy_rate: f64,
    pub avg_rent: f64,
    pub population: Option<f64>,
    pub high_vacancy: bool,
}

/// Joins vacancy and rent totals on (city, province) and attaches populations.
///
/// Centres missing either measure are dropped. The result is ordered by
/// population, largest first, with centres of unknown population last.
pub fn merge_markets(vacancy: &[MappedRow], rent: &[MappedRow], population: &PopulationIndex) -> Vec<CityMarket> {
    let rents = centre_totals(rent);

    let mut markets: Vec<CityMarket> = centre_totals(vacancy)
        .into_iter()
        .filter_map(|(key, vacancy_rate)| {
            let vacancy_rate = vacancy_rate?;
            let avg_rent = (*rents.get(&key)?)?;
            let (city, province) = key;
            Some(CityMarket {
                population: population.get(&city),
                high_vacancy: vacancy_rate > HIGH_VACANCY_RATE,
                city,
                province,
                vacancy_rate,
                avg_rent,
            })
        })
        .collect();

    markets.sort_by(|a, b| match (a.population, b.population) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.city.cmp(&b.city)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.city.cmp(&b.city),
    });

    debug!(
        markets = markets.len(),
        with_population = markets.iter().filter(|m| m.population.is_some()).count(),
        "Markets merged"
    );
    markets
}
