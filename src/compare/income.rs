use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::compare::affordability::Affordability;
use crate::compare::rent_type::UnitKind;
use crate::normalize::MappedRow;
use crate::pipeline::utility::mean;
use crate::schema;

/// Rows of `year` with a positive value, as (row, value).
fn rows_for_year(rows: &[MappedRow], year: i32) -> impl Iterator<Item = (&MappedRow, f64)> {
    rows.iter().filter_map(move |row| {
        let value = row.get(schema::VALUE).as_f64().filter(|v| *v > 0.0)?;
        (row.get(schema::YEAR).year() == Some(year)).then_some((row, value))
    })
}

pub(crate) fn label(row: &MappedRow, field: &str) -> Option<String> {
    row.get(field).label().filter(|s| !s.is_empty())
}

/// Mean rent per city and unit size for one year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RentIndex {
    by_city: BTreeMap<String, BTreeMap<UnitKind, f64>>,
}

impl RentIndex {
    /// Rows whose unit label is not one of the four sizes are dropped.
    pub fn from_rows(rows: &[MappedRow], year: i32) -> Self {
        let mut samples: BTreeMap<String, BTreeMap<UnitKind, Vec<f64>>> = BTreeMap::new();
        for (row, value) in rows_for_year(rows, year) {
            let Some(city) = label(row, schema::LOCATION) else {
                continue;
            };
            let Some(kind) = label(row, schema::UNIT).and_then(|u| UnitKind::classify(&u)) else {
                continue;
            };
            samples.entry(city).or_default().entry(kind).or_default().push(value);
        }

        let by_city = samples
            .into_iter()
            .map(|(city, kinds)| {
                let means = kinds
                    .into_iter()
                    .filter_map(|(kind, values)| mean(&values).map(|m| (kind, m)))
                    .collect();
                (city, means)
            })
            .collect();

        let index = RentIndex { by_city };
        debug!(cities = index.by_city.len(), year, "Rent index built");
        index
    }

    pub fn get(&self, city: &str) -> Option<&BTreeMap<UnitKind, f64>> {
        self.by_city.get(city)
    }

    pub fn contains(&self, city: &str) -> bool {
        self.by_city.contains_key(city)
    }

    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.by_city.keys().map(String::as_str)
    }
}

/// Mean monthly income per family type, income source and city for one year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncomeIndex {
    by_family: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
}

impl IncomeIndex {
    /// Annual amounts are converted to monthly before averaging.
    pub fn from_rows(rows: &[MappedRow], year: i32) -> Self {
        let mut samples: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<f64>>>> =
            BTreeMap::new();
        for (row, value) in rows_for_year(rows, year) {
            let (Some(family), Some(source), Some(city)) = (
                label(row, schema::FAMILY_TYPE),
                label(row, schema::INCOME_SOURCE),
                label(row, schema::LOCATION),
            ) else {
                continue;
            };
            samples
                .entry(family)
                .or_default()
                .entry(source)
                .or_default()
                .entry(city)
                .or_default()
                .push(value / 12.0);
        }

        let by_family = samples
            .into_iter()
            .map(|(family, sources)| {
                let sources = sources
                    .into_iter()
                    .map(|(source, cities)| {
                        let cities = cities
                            .into_iter()
                            .filter_map(|(city, values)| mean(&values).map(|m| (city, m)))
                            .collect();
                        (source, cities)
                    })
                    .collect();
                (family, sources)
            })
            .collect();

        let index = IncomeIndex { by_family };
        debug!(families = index.by_family.len(), year, "Income index built");
        index
    }

    /// Family types, sorted.
    pub fn family_types(&self) -> impl Iterator<Item = &str> {
        self.by_family.keys().map(String::as_str)
    }

    /// Income sources reported for `family_type`, sorted.
    pub fn sources(&self, family_type: &str) -> Vec<&str> {
        self.by_family
            .get(family_type)
            .map(|sources| sources.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn monthly_income(&self, family_type: &str, source: &str, city: &str) -> Option<f64> {
        self.by_family.get(family_type)?.get(source)?.get(city).copied()
    }

    fn source_cities(&self, family_type: &str, source: &str) -> impl Iterator<Item = &str> {
        self.by_family
            .get(family_type)
            .and_then(|sources| sources.get(source))
            .into_iter()
            .flat_map(|cities| cities.keys().map(String::as_str))
    }
}

/// Cities with income data for the selection that also have rent data, sorted.
pub fn cities_for_selection(
    income: &IncomeIndex,
    rent: &RentIndex,
    family_type: &str,
    sources: &BTreeSet<String>,
) -> Vec<String> {
    let cities: BTreeSet<&str> = sources
        .iter()
        .flat_map(|source| income.source_cities(family_type, source))
        .filter(|city| rent.contains(city))
        .collect();
    cities.into_iter().map(str::to_string).collect()
}

/// User choices of the comparison chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub family_type: String,
    pub sources: BTreeSet<String>,
    pub cities: BTreeSet<String>,
}

impl Selection {
    /// First family type with all of its sources and every matching city.
    pub fn initial(income: &IncomeIndex, rent: &RentIndex) -> Option<Self> {
        let family_type = income.family_types().next()?.to_string();
        Some(Self::for_family(income, rent, family_type))
    }

    pub fn for_family(income: &IncomeIndex, rent: &RentIndex, family_type: String) -> Self {
        let sources: BTreeSet<String> = income
            .sources(&family_type)
            .into_iter()
            .map(str::to_string)
            .collect();
        let cities = cities_for_selection(income, rent, &family_type, &sources)
            .into_iter()
            .collect();
        Selection {
            family_type,
            sources,
            cities,
        }
    }

    /// Switches family type, keeping the selected sources that the new family
    /// also reports. With none left, every source of the new family is
    /// selected. Cities are reset to all available ones.
    pub fn change_family(&self, income: &IncomeIndex, rent: &RentIndex, family_type: String) -> Self {
        let available = income.sources(&family_type);
        let retained: BTreeSet<String> = available
            .iter()
            .filter(|source| self.sources.contains(**source))
            .map(|source| source.to_string())
            .collect();
        if retained.is_empty() {
            return Self::for_family(income, rent, family_type);
        }

        let cities = cities_for_selection(income, rent, &family_type, &retained)
            .into_iter()
            .collect();
        Selection {
            family_type,
            sources: retained,
            cities,
        }
    }

    /// Toggles an income source, keeping the selected cities that are still
    /// available or, if none remain, selecting all available cities.
    pub fn toggle_source(&self, income: &IncomeIndex, rent: &RentIndex, source: &str, on: bool) -> Self {
        let mut sources = self.sources.clone();
        if on {
            sources.insert(source.to_string());
        } else {
            sources.remove(source);
        }

        let available = cities_for_selection(income, rent, &self.family_type, &sources);
        let retained: BTreeSet<String> = available
            .iter()
            .filter(|c| self.cities.contains(*c))
            .cloned()
            .collect();
        let cities = if retained.is_empty() {
            available.into_iter().collect()
        } else {
            retained
        };

        Selection {
            family_type: self.family_type.clone(),
            sources,
            cities,
        }
    }

    pub fn toggle_city(&self, city: &str, on: bool) -> Self {
        let mut next = self.clone();
        if on {
            next.cities.insert(city.to_string());
        } else {
            next.cities.remove(city);
        }
        next
    }
}

/// Income and rents of one city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub city: String,
    pub monthly_income: f64,
    pub rents: BTreeMap<UnitKind, f64>,
    pub affordability: BTreeMap<UnitKind, Affordability>,
}

/// Builds one row per selected city that has both income and rent data,
/// sorted by city.
pub fn compare(income: &IncomeIndex, rent: &RentIndex, selection: &Selection) -> Vec<ComparisonRow> {
    let mut rows = Vec::new();

    for city in &selection.cities {
        let Some(rents) = rent.get(city) else {
            continue;
        };
        let incomes: Vec<f64> = selection
            .sources
            .iter()
            .filter_map(|source| income.monthly_income(&selection.family_type, source, city))
            .collect();
        let Some(monthly_income) = mean(&incomes) else {
            continue;
        };

        let affordability = rents
            .iter()
            .filter_map(|(kind, r)| Affordability::monthly(*r, monthly_income).map(|a| (*kind, a)))
            .collect();

        rows.push(ComparisonRow {
            city: city.clone(),
            monthly_income,
            rents: rents.clone(),
            affordability,
        });
    }

    rows
}
