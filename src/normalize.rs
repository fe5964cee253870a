//! Record normalizer for tabular housing datasets.
//!
//! Reads CSV bytes into [`MappedRow`]s keyed by logical field name, lifts them
//! into [`RawRecord`]s and folds rows sharing a (location, year) pair into
//! [`CanonicalRecord`]s.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::pipeline::types::{CanonicalRecord, Entry};
use crate::schema::{self, FieldMap};

/// A single coerced field.
///
/// Coercion fails open: text that does not parse as a finite number is kept
/// verbatim as [`Cell::Text`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

static MISSING: Cell = Cell::Missing;

impl Cell {
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view for measures; non-numeric cells become `NaN`.
    pub fn measure(&self) -> f64 {
        self.as_f64().unwrap_or(f64::NAN)
    }

    /// Textual view for labels such as geography or unit type.
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Missing => None,
        }
    }

    /// Reference years arrive as `2023` or as `2023-10` in monthly tables.
    pub fn year(&self) -> Option<i32> {
        match self {
            Cell::Number(n) if n.fract() == 0.0 => i32::try_from(*n as i64).ok(),
            Cell::Text(s) => {
                let s = s.trim();
                let (head, _) = s.split_once('-')?;
                if head.len() == 4 && head.bytes().all(|b| b.is_ascii_digit()) {
                    head.parse().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// One table row, keyed by logical field name rather than column header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRow {
    cells: HashMap<String, Cell>,
}

impl MappedRow {
    pub fn new<I, K>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, field: &str) -> &Cell {
        self.cells.get(field).unwrap_or(&MISSING)
    }
}

fn clean_header(header: &str) -> &str {
    header.trim_start_matches('\u{feff}').trim()
}

/// Parses CSV bytes and projects every row through `map`.
///
/// Columns named in the map but absent from the header are logged and read as
/// [`Cell::Missing`].
pub fn read_table(bytes: &[u8], map: &FieldMap) -> Result<Vec<MappedRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();

    let mut columns = Vec::new();
    for (field, column) in map.iter() {
        match headers.iter().position(|h| clean_header(h) == column) {
            Some(idx) => columns.push((field.to_string(), idx)),
            None => warn!(field, column, "Column not found in table header"),
        }
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let cells = columns.iter().map(|(field, idx)| {
            let cell = record.get(*idx).map(Cell::coerce).unwrap_or(Cell::Missing);
            (field.clone(), cell)
        });
        rows.push(MappedRow::new(cells));
    }

    debug!(rows = rows.len(), columns = columns.len(), "Table read");
    Ok(rows)
}

/// A single observation before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub location: String,
    pub year: Cell,
    pub population: Cell,
    pub structure: String,
    pub unit: String,
    pub value: Cell,
}

impl RawRecord {
    pub fn from_row(row: &MappedRow) -> Self {
        RawRecord {
            location: row.get(schema::LOCATION).label().unwrap_or_default(),
            year: row.get(schema::YEAR).clone(),
            population: row.get(schema::POPULATION).clone(),
            structure: row.get(schema::STRUCTURE).label().unwrap_or_default(),
            unit: row.get(schema::UNIT).label().unwrap_or_default(),
            value: row.get(schema::VALUE).clone(),
        }
    }
}

/// How a combined "City, Province" string is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationFormat {
    pub separator: char,
    /// Characters dropped from the start of the province part.
    pub province_offset: usize,
}

impl Default for LocationFormat {
    fn default() -> Self {
        Self {
            separator: ',',
            province_offset: 1,
        }
    }
}

/// Splits `location` at the first separator into `(city, province)`.
///
/// Returns `None` when there is no separator or either side ends up empty.
pub fn split_location(location: &str, format: LocationFormat) -> Option<(String, String)> {
    let (left, rest) = location.split_once(format.separator)?;
    let city = left.trim();
    let province: String = rest.chars().skip(format.province_offset).collect();

    if city.is_empty() || province.trim().is_empty() {
        return None;
    }
    Some((city.to_string(), province))
}

/// Strips the census suffix from a geography name: `"Toronto (CMA)"` -> `"Toronto"`.
pub fn metro_name(city: &str) -> &str {
    for suffix in [" (CMA)", " (CA)"] {
        if let Some(idx) = city.find(suffix) {
            return &city[..idx];
        }
    }
    city
}

/// Population-table spellings that differ from the rental tables.
static METRO_ALIASES: &[(&str, &str)] = &[
    ("Québec", "Quebec"),
    ("Kitchener - Cambridge - Waterloo", "Kitchener-Cambridge-Waterloo"),
    ("St. Catharines - Niagara", "St. Catharines-Niagara"),
    ("Abbotsford - Mission", "Abbotsford-Mission"),
];

/// Rental-table name of a population-table geography:
/// `"Toronto (CMA), Ontario"` -> `"Toronto"`.
///
/// Ottawa - Gatineau is reported per provincial part in both tables.
pub fn metro_key(geo: &str) -> String {
    if geo.contains("Ottawa - Gatineau") {
        let lower = geo.to_lowercase();
        let key = if lower.contains("ontario part") {
            "Ottawa-Gatineau (Ontario Part/Partie de l'Ontario)"
        } else if lower.contains("quebec part") || lower.contains("québec part") {
            "Ottawa-Gatineau (Québec Part/Partie du Québec)"
        } else {
            "Ottawa-Gatineau"
        };
        return key.to_string();
    }

    let name = metro_name(geo);
    METRO_ALIASES
        .iter()
        .find(|(from, _)| *from == name)
        .map_or(name, |&(_, to)| to)
        .to_string()
}

/// National and catch-all rows that are not a real metropolitan area.
pub fn is_aggregate_geo(geo: &str) -> bool {
    geo == "Canada" || geo.contains("All census") || geo.contains("Area outside")
}

/// Counters produced by a normalization pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows: usize,
    pub records: usize,
    pub skipped_location: usize,
    pub skipped_year: usize,
}

/// Folds raw rows into canonical records, one per (location, year), in
/// first-seen order.
pub fn normalize(
    raws: &[RawRecord],
    format: LocationFormat,
) -> (Vec<CanonicalRecord>, NormalizeReport) {
    let mut report = NormalizeReport {
        rows: raws.len(),
        ..Default::default()
    };
    let mut records: Vec<CanonicalRecord> = Vec::new();
    let mut index: HashMap<(&str, i32), usize> = HashMap::new();

    for raw in raws {
        let Some(year) = raw.year.year() else {
            report.skipped_year += 1;
            warn!(location = %raw.location, year = ?raw.year, "Skipping row with unreadable year");
            continue;
        };

        let slot = match index.get(&(raw.location.as_str(), year)) {
            Some(&slot) => slot,
            None => {
                let Some((city, province)) = split_location(&raw.location, format) else {
                    report.skipped_location += 1;
                    warn!(location = %raw.location, "Skipping row with unsplittable location");
                    continue;
                };
                records.push(CanonicalRecord {
                    city,
                    province,
                    year,
                    population: None,
                    entries: Vec::new(),
                });
                index.insert((raw.location.as_str(), year), records.len() - 1);
                records.len() - 1
            }
        };

        let record = &mut records[slot];
        if record.population.is_none() {
            record.population = raw.population.as_f64();
        }
        record.entries.push(Entry {
            structure: raw.structure.clone(),
            unit: raw.unit.clone(),
            value: raw.value.measure(),
        });
    }

    report.records = records.len();
    debug!(?report, "Normalization complete");
    (records, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(location: &str, year: f64, structure: &str, unit: &str, value: &str) -> RawRecord {
        RawRecord {
            location: location.to_string(),
            year: Cell::Number(year),
            population: Cell::Missing,
            structure: structure.to_string(),
            unit: unit.to_string(),
            value: Cell::coerce(value),
        }
    }

    #[test]
    fn test_coerce_fails_open() {
        assert_eq!(Cell::coerce("12.5"), Cell::Number(12.5));
        assert_eq!(Cell::coerce(" 7 "), Cell::Number(7.0));
        assert_eq!(Cell::coerce("x"), Cell::Text("x".to_string()));
        assert_eq!(Cell::coerce("NaN"), Cell::Text("NaN".to_string()));
        assert_eq!(Cell::coerce("  "), Cell::Missing);
        assert!(Cell::coerce("..").measure().is_nan());
    }

    #[test]
    fn test_year_forms() {
        assert_eq!(Cell::Number(2023.0).year(), Some(2023));
        assert_eq!(Cell::Number(2023.5).year(), None);
        assert_eq!(Cell::coerce("2021-07").year(), Some(2021));
        assert_eq!(Cell::coerce("July").year(), None);
        assert_eq!(Cell::Missing.year(), None);
    }

    #[test]
    fn test_split_location_reconstructs() {
        for location in [
            "Toronto, Ontario",
            "St. John's, Newfoundland and Labrador",
            "Ottawa-Gatineau, Ontario part, Ontario/Quebec",
            "Québec, Quebec",
        ] {
            let (city, province) = split_location(location, LocationFormat::default()).unwrap();
            assert_eq!(format!("{}, {}", city, province), location);
            assert!(!city.is_empty());
            assert!(!province.is_empty());
        }
    }

    #[test]
    fn test_split_location_rejects_malformed() {
        let format = LocationFormat::default();
        assert_eq!(split_location("Canada", format), None);
        assert_eq!(split_location(", Ontario", format), None);
        assert_eq!(split_location("Toronto, ", format), None);
    }

    #[test]
    fn test_metro_name_and_aggregates() {
        assert_eq!(metro_name("Toronto (CMA)"), "Toronto");
        assert_eq!(metro_name("Brandon (CA)"), "Brandon");
        assert_eq!(metro_name("Halifax"), "Halifax");
        assert!(is_aggregate_geo("Canada"));
        assert!(is_aggregate_geo("All census metropolitan areas"));
        assert!(!is_aggregate_geo("Toronto (CMA), Ontario"));
    }

    #[test]
    fn test_metro_key() {
        assert_eq!(metro_key("Toronto (CMA), Ontario"), "Toronto");
        assert_eq!(metro_key("Québec (CMA), Quebec"), "Quebec");
        assert_eq!(
            metro_key("Kitchener - Cambridge - Waterloo (CMA), Ontario"),
            "Kitchener-Cambridge-Waterloo"
        );
        assert_eq!(
            metro_key("Ottawa - Gatineau (CMA), Ontario part, Ontario/Quebec"),
            "Ottawa-Gatineau (Ontario Part/Partie de l'Ontario)"
        );
        assert_eq!(
            metro_key("Ottawa - Gatineau (CMA), Québec part, Ontario/Quebec"),
            "Ottawa-Gatineau (Québec Part/Partie du Québec)"
        );
        assert_eq!(metro_key("Ottawa - Gatineau (CMA), Ontario/Quebec"), "Ottawa-Gatineau");
        assert_eq!(metro_key("Halifax"), "Halifax");
    }

    #[test]
    fn test_normalize_groups_by_location_and_year() {
        let raws = vec![
            raw("Toronto, Ontario", 2001.0, "A3P", "Bachelor units", "700"),
            raw("Toronto, Ontario", 2001.0, "A3P", "One bedroom units", "900"),
            raw("Toronto, Ontario", 2002.0, "A3P", "Bachelor units", "720"),
            raw("Halifax, Nova Scotia", 2001.0, "A3P", "Bachelor units", "500"),
        ];

        let (records, report) = normalize(&raws, LocationFormat::default());

        assert_eq!(records.len(), 3);
        assert_eq!(report.records, 3);
        assert_eq!(records[0].city, "Toronto");
        assert_eq!(records[0].province, "Ontario");
        assert_eq!(records[0].year, 2001);
        assert_eq!(records[0].entries.len(), 2);
        assert_eq!(records[2].province, "Nova Scotia");
    }

    #[test]
    fn test_normalize_skips_and_counts_malformed_rows() {
        let mut bad_year = raw("Toronto, Ontario", 2001.0, "A3P", "Bachelor units", "1");
        bad_year.year = Cell::Text("n/a".to_string());
        let raws = vec![
            bad_year,
            raw("Canada", 2001.0, "A3P", "Bachelor units", "1"),
            raw("Toronto, Ontario", 2001.0, "A3P", "Bachelor units", "bad"),
        ];

        let (records, report) = normalize(&raws, LocationFormat::default());

        assert_eq!(report.skipped_year, 1);
        assert_eq!(report.skipped_location, 1);
        assert_eq!(records.len(), 1);
        assert!(records[0].entries[0].value.is_nan());
    }

    #[test]
    fn test_population_takes_first_numeric() {
        let mut a = raw("Regina, Saskatchewan", 2001.0, "R3P", "Bachelor units", "400");
        a.population = Cell::Text("..".to_string());
        let mut b = raw("Regina, Saskatchewan", 2001.0, "R3P", "Two bedroom units", "600");
        b.population = Cell::Number(190_000.0);

        let (records, _) = normalize(&[a, b], LocationFormat::default());
        assert_eq!(records[0].population, Some(190_000.0));
    }

    #[test]
    fn test_read_table_maps_headers() {
        let csv = "\u{feff}REF_DATE,GEO,Type of structure,Type of unit,VALUE\n\
                   2001,\"Toronto, Ontario\",A3P,Bachelor units,700\n\
                   2001,\"Toronto, Ontario\",A3P,One bedroom units,..\n";

        let rows = read_table(csv.as_bytes(), &FieldMap::rent_survey()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(schema::YEAR), &Cell::Number(2001.0));
        assert_eq!(rows[0].get(schema::VALUE), &Cell::Number(700.0));
        assert_eq!(rows[1].get(schema::VALUE), &Cell::Text("..".to_string()));
        // no Population column in this table
        assert_eq!(rows[0].get(schema::POPULATION), &Cell::Missing);

        let raw = RawRecord::from_row(&rows[0]);
        assert_eq!(raw.location, "Toronto, Ontario");
        assert_eq!(raw.unit, "Bachelor units");
    }
}
