//! Column-name mappings for the tabular datasets.
//!
//! Statistics Canada and CMHC tables use locale-specific headers (`GEO`,
//! `REF_DATE`, `VALUE`, ...). A [`FieldMap`] translates the logical fields the
//! pipeline needs into the header names of a particular file.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;

/// Logical fields understood by the normalizer.
pub const LOCATION: &str = "location";
pub const YEAR: &str = "year";
pub const VALUE: &str = "value";
pub const STRUCTURE: &str = "structure";
pub const UNIT: &str = "unit";
pub const POPULATION: &str = "population";

/// Logical fields used by the income tables.
pub const INCOME_SOURCE: &str = "source";
pub const FAMILY_TYPE: &str = "family_type";

/// Logical fields used by the population estimates table.
pub const GENDER: &str = "gender";
pub const AGE_GROUP: &str = "age_group";

/// Logical fields used by the urban rental market survey tables.
pub const PROVINCE: &str = "province";
pub const SUBDIVISION: &str = "subdivision";
pub const DWELLING: &str = "dwelling";

/// Maps logical field names to column headers.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "location": "GEO",
///   "year": "REF_DATE",
///   "value": "VALUE"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    entries: HashMap<String, String>,
}

impl FieldMap {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Rent survey layout: one row per (geography, year, structure, unit).
    pub fn rent_survey() -> Self {
        Self::new([
            (LOCATION, "GEO"),
            (YEAR, "REF_DATE"),
            (VALUE, "VALUE"),
            (STRUCTURE, "Type of structure"),
            (UNIT, "Type of unit"),
            (POPULATION, "Population"),
        ])
    }

    /// Rent price table used by the income comparison.
    pub fn rent_prices() -> Self {
        Self::new([
            (LOCATION, "GEO"),
            (YEAR, "REF_DATE"),
            (VALUE, "VALUE"),
            (UNIT, "Type of unit"),
        ])
    }

    /// Income table used by the income comparison.
    pub fn income() -> Self {
        Self::new([
            (LOCATION, "GEO"),
            (YEAR, "REF_DATE"),
            (VALUE, "VALUE"),
            (INCOME_SOURCE, "Income source"),
            (FAMILY_TYPE, "Economic family type"),
        ])
    }

    /// Population estimates per census metropolitan area.
    pub fn population() -> Self {
        Self::new([
            (LOCATION, "GEO"),
            (YEAR, "REF_DATE"),
            (VALUE, "VALUE"),
            (GENDER, "Gender"),
            (AGE_GROUP, "Age group"),
        ])
    }

    /// Urban rental market survey layout, shared by the vacancy rate and
    /// average rent tables. `value` is the all-bedroom total column.
    pub fn market_survey() -> Self {
        Self::new([
            (PROVINCE, "Province"),
            (LOCATION, "Centre"),
            (SUBDIVISION, "Census Subdivision"),
            (DWELLING, "Dwelling Type"),
            (VALUE, "Total"),
        ])
    }

    /// Merged city rent table: one rent per (city, year, housing type).
    pub fn city_rents() -> Self {
        Self::new([
            (LOCATION, "city"),
            (YEAR, "year"),
            (UNIT, "housing_type"),
            (VALUE, "rent_price"),
        ])
    }

    /// Loads a mapping from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read field map: {}", path))?;
        Self::from_json(&content).with_context(|| format!("Invalid field map: {}", path))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(content)?;
        if entries.is_empty() {
            bail!("field map is empty");
        }
        Ok(Self { entries })
    }

    /// Returns the column header for `field`, if one is configured.
    pub fn column(&self, field: &str) -> Option<&str> {
        self.entries.get(field).map(String::as_str)
    }

    /// Iterates over all `(field, column)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_survey_defaults() {
        let map = FieldMap::rent_survey();
        assert_eq!(map.column(LOCATION), Some("GEO"));
        assert_eq!(map.column(YEAR), Some("REF_DATE"));
        assert_eq!(map.column(UNIT), Some("Type of unit"));
        assert_eq!(map.column("nope"), None);
    }

    #[test]
    fn test_market_survey_defaults() {
        let map = FieldMap::market_survey();
        assert_eq!(map.column(LOCATION), Some("Centre"));
        assert_eq!(map.column(SUBDIVISION), Some("Census Subdivision"));
        assert_eq!(FieldMap::population().column(AGE_GROUP), Some("Age group"));
    }

    #[test]
    fn test_from_json() {
        let map = FieldMap::from_json(r#"{"location": "Geography", "value": "Amount"}"#).unwrap();
        assert_eq!(map.column(LOCATION), Some("Geography"));
        assert_eq!(map.column(VALUE), Some("Amount"));
        assert_eq!(map.iter().count(), 2);
    }

    #[test]
    fn test_from_json_rejects_empty_and_non_strings() {
        assert!(FieldMap::from_json("{}").is_err());
        assert!(FieldMap::from_json(r#"{"value": 3}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(FieldMap::load("/definitely/not/here.json").is_err());
    }
}
