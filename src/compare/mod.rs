//! Housing cost comparisons.
//!
//! Rent and income tables are rolled up per city for a target year, then
//! joined for a chosen household type and set of income sources. Alongside
//! that: vacancy and rent per urban centre with metro populations, average
//! rent per city and year, and quarterly mortgage payments rated against an
//! income.

pub mod affordability;
pub mod city_rent;
pub mod income;
pub mod market;
pub mod mortgage;
pub mod rent_type;

pub use city_rent::CityRentTrend;
pub use income::{ComparisonRow, IncomeIndex, RentIndex, Selection, compare};
pub use market::{CityMarket, PopulationIndex, merge_markets};
pub use mortgage::{AffordabilityReport, MortgageTimeseries};
pub use rent_type::UnitKind;

/// Year the comparison chart reports on by default.
pub const TARGET_YEAR: i32 = 2023;
