//! Rent trend pipeline.
//!
//! Canonical records are aggregated per category and year, compared against
//! each category's earliest year, and binned by population change for the
//! stacked population/rent chart. Every stage is a pure function of its input
//! and a [`config::PipelineConfig`]; [`session::Pipeline`] keeps the normalized
//! records so only these stages rerun when the configuration changes.

pub mod aggregate;
pub mod binning;
pub mod change;
pub mod config;
pub mod controls;
pub mod filters;
pub mod session;
pub mod types;
pub mod utility;

pub use config::{BoundaryStrategy, PipelineConfig, RollupMode};
pub use session::{Pipeline, PipelineOutput};
