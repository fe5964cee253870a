//! Checkbox ids of the rent chart and the filter labels they switch.

use anyhow::{Result, bail};

use crate::pipeline::config::PipelineConfig;

/// Structure-type checkbox ids.
pub static STRUCTURE_CONTROLS: &[(&str, &str)] = &[
    ("RA3P", "Row and apartment structures of three units and over"),
    ("R3P", "Row structures of three units and over"),
    ("A3P", "Apartment structures of three units and over"),
    ("A6P", "Apartment structures of six units and over"),
];

/// Unit-type checkbox ids.
pub static UNIT_CONTROLS: &[(&str, &str)] = &[
    ("bachelor", "Bachelor units"),
    ("onebed", "One bedroom units"),
    ("twobed", "Two bedroom units"),
    ("threebed", "Three bedroom units"),
];

/// What a control id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Structure(&'static str),
    Unit(&'static str),
}

impl Control {
    pub fn resolve(id: &str) -> Option<Self> {
        let find = |table: &'static [(&'static str, &'static str)]| {
            table.iter().find(|(key, _)| *key == id).map(|(_, label)| *label)
        };
        find(STRUCTURE_CONTROLS)
            .map(Control::Structure)
            .or_else(|| find(UNIT_CONTROLS).map(Control::Unit))
    }
}

/// Applies a checkbox state to `config`, returning the new config.
pub fn apply_control(config: &PipelineConfig, id: &str, checked: bool) -> Result<PipelineConfig> {
    match Control::resolve(id) {
        Some(Control::Structure(label)) => Ok(config.with_structure(label, checked)),
        Some(Control::Unit(label)) => Ok(config.with_unit(label, checked)),
        None => bail!("unknown control id: {}", id),
    }
}

/// Switches off a structure type named by checkbox id or full label.
///
/// A unit checkbox id is rejected rather than read as a structure label.
pub fn exclude_structure(config: &PipelineConfig, id: &str) -> Result<PipelineConfig> {
    match Control::resolve(id) {
        Some(Control::Structure(label)) => Ok(config.with_structure(label, false)),
        Some(Control::Unit(_)) => bail!("{} is a unit control, not a structure type", id),
        None => Ok(config.with_structure(id, false)),
    }
}

/// Switches off a unit type named by checkbox id or full label.
pub fn exclude_unit(config: &PipelineConfig, id: &str) -> Result<PipelineConfig> {
    match Control::resolve(id) {
        Some(Control::Unit(label)) => Ok(config.with_unit(label, false)),
        Some(Control::Structure(_)) => bail!("{} is a structure control, not a unit type", id),
        None => Ok(config.with_unit(id, false)),
    }
}
