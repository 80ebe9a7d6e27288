//! Equipment catalog: panels, inverters, microinverters, mounting hardware.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A panel model offered at one wattage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelOption {
    pub model: String,
    pub watts: u32,
    pub price_per_watt_usd: f64,
}

/// String (central) inverter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InverterModel {
    pub model: String,
    /// AC nameplate capacity (W).
    pub capacity_w: u32,
    pub price_usd: f64,
    pub warranty_years: u32,
}

/// Microinverter serving `channels` panels (one per MPPT channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicroinverterModel {
    pub model: String,
    pub channels: u32,
    pub requires_trunk: bool,
    pub price_usd: f64,
    pub warranty_years: u32,
}

/// Mounting kit valid for a band of panel counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountingOption {
    pub model: String,
    pub min_panels: u32,
    pub max_panels: u32,
    pub price_per_panel_usd: f64,
}

/// How the panel count is searched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingMode {
    /// Minimal panel count within tolerance for each catalog wattage.
    #[default]
    Catalog,
    /// Nearest panel count for each wattage; used with reduced catalogs.
    Simplified,
}

/// Physical and design constants of the sizer.
///
/// Every field is mandatory in reference files; `Default` backs the presets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizingParameters {
    pub mode: SizingMode,
    /// System losses factor applied to ideal generation (0.0–1.0).
    pub performance_ratio: f64,
    /// Footprint of one panel (m²).
    pub panel_area_m2: f64,
    /// Extra roof space for walkways and row spacing.
    pub space_multiplier: f64,
    /// Allowed DC/AC ratio when matching a central inverter.
    pub dc_ac_ratio: f64,
    /// Trunk cable cost per microinverter that needs one (USD).
    pub trunk_cable_usd_per_unit: f64,
}

impl Default for SizingParameters {
    fn default() -> Self {
        Self {
            mode: SizingMode::Catalog,
            performance_ratio: 0.8,
            panel_area_m2: 2.6,
            space_multiplier: 1.3,
            dc_ac_ratio: 1.2,
            trunk_cable_usd_per_unit: 18.0,
        }
    }
}

/// Read-only equipment catalog consumed by the sizer and pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EquipmentCatalog {
    pub panels: Vec<PanelOption>,
    pub inverters: Vec<InverterModel>,
    pub microinverters: Vec<MicroinverterModel>,
    pub mounting: Vec<MountingOption>,
    pub sizing: SizingParameters,
}

impl EquipmentCatalog {
    /// Validates catalog entries and returns a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: &str| {
            errors.push(ConfigError {
                field,
                message: message.to_string(),
            });
        };

        if self.panels.is_empty() {
            push("catalog.panels".into(), "must not be empty");
        }
        for (i, p) in self.panels.iter().enumerate() {
            if p.watts == 0 {
                push(format!("catalog.panels[{i}].watts"), "must be > 0");
            }
            if !(p.price_per_watt_usd >= 0.0) {
                push(format!("catalog.panels[{i}].price_per_watt_usd"), "must be >= 0");
            }
        }
        for (i, inv) in self.inverters.iter().enumerate() {
            if inv.capacity_w == 0 {
                push(format!("catalog.inverters[{i}].capacity_w"), "must be > 0");
            }
            if !(inv.price_usd >= 0.0) {
                push(format!("catalog.inverters[{i}].price_usd"), "must be >= 0");
            }
        }
        for (i, m) in self.microinverters.iter().enumerate() {
            if m.channels == 0 {
                push(format!("catalog.microinverters[{i}].channels"), "must be > 0");
            }
            if !(m.price_usd >= 0.0) {
                push(format!("catalog.microinverters[{i}].price_usd"), "must be >= 0");
            }
        }
        for (i, m) in self.mounting.iter().enumerate() {
            if m.min_panels > m.max_panels {
                push(
                    format!("catalog.mounting[{i}].min_panels"),
                    "must be <= max_panels",
                );
            }
        }

        let s = &self.sizing;
        if !(s.performance_ratio > 0.0 && s.performance_ratio <= 1.0) {
            push("catalog.sizing.performance_ratio".into(), "must be in (0.0, 1.0]");
        }
        if !(s.panel_area_m2 > 0.0) {
            push("catalog.sizing.panel_area_m2".into(), "must be > 0");
        }
        if !(s.space_multiplier >= 1.0) {
            push("catalog.sizing.space_multiplier".into(), "must be >= 1.0");
        }
        if !(s.dc_ac_ratio >= 1.0) {
            push("catalog.sizing.dc_ac_ratio".into(), "must be >= 1.0");
        }
        errors
    }
}
