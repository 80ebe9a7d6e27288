//! TOML-based reference data and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::{
    EquipmentCatalog, InverterModel, MicroinverterModel, MountingOption, PanelOption,
    SizingMode, SizingParameters,
};
use crate::consumption::{DemandTables, EmployeeBracket, HouseholdBracket};
use crate::loads::LoadConstants;
use crate::pricing::{BalanceOfSystem, EnvironmentalFactors, Financing, PricingConfig};
use crate::tariff::{Effective, FlatRates, TariffFamily, TariffSchedule, Tier, TieredRates};

/// Read-only reference data consumed by the proposal pipeline.
///
/// Load from TOML with [`ReferenceData::from_toml_file`] or use
/// [`ReferenceData::builtin`] for the bundled tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceData {
    /// Dated utility tariffs.
    pub tariffs: TariffSchedule,
    /// Per-appliance consumption constants.
    #[serde(default)]
    pub loads: LoadConstants,
    /// Demographic consumption guesses.
    pub demand: DemandTables,
    /// Peak sun hours.
    pub solar: SolarResource,
    /// Panels, inverters, mounting, and sizer constants.
    pub catalog: EquipmentCatalog,
    /// Installer commercial constants.
    pub pricing: PricingConfig,
}

/// Daily peak sun hours by state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolarResource {
    /// Used when the state is blank or not listed.
    pub default_hours: f64,
    /// Keyed by lower-case state name.
    #[serde(default)]
    pub by_state: BTreeMap<String, f64>,
}

impl SolarResource {
    /// Peak sun hours for `state`, matched case-insensitively.
    pub fn hours_for(&self, state: &str) -> f64 {
        let key = state.trim().to_lowercase();
        self.by_state
            .get(&key)
            .copied()
            .unwrap_or(self.default_hours)
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"catalog.panels"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn tiered(basic: f64, intermediate: f64, excess: f64) -> TieredRates {
    TieredRates {
        fixed_charge: 0.0,
        minimum_charge: 27.0,
        tiers: vec![
            Tier {
                up_to_kwh: Some(75.0),
                price_per_kwh: basic,
            },
            Tier {
                up_to_kwh: Some(140.0),
                price_per_kwh: intermediate,
            },
            Tier {
                up_to_kwh: None,
                price_per_kwh: excess,
            },
        ],
    }
}

fn flat(charge: f64, price_per_kwh: f64) -> FlatRates {
    FlatRates {
        fixed_charge: charge,
        price_per_kwh,
        minimum_charge: charge,
    }
}

fn builtin_tariffs() -> TariffSchedule {
    let mut codes = BTreeMap::new();
    for code in ["1", "1A", "1B", "1C", "1D", "1E", "1F"] {
        codes.insert(code.to_string(), TariffFamily::Tiered);
    }
    codes.insert("PDBT".to_string(), TariffFamily::LowDemand);
    codes.insert("DAC".to_string(), TariffFamily::Dac);

    TariffSchedule {
        tax_rate: 0.16,
        dac_monthly_threshold_kwh: 250.0,
        min_plausible_kwh: 30.0,
        codes,
        tiered: vec![
            Effective {
                effective_from: date(2024, 1, 1),
                rates: tiered(1.03, 1.25, 3.66),
            },
            Effective {
                effective_from: date(2025, 1, 1),
                rates: tiered(1.08, 1.31, 3.84),
            },
        ],
        low_demand: vec![
            Effective {
                effective_from: date(2024, 1, 1),
                rates: flat(62.0, 3.29),
            },
            Effective {
                effective_from: date(2025, 1, 1),
                rates: flat(65.0, 3.45),
            },
        ],
        dac: vec![
            Effective {
                effective_from: date(2024, 1, 1),
                rates: flat(120.0, 6.12),
            },
            Effective {
                effective_from: date(2025, 1, 1),
                rates: flat(125.0, 6.42),
            },
        ],
    }
}

fn builtin_loads() -> LoadConstants {
    let ev = [
        ("BYD Dolphin", 15.5),
        ("Nissan Leaf", 17.0),
        ("Tesla Model 3", 14.9),
        ("Tesla Model Y", 16.9),
    ];
    LoadConstants {
        ev_kwh_per_100km: ev.iter().map(|(m, k)| (m.to_string(), *k)).collect(),
        minisplit_kwh_per_unit_hour: Some(1.1),
        dryer_kwh_per_hour: Some(2.8),
        water_pump_kwh_per_day: Some(1.2),
        other_kwh_per_day: Some(2.0),
    }
}

fn builtin_demand() -> DemandTables {
    let household = [(1, 90.0), (2, 150.0), (3, 200.0), (4, 250.0), (5, 300.0), (6, 350.0)];
    let commercial = [
        (1, 5, 300.0),
        (6, 10, 600.0),
        (11, 20, 1100.0),
        (21, 50, 2400.0),
        (51, 9999, 5000.0),
    ];
    DemandTables {
        household: household
            .iter()
            .map(|&(occupants, monthly_kwh)| HouseholdBracket {
                occupants,
                monthly_kwh,
            })
            .collect(),
        commercial: commercial
            .iter()
            .map(|&(min_employees, max_employees, monthly_kwh)| EmployeeBracket {
                min_employees,
                max_employees,
                monthly_kwh,
            })
            .collect(),
    }
}

fn builtin_solar() -> SolarResource {
    let states = [
        ("aguascalientes", 5.8),
        ("baja california", 5.9),
        ("baja california sur", 6.1),
        ("chihuahua", 6.0),
        ("ciudad de mexico", 5.3),
        ("coahuila", 5.7),
        ("guanajuato", 5.7),
        ("jalisco", 5.8),
        ("nuevo leon", 5.4),
        ("puebla", 5.4),
        ("queretaro", 5.7),
        ("sonora", 6.2),
        ("veracruz", 4.9),
        ("yucatan", 5.5),
    ];
    SolarResource {
        default_hours: 5.5,
        by_state: states.iter().map(|(s, h)| (s.to_string(), *h)).collect(),
    }
}

fn builtin_catalog() -> EquipmentCatalog {
    let panels = [
        ("TSM-450", 450, 0.21),
        ("JAM-550", 550, 0.20),
        ("LR5-580", 580, 0.21),
        ("CS7-600", 600, 0.22),
    ];
    let inverters = [
        ("INV-3K", 3_000, 650.0),
        ("INV-5K", 5_000, 900.0),
        ("INV-8K", 8_000, 1_300.0),
        ("INV-10K", 10_000, 1_550.0),
        ("INV-15K", 15_000, 2_100.0),
        ("INV-20K", 20_000, 2_600.0),
        ("INV-30K", 30_000, 3_500.0),
        ("INV-50K", 50_000, 5_200.0),
        ("INV-100K", 100_000, 9_500.0),
    ];
    let micros = [
        ("MI-2", 2, false, 210.0),
        ("MI-4", 4, false, 390.0),
        ("MI-4T", 4, true, 330.0),
    ];
    let mounting = [
        ("RAIL-S", 1, 10, 32.0),
        ("RAIL-M", 11, 30, 29.0),
        ("RAIL-L", 31, 250, 26.0),
    ];
    EquipmentCatalog {
        panels: panels
            .iter()
            .map(|&(model, watts, price_per_watt_usd)| PanelOption {
                model: model.to_string(),
                watts,
                price_per_watt_usd,
            })
            .collect(),
        inverters: inverters
            .iter()
            .map(|&(model, capacity_w, price_usd)| InverterModel {
                model: model.to_string(),
                capacity_w,
                price_usd,
                warranty_years: 10,
            })
            .collect(),
        microinverters: micros
            .iter()
            .map(|&(model, channels, requires_trunk, price_usd)| MicroinverterModel {
                model: model.to_string(),
                channels,
                requires_trunk,
                price_usd,
                warranty_years: 25,
            })
            .collect(),
        mounting: mounting
            .iter()
            .map(|&(model, min_panels, max_panels, price_per_panel_usd)| MountingOption {
                model: model.to_string(),
                min_panels,
                max_panels,
                price_per_panel_usd,
            })
            .collect(),
        sizing: SizingParameters::default(),
    }
}

fn builtin_pricing() -> PricingConfig {
    PricingConfig {
        exchange_rate: 18.5,
        profit_margin: 0.30,
        discount_rate: 0.10,
        transport_rate: 0.03,
        insurance_rate: 0.01,
        labor_mxn_per_watt: 1.2,
        extraordinary_mxn: 1500.0,
        acquisition_cost_mxn: 2500.0,
        balance_of_system: BalanceOfSystem {
            base_mxn: 3500.0,
            per_floor_mxn: 800.0,
            per_meter_mxn: 45.0,
        },
        financing: Financing::default(),
        environment: EnvironmentalFactors::default(),
    }
}

impl ReferenceData {
    /// Returns the bundled reference tables (same values as `data/reference.toml`).
    pub fn builtin() -> Self {
        Self {
            tariffs: builtin_tariffs(),
            loads: builtin_loads(),
            demand: builtin_demand(),
            solar: builtin_solar(),
            catalog: builtin_catalog(),
            pricing: builtin_pricing(),
        }
    }

    /// Returns the simplified preset: one panel wattage, nearest-count sizing.
    pub fn simplified() -> Self {
        let mut data = Self::builtin();
        data.catalog.panels.retain(|p| p.watts == 550);
        data.catalog.sizing = SizingParameters {
            mode: SizingMode::Simplified,
            ..SizingParameters::default()
        };
        data
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["default", "simplified"];

    /// Loads reference data from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::builtin()),
            "simplified" => Ok(Self::simplified()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses reference data from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "reference".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses reference data from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all tables and returns a list of errors.
    ///
    /// Returns an empty vector if the reference data is usable.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.tariffs.validate();

        if self.demand.household.is_empty() {
            errors.push(ConfigError {
                field: "demand.household".into(),
                message: "must not be empty".into(),
            });
        }
        if self.demand.commercial.is_empty() {
            errors.push(ConfigError {
                field: "demand.commercial".into(),
                message: "must not be empty".into(),
            });
        }
        for (i, b) in self.demand.commercial.iter().enumerate() {
            if b.min_employees > b.max_employees {
                errors.push(ConfigError {
                    field: format!("demand.commercial[{i}].min_employees"),
                    message: "must be <= max_employees".into(),
                });
            }
        }

        if !(self.solar.default_hours > 0.0) {
            errors.push(ConfigError {
                field: "solar.default_hours".into(),
                message: "must be > 0".into(),
            });
        }
        for (state, hours) in &self.solar.by_state {
            if !(*hours > 0.0) {
                errors.push(ConfigError {
                    field: format!("solar.by_state.{state}"),
                    message: "must be > 0".into(),
                });
            }
        }

        errors.extend(self.catalog.validate());
        errors.extend(self.pricing.validate());
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_preset_valid() {
        let data = ReferenceData::builtin();
        let errors = data.validate();
        assert!(errors.is_empty(), "builtin should be valid: {errors:?}");
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ReferenceData::PRESETS {
            let data = ReferenceData::from_preset(name).unwrap();
            let errors = data.validate();
            assert!(errors.is_empty(), "preset {name} invalid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let e = ReferenceData::from_preset("nonexistent").unwrap_err();
        assert_eq!(e.field, "preset");
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn simplified_uses_one_wattage() {
        let data = ReferenceData::simplified();
        assert_eq!(data.catalog.panels.len(), 1);
        assert_eq!(data.catalog.sizing.mode, SizingMode::Simplified);
    }

    #[test]
    fn bundled_toml_matches_builtin() {
        let parsed = ReferenceData::from_toml_str(include_str!("../data/reference.toml")).unwrap();
        assert_eq!(parsed.tariffs, ReferenceData::builtin().tariffs);
        assert_eq!(parsed.catalog, ReferenceData::builtin().catalog);
        assert_eq!(parsed, ReferenceData::builtin());
    }

    fn without_section(section: &str) -> String {
        let bundled = include_str!("../data/reference.toml");
        let mut skipping = false;
        let mut out = String::new();
        for line in bundled.lines() {
            if line.starts_with('[') {
                skipping = line.trim() == section;
            }
            if !skipping {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    #[test]
    fn missing_mandatory_sections_rejected() {
        for section in ["[catalog.sizing]", "[pricing.financing]", "[pricing.environment]"] {
            let e = ReferenceData::from_toml_str(&without_section(section)).unwrap_err();
            assert_eq!(e.field, "toml", "{section}");
            assert!(e.message.contains("missing field"), "{section}: {}", e.message);
        }
    }

    #[test]
    fn unknown_field_rejected() {
        let e = ReferenceData::from_toml_str("[tariffs]\nvoltage = 127\n").unwrap_err();
        assert_eq!(e.field, "toml");
    }

    #[test]
    fn solar_hours_fall_back_to_default() {
        let solar = builtin_solar();
        assert_eq!(solar.hours_for("Sonora"), 6.2);
        assert_eq!(solar.hours_for("  JALISCO "), 5.8);
        assert_eq!(solar.hours_for("Atlantis"), 5.5);
        assert_eq!(solar.hours_for(""), 5.5);
    }

    #[test]
    fn validation_aggregates_sections() {
        let mut data = ReferenceData::builtin();
        data.solar.default_hours = 0.0;
        data.demand.household.clear();
        data.pricing.exchange_rate = -1.0;
        let fields: Vec<_> = data.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"solar.default_hours".to_string()));
        assert!(fields.contains(&"demand.household".to_string()));
        assert!(fields.contains(&"pricing.exchange_rate".to_string()));
    }

    #[test]
    fn display_names_field() {
        let e = ConfigError {
            field: "catalog.panels".into(),
            message: "must not be empty".into(),
        };
        assert_eq!(e.to_string(), "config error: catalog.panels — must not be empty");
    }
}
