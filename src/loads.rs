//! Incremental consumption of loads the prospect plans to add.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, Result};
use crate::tariff::Periodicity;

/// Electric vehicle charged at home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvLoad {
    /// Catalog model key (e.g. `"tesla_model_3"`).
    pub model: String,
    /// Average kilometres driven per day.
    pub daily_km: f64,
}

/// Minisplit air-conditioning units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinisplitLoad {
    pub units: u32,
    pub daily_hours: f64,
}

/// Electric clothes dryer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DryerLoad {
    pub weekly_hours: f64,
}

/// Extra loads declared on the form. Absent loads contribute nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtraLoads {
    pub ev: Option<EvLoad>,
    pub minisplit: Option<MinisplitLoad>,
    pub dryer: Option<DryerLoad>,
    pub water_pump: bool,
    pub other: bool,
}

impl ExtraLoads {
    /// Whether any load is declared.
    pub fn is_empty(&self) -> bool {
        self.ev.is_none()
            && self.minisplit.is_none()
            && self.dryer.is_none()
            && !self.water_pump
            && !self.other
    }
}

/// Per-unit consumption constants from the reference data.
///
/// Every constant is optional so a catalog may omit loads it does not
/// support; estimating a declared load without its constant is an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConstants {
    /// kWh per 100 km, keyed by EV model.
    pub ev_kwh_per_100km: BTreeMap<String, f64>,
    pub minisplit_kwh_per_unit_hour: Option<f64>,
    pub dryer_kwh_per_hour: Option<f64>,
    pub water_pump_kwh_per_day: Option<f64>,
    pub other_kwh_per_day: Option<f64>,
}

/// Unrounded per-load figures for one billing period (kWh).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadBreakdown {
    pub ev: f64,
    pub minisplit: f64,
    pub dryer: f64,
    pub water_pump: f64,
    pub other: f64,
}

impl LoadBreakdown {
    pub fn total(&self) -> f64 {
        self.ev + self.minisplit + self.dryer + self.water_pump + self.other
    }
}

fn required(value: Option<f64>, table: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(QuoteError::configuration(
            table,
            format!("must be a non-negative number, got {v}"),
        )),
        None => Err(QuoteError::configuration(
            table,
            "missing consumption constant for a declared load",
        )),
    }
}

fn non_negative(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(QuoteError::invalid_input(
            field,
            format!("must be a non-negative number, got {value}"),
        ))
    }
}

/// Estimates each declared load's consumption over one billing period.
///
/// # Errors
///
/// Returns `Configuration` when a declared load has no constant, and
/// `InvalidInput` for negative usage figures.
pub fn estimate_breakdown(
    loads: &ExtraLoads,
    periodicity: Periodicity,
    constants: &LoadConstants,
) -> Result<LoadBreakdown> {
    let days = periodicity.days();
    let mut out = LoadBreakdown::default();

    if let Some(ev) = &loads.ev {
        let per_100km = constants
            .ev_kwh_per_100km
            .get(&ev.model)
            .copied()
            .ok_or_else(|| {
                QuoteError::configuration(
                    "loads.ev_kwh_per_100km",
                    format!("no consumption figure for EV model \"{}\"", ev.model),
                )
            })?;
        let km = non_negative(ev.daily_km, "extra_loads.ev.daily_km")?;
        out.ev = km / 100.0 * per_100km * days;
    }
    if let Some(ms) = &loads.minisplit {
        let rate = required(
            constants.minisplit_kwh_per_unit_hour,
            "loads.minisplit_kwh_per_unit_hour",
        )?;
        let hours = non_negative(ms.daily_hours, "extra_loads.minisplit.daily_hours")?;
        out.minisplit = f64::from(ms.units) * hours * rate * days;
    }
    if let Some(dryer) = &loads.dryer {
        let rate = required(constants.dryer_kwh_per_hour, "loads.dryer_kwh_per_hour")?;
        let hours = non_negative(dryer.weekly_hours, "extra_loads.dryer.weekly_hours")?;
        out.dryer = hours * rate * periodicity.weeks();
    }
    if loads.water_pump {
        out.water_pump =
            required(constants.water_pump_kwh_per_day, "loads.water_pump_kwh_per_day")? * days;
    }
    if loads.other {
        out.other = required(constants.other_kwh_per_day, "loads.other_kwh_per_day")? * days;
    }
    Ok(out)
}

/// Total extra consumption over one billing period, rounded to whole kWh.
///
/// # Errors
///
/// See [`estimate_breakdown`].
pub fn estimate_extra_kwh(
    loads: &ExtraLoads,
    periodicity: Periodicity,
    constants: &LoadConstants,
) -> Result<f64> {
    Ok(estimate_breakdown(loads, periodicity, constants)?
        .total()
        .round())
}
