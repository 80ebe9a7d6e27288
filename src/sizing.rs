//! Panel, inverter, and mounting selection for a consumption target.

use std::cmp::Reverse;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{
    EquipmentCatalog, InverterModel, MicroinverterModel, MountingOption, PanelOption, SizingMode,
};
use crate::error::{QuoteError, Result};
use crate::tariff::Periodicity;

/// Largest accepted relative gap between array and required wattage.
pub const MAX_RELATIVE_ERROR: f64 = 0.05;

/// Panel count from which a central inverter replaces microinverters.
pub const CENTRAL_INVERTER_MIN_PANELS: u32 = 15;

const EPS: f64 = 1e-9;

/// Inverter topology for a panel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Central,
    Micro,
}

pub fn topology_for(panel_count: u32) -> Topology {
    if panel_count >= CENTRAL_INVERTER_MIN_PANELS {
        Topology::Central
    } else {
        Topology::Micro
    }
}

/// Quantity of one microinverter model in a selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicroUnit {
    pub model: MicroinverterModel,
    pub quantity: u32,
}

/// A set of microinverters covering every panel.
///
/// All units share the same trunk-cable requirement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicroSelection {
    pub units: Vec<MicroUnit>,
    pub requires_trunk: bool,
    pub unused_channels: u32,
    /// Hardware plus trunk cable (USD).
    pub cost_usd: f64,
}

impl MicroSelection {
    pub fn unit_count(&self) -> u32 {
        self.units.iter().map(|u| u.quantity).sum()
    }

    pub fn channel_count(&self) -> u32 {
        self.units.iter().map(|u| u.quantity * u.model.channels).sum()
    }

    /// Shortest warranty across selected models.
    pub fn warranty_years(&self) -> u32 {
        self.units
            .iter()
            .map(|u| u.model.warranty_years)
            .min()
            .unwrap_or(0)
    }
}

/// Mutually exclusive inverter choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topology", rename_all = "snake_case")]
pub enum InverterSelection {
    Central(InverterModel),
    Micro(MicroSelection),
}

impl InverterSelection {
    pub fn topology(&self) -> Topology {
        match self {
            Self::Central(_) => Topology::Central,
            Self::Micro(_) => Topology::Micro,
        }
    }

    /// Equipment cost in USD.
    pub fn cost_usd(&self) -> f64 {
        match self {
            Self::Central(inv) => inv.price_usd,
            Self::Micro(sel) => sel.cost_usd,
        }
    }

    /// Short human-readable description, e.g. `"2 x IQ8-2, 1 x IQ8-4"`.
    pub fn describe(&self) -> String {
        match self {
            Self::Central(inv) => inv.model.clone(),
            Self::Micro(sel) => sel
                .units
                .iter()
                .map(|u| format!("{} x {}", u.quantity, u.model.model))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Sized photovoltaic system for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemConfiguration {
    pub panel: PanelOption,
    pub panel_count: u32,
    /// Wattage needed to cover the target (W).
    pub required_watts: f64,
    /// Installed DC wattage (W).
    pub array_watts: f64,
    /// `|array - required| / required`.
    pub relative_error: f64,
    pub inverter: InverterSelection,
    pub mounting: MountingOption,
    /// Roof area needed, rounded to whole m².
    pub roof_area_m2: f64,
    pub annual_generation_kwh: f64,
}

/// DC wattage required to generate `period_kwh` per billing period.
pub fn required_watts(
    period_kwh: f64,
    periodicity: Periodicity,
    solar_hours: f64,
    performance_ratio: f64,
) -> f64 {
    let monthly_kwh = period_kwh / periodicity.factor();
    monthly_kwh / (solar_hours * 30.0 * performance_ratio) * 1000.0
}

/// Panel count and its wattage error for one catalog option.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    index: usize,
    count: u32,
    error: f64,
}

fn candidate_for(index: usize, watts: u32, required_w: f64, mode: SizingMode) -> Option<Candidate> {
    let w = f64::from(watts);
    let count = match mode {
        SizingMode::Catalog => ((required_w * (1.0 - MAX_RELATIVE_ERROR)) / w - EPS).ceil(),
        SizingMode::Simplified => (required_w / w).round(),
    }
    .max(1.0);
    let error = (count * w - required_w).abs() / required_w;
    (error <= MAX_RELATIVE_ERROR + EPS).then_some(Candidate {
        index,
        count: count as u32,
        error,
    })
}

/// Picks the panel option and count closest to `required_w`.
///
/// Ties keep catalog order.
///
/// # Errors
///
/// Returns `NoFeasibleConfiguration` when no option lands within
/// [`MAX_RELATIVE_ERROR`].
pub fn choose_panels(
    required_w: f64,
    panels: &[PanelOption],
    mode: SizingMode,
) -> Result<(PanelOption, u32)> {
    if !(required_w.is_finite() && required_w > 0.0) {
        return Err(QuoteError::infeasible(
            "catalog.panels",
            format!("required wattage must be positive, got {required_w}"),
        ));
    }
    let best = panels
        .iter()
        .enumerate()
        .filter(|(_, p)| p.watts > 0)
        .filter_map(|(i, p)| candidate_for(i, p.watts, required_w, mode))
        .fold(None::<Candidate>, |best, c| match best {
            Some(b) if b.error <= c.error => Some(b),
            _ => Some(c),
        });
    match best {
        Some(c) => Ok((panels[c.index].clone(), c.count)),
        None => Err(QuoteError::infeasible(
            "catalog.panels",
            format!(
                "no panel wattage reaches {required_w:.0} W within {:.0}%",
                MAX_RELATIVE_ERROR * 100.0
            ),
        )),
    }
}

/// Chooses a central inverter for `array_w`.
///
/// An inverter is eligible when `capacity × dc_ac_ratio ≥ array_w`. Among
/// eligible models the cheapest wins, then the longest warranty, then the
/// smaller capacity.
///
/// # Errors
///
/// Returns `NoFeasibleConfiguration` when no inverter is large enough.
pub fn select_central_inverter(
    array_w: f64,
    inverters: &[InverterModel],
    dc_ac_ratio: f64,
) -> Result<InverterModel> {
    inverters
        .iter()
        .filter(|inv| f64::from(inv.capacity_w) * dc_ac_ratio + EPS >= array_w)
        .min_by(|a, b| {
            a.price_usd
                .total_cmp(&b.price_usd)
                .then_with(|| Reverse(a.warranty_years).cmp(&Reverse(b.warranty_years)))
                .then_with(|| a.capacity_w.cmp(&b.capacity_w))
        })
        .cloned()
        .ok_or_else(|| {
            QuoteError::infeasible(
                "catalog.inverters",
                format!("no inverter accommodates {array_w:.0} W at DC/AC {dc_ac_ratio}"),
            )
        })
}

/// Cheapest cover of `panels` with one homogeneous group of models.
///
/// Searches every channel total from `panels` up to `panels + max_channels`
/// and keeps the first reachable one, so unused channels are minimal. Among
/// combinations with the same channel total the cheapest wins, trunk cable
/// included.
fn cover_group(
    panels: u32,
    group: &[&MicroinverterModel],
    trunk_usd: f64,
) -> Option<MicroSelection> {
    let mut models: Vec<&MicroinverterModel> =
        group.iter().copied().filter(|m| m.channels > 0).collect();
    // Larger models first; among equal channel counts the cheaper one.
    models.sort_by(|a, b| {
        b.channels
            .cmp(&a.channels)
            .then_with(|| a.price_usd.total_cmp(&b.price_usd))
    });
    let max_channels = models.first()?.channels;
    let requires_trunk = models[0].requires_trunk;
    let unit_cost = |m: &MicroinverterModel| {
        if requires_trunk {
            m.price_usd + trunk_usd
        } else {
            m.price_usd
        }
    };

    // best[c]: cheapest quantities reaching exactly `c` channels.
    let limit = (panels + max_channels) as usize;
    let mut best: Vec<Option<(f64, Vec<u32>)>> = vec![None; limit + 1];
    best[0] = Some((0.0, vec![0; models.len()]));
    for c in 1..=limit {
        for (i, m) in models.iter().enumerate() {
            let k = m.channels as usize;
            if k > c {
                continue;
            }
            let Some((cost, quantities)) = &best[c - k] else {
                continue;
            };
            let cost = cost + unit_cost(*m);
            if best[c].as_ref().is_none_or(|(b, _)| cost < *b - EPS) {
                let mut quantities = quantities.clone();
                quantities[i] += 1;
                best[c] = Some((cost, quantities));
            }
        }
    }

    let (channels, (cost_usd, quantities)) = best
        .into_iter()
        .enumerate()
        .skip(panels as usize)
        .find_map(|(c, entry)| entry.map(|e| (c as u32, e)))?;
    let units = models
        .iter()
        .zip(quantities)
        .filter(|(_, q)| *q > 0)
        .map(|(m, quantity)| MicroUnit {
            model: (*m).clone(),
            quantity,
        })
        .collect();
    Some(MicroSelection {
        units,
        requires_trunk,
        unused_channels: channels - panels,
        cost_usd,
    })
}

/// Covers `panel_count` panels with microinverters.
///
/// Trunk-required and trunk-free models are never mixed. The trunk-free
/// group is used whenever it has a model; trunk-required models are the
/// fallback for catalogs without one.
///
/// # Errors
///
/// Returns `NoFeasibleConfiguration` if the catalog has no usable model.
pub fn select_microinverters(
    panel_count: u32,
    micros: &[MicroinverterModel],
    trunk_usd_per_unit: f64,
) -> Result<MicroSelection> {
    let (trunk, plain): (Vec<&MicroinverterModel>, Vec<&MicroinverterModel>) =
        micros.iter().partition(|m| m.requires_trunk);
    cover_group(panel_count, &plain, trunk_usd_per_unit)
        .or_else(|| cover_group(panel_count, &trunk, trunk_usd_per_unit))
        .ok_or_else(|| {
            QuoteError::infeasible(
                "catalog.microinverters",
                format!("no microinverter model covers {panel_count} panels"),
            )
        })
}

/// First mounting option whose panel band contains `panel_count`.
///
/// # Errors
///
/// Returns `NoFeasibleConfiguration` when no band matches.
pub fn select_mounting(panel_count: u32, options: &[MountingOption]) -> Result<MountingOption> {
    options
        .iter()
        .find(|m| (m.min_panels..=m.max_panels).contains(&panel_count))
        .cloned()
        .ok_or_else(|| {
            QuoteError::infeasible(
                "catalog.mounting",
                format!("no mounting option for {panel_count} panels"),
            )
        })
}

/// Sizes a system generating `target_kwh` per billing period.
///
/// # Arguments
///
/// * `target_kwh` - Consumption to cover per billing period
/// * `periodicity` - Billing period of `target_kwh`
/// * `solar_hours` - Daily peak sun hours at the site
/// * `catalog` - Equipment and sizer constants
///
/// # Errors
///
/// Returns `NoFeasibleConfiguration` when panels, inverter, or mounting
/// cannot be matched, and `Configuration` for non-positive solar hours.
pub fn size(
    target_kwh: f64,
    periodicity: Periodicity,
    solar_hours: f64,
    catalog: &EquipmentCatalog,
) -> Result<SystemConfiguration> {
    if !(solar_hours.is_finite() && solar_hours > 0.0) {
        return Err(QuoteError::configuration(
            "solar_hours",
            format!("must be > 0, got {solar_hours}"),
        ));
    }
    let s = &catalog.sizing;
    let required = required_watts(target_kwh, periodicity, solar_hours, s.performance_ratio);
    let (panel, panel_count) = choose_panels(required, &catalog.panels, s.mode)?;
    let array_watts = f64::from(panel.watts) * f64::from(panel_count);

    let inverter = match topology_for(panel_count) {
        Topology::Central => InverterSelection::Central(select_central_inverter(
            array_watts,
            &catalog.inverters,
            s.dc_ac_ratio,
        )?),
        Topology::Micro => InverterSelection::Micro(select_microinverters(
            panel_count,
            &catalog.microinverters,
            s.trunk_cable_usd_per_unit,
        )?),
    };
    let mounting = select_mounting(panel_count, &catalog.mounting)?;

    let roof_area_m2 = (f64::from(panel_count) * s.panel_area_m2 * s.space_multiplier).round();
    let annual_generation_kwh = array_watts / 1000.0 * solar_hours * 365.0 * s.performance_ratio;
    let relative_error = (array_watts - required).abs() / required;

    debug!(
        target_kwh,
        required_w = required,
        panel_w = panel.watts,
        panel_count,
        topology = ?inverter.topology(),
        "sized system"
    );

    Ok(SystemConfiguration {
        panel,
        panel_count,
        required_watts: required,
        array_watts,
        relative_error,
        inverter,
        mounting,
        roof_area_m2,
        annual_generation_kwh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SizingParameters;

    fn inverter(
        model: &str,
        capacity_w: u32,
        price_usd: f64,
        warranty_years: u32,
    ) -> InverterModel {
        InverterModel {
            model: model.into(),
            capacity_w,
            price_usd,
            warranty_years,
        }
    }

    fn micro(
        model: &str,
        channels: u32,
        requires_trunk: bool,
        price_usd: f64,
    ) -> MicroinverterModel {
        MicroinverterModel {
            model: model.into(),
            channels,
            requires_trunk,
            price_usd,
            warranty_years: 25,
        }
    }

    fn panel(watts: u32) -> PanelOption {
        PanelOption {
            model: format!("P{watts}"),
            watts,
            price_per_watt_usd: 0.2,
        }
    }

    fn catalog() -> EquipmentCatalog {
        EquipmentCatalog {
            panels: vec![panel(500)],
            inverters: vec![
                inverter("INV-5K", 5000, 900.0, 5),
                inverter("INV-8K", 8000, 1300.0, 10),
                inverter("INV-15K", 15000, 2100.0, 10),
            ],
            microinverters: vec![micro("M2", 2, false, 180.0), micro("M4", 4, false, 320.0)],
            mounting: vec![MountingOption {
                model: "rail".into(),
                min_panels: 1,
                max_panels: 60,
                price_per_panel_usd: 30.0,
            }],
            sizing: SizingParameters {
                performance_ratio: 0.8,
                ..SizingParameters::default()
            },
        }
    }

    #[test]
    fn required_watts_formula() {
        // 600 kWh bimonthly = 300 kWh/month; 300 / (5 * 30 * 0.8) * 1000
        let w = required_watts(600.0, Periodicity::Bimonthly, 5.0, 0.8);
        assert!((w - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn fourteen_panels_use_microinverters() {
        // one 500 W panel yields 60 kWh/month at 5 h and PR 0.8
        let cfg = size(840.0, Periodicity::Monthly, 5.0, &catalog()).unwrap();
        assert_eq!(cfg.panel_count, 14);
        assert_eq!(cfg.inverter.topology(), Topology::Micro);
    }

    #[test]
    fn fifteen_panels_use_central_inverter() {
        let cfg = size(900.0, Periodicity::Monthly, 5.0, &catalog()).unwrap();
        assert_eq!(cfg.panel_count, 15);
        assert_eq!(cfg.inverter.topology(), Topology::Central);
        // 7500 W needs 6250 W AC at DC/AC 1.2
        match cfg.inverter {
            InverterSelection::Central(inv) => assert_eq!(inv.model, "INV-8K"),
            other => panic!("expected central inverter, got {other:?}"),
        }
    }

    #[test]
    fn equal_price_prefers_longer_warranty() {
        let inverters = vec![inverter("A", 6000, 900.0, 5), inverter("B", 7000, 900.0, 8)];
        let chosen = select_central_inverter(5000.0, &inverters, 1.0).unwrap();
        assert_eq!(chosen.model, "B");
        let reversed = vec![inverters[1].clone(), inverters[0].clone()];
        assert_eq!(select_central_inverter(5000.0, &reversed, 1.0).unwrap().model, "B");
    }

    #[test]
    fn too_small_inverters_are_infeasible() {
        let inverters = vec![inverter("A", 3000, 900.0, 5)];
        let err = select_central_inverter(9000.0, &inverters, 1.2).unwrap_err();
        assert!(err.is_infeasible());
    }

    #[test]
    fn catalog_mode_picks_minimal_count_in_band() {
        let panels = vec![panel(450), panel(550)];
        // 4950 W: 11 x 450 exact, 9 x 550 exact; 450 comes first
        let (p, n) = choose_panels(4950.0, &panels, SizingMode::Catalog).unwrap();
        assert_eq!((p.watts, n), (450, 11));
        // 4800 W: band [4560, 5040] -> 11 x 450 = 4950 (3.1%), 9 x 550 = 4950 (3.1%)
        let (p, n) = choose_panels(4800.0, &panels, SizingMode::Catalog).unwrap();
        assert_eq!((p.watts, n), (450, 11));
    }

    #[test]
    fn simplified_mode_picks_nearest_count() {
        let panels = vec![panel(450), panel(550)];
        let (p, n) = choose_panels(5480.0, &panels, SizingMode::Simplified).unwrap();
        assert_eq!((p.watts, n), (550, 10));
    }

    #[test]
    fn out_of_band_targets_fail() {
        let panels = vec![panel(650)];
        // 1000 W: 2 x 650 = 1300 W is 30% over
        assert!(choose_panels(1000.0, &panels, SizingMode::Catalog)
            .unwrap_err()
            .is_infeasible());
        assert!(choose_panels(0.0, &panels, SizingMode::Catalog).is_err());
    }

    #[test]
    fn microinverters_minimize_unused_channels() {
        let micros = vec![micro("M2", 2, false, 180.0), micro("M4", 4, false, 320.0)];
        let sel = select_microinverters(10, &micros, 18.0).unwrap();
        assert_eq!(sel.unused_channels, 0);
        assert_eq!(sel.describe_units(), vec![("M4", 2), ("M2", 1)]);
        let odd = select_microinverters(7, &micros, 18.0).unwrap();
        assert_eq!(odd.unused_channels, 1);
        assert_eq!(odd.channel_count(), 8);
    }

    #[test]
    fn microinverter_groups_are_homogeneous() {
        let micros = vec![micro("M2", 2, false, 180.0), micro("T4", 4, true, 250.0)];
        for n in 1..15 {
            let sel = select_microinverters(n, &micros, 18.0).unwrap();
            assert!(sel.channel_count() >= n);
            assert!(
                sel.units
                    .iter()
                    .all(|u| u.model.requires_trunk == sel.requires_trunk),
                "mixed trunk requirement for {n} panels: {sel:?}"
            );
        }
    }

    #[test]
    fn exact_cover_beats_largest_first() {
        // 4 + 3 would leave a channel idle; two 3-channel units fill 6 exactly
        let micros = vec![micro("M3", 3, false, 250.0), micro("M4", 4, false, 320.0)];
        let sel = select_microinverters(6, &micros, 18.0).unwrap();
        assert_eq!(sel.unused_channels, 0);
        assert_eq!(sel.describe_units(), vec![("M3", 2)]);
        assert!((sel.cost_usd - 500.0).abs() < 1e-9);
    }

    #[test]
    fn trunk_free_group_preferred_over_cheaper_trunk_models() {
        let micros = crate::config::ReferenceData::builtin().catalog.microinverters;
        for (panels, units) in [(4, 1), (8, 2)] {
            let sel = select_microinverters(panels, &micros, 18.0).unwrap();
            assert!(!sel.requires_trunk, "{panels} panels: {sel:?}");
            assert_eq!(sel.unused_channels, 0);
            assert_eq!(sel.describe_units(), vec![("MI-4", units)]);
        }
        for panels in 1..CENTRAL_INVERTER_MIN_PANELS {
            let sel = select_microinverters(panels, &micros, 18.0).unwrap();
            assert!(!sel.requires_trunk, "{panels} panels: {sel:?}");
        }
    }

    #[test]
    fn trunk_group_used_when_no_plain_model() {
        let micros = vec![micro("T2", 2, true, 100.0), micro("T3", 3, true, 150.0)];
        let sel = select_microinverters(3, &micros, 18.0).unwrap();
        assert!(sel.requires_trunk);
        assert_eq!(sel.unused_channels, 0);
        assert!((sel.cost_usd - 168.0).abs() < 1e-9);
    }

    #[test]
    fn no_microinverters_is_infeasible() {
        assert!(select_microinverters(4, &[], 18.0).unwrap_err().is_infeasible());
    }

    #[test]
    fn mounting_band_gap_is_infeasible() {
        let options = vec![MountingOption {
            model: "small".into(),
            min_panels: 1,
            max_panels: 10,
            price_per_panel_usd: 25.0,
        }];
        assert_eq!(select_mounting(10, &options).unwrap().model, "small");
        assert!(select_mounting(11, &options).unwrap_err().is_infeasible());
    }

    #[test]
    fn roof_area_and_generation() {
        let cfg = size(840.0, Periodicity::Monthly, 5.0, &catalog()).unwrap();
        // 14 * 2.6 * 1.3 = 47.32
        assert_eq!(cfg.roof_area_m2, 47.0);
        assert!((cfg.annual_generation_kwh - 7.0 * 5.0 * 365.0 * 0.8).abs() < 1e-6);
    }

    #[test]
    fn non_positive_solar_hours_is_configuration_error() {
        assert!(matches!(
            size(840.0, Periodicity::Monthly, 0.0, &catalog()),
            Err(QuoteError::Configuration { .. })
        ));
    }

    impl MicroSelection {
        fn describe_units(&self) -> Vec<(&str, u32)> {
            self.units
                .iter()
                .map(|u| (u.model.model.as_str(), u.quantity))
                .collect()
        }
    }
}
