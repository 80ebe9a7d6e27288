//! Proposal assembly for the baseline and extra-load scenarios.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ReferenceData;
use crate::consumption::{
    ConsumptionEstimate, ConsumptionSource, FormInput, PropertyType, resolve_consumption,
};
use crate::error::{Result, check_config};
use crate::loads::{LoadBreakdown, estimate_breakdown};
use crate::pricing::{EnvironmentalImpact, FinancialBreakdown, Site, payback_years, price};
use crate::sizing::{SystemConfiguration, size};
use crate::tariff::{Periodicity, TariffFamily, TariffParameters, kwh_to_payment, minimum_payment};

/// Facts shared by both scenarios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalMetadata {
    pub quote_date: NaiveDate,
    /// Normalized tariff code as entered, or `"unknown"`.
    pub tariff_code: String,
    pub family: TariffFamily,
    pub tariff_guessed: bool,
    pub periodicity: Periodicity,
    pub dac_monthly_threshold_kwh: f64,
    pub solar_hours: f64,
    pub consumption_source: ConsumptionSource,
    pub property_type: PropertyType,
    pub state: String,
}

/// Sized and priced system for one consumption level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    /// Consumption per billing period (kWh).
    pub period_kwh: f64,
    pub system: SystemConfiguration,
    pub financials: FinancialBreakdown,
    pub environment: EnvironmentalImpact,
    /// Bill per period at `period_kwh` under the resolved family.
    pub bill_before: f64,
    /// Bill per period once solar covers consumption (the minimum payment).
    pub bill_after: f64,
    pub annual_savings: f64,
    pub payback_years: Option<f64>,
}

/// State of the baseline-plus-extra-loads scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// No extra loads were declared.
    NotRequested,
    /// Equipment could not be matched at the higher consumption.
    Infeasible { reason: String },
    Computed(Box<ScenarioResult>),
}

impl ScenarioOutcome {
    pub fn result(&self) -> Option<&ScenarioResult> {
        match self {
            Self::Computed(result) => Some(result),
            _ => None,
        }
    }
}

/// What the prospect would pay under DAC, regardless of their actual tariff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypotheticalPayments {
    pub dac_current: f64,
    /// Present only when extra loads were declared.
    pub dac_with_extra: Option<f64>,
    pub exceeds_dac_threshold: bool,
    pub with_extra_exceeds_dac_threshold: bool,
}

/// Complete proposal for one form submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub metadata: ProposalMetadata,
    pub consumption: ConsumptionEstimate,
    pub loads: LoadBreakdown,
    pub hypothetical: HypotheticalPayments,
    pub current: ScenarioResult,
    pub with_extra: ScenarioOutcome,
}

struct ScenarioContext<'a> {
    reference: &'a ReferenceData,
    params: &'a TariffParameters,
    family: TariffFamily,
    periodicity: Periodicity,
    solar_hours: f64,
    site: Site,
}

impl ScenarioContext<'_> {
    fn build(&self, period_kwh: f64) -> Result<ScenarioResult> {
        let system = size(
            period_kwh,
            self.periodicity,
            self.solar_hours,
            &self.reference.catalog,
        )?;
        let financials = price(&system, &self.reference.pricing, self.site);
        let environment = EnvironmentalImpact::from_generation(
            system.annual_generation_kwh,
            &self.reference.pricing.environment,
        );
        let bill_before = kwh_to_payment(period_kwh, self.family, self.periodicity, self.params)?;
        let bill_after = minimum_payment(self.family, self.periodicity, self.params)?;
        let annual_savings =
            ((bill_before - bill_after) * self.periodicity.periods_per_year()).max(0.0);
        let payback_years = payback_years(financials.total, annual_savings);

        Ok(ScenarioResult {
            period_kwh,
            system,
            financials,
            environment,
            bill_before,
            bill_after,
            annual_savings,
            payback_years,
        })
    }
}

/// Builds a proposal from a form submission.
///
/// Tariff constants are those effective on `as_of`. When extra loads are
/// declared, a second scenario is sized at baseline plus extra consumption;
/// if no equipment fits that scenario it is marked infeasible and the
/// baseline proposal is still returned.
///
/// # Arguments
///
/// * `input` - Form answers of the prospect
/// * `reference` - Tariffs, catalog, and pricing constants
/// * `as_of` - Quote date used to pick the tariff period
///
/// # Errors
///
/// Returns `Configuration` for unusable reference data, `InvalidInput` for
/// malformed form figures, and `NoFeasibleConfiguration` when the baseline
/// cannot be sized.
pub fn generate(
    input: &FormInput,
    reference: &ReferenceData,
    as_of: NaiveDate,
) -> Result<Proposal> {
    check_config(reference.validate())?;
    let params = reference.tariffs.parameters_at(as_of);
    let periodicity = input.periodicity;

    let resolution = resolve_consumption(input, &params, &reference.demand)?;
    let requested = !input.extra_loads.is_empty();
    let loads = if requested {
        estimate_breakdown(&input.extra_loads, periodicity, &reference.loads)?
    } else {
        LoadBreakdown::default()
    };
    let consumption = ConsumptionEstimate::new(resolution.period_kwh, loads.total().round());

    let ctx = ScenarioContext {
        reference,
        params: &params,
        family: resolution.family,
        periodicity,
        solar_hours: reference.solar.hours_for(&input.state),
        site: Site {
            floors: input.floors,
            panel_distance_m: input.panel_distance_m,
        },
    };

    let current = ctx.build(consumption.baseline_kwh)?;
    let with_extra = if requested {
        match ctx.build(consumption.with_extra_kwh) {
            Ok(result) => ScenarioOutcome::Computed(Box::new(result)),
            Err(e) if e.is_infeasible() => {
                warn!(
                    kwh = consumption.with_extra_kwh,
                    error = %e,
                    "extra-load scenario infeasible"
                );
                ScenarioOutcome::Infeasible {
                    reason: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        }
    } else {
        ScenarioOutcome::NotRequested
    };

    let pf = periodicity.factor();
    let threshold = params.dac_monthly_threshold_kwh;
    let hypothetical = HypotheticalPayments {
        dac_current: kwh_to_payment(
            consumption.baseline_kwh,
            TariffFamily::Dac,
            periodicity,
            &params,
        )?,
        dac_with_extra: if requested {
            Some(kwh_to_payment(
                consumption.with_extra_kwh,
                TariffFamily::Dac,
                periodicity,
                &params,
            )?)
        } else {
            None
        },
        exceeds_dac_threshold: consumption.baseline_kwh / pf > threshold,
        with_extra_exceeds_dac_threshold: requested && consumption.with_extra_kwh / pf > threshold,
    };
    if hypothetical.exceeds_dac_threshold && resolution.family != TariffFamily::Dac {
        warn!(
            monthly_kwh = consumption.baseline_kwh / pf,
            threshold, "consumption above DAC threshold"
        );
    }

    let code = input.tariff_code();
    info!(
        tariff = %code,
        family = %resolution.family,
        kwh = consumption.baseline_kwh,
        panels = current.system.panel_count,
        total = current.financials.total,
        "proposal generated"
    );

    Ok(Proposal {
        metadata: ProposalMetadata {
            quote_date: as_of,
            tariff_code: code.as_str().to_string(),
            family: resolution.family,
            tariff_guessed: resolution.tariff_guessed,
            periodicity,
            dac_monthly_threshold_kwh: threshold,
            solar_hours: ctx.solar_hours,
            consumption_source: resolution.source,
            property_type: input.property_type,
            state: input.state.clone(),
        },
        consumption,
        loads,
        hypothetical,
        current,
        with_extra,
    })
}

fn write_scenario(f: &mut fmt::Formatter<'_>, label: &str, s: &ScenarioResult) -> fmt::Result {
    let sys = &s.system;
    let fin = &s.financials;
    writeln!(f, "--- {label} ---")?;
    writeln!(f, "Consumption:           {:.0} kWh/period", s.period_kwh)?;
    writeln!(
        f,
        "Panels:                {} x {} W ({}) = {:.2} kWp",
        sys.panel_count,
        sys.panel.watts,
        sys.panel.model,
        sys.array_watts / 1000.0
    )?;
    writeln!(f, "Inverter:              {}", sys.inverter.describe())?;
    writeln!(f, "Mounting:              {}", sys.mounting.model)?;
    writeln!(f, "Roof area:             {:.0} m²", sys.roof_area_m2)?;
    writeln!(f, "Annual generation:     {:.0} kWh", sys.annual_generation_kwh)?;
    writeln!(f, "List price:            ${:.0} MXN", fin.list_price)?;
    writeln!(f, "Subtotal:              ${:.0} MXN", fin.subtotal)?;
    writeln!(f, "IVA:                   ${:.0} MXN", fin.tax)?;
    writeln!(f, "Total:                 ${:.0} MXN", fin.total)?;
    writeln!(
        f,
        "Bill before/after:     ${:.0} / ${:.0} MXN per period",
        s.bill_before, s.bill_after
    )?;
    match s.payback_years {
        Some(years) => writeln!(f, "Payback:               {years:.1} years")?,
        None => writeln!(f, "Payback:               n/a")?,
    }
    writeln!(
        f,
        "CO2 avoided:           {:.2} t/yr ({:.0} trees)",
        s.environment.co2_tonnes, s.environment.trees
    )
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metadata;
        writeln!(f, "--- Proposal {} ---", m.quote_date)?;
        writeln!(
            f,
            "Tariff:                {} ({}{})",
            m.tariff_code,
            m.family,
            if m.tariff_guessed { ", guessed" } else { "" }
        )?;
        writeln!(f, "Billing:               {}", m.periodicity)?;
        writeln!(f, "Solar hours:           {:.1} h/day", m.solar_hours)?;
        writeln!(
            f,
            "DAC payment (current): ${:.0} MXN",
            self.hypothetical.dac_current
        )?;
        if self.hypothetical.exceeds_dac_threshold {
            writeln!(
                f,
                "Warning:               consumption above DAC threshold ({:.0} kWh/month)",
                m.dac_monthly_threshold_kwh
            )?;
        }
        write_scenario(f, "Current consumption", &self.current)?;
        match &self.with_extra {
            ScenarioOutcome::NotRequested => Ok(()),
            ScenarioOutcome::Infeasible { reason } => {
                write!(f, "--- With extra loads ---\nNot available: {reason}")
            }
            ScenarioOutcome::Computed(result) => write_scenario(f, "With extra loads", result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuoteError;
    use crate::loads::EvLoad;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn form() -> FormInput {
        let mut input = FormInput::new(Periodicity::Bimonthly);
        input.tariff = "1".into();
        input.average_payment = Some(3000.0);
        input
    }

    #[test]
    fn baseline_only_without_extra_loads() {
        let p = generate(&form(), &ReferenceData::builtin(), as_of()).unwrap();
        assert_eq!(p.with_extra, ScenarioOutcome::NotRequested);
        assert_eq!(p.hypothetical.dac_with_extra, None);
        assert_eq!(p.consumption.extra_kwh, 0.0);
        assert_eq!(p.metadata.family, TariffFamily::Tiered);
        assert!(!p.metadata.tariff_guessed);
        assert_eq!(p.metadata.consumption_source, ConsumptionSource::Payment);
    }

    #[test]
    fn totals_are_consistent() {
        let p = generate(&form(), &ReferenceData::builtin(), as_of()).unwrap();
        let fin = &p.current.financials;
        assert_eq!(fin.total, fin.subtotal + fin.tax);
        assert!(p.current.system.panel_count >= 1);
        assert!(p.current.bill_before > p.current.bill_after);
        assert!(p.current.payback_years.is_some());
    }

    #[test]
    fn extra_loads_add_a_scenario() {
        let mut input = form();
        input.extra_loads.ev = Some(EvLoad {
            model: "Nissan Leaf".into(),
            daily_km: 40.0,
        });
        let p = generate(&input, &ReferenceData::builtin(), as_of()).unwrap();
        // 0.4 × 17 × 60
        assert_eq!(p.consumption.extra_kwh, 408.0);
        let extra = p.with_extra.result().unwrap();
        assert!(extra.period_kwh > p.current.period_kwh);
        assert!(extra.system.array_watts >= p.current.system.array_watts);
        assert!(p.hypothetical.dac_with_extra.unwrap() > p.hypothetical.dac_current);
    }

    #[test]
    fn infeasible_extra_scenario_keeps_baseline() {
        let mut reference = ReferenceData::builtin();
        reference.catalog.mounting.retain(|m| m.max_panels <= 10);
        let mut input = form();
        input.extra_loads.minisplit = Some(crate::loads::MinisplitLoad {
            units: 4,
            daily_hours: 12.0,
        });
        let p = generate(&input, &reference, as_of()).unwrap();
        assert!(matches!(p.with_extra, ScenarioOutcome::Infeasible { .. }));
        assert!(p.current.system.panel_count >= 1);
    }

    #[test]
    fn invalid_reference_aborts() {
        let mut reference = ReferenceData::builtin();
        reference.catalog.panels.clear();
        let err = generate(&form(), &reference, as_of()).unwrap_err();
        assert!(matches!(err, QuoteError::Configuration { .. }));
    }

    #[test]
    fn quote_date_before_any_tariff_is_a_configuration_error() {
        let early = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let err = generate(&form(), &ReferenceData::builtin(), early).unwrap_err();
        assert!(matches!(err, QuoteError::Configuration { .. }));
    }

    #[test]
    fn summary_mentions_totals() {
        let p = generate(&form(), &ReferenceData::builtin(), as_of()).unwrap();
        let text = p.to_string();
        assert!(text.contains("--- Proposal 2025-06-01 ---"));
        assert!(text.contains("Total:"));
        assert!(!text.contains("With extra loads"));
    }
}
