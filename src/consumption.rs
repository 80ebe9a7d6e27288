//! Form input and baseline consumption resolution.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QuoteError, Result};
use crate::loads::ExtraLoads;
use crate::tariff::{Periodicity, TariffCode, TariffFamily, TariffParameters, payment_to_kwh};

/// Occupant count assumed when the form leaves it blank or negative.
pub const DEFAULT_OCCUPANTS: u32 = 2;

/// Whether the site already has a utility contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    #[default]
    Active,
    InProgress,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[default]
    #[serde(alias = "casa")]
    Residential,
    #[serde(alias = "negocio")]
    Commercial,
}

/// Employee-count range picked on the commercial branch of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmployeeRange {
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

/// Normalized prospect data handed over by the request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormInput {
    #[serde(default)]
    pub contract_status: ContractStatus,
    /// Tariff code from the bill; blank or `"unknown"` when not known.
    #[serde(default, alias = "tarifa")]
    pub tariff: String,
    #[serde(alias = "periodicidad")]
    pub periodicity: Periodicity,
    /// Average taxed payment per billing period (MXN).
    #[serde(default, alias = "pago_promedio")]
    pub average_payment: Option<f64>,
    /// Consumption per billing period typed in or read from the meter.
    #[serde(default, alias = "kwh_consumidos")]
    pub reported_kwh: Option<f64>,
    /// Average consumption of the bill's history block, as read by OCR.
    #[serde(default)]
    pub ocr_average_kwh: Option<f64>,
    #[serde(default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub occupants: Option<i32>,
    #[serde(default)]
    pub employees: Option<EmployeeRange>,
    /// State used for the local solar-hours lookup.
    #[serde(default, alias = "estado")]
    pub state: String,
    #[serde(default = "default_floors")]
    pub floors: u32,
    /// Cable run from the panels to the electrical panel (m).
    #[serde(default)]
    pub panel_distance_m: f64,
    #[serde(default)]
    pub extra_loads: ExtraLoads,
}

fn default_floors() -> u32 {
    1
}

impl FormInput {
    /// A residential form with only the periodicity filled in.
    pub fn new(periodicity: Periodicity) -> Self {
        Self {
            contract_status: ContractStatus::default(),
            tariff: String::new(),
            periodicity,
            average_payment: None,
            reported_kwh: None,
            ocr_average_kwh: None,
            property_type: PropertyType::default(),
            occupants: None,
            employees: None,
            state: String::new(),
            floors: default_floors(),
            panel_distance_m: 0.0,
            extra_loads: ExtraLoads::default(),
        }
    }

    pub fn tariff_code(&self) -> TariffCode {
        TariffCode::parse(&self.tariff)
    }

    /// Rejects negative or non-finite figures before they enter the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let optional = [
            ("average_payment", self.average_payment),
            ("reported_kwh", self.reported_kwh),
            ("ocr_average_kwh", self.ocr_average_kwh),
        ];
        for (field, value) in optional {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(QuoteError::invalid_input(
                        field,
                        format!("must be a non-negative number, got {v}"),
                    ));
                }
            }
        }
        if !self.panel_distance_m.is_finite() || self.panel_distance_m < 0.0 {
            return Err(QuoteError::invalid_input(
                "panel_distance_m",
                format!("must be a non-negative number, got {}", self.panel_distance_m),
            ));
        }
        if let Some(EmployeeRange { min, max: Some(max) }) = self.employees {
            if min > max {
                return Err(QuoteError::invalid_input(
                    "employees",
                    format!("range lower bound {min} exceeds upper bound {max}"),
                ));
            }
        }
        Ok(())
    }
}

/// Monthly consumption for a household size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HouseholdBracket {
    pub occupants: u32,
    pub monthly_kwh: f64,
}

/// Monthly consumption for an employee-count bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmployeeBracket {
    pub min_employees: u32,
    pub max_employees: u32,
    pub monthly_kwh: f64,
}

/// Demographic guess tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemandTables {
    pub household: Vec<HouseholdBracket>,
    pub commercial: Vec<EmployeeBracket>,
}

impl DemandTables {
    /// Monthly kWh of the bracket closest to `occupants`.
    ///
    /// Negative or absent counts use [`DEFAULT_OCCUPANTS`]; ties keep the
    /// earlier table entry.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the household table is empty.
    pub fn household_kwh(&self, occupants: Option<i32>) -> Result<f64> {
        let n = occupants
            .and_then(|o| u32::try_from(o).ok())
            .unwrap_or(DEFAULT_OCCUPANTS);
        self.household
            .iter()
            .min_by_key(|b| b.occupants.abs_diff(n))
            .map(|b| b.monthly_kwh)
            .ok_or_else(|| QuoteError::configuration("demand.household", "table is empty"))
    }

    /// Monthly kWh of the bucket containing the range's lower bound, or the
    /// first bucket when none matches.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the commercial table is empty.
    pub fn commercial_kwh(&self, employees: Option<EmployeeRange>) -> Result<f64> {
        let first = self
            .commercial
            .first()
            .ok_or_else(|| QuoteError::configuration("demand.commercial", "table is empty"))?;
        let bucket = employees
            .and_then(|range| {
                self.commercial
                    .iter()
                    .find(|b| (b.min_employees..=b.max_employees).contains(&range.min))
            })
            .unwrap_or(first);
        Ok(bucket.monthly_kwh)
    }
}

/// Which input the baseline consumption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionSource {
    Reported,
    OcrHistory,
    Payment,
    Household,
    Commercial,
}

/// Baseline consumption and the tariff family it is billed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionResolution {
    /// Consumption for one billing period (kWh).
    pub period_kwh: f64,
    pub source: ConsumptionSource,
    pub family: TariffFamily,
    /// True when the family was inferred rather than read from the tariff code.
    pub tariff_guessed: bool,
}

/// Baseline and with-extra-loads consumption for one billing period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionEstimate {
    pub baseline_kwh: f64,
    pub extra_kwh: f64,
    pub with_extra_kwh: f64,
}

impl ConsumptionEstimate {
    pub fn new(baseline_kwh: f64, extra_kwh: f64) -> Self {
        Self {
            baseline_kwh,
            extra_kwh,
            with_extra_kwh: baseline_kwh + extra_kwh,
        }
    }
}

/// Infers a tariff family when the prospect does not know theirs.
///
/// Commercial sites are assumed low-demand; residential sites above the DAC
/// monthly threshold are assumed DAC, the rest tiered.
pub fn guess_family(
    property_type: PropertyType,
    monthly_kwh: f64,
    params: &TariffParameters,
) -> TariffFamily {
    match property_type {
        PropertyType::Commercial => TariffFamily::LowDemand,
        PropertyType::Residential if monthly_kwh > params.dac_monthly_threshold_kwh => {
            TariffFamily::Dac
        }
        PropertyType::Residential => TariffFamily::Tiered,
    }
}

/// Determines the baseline consumption for one billing period.
///
/// Precedence: reported consumption, then the OCR history average, then the
/// payment inverted through a known tariff, then the demographic tables.
///
/// # Errors
///
/// Returns `Configuration` for unmapped tariff codes or missing tables, and
/// `InvalidInput` for malformed figures.
pub fn resolve_consumption(
    input: &FormInput,
    params: &TariffParameters,
    demand: &DemandTables,
) -> Result<ConsumptionResolution> {
    input.validate()?;
    let code = input.tariff_code();
    let known = params.family_for(&code)?;
    let periodicity = input.periodicity;
    let pf = periodicity.factor();
    let positive = |v: Option<f64>| v.filter(|k| *k > 0.0);

    let (period_kwh, source) = if let Some(kwh) = positive(input.reported_kwh) {
        (kwh, ConsumptionSource::Reported)
    } else if let Some(kwh) = positive(input.ocr_average_kwh) {
        (kwh, ConsumptionSource::OcrHistory)
    } else if let (Some(payment), Some(family)) = (positive(input.average_payment), known) {
        (
            payment_to_kwh(payment, family, periodicity, params)?,
            ConsumptionSource::Payment,
        )
    } else {
        match input.property_type {
            PropertyType::Residential => (
                demand.household_kwh(input.occupants)? * pf,
                ConsumptionSource::Household,
            ),
            PropertyType::Commercial => (
                demand.commercial_kwh(input.employees)? * pf,
                ConsumptionSource::Commercial,
            ),
        }
    };

    let (family, tariff_guessed) = match known {
        Some(family) => (family, false),
        None => (guess_family(input.property_type, period_kwh / pf, params), true),
    };
    debug!(tariff = %code, %family, tariff_guessed, ?source, period_kwh, "resolved consumption");

    Ok(ConsumptionResolution {
        period_kwh,
        source,
        family,
        tariff_guessed,
    })
}
