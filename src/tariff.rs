//! Payment ⇄ consumption conversion under the three tariff families.
//!
//! All rate constants are stored per month and before tax. A bimonthly bill
//! multiplies the fixed and minimum charges by two and stretches tier
//! boundaries by the same factor, so the per-kWh part scales linearly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::error::{QuoteError, Result};

/// Billing period of the utility bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Periodicity {
    #[serde(rename = "mensual", alias = "monthly")]
    Monthly,
    #[serde(rename = "bimestral", alias = "bimonthly")]
    Bimonthly,
}

impl Periodicity {
    /// Multiplier applied to monthly constants (1 or 2).
    pub fn factor(self) -> f64 {
        match self {
            Self::Monthly => 1.0,
            Self::Bimonthly => 2.0,
        }
    }

    /// Days covered by one bill.
    pub fn days(self) -> f64 {
        match self {
            Self::Monthly => 30.0,
            Self::Bimonthly => 60.0,
        }
    }

    /// Weeks covered by one bill.
    pub fn weeks(self) -> f64 {
        match self {
            Self::Monthly => 4.0,
            Self::Bimonthly => 8.0,
        }
    }

    /// Bills per year.
    pub fn periods_per_year(self) -> f64 {
        12.0 / self.factor()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "mensual",
            Self::Bimonthly => "bimestral",
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tariff structure a bill is computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffFamily {
    /// Residential tariffs (1, 1A–1F) with increasing price tiers.
    Tiered,
    /// Low-demand commercial tariff (PDBT), flat rate.
    LowDemand,
    /// High-consumption residential tariff (DAC), flat rate.
    Dac,
}

impl TariffFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tiered => "tiered",
            Self::LowDemand => "low_demand",
            Self::Dac => "dac",
        }
    }
}

impl fmt::Display for TariffFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tariff code as printed on the bill, or an explicit "don't know".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TariffCode {
    Code(String),
    Unknown,
}

impl TariffCode {
    /// Normalizes a raw form value. Blank and "unknown"-style answers map to
    /// [`TariffCode::Unknown`]; anything else is kept upper-cased.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "unknown" | "desconocida" | "no_se" | "no sé" | "nose" => Self::Unknown,
            _ => Self::Code(trimmed.to_uppercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Code(code) => code,
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TariffCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price band of a tiered tariff. `up_to_kwh` is the monthly upper bound;
/// `None` marks the open-ended last tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tier {
    #[serde(default)]
    pub up_to_kwh: Option<f64>,
    pub price_per_kwh: f64,
}

/// Monthly constants of the tiered residential family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TieredRates {
    pub fixed_charge: f64,
    pub minimum_charge: f64,
    pub tiers: Vec<Tier>,
}

/// Monthly constants of a flat-rate family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlatRates {
    pub fixed_charge: f64,
    pub price_per_kwh: f64,
    pub minimum_charge: f64,
}

/// Tariff constants effective for one quote date.
#[derive(Debug, Clone, PartialEq)]
pub struct TariffParameters {
    pub tiered: Option<TieredRates>,
    pub low_demand: Option<FlatRates>,
    pub dac: Option<FlatRates>,
    /// VAT multiplier minus one (0.16).
    pub tax_rate: f64,
    /// Monthly consumption above which a residential customer is billed DAC.
    pub dac_monthly_threshold_kwh: f64,
    /// Monthly floor applied when inverting flat-rate payments.
    pub min_plausible_kwh: f64,
    /// Tariff code → family table.
    pub codes: BTreeMap<String, TariffFamily>,
}

impl TariffParameters {
    /// Looks up the family of a tariff code.
    ///
    /// Returns `Ok(None)` for [`TariffCode::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the code has no configured family.
    pub fn family_for(&self, code: &TariffCode) -> Result<Option<TariffFamily>> {
        match code {
            TariffCode::Unknown => Ok(None),
            TariffCode::Code(c) => self.codes.get(c).copied().map(Some).ok_or_else(|| {
                QuoteError::configuration(
                    "tariffs.codes",
                    format!("no tariff family configured for code \"{c}\""),
                )
            }),
        }
    }

    fn tiered_rates(&self) -> Result<&TieredRates> {
        let rates = self.tiered.as_ref().ok_or_else(|| {
            QuoteError::configuration("tariffs.tiered", "no effective tiered tariff constants")
        })?;
        if rates.tiers.is_empty() {
            return Err(QuoteError::configuration(
                "tariffs.tiered",
                "tier list is empty",
            ));
        }
        Ok(rates)
    }

    fn flat_rates(&self, family: TariffFamily) -> Result<&FlatRates> {
        let rates = match family {
            TariffFamily::LowDemand => self.low_demand.as_ref(),
            TariffFamily::Dac => self.dac.as_ref(),
            TariffFamily::Tiered => None,
        };
        let rates = rates.ok_or_else(|| {
            QuoteError::configuration(
                format!("tariffs.{family}"),
                "no effective flat-rate constants",
            )
        })?;
        if rates.price_per_kwh <= 0.0 || !rates.price_per_kwh.is_finite() {
            return Err(QuoteError::configuration(
                format!("tariffs.{family}"),
                "price_per_kwh must be > 0",
            ));
        }
        Ok(rates)
    }

    fn tax_multiplier(&self) -> f64 {
        1.0 + self.tax_rate
    }
}

/// Rates that take effect on a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Effective<T> {
    pub effective_from: NaiveDate,
    pub rates: T,
}

/// Dated tariff reference data as published by the utility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TariffSchedule {
    pub tax_rate: f64,
    pub dac_monthly_threshold_kwh: f64,
    pub min_plausible_kwh: f64,
    pub codes: BTreeMap<String, TariffFamily>,
    pub tiered: Vec<Effective<TieredRates>>,
    pub low_demand: Vec<Effective<FlatRates>>,
    pub dac: Vec<Effective<FlatRates>>,
}

/// Most recent period effective on or before `as_of`.
fn latest<T: Clone>(periods: &[Effective<T>], as_of: NaiveDate) -> Option<T> {
    periods
        .iter()
        .filter(|p| p.effective_from <= as_of)
        .max_by_key(|p| p.effective_from)
        .map(|p| p.rates.clone())
}

impl TariffSchedule {
    /// Resolves the constants effective on `as_of`.
    ///
    /// A family with no period on or before that date is left empty; using
    /// it later fails with a configuration error.
    pub fn parameters_at(&self, as_of: NaiveDate) -> TariffParameters {
        TariffParameters {
            tiered: latest(&self.tiered, as_of),
            low_demand: latest(&self.low_demand, as_of),
            dac: latest(&self.dac, as_of),
            tax_rate: self.tax_rate,
            dac_monthly_threshold_kwh: self.dac_monthly_threshold_kwh,
            min_plausible_kwh: self.min_plausible_kwh,
            codes: self.codes.clone(),
        }
    }

    /// Validates all periods and returns a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !(0.0..1.0).contains(&self.tax_rate) {
            errors.push(ConfigError {
                field: "tariffs.tax_rate".into(),
                message: "must be in [0.0, 1.0)".into(),
            });
        }
        if !(self.dac_monthly_threshold_kwh > 0.0) {
            errors.push(ConfigError {
                field: "tariffs.dac_monthly_threshold_kwh".into(),
                message: "must be > 0".into(),
            });
        }
        if !(self.min_plausible_kwh >= 0.0) {
            errors.push(ConfigError {
                field: "tariffs.min_plausible_kwh".into(),
                message: "must be >= 0".into(),
            });
        }
        for (i, period) in self.tiered.iter().enumerate() {
            let field = format!("tariffs.tiered[{i}]");
            let tiers = &period.rates.tiers;
            if tiers.is_empty() {
                errors.push(ConfigError {
                    field: format!("{field}.tiers"),
                    message: "must not be empty".into(),
                });
            }
            let mut lower = 0.0;
            for (j, tier) in tiers.iter().enumerate() {
                if !(tier.price_per_kwh > 0.0) {
                    errors.push(ConfigError {
                        field: format!("{field}.tiers[{j}].price_per_kwh"),
                        message: "must be > 0".into(),
                    });
                }
                match tier.up_to_kwh {
                    Some(up) if up <= lower => errors.push(ConfigError {
                        field: format!("{field}.tiers[{j}].up_to_kwh"),
                        message: "tier bounds must increase".into(),
                    }),
                    Some(up) => lower = up,
                    None if j + 1 != tiers.len() => errors.push(ConfigError {
                        field: format!("{field}.tiers[{j}].up_to_kwh"),
                        message: "only the last tier may be open-ended".into(),
                    }),
                    None => {}
                }
            }
        }
        let flats = [("low_demand", &self.low_demand), ("dac", &self.dac)];
        for (name, periods) in flats {
            for (i, period) in periods.iter().enumerate() {
                if !(period.rates.price_per_kwh > 0.0) {
                    errors.push(ConfigError {
                        field: format!("tariffs.{name}[{i}].rates.price_per_kwh"),
                        message: "must be > 0".into(),
                    });
                }
            }
        }
        errors
    }
}

/// Taxed bill for zero consumption: the larger of the fixed and minimum
/// charges for the period.
///
/// # Errors
///
/// Returns `Configuration` if the family's constants are missing.
pub fn minimum_payment(
    family: TariffFamily,
    periodicity: Periodicity,
    params: &TariffParameters,
) -> Result<f64> {
    let pf = periodicity.factor();
    let floor = match family {
        TariffFamily::Tiered => {
            let r = params.tiered_rates()?;
            r.fixed_charge.max(r.minimum_charge)
        }
        _ => {
            let r = params.flat_rates(family)?;
            r.fixed_charge.max(r.minimum_charge)
        }
    };
    Ok(floor * pf * params.tax_multiplier())
}

/// Converts consumption for one billing period into the taxed payment (MXN).
///
/// # Arguments
///
/// * `kwh` - Consumption for the whole period
/// * `family` - Rate structure to apply
/// * `periodicity` - Billing period; tier bounds and charges scale with it
/// * `params` - Tariff constants effective on the quote date
///
/// # Errors
///
/// Returns `InvalidInput` for negative or non-finite `kwh`, and
/// `Configuration` if the family's constants are missing.
pub fn kwh_to_payment(
    kwh: f64,
    family: TariffFamily,
    periodicity: Periodicity,
    params: &TariffParameters,
) -> Result<f64> {
    if !kwh.is_finite() || kwh < 0.0 {
        return Err(QuoteError::invalid_input(
            "kwh",
            format!("consumption must be a non-negative number, got {kwh}"),
        ));
    }
    let pf = periodicity.factor();
    let pre_tax = match family {
        TariffFamily::Tiered => {
            let r = params.tiered_rates()?;
            let energy = tiered_energy_charge(kwh, &r.tiers, pf);
            (r.fixed_charge * pf + energy).max(r.minimum_charge * pf)
        }
        _ => {
            let r = params.flat_rates(family)?;
            (r.fixed_charge * pf + kwh * r.price_per_kwh).max(r.minimum_charge * pf)
        }
    };
    Ok(pre_tax * params.tax_multiplier())
}

/// Converts a taxed payment for one billing period back into consumption.
///
/// Payments at or below the minimum charge map to the consumption that the
/// minimum charge buys. Flat-rate results never go below
/// `min_plausible_kwh` for the period.
///
/// # Arguments
///
/// * `amount` - Taxed payment for the whole period (MXN)
/// * `family` - Rate structure to invert
/// * `periodicity` - Billing period of `amount`
/// * `params` - Tariff constants effective on the quote date
///
/// # Errors
///
/// Returns `InvalidInput` for negative or non-finite `amount`, and
/// `Configuration` if the family's constants are missing.
pub fn payment_to_kwh(
    amount: f64,
    family: TariffFamily,
    periodicity: Periodicity,
    params: &TariffParameters,
) -> Result<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(QuoteError::invalid_input(
            "average_payment",
            format!("payment must be a non-negative number, got {amount}"),
        ));
    }
    let pf = periodicity.factor();
    let pre_tax = amount / params.tax_multiplier();
    let kwh = match family {
        TariffFamily::Tiered => {
            let r = params.tiered_rates()?;
            let energy = pre_tax.max(r.minimum_charge * pf) - r.fixed_charge * pf;
            tiered_kwh_for_charge(energy, &r.tiers, pf)
        }
        _ => {
            let r = params.flat_rates(family)?;
            let energy = pre_tax.max(r.minimum_charge * pf) - r.fixed_charge * pf;
            let kwh = energy / r.price_per_kwh;
            let floor = params.min_plausible_kwh * pf;
            if kwh < floor {
                debug!(family = %family, kwh, floor, "flat-rate inversion below plausible floor");
            }
            kwh.max(floor)
        }
    };
    Ok(kwh)
}

/// Energy charge of `kwh` across the tiers, boundaries scaled by `pf`.
/// Consumption beyond a bounded last tier is billed at its price.
fn tiered_energy_charge(kwh: f64, tiers: &[Tier], pf: f64) -> f64 {
    let mut charge = 0.0;
    let mut remaining = kwh;
    let mut lower = 0.0;
    let mut last_price = 0.0;
    for tier in tiers {
        last_price = tier.price_per_kwh;
        let take = match tier.up_to_kwh {
            Some(up) => {
                let upper = up * pf;
                let width = (upper - lower).max(0.0);
                lower = upper;
                remaining.min(width)
            }
            None => remaining,
        };
        charge += take * tier.price_per_kwh;
        remaining -= take;
        if remaining <= 0.0 {
            return charge;
        }
    }
    charge + remaining * last_price
}

/// Inverse of [`tiered_energy_charge`].
fn tiered_kwh_for_charge(charge: f64, tiers: &[Tier], pf: f64) -> f64 {
    if charge <= 0.0 {
        return 0.0;
    }
    let mut kwh = 0.0;
    let mut remaining = charge;
    let mut lower = 0.0;
    let mut last_price = 0.0;
    for tier in tiers {
        last_price = tier.price_per_kwh;
        match tier.up_to_kwh {
            Some(up) => {
                let upper = up * pf;
                let width = (upper - lower).max(0.0);
                lower = upper;
                let cost = width * tier.price_per_kwh;
                if remaining <= cost {
                    return kwh + remaining / tier.price_per_kwh;
                }
                kwh += width;
                remaining -= cost;
            }
            None => return kwh + remaining / tier.price_per_kwh,
        }
    }
    kwh + remaining / last_price
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn params() -> TariffParameters {
        let mut codes = BTreeMap::new();
        codes.insert("1".to_string(), TariffFamily::Tiered);
        codes.insert("PDBT".to_string(), TariffFamily::LowDemand);
        codes.insert("DAC".to_string(), TariffFamily::Dac);
        TariffParameters {
            tiered: Some(TieredRates {
                fixed_charge: 0.0,
                minimum_charge: 27.0,
                tiers: vec![
                    Tier {
                        up_to_kwh: Some(75.0),
                        price_per_kwh: 1.08,
                    },
                    Tier {
                        up_to_kwh: Some(140.0),
                        price_per_kwh: 1.31,
                    },
                    Tier {
                        up_to_kwh: None,
                        price_per_kwh: 3.84,
                    },
                ],
            }),
            low_demand: Some(FlatRates {
                fixed_charge: 65.0,
                price_per_kwh: 3.45,
                minimum_charge: 65.0,
            }),
            dac: Some(FlatRates {
                fixed_charge: 125.0,
                price_per_kwh: 6.42,
                minimum_charge: 125.0,
            }),
            tax_rate: 0.16,
            dac_monthly_threshold_kwh: 250.0,
            min_plausible_kwh: 30.0,
            codes,
        }
    }

    const FAMILIES: [TariffFamily; 3] = [
        TariffFamily::Tiered,
        TariffFamily::LowDemand,
        TariffFamily::Dac,
    ];
    const PERIODS: [Periodicity; 2] = [Periodicity::Monthly, Periodicity::Bimonthly];

    #[test]
    fn tiered_payment_sums_bands() {
        let p = params();
        let pay = kwh_to_payment(200.0, TariffFamily::Tiered, Periodicity::Monthly, &p).unwrap();
        let expected = (75.0 * 1.08 + 65.0 * 1.31 + 60.0 * 3.84) * 1.16;
        assert!((pay - expected).abs() < 1e-9);
    }

    #[test]
    fn bimonthly_doubles_tier_boundaries() {
        let p = params();
        let monthly =
            kwh_to_payment(100.0, TariffFamily::Tiered, Periodicity::Monthly, &p).unwrap();
        let bimonthly =
            kwh_to_payment(200.0, TariffFamily::Tiered, Periodicity::Bimonthly, &p).unwrap();
        assert!((bimonthly - 2.0 * monthly).abs() < 1e-9);
    }

    #[test]
    fn round_trip_across_tier_boundaries() {
        let p = params();
        for pf in PERIODS {
            let f = pf.factor();
            for k in [30.0, 74.0, 76.0, 139.0, 141.0, 260.0, 900.0] {
                let kwh = k * f;
                for family in FAMILIES {
                    let pay = kwh_to_payment(kwh, family, pf, &p).unwrap();
                    let back = payment_to_kwh(pay, family, pf, &p).unwrap();
                    assert!(
                        (back - kwh).abs() < 1e-6,
                        "{family} {pf}: {kwh} kWh -> {pay} -> {back}"
                    );
                }
            }
        }
    }

    #[test]
    fn zero_consumption_pays_taxed_minimum() {
        let p = params();
        for pf in PERIODS {
            for family in FAMILIES {
                let pay = kwh_to_payment(0.0, family, pf, &p).unwrap();
                let min = minimum_payment(family, pf, &p).unwrap();
                assert!(pay > 0.0);
                assert!((pay - min).abs() < 1e-9, "{family} {pf}");
            }
        }
        let min = minimum_payment(TariffFamily::Tiered, Periodicity::Bimonthly, &p).unwrap();
        assert!((min - 27.0 * 2.0 * 1.16).abs() < 1e-9);
    }

    #[test]
    fn flat_inverse_applies_plausible_floor() {
        let p = params();
        let kwh = payment_to_kwh(10.0, TariffFamily::Dac, Periodicity::Bimonthly, &p).unwrap();
        assert_eq!(kwh, 60.0);
    }

    #[test]
    fn tiered_inverse_of_tiny_payment_uses_minimum_charge() {
        let p = params();
        let kwh = payment_to_kwh(1.0, TariffFamily::Tiered, Periodicity::Monthly, &p).unwrap();
        assert!((kwh - 27.0 / 1.08).abs() < 1e-9);
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let p = params();
        assert!(matches!(
            kwh_to_payment(-1.0, TariffFamily::Dac, Periodicity::Monthly, &p),
            Err(QuoteError::InvalidInput { .. })
        ));
        assert!(matches!(
            payment_to_kwh(f64::NAN, TariffFamily::Dac, Periodicity::Monthly, &p),
            Err(QuoteError::InvalidInput { .. })
        ));
    }

    #[test]
    fn missing_family_constants_fail_fast() {
        let mut p = params();
        p.dac = None;
        let err = kwh_to_payment(300.0, TariffFamily::Dac, Periodicity::Monthly, &p).unwrap_err();
        assert_eq!(
            err,
            QuoteError::configuration("tariffs.dac", "no effective flat-rate constants")
        );
        p.tiered.as_mut().unwrap().tiers.clear();
        assert!(payment_to_kwh(500.0, TariffFamily::Tiered, Periodicity::Monthly, &p).is_err());
    }

    #[test]
    fn code_lookup() {
        let p = params();
        assert_eq!(
            p.family_for(&TariffCode::parse("pdbt")).unwrap(),
            Some(TariffFamily::LowDemand)
        );
        assert_eq!(p.family_for(&TariffCode::parse("  ")).unwrap(), None);
        assert_eq!(p.family_for(&TariffCode::parse("desconocida")).unwrap(), None);
        assert!(matches!(
            p.family_for(&TariffCode::parse("GDMTH")),
            Err(QuoteError::Configuration { .. })
        ));
    }

    #[test]
    fn periodicity_parses_spanish_and_english() {
        let m: Periodicity = serde_json::from_str("\"bimestral\"").unwrap();
        let e: Periodicity = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(m, Periodicity::Bimonthly);
        assert_eq!(e, Periodicity::Monthly);
        assert_eq!(Periodicity::Bimonthly.days(), 60.0);
        assert_eq!(Periodicity::Monthly.weeks(), 4.0);
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule() -> TariffSchedule {
        let p = params();
        let flat = |price| FlatRates {
            fixed_charge: 125.0,
            price_per_kwh: price,
            minimum_charge: 125.0,
        };
        TariffSchedule {
            tax_rate: p.tax_rate,
            dac_monthly_threshold_kwh: p.dac_monthly_threshold_kwh,
            min_plausible_kwh: p.min_plausible_kwh,
            codes: p.codes.clone(),
            tiered: vec![Effective {
                effective_from: date(2025, 1, 1),
                rates: p.tiered.clone().unwrap(),
            }],
            low_demand: Vec::new(),
            dac: vec![
                Effective {
                    effective_from: date(2024, 1, 1),
                    rates: flat(6.0),
                },
                Effective {
                    effective_from: date(2025, 6, 1),
                    rates: flat(6.42),
                },
            ],
        }
    }

    #[test]
    fn most_recent_period_is_selected() {
        let s = schedule();
        let later = s.parameters_at(date(2025, 8, 1));
        assert_eq!(later.dac.map(|r| r.price_per_kwh), Some(6.42));
        let earlier = s.parameters_at(date(2025, 3, 1));
        assert_eq!(earlier.dac.map(|r| r.price_per_kwh), Some(6.0));
    }

    #[test]
    fn family_without_effective_period_fails_on_use() {
        let p = schedule().parameters_at(date(2024, 6, 1));
        assert!(p.tiered.is_none());
        assert!(matches!(
            kwh_to_payment(100.0, TariffFamily::Tiered, Periodicity::Monthly, &p),
            Err(QuoteError::Configuration { .. })
        ));
        assert!(kwh_to_payment(100.0, TariffFamily::LowDemand, Periodicity::Monthly, &p).is_err());
    }

    #[test]
    fn schedule_validation() {
        let mut s = schedule();
        assert!(s.validate().is_empty(), "{:?}", s.validate());
        s.tiered[0].rates.tiers[1].up_to_kwh = Some(50.0);
        s.dac[0].rates.price_per_kwh = 0.0;
        let errors = s.validate();
        assert!(errors.iter().any(|e| e.field == "tariffs.tiered[0].tiers[1].up_to_kwh"));
        assert!(errors.iter().any(|e| e.field == "tariffs.dac[0].rates.price_per_kwh"));
    }
}
