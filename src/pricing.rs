//! Cost roll-up, list price, taxes, profit, financing, and environmental impact.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::sizing::SystemConfiguration;

/// VAT applied to the installation subtotal.
pub const IVA_RATE: f64 = 0.16;

/// Balance-of-system cost: wiring, protections, and conduit. Floors stand in
/// for building height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceOfSystem {
    pub base_mxn: f64,
    pub per_floor_mxn: f64,
    pub per_meter_mxn: f64,
}

/// Financing offered on the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Financing {
    /// Nominal annual interest rate (0.18 = 18%).
    pub annual_rate: f64,
    pub terms_months: Vec<u32>,
}

impl Default for Financing {
    fn default() -> Self {
        Self {
            annual_rate: 0.18,
            terms_months: vec![12, 24, 36, 48, 60],
        }
    }
}

/// Linear conversion constants for environmental figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentalFactors {
    /// Grid emission factor.
    pub co2_kg_per_kwh: f64,
    /// CO₂ absorbed by one tree in a year.
    pub co2_kg_per_tree_year: f64,
    /// Energy content of one oil barrel.
    pub kwh_per_oil_barrel: f64,
}

impl Default for EnvironmentalFactors {
    fn default() -> Self {
        Self {
            co2_kg_per_kwh: 0.444,
            co2_kg_per_tree_year: 22.0,
            kwh_per_oil_barrel: 1700.0,
        }
    }
}

/// Commercial constants of the installer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// MXN per USD.
    pub exchange_rate: f64,
    pub profit_margin: f64,
    pub discount_rate: f64,
    /// Share of equipment + mounting cost.
    pub transport_rate: f64,
    /// Share of the running subtotal.
    pub insurance_rate: f64,
    pub labor_mxn_per_watt: f64,
    pub extraordinary_mxn: f64,
    /// Customer acquisition cost.
    pub acquisition_cost_mxn: f64,
    pub balance_of_system: BalanceOfSystem,
    pub financing: Financing,
    pub environment: EnvironmentalFactors,
}

impl PricingConfig {
    /// Validates all fields and returns a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !(self.exchange_rate > 0.0) {
            errors.push(ConfigError {
                field: "pricing.exchange_rate".into(),
                message: "must be > 0".into(),
            });
        }
        let rates = [
            ("pricing.profit_margin", self.profit_margin),
            ("pricing.discount_rate", self.discount_rate),
            ("pricing.transport_rate", self.transport_rate),
            ("pricing.insurance_rate", self.insurance_rate),
        ];
        for (field, rate) in rates {
            if !(0.0..1.0).contains(&rate) {
                errors.push(ConfigError {
                    field: field.into(),
                    message: "must be in [0.0, 1.0)".into(),
                });
            }
        }
        if !(self.financing.annual_rate >= 0.0) {
            errors.push(ConfigError {
                field: "pricing.financing.annual_rate".into(),
                message: "must be >= 0".into(),
            });
        }
        if self.financing.terms_months.contains(&0) {
            errors.push(ConfigError {
                field: "pricing.financing.terms_months".into(),
                message: "terms must be > 0".into(),
            });
        }
        let env = &self.environment;
        if !(env.co2_kg_per_tree_year > 0.0 && env.kwh_per_oil_barrel > 0.0) {
            errors.push(ConfigError {
                field: "pricing.environment".into(),
                message: "conversion divisors must be > 0".into(),
            });
        }
        errors
    }
}

/// Site facts that affect installation cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub floors: u32,
    pub panel_distance_m: f64,
}

/// Itemized costs (MXN, rounded).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostItems {
    pub panels: f64,
    pub inverter: f64,
    pub mounting: f64,
    pub balance_of_system: f64,
    pub transport: f64,
    pub labor: f64,
    pub insurance: f64,
    pub extraordinary: f64,
}

/// Monthly instalment for one financing term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancingOption {
    pub months: u32,
    pub monthly_payment: f64,
}

/// Prices and margins for one scenario. Monetary fields are whole MXN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialBreakdown {
    pub items: CostItems,
    pub costs_total: f64,
    pub list_price: f64,
    pub discount: f64,
    pub subtotal: f64,
    pub tax: f64,
    /// Always `subtotal + tax`.
    pub total: f64,
    pub gross_profit: f64,
    pub gross_profit_post_cac: f64,
    /// `None` when the ratio cannot be computed.
    pub usd_per_watt: Option<f64>,
    pub financing: Vec<FinancingOption>,
}

/// Yearly environmental benefit of the generated energy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentalImpact {
    pub co2_tonnes: f64,
    pub trees: f64,
    pub oil_barrels: f64,
}

impl EnvironmentalImpact {
    pub fn from_generation(annual_kwh: f64, factors: &EnvironmentalFactors) -> Self {
        let co2_kg = annual_kwh * factors.co2_kg_per_kwh;
        Self {
            co2_tonnes: co2_kg / 1000.0,
            trees: co2_kg / factors.co2_kg_per_tree_year,
            oil_barrels: annual_kwh / factors.kwh_per_oil_barrel,
        }
    }
}

/// Level monthly payment repaying `principal` over `months`.
pub fn amortized_payment(principal: f64, annual_rate: f64, months: u32) -> f64 {
    if months == 0 {
        return principal;
    }
    let n = f64::from(months);
    let r = annual_rate / 12.0;
    if r <= 0.0 {
        return principal / n;
    }
    principal * r / (1.0 - (1.0 + r).powf(-n))
}

/// Years until savings repay `total`; `None` without positive savings.
pub fn payback_years(total: f64, annual_savings: f64) -> Option<f64> {
    (annual_savings > 0.0 && total.is_finite()).then(|| total / annual_savings)
}

/// Dollars per installed watt, suppressed when not finite.
fn usd_per_watt(subtotal: f64, exchange_rate: f64, array_watts: f64) -> Option<f64> {
    let value = (subtotal / exchange_rate) / array_watts;
    value.is_finite().then_some(value)
}

/// Prices a sized system.
///
/// # Arguments
///
/// * `config` - Sized system for one scenario
/// * `pricing` - Installer commercial constants
/// * `site` - Floors and panel distance for balance-of-system cost
pub fn price(
    config: &SystemConfiguration,
    pricing: &PricingConfig,
    site: Site,
) -> FinancialBreakdown {
    let fx = pricing.exchange_rate;
    let count = f64::from(config.panel_count);
    let watts = f64::from(config.panel.watts);

    let panels = count * watts * config.panel.price_per_watt_usd * fx;
    let inverter = config.inverter.cost_usd() * fx;
    let mounting = count * config.mounting.price_per_panel_usd * fx;
    let bos = &pricing.balance_of_system;
    let balance_of_system = bos.base_mxn
        + f64::from(site.floors) * bos.per_floor_mxn
        + site.panel_distance_m * bos.per_meter_mxn;
    let transport = (panels + inverter + mounting) * pricing.transport_rate;
    let labor = watts * count * pricing.labor_mxn_per_watt;
    let running = panels + inverter + mounting + balance_of_system + transport + labor;
    let insurance = running * pricing.insurance_rate;
    let extraordinary = pricing.extraordinary_mxn;

    let costs_total = running + insurance + extraordinary;
    let margin = 1.0 - pricing.profit_margin;
    let list_price = costs_total / (margin * (1.0 - pricing.discount_rate));
    let subtotal = costs_total / margin;
    let gross_profit = subtotal - costs_total;

    let subtotal_r = subtotal.round();
    let tax_r = (subtotal * IVA_RATE).round();
    let total = subtotal_r + tax_r;

    let financing = pricing
        .financing
        .terms_months
        .iter()
        .map(|&months| FinancingOption {
            months,
            monthly_payment: amortized_payment(total, pricing.financing.annual_rate, months)
                .round(),
        })
        .collect();

    FinancialBreakdown {
        items: CostItems {
            panels: panels.round(),
            inverter: inverter.round(),
            mounting: mounting.round(),
            balance_of_system: balance_of_system.round(),
            transport: transport.round(),
            labor: labor.round(),
            insurance: insurance.round(),
            extraordinary: extraordinary.round(),
        },
        costs_total: costs_total.round(),
        list_price: list_price.round(),
        discount: (list_price - subtotal).round(),
        subtotal: subtotal_r,
        tax: tax_r,
        total,
        gross_profit: gross_profit.round(),
        gross_profit_post_cac: (gross_profit - pricing.acquisition_cost_mxn).round(),
        usd_per_watt: usd_per_watt(subtotal, fx, config.array_watts),
        financing,
    }
}
