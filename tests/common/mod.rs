//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use solar_quote::ReferenceData;
use solar_quote::consumption::FormInput;
use solar_quote::tariff::{Periodicity, TariffParameters};

/// Quote date inside the 2025 tariff period of the bundled reference data.
pub fn quote_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

/// Bundled reference data.
pub fn reference() -> ReferenceData {
    ReferenceData::builtin()
}

/// Tariff constants effective on [`quote_date`].
pub fn params() -> TariffParameters {
    reference().tariffs.parameters_at(quote_date())
}

/// Residential tariff "1" form paying `payment` MXN every two months.
pub fn tariff_one_bimonthly(payment: f64) -> FormInput {
    let mut input = FormInput::new(Periodicity::Bimonthly);
    input.tariff = "1".into();
    input.average_payment = Some(payment);
    input
}

/// Tariff "1" form whose reported consumption is above the DAC threshold.
pub fn heavy_tariff_one() -> FormInput {
    let mut input = FormInput::new(Periodicity::Bimonthly);
    input.tariff = "1".into();
    input.reported_kwh = Some(800.0);
    input
}
