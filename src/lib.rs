//! Solar installation quoting engine: tariff conversion, consumption
//! resolution, equipment sizing, pricing, and proposal assembly.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod consumption;
pub mod error;
pub mod loads;
pub mod pricing;
pub mod proposal;
pub mod record;
pub mod sizing;
pub mod tariff;

pub use config::ReferenceData;
pub use consumption::FormInput;
pub use error::{QuoteError, Result};
pub use proposal::{Proposal, generate};
