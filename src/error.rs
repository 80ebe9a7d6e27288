//! Error taxonomy for the quoting engine.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while resolving, sizing, or pricing a proposal.
///
/// Every variant carries the table or field it refers to so operators can
/// tell which piece of reference data or input is at fault. The text is not
/// meant to be shown verbatim to prospects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    /// Required reference data (tariff constants, catalog entries, load
    /// constants) is missing or malformed.
    #[error("configuration error in `{table}`: {detail}")]
    Configuration { table: String, detail: String },

    /// The sizer found no panel/inverter/mounting combination within tolerance.
    #[error("no feasible configuration from `{table}`: {detail}")]
    NoFeasibleConfiguration { table: String, detail: String },

    /// The form input is malformed or contradictory.
    #[error("invalid input `{field}`: {detail}")]
    InvalidInput { field: String, detail: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QuoteError>;

impl QuoteError {
    pub(crate) fn configuration(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Configuration {
            table: table.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn infeasible(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NoFeasibleConfiguration {
            table: table.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_input(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Whether this error only invalidates the scenario being computed.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::NoFeasibleConfiguration { .. })
    }
}

impl From<ConfigError> for QuoteError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration {
            table: err.field,
            detail: err.message,
        }
    }
}

/// Collapses a validation report into a single configuration error.
///
/// Returns `Ok(())` when `errors` is empty.
pub(crate) fn check_config(errors: Vec<ConfigError>) -> Result<()> {
    let mut iter = errors.into_iter();
    let Some(first) = iter.next() else {
        return Ok(());
    };
    let rest: Vec<String> = iter.map(|e| e.to_string()).collect();
    if rest.is_empty() {
        return Err(first.into());
    }
    Err(QuoteError::Configuration {
        table: first.field,
        detail: format!("{} (and {} more: {})", first.message, rest.len(), rest.join("; ")),
    })
}
