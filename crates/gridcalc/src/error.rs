//! Error types for worksheet operations

use gridcalc_formula::FormulaError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Worksheet`](crate::Worksheet) mutations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The cell address or range could not be parsed, or lies off the grid
    #[error(transparent)]
    Address(#[from] gridcalc_core::Error),

    /// The formula was stored but could not be parsed, or would close a cycle
    #[error(transparent)]
    Formula(#[from] FormulaError),
}

impl Error {
    /// The formula error, if this is one
    pub fn formula_error(&self) -> Option<&FormulaError> {
        match self {
            Error::Formula(e) => Some(e),
            Error::Address(_) => None,
        }
    }
}
