//! Formula error types

use gridcalc_core::{CellAddress, CellError};
use std::fmt;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while tokenizing, validating or evaluating a formula
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// The formula text could not be split into tokens
    #[error("{message} at position {position}: '{fragment}'")]
    Tokenize {
        message: String,
        fragment: String,
        /// Byte offset into the formula text
        position: usize,
    },

    /// Parentheses are not properly nested
    #[error("Unbalanced parentheses: {0}")]
    UnbalancedParentheses(String),

    /// Tokens appear in an order that cannot form an expression
    #[error("Invalid token sequence: {0}")]
    InvalidTokenSequence(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArityMismatch {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Operand cannot be coerced to the type an operator needs
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// The operand and operator stacks did not reduce to a single value
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    /// Accepting the formula would close a dependency cycle
    #[error("Circular reference: {}", CyclePath(.cells))]
    CircularReference { cells: Vec<CellAddress> },

    /// Reference to invalid cell
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

struct CyclePath<'a>(&'a [CellAddress]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", cell)?;
        }
        Ok(())
    }
}

/// Machine-readable classification of a [`FormulaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Tokenize,
    UnbalancedParentheses,
    InvalidTokenSequence,
    UnknownFunction,
    ArityMismatch,
    TypeMismatch,
    DivisionByZero,
    MalformedExpression,
    CircularReference,
    InvalidReference,
}

impl ErrorKind {
    /// Stable identifier for hosts that report errors over an API
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Tokenize => "tokenize",
            ErrorKind::UnbalancedParentheses => "unbalanced_parentheses",
            ErrorKind::InvalidTokenSequence => "invalid_token_sequence",
            ErrorKind::UnknownFunction => "unknown_function",
            ErrorKind::ArityMismatch => "arity_mismatch",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::DivisionByZero => "division_by_zero",
            ErrorKind::MalformedExpression => "malformed_expression",
            ErrorKind::CircularReference => "circular_reference",
            ErrorKind::InvalidReference => "invalid_reference",
        }
    }

    /// Whether this kind is raised before evaluation starts
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            ErrorKind::Tokenize
                | ErrorKind::UnbalancedParentheses
                | ErrorKind::InvalidTokenSequence
                | ErrorKind::UnknownFunction
                | ErrorKind::ArityMismatch
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FormulaError {
    /// Create a tokenize error
    pub fn tokenize(message: impl Into<String>, fragment: impl Into<String>, position: usize) -> Self {
        FormulaError::Tokenize {
            message: message.into(),
            fragment: fragment.into(),
            position,
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::Tokenize { .. } => ErrorKind::Tokenize,
            FormulaError::UnbalancedParentheses(_) => ErrorKind::UnbalancedParentheses,
            FormulaError::InvalidTokenSequence(_) => ErrorKind::InvalidTokenSequence,
            FormulaError::UnknownFunction(_) => ErrorKind::UnknownFunction,
            FormulaError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            FormulaError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            FormulaError::DivisionByZero => ErrorKind::DivisionByZero,
            FormulaError::MalformedExpression(_) => ErrorKind::MalformedExpression,
            FormulaError::CircularReference { .. } => ErrorKind::CircularReference,
            FormulaError::InvalidReference(_) => ErrorKind::InvalidReference,
        }
    }

    /// The error marker a cell displays when its formula fails this way
    pub fn cell_error(&self) -> CellError {
        match self {
            FormulaError::UnknownFunction(_) => CellError::Name,
            FormulaError::TypeMismatch(_) => CellError::Value,
            FormulaError::DivisionByZero => CellError::Div0,
            FormulaError::CircularReference { .. } => CellError::Circular,
            FormulaError::InvalidReference(_) => CellError::Ref,
            FormulaError::Tokenize { .. }
            | FormulaError::UnbalancedParentheses(_)
            | FormulaError::InvalidTokenSequence(_)
            | FormulaError::ArityMismatch { .. }
            | FormulaError::MalformedExpression(_) => CellError::Error,
        }
    }
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(err: gridcalc_core::Error) -> Self {
        FormulaError::InvalidReference(err.to_string())
    }
}
