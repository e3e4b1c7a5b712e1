//! # gridcalc
//!
//! A spreadsheet formula engine.
//!
//! gridcalc tokenizes cell formulas, evaluates them with decimal arithmetic
//! against the current cell values, and keeps a dependency graph so that
//! editing a cell recalculates exactly the formulas that read it.
//!
//! ## Features
//!
//! - Shunting-yard evaluation with spreadsheet precedence (`2^3^2` is 512)
//! - Built-in math, logical, text, date and lookup functions
//! - Custom functions registered per worksheet or engine
//! - Circular references rejected before they enter the graph
//! - Volatile functions (TODAY, NOW) refreshed by full recalculation
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut sheet = Worksheet::new();
//! sheet.set_value("A1", 10).unwrap();
//! sheet.set_value("B1", 20).unwrap();
//! sheet.set_formula("C1", "=A1*B1").unwrap();
//! assert_eq!(sheet.value("C1").unwrap().to_string(), "200");
//!
//! // A formula reading itself is refused
//! assert!(sheet.set_formula("D1", "=D1+1").is_err());
//! ```

pub mod calculation;
pub mod error;
pub mod prelude;
pub mod worksheet;

pub use calculation::{CalculationOptions, CalculationStats};
pub use error::{Error, Result};
pub use worksheet::{CellEntry, Worksheet};

// Re-export core types
pub use gridcalc_core::{CellAddress, CellError, CellRange, CellValue, MAX_COLS, MAX_ROWS};

// Re-export formula types
pub use gridcalc_formula::{
    evaluate, extract_dependencies, tokenize, tokens_to_string, validate, CellLookup,
    DependencyGraph, EmptyLookup, EngineConfig, ErrorKind, EvaluationContext, Formula,
    FormulaEngine, FormulaError, FormulaResult, FormulaValue, FunctionRegistry, Token,
};
