//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    // Cell types
    CellAddress,
    CellError,
    CellRange,
    CellValue,
    // Formula types
    EngineConfig,
    // Error types
    Error,
    FormulaEngine,
    FormulaError,
    FormulaValue,
    Result,
    // Main types
    Worksheet,
};
