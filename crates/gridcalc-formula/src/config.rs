//! Engine limits

use gridcalc_core::{MAX_COLS, MAX_ROWS};

/// Limits applied while tokenizing formulas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Longest accepted formula, in characters (default: 8192)
    pub max_formula_length: usize,
    /// Highest addressable row (default: 1,048,576)
    pub max_rows: u32,
    /// Highest addressable column (default: 16,384)
    pub max_columns: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_formula_length: 8192,
            max_rows: MAX_ROWS,
            max_columns: MAX_COLS,
        }
    }
}
