//! Full-sheet recalculation
//!
//! Edits already recalculate their dependents; a full pass is needed after
//! registering custom functions or to refresh volatile cells (TODAY, NOW).
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut sheet = Worksheet::new();
//! sheet.set_value("A1", 10).unwrap();
//! sheet.set_value("A2", 20).unwrap();
//! sheet.set_formula("A3", "=A1+A2").unwrap();
//!
//! let stats = sheet.recalculate_all();
//! assert_eq!(stats.formula_count, 1);
//! assert_eq!(stats.cells_calculated, 1);
//! ```

use crate::worksheet::{CellEntry, Worksheet};
use gridcalc_core::CellAddress;
use tracing::debug;

/// Options for a full recalculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Re-evaluate formulas calling volatile functions (TODAY, NOW)
    /// even when a cached result exists
    pub calculate_volatile: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            calculate_volatile: true,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of valid formula cells
    pub formula_count: usize,
    /// Number of cells evaluated in this pass
    pub cells_calculated: usize,
    /// Number of volatile cells re-evaluated
    pub volatile_cells: usize,
    /// Formula cells whose result is an error value
    pub errors: usize,
    /// Cells holding formula text that could not be registered
    /// (syntax errors and circular references)
    pub invalid_formulas: usize,
}

impl Worksheet {
    /// Recalculate every formula with default options
    pub fn recalculate_all(&mut self) -> CalculationStats {
        self.recalculate_with(&CalculationOptions::default())
    }

    /// Recalculate every formula in dependency order
    ///
    /// Stored formula text that failed to register is parsed again first,
    /// so formulas calling a function registered since then come back to
    /// life. Formulas are re-evaluated from scratch. With
    /// `calculate_volatile` off, volatile formulas that already hold a
    /// result keep it.
    pub fn recalculate_with(&mut self, options: &CalculationOptions) -> CalculationStats {
        let mut stats = CalculationStats::default();
        let now = self.now();

        let mut invalid: Vec<(CellAddress, String)> = self
            .cells
            .iter()
            .filter_map(|(addr, entry)| match entry {
                CellEntry::Invalid { expression, .. } => Some((*addr, expression.clone())),
                _ => None,
            })
            .collect();
        invalid.sort_unstable_by_key(|(addr, _)| *addr);
        for (addr, expression) in invalid {
            self.register_stored(addr, &expression);
        }

        for entry in self.cells.values() {
            match entry {
                CellEntry::Formula(_) => stats.formula_count += 1,
                CellEntry::Invalid { .. } => stats.invalid_formulas += 1,
                CellEntry::Value(_) => {}
            }
        }

        for addr in self.graph.evaluation_order() {
            let (volatile, cached) = match self.cells.get(&addr) {
                Some(CellEntry::Formula(f)) => (f.is_volatile(), f.cached_result().is_some()),
                _ => continue,
            };
            if volatile && cached && !options.calculate_volatile {
                continue;
            }

            if self.evaluate_cell(addr, now) {
                stats.cells_calculated += 1;
                if volatile {
                    stats.volatile_cells += 1;
                }
                if self.value_at(&addr).is_error() {
                    stats.errors += 1;
                }
            }
        }

        debug!(
            formulas = stats.formula_count,
            calculated = stats.cells_calculated,
            errors = stats.errors,
            "recalculated worksheet"
        );
        stats
    }
}
