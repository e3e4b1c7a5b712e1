//! Worksheet: a flat cell table with dependency-driven recalculation

use crate::error::Result;
use ahash::AHashMap;
use chrono::{Local, NaiveDateTime};
use gridcalc_core::{CellAddress, CellError, CellRange, CellValue};
use gridcalc_formula::{
    CellLookup, DependencyGraph, EvaluationContext, Formula, FormulaEngine, FormulaError,
    FormulaResult, FormulaValue,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Contents of one cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellEntry {
    /// A literal value
    Value(CellValue),
    /// A formula that parsed and is tracked in the dependency graph
    Formula(Formula),
    /// Formula text kept as entered that cannot be evaluated
    ///
    /// Syntax errors and formulas that would close a dependency cycle land
    /// here; the cell shows `error`.
    Invalid { expression: String, error: CellError },
}

impl CellEntry {
    /// Formula text, for formula and invalid cells
    pub fn expression(&self) -> Option<&str> {
        match self {
            CellEntry::Value(_) => None,
            CellEntry::Formula(f) => Some(f.expression()),
            CellEntry::Invalid { expression, .. } => Some(expression),
        }
    }

    /// The value other formulas see when they read this cell
    pub fn value(&self) -> CellValue {
        match self {
            CellEntry::Value(v) => v.clone(),
            CellEntry::Formula(f) => f
                .cached_result()
                .cloned()
                .map(CellValue::from)
                .unwrap_or_default(),
            CellEntry::Invalid { error, .. } => CellValue::Error(*error),
        }
    }
}

/// A worksheet
///
/// Cells live in one table keyed by address; formulas refer to other cells
/// by address only and read them through [`CellLookup`] when evaluated.
/// Every mutation recalculates the cells that depend on the edited one.
///
/// # Example
/// ```rust
/// use gridcalc::prelude::*;
///
/// let mut sheet = Worksheet::new();
/// sheet.set_value("A1", 10).unwrap();
/// sheet.set_value("B1", 20).unwrap();
/// sheet.set_formula("C1", "=SUM(A1, B1)").unwrap();
/// assert_eq!(sheet.value("C1").unwrap(), CellValue::from(30));
///
/// sheet.set_value("A1", 1).unwrap();
/// assert_eq!(sheet.value("C1").unwrap(), CellValue::from(21));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub(crate) cells: AHashMap<CellAddress, CellEntry>,
    pub(crate) graph: DependencyGraph,
    pub(crate) engine: FormulaEngine,
    /// Pinned time for TODAY/NOW; the local clock when unset
    pub(crate) clock: Option<NaiveDateTime>,
    /// Cells rejected as circular, retried after every edit
    pub(crate) circular: BTreeSet<CellAddress>,
}

impl Worksheet {
    /// Create an empty worksheet with the built-in functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty worksheet using `engine`'s functions and limits
    pub fn with_engine(engine: FormulaEngine) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }

    pub fn engine(&self) -> &FormulaEngine {
        &self.engine
    }

    /// Pin the time TODAY and NOW report, or unpin with `None`
    pub fn set_clock(&mut self, now: Option<NaiveDateTime>) {
        self.clock = now;
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Parse an A1 address and check it against the engine's grid limits
    pub fn parse_address(&self, address: &str) -> Result<CellAddress> {
        let addr = CellAddress::parse(address)?;
        self.check_address(addr)
    }

    fn check_address(&self, addr: CellAddress) -> Result<CellAddress> {
        let config = self.engine.config();
        addr.check_bounds(config.max_rows, config.max_columns)?;
        Ok(addr)
    }

    /// Set a literal value
    pub fn set_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = self.parse_address(address)?;
        self.set_value_at(addr, value)
    }

    /// Set a literal value by address
    pub fn set_value_at<V: Into<CellValue>>(&mut self, addr: CellAddress, value: V) -> Result<()> {
        let addr = self.check_address(addr)?;
        self.circular.remove(&addr);
        self.graph.remove(&addr);
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&addr);
            }
            value => {
                self.cells.insert(addr, CellEntry::Value(value));
            }
        }
        self.recalculate_dependents(addr);
        self.revive_circular();
        Ok(())
    }

    /// Set a formula
    ///
    /// Syntax errors and circular references are returned, but the formula
    /// text is still stored and the cell shows an error value
    /// (`#NAME?` for unknown functions, `#CIRC!` for cycles).
    pub fn set_formula(&mut self, address: &str, expression: &str) -> Result<()> {
        let addr = self.parse_address(address)?;
        self.set_formula_at(addr, expression)
    }

    /// Set a formula by address
    pub fn set_formula_at(&mut self, addr: CellAddress, expression: &str) -> Result<()> {
        let addr = self.check_address(addr)?;
        self.circular.remove(&addr);

        let formula = match self.engine.parse(expression) {
            Ok(formula) => formula,
            Err(err) => {
                warn!(cell = %addr, %err, "stored formula that does not parse");
                self.graph.remove(&addr);
                self.store_invalid(addr, expression, err.cell_error());
                self.revive_circular();
                return Err(err.into());
            }
        };

        if let Err(err) = self.graph.update(addr, formula.dependencies().clone()) {
            // the rejected formula adds no edges and the replaced one keeps none
            self.graph.remove(&addr);
            self.store_invalid(addr, expression, CellError::Circular);
            self.revive_circular();
            self.circular.insert(addr);
            return Err(err.into());
        }

        debug!(cell = %addr, expression, "set formula");
        self.cells.insert(addr, CellEntry::Formula(formula));
        self.recalculate_from(&[addr]);
        self.revive_circular();
        Ok(())
    }

    fn store_invalid(&mut self, addr: CellAddress, expression: &str, error: CellError) {
        self.cells.insert(
            addr,
            CellEntry::Invalid {
                expression: expression.to_string(),
                error,
            },
        );
        self.recalculate_dependents(addr);
    }

    /// Try to turn stored formula text into a registered formula, without
    /// evaluating it. Returns whether it succeeded.
    pub(crate) fn register_stored(&mut self, addr: CellAddress, expression: &str) -> bool {
        let Ok(formula) = self.engine.parse(expression) else {
            return false;
        };
        if self.graph.update(addr, formula.dependencies().clone()).is_err() {
            return false;
        }
        debug!(cell = %addr, expression, "registered stored formula");
        self.cells.insert(addr, CellEntry::Formula(formula));
        self.circular.remove(&addr);
        true
    }

    /// Register circular cells whose cycle an edit has broken, then
    /// evaluate them and their dependents
    fn revive_circular(&mut self) {
        let pending: Vec<CellAddress> = self.circular.iter().copied().collect();
        let mut revived = Vec::new();
        for addr in pending {
            let expression = match self.cells.get(&addr) {
                Some(CellEntry::Invalid {
                    expression,
                    error: CellError::Circular,
                }) => expression.clone(),
                _ => {
                    self.circular.remove(&addr);
                    continue;
                }
            };
            if self.register_stored(addr, &expression) {
                revived.push(addr);
            }
        }
        if !revived.is_empty() {
            debug!(cells = revived.len(), "cycle broken, formulas restored");
            self.recalculate_from(&revived);
        }
    }

    /// Set a cell from user input: text starting with `=` is a formula,
    /// anything else a literal
    pub fn set_contents(&mut self, address: &str, input: &str) -> Result<()> {
        if input.trim_start().starts_with('=') {
            self.set_formula(address, input)
        } else {
            self.set_value(address, CellValue::parse_literal(input))
        }
    }

    /// Empty a cell
    pub fn clear(&mut self, address: &str) -> Result<()> {
        self.set_value(address, CellValue::Empty)
    }

    /// Current value of a cell; formulas report their last result
    pub fn value(&self, address: &str) -> Result<CellValue> {
        Ok(self.value_at(&self.parse_address(address)?))
    }

    pub fn value_at(&self, addr: &CellAddress) -> CellValue {
        self.cells.get(addr).map(CellEntry::value).unwrap_or_default()
    }

    pub fn entry(&self, addr: &CellAddress) -> Option<&CellEntry> {
        self.cells.get(addr)
    }

    /// Formula text of a cell, if it holds one
    pub fn formula(&self, address: &str) -> Result<Option<&str>> {
        let addr = self.parse_address(address)?;
        Ok(self.cells.get(&addr).and_then(CellEntry::expression))
    }

    /// Cells the formula at `address` reads
    pub fn dependencies(&self, address: &str) -> Result<BTreeSet<CellAddress>> {
        let addr = self.parse_address(address)?;
        Ok(self.graph.precedents(&addr).collect())
    }

    /// Formula cells that read `address` directly
    pub fn dependents(&self, address: &str) -> Result<BTreeSet<CellAddress>> {
        let addr = self.parse_address(address)?;
        Ok(self.graph.dependents(&addr).collect())
    }

    /// Read-only view of the dependency graph
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Register a custom function for this worksheet
    ///
    /// Existing formulas are not recalculated; call
    /// [`recalculate_all`](Self::recalculate_all) afterwards if they use it.
    pub fn register_function<F>(&mut self, name: &str, min_args: usize, max_args: Option<usize>, f: F)
    where
        F: Fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>
            + Send
            + Sync
            + 'static,
    {
        self.engine.register_fn(name, min_args, max_args, f);
    }

    /// Evaluate the formula cells in `range` and return the block's values
    ///
    /// Rows come back top to bottom, each left to right.
    pub fn calculate_range(&mut self, range: &str) -> Result<Vec<Vec<CellValue>>> {
        let range = CellRange::parse(range)?;
        self.check_address(range.start)?;
        self.check_address(range.end)?;

        let formulas: Vec<CellAddress> = self
            .cells
            .iter()
            .filter(|(addr, entry)| range.contains(addr) && matches!(entry, CellEntry::Formula(_)))
            .map(|(addr, _)| *addr)
            .collect();
        if !formulas.is_empty() {
            self.recalculate_from(&formulas);
        }

        Ok((range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.value_at(&CellAddress::new(row, col)))
                    .collect()
            })
            .collect())
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.clock.unwrap_or_else(|| Local::now().naive_local())
    }

    /// Re-evaluate everything that reads `addr`, not `addr` itself
    fn recalculate_dependents(&mut self, addr: CellAddress) {
        let order = self.graph.recalc_order(&[addr]);
        let now = self.now();
        for cell in order.into_iter().filter(|c| *c != addr) {
            self.evaluate_cell(cell, now);
        }
    }

    /// Re-evaluate `changed` and everything downstream of it
    pub(crate) fn recalculate_from(&mut self, changed: &[CellAddress]) -> usize {
        let order = self.graph.recalc_order(changed);
        let now = self.now();
        order
            .into_iter()
            .filter(|cell| self.evaluate_cell(*cell, now))
            .count()
    }

    /// Evaluate one formula cell and cache its result
    ///
    /// Returns false when the cell holds no formula.
    pub(crate) fn evaluate_cell(&mut self, addr: CellAddress, now: NaiveDateTime) -> bool {
        let value = match self.cells.get(&addr) {
            Some(CellEntry::Formula(formula)) => {
                let ctx = EvaluationContext::new(&*self, self.engine.registry()).with_now(now);
                formula.compute(&ctx)
            }
            _ => return false,
        };
        if let Some(CellEntry::Formula(formula)) = self.cells.get_mut(&addr) {
            formula.set_result(value);
        }
        true
    }

    /// Check a prospective formula without storing it
    pub fn check_formula(&self, addr: CellAddress, expression: &str) -> FormulaResult<()> {
        let formula = self.engine.parse(expression)?;
        match self.graph.would_create_cycle(addr, formula.dependencies()) {
            Some(cells) => Err(FormulaError::CircularReference { cells }),
            None => Ok(()),
        }
    }
}

impl CellLookup for Worksheet {
    fn cell_value(&self, addr: &CellAddress) -> Option<CellValue> {
        self.cells.get(addr).map(CellEntry::value)
    }
}
