//! Reference resolution
//!
//! Turns operand tokens into values by reading the host's cells through
//! [`CellLookup`]. Resolution never writes to the lookup.

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::FormulaValue;
use crate::token::{Literal, Token};
use gridcalc_core::{CellAddress, CellValue};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Read access to the current cell values of a sheet
///
/// Returning `None` means the cell holds nothing; it resolves to
/// [`FormulaValue::Empty`].
pub trait CellLookup {
    fn cell_value(&self, addr: &CellAddress) -> Option<CellValue>;
}

impl<S: BuildHasher> CellLookup for HashMap<CellAddress, CellValue, S> {
    fn cell_value(&self, addr: &CellAddress) -> Option<CellValue> {
        self.get(addr).cloned()
    }
}

impl CellLookup for BTreeMap<CellAddress, CellValue> {
    fn cell_value(&self, addr: &CellAddress) -> Option<CellValue> {
        self.get(addr).cloned()
    }
}

impl<F> CellLookup for F
where
    F: Fn(&CellAddress) -> Option<CellValue>,
{
    fn cell_value(&self, addr: &CellAddress) -> Option<CellValue> {
        self(addr)
    }
}

/// A lookup with no cells, for formulas that reference nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyLookup;

impl CellLookup for EmptyLookup {
    fn cell_value(&self, _addr: &CellAddress) -> Option<CellValue> {
        None
    }
}

/// Resolve an operand token to its value
///
/// References read one cell; ranges produce a row-major
/// [`FormulaValue::Array`]. Operators, parentheses and function calls are
/// not operands the resolver can handle.
pub fn resolve(token: &Token, lookup: &dyn CellLookup) -> FormulaResult<FormulaValue> {
    match token {
        Token::Value(literal) => Ok(literal_value(literal)),
        Token::Reference(addr) => Ok(lookup
            .cell_value(addr)
            .map(FormulaValue::from)
            .unwrap_or(FormulaValue::Empty)),
        Token::Range(range) => {
            let mut rows = Vec::with_capacity(range.row_count() as usize);
            for row in range.start.row..=range.end.row {
                let mut values = Vec::with_capacity(range.col_count() as usize);
                for col in range.start.col..=range.end.col {
                    let addr = CellAddress::new(row, col);
                    values.push(
                        lookup
                            .cell_value(&addr)
                            .map(FormulaValue::from)
                            .unwrap_or(FormulaValue::Empty),
                    );
                }
                rows.push(values);
            }
            Ok(FormulaValue::Array(rows))
        }
        other => Err(FormulaError::MalformedExpression(format!(
            "'{}' is not an operand",
            other
        ))),
    }
}

fn literal_value(literal: &Literal) -> FormulaValue {
    match literal {
        Literal::Number(n) => FormulaValue::Number(*n),
        Literal::Text(s) => FormulaValue::Text(s.clone()),
        Literal::Boolean(b) => FormulaValue::Boolean(*b),
        Literal::Date(d) => FormulaValue::Date(*d),
        Literal::Null => FormulaValue::Empty,
    }
}
