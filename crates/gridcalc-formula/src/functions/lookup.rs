//! Lookup functions
//!
//! Tables arrive as row-major [`FormulaValue::Array`]s. A value that is not
//! found is the explicit `#N/A` error value.

use super::arg;
use crate::error::FormulaResult;
use crate::evaluator::{compare_values, EvaluationContext, FormulaValue};
use crate::number;
use gridcalc_core::CellError;
use rust_decimal::prelude::ToPrimitive;
use std::borrow::Cow;
use std::cmp::Ordering;

type Table = [Vec<FormulaValue>];

static EMPTY: FormulaValue = FormulaValue::Empty;

fn to_i64_trunc(v: &FormulaValue) -> Option<i64> {
    number::to_decimal(v).ok().and_then(|n| n.trunc().to_i64())
}

fn values_equal(a: &FormulaValue, b: &FormulaValue) -> bool {
    match (a, b) {
        (FormulaValue::Text(x), FormulaValue::Text(y)) => x.to_lowercase() == y.to_lowercase(),

        // Numeric text matches the number it spells
        (FormulaValue::Number(x), FormulaValue::Text(s))
        | (FormulaValue::Text(s), FormulaValue::Number(x)) => {
            number::parse_decimal(s).map_or(false, |n| n == *x)
        }

        (FormulaValue::Empty, FormulaValue::Empty) => true,
        (FormulaValue::Error(_), _) | (_, FormulaValue::Error(_)) => false,
        _ => compare_values(a, b).map_or(false, |o| o == Ordering::Equal),
    }
}

/// Ordering of `candidate` against `target` when both belong to the same
/// family (numbers and dates, text, booleans); `None` otherwise
fn ordered(candidate: &FormulaValue, target: &FormulaValue) -> Option<Ordering> {
    fn family(v: &FormulaValue) -> Option<u8> {
        match v {
            FormulaValue::Number(_) | FormulaValue::Date(_) => Some(0),
            FormulaValue::Text(_) => Some(1),
            FormulaValue::Boolean(_) => Some(2),
            _ => None,
        }
    }
    if family(candidate)? != family(target)? {
        return None;
    }
    compare_values(candidate, target).ok()
}

/// Treat a scalar as a 1x1 table
fn as_table(v: &FormulaValue) -> Cow<'_, Table> {
    match v {
        FormulaValue::Array(rows) => Cow::Borrowed(rows.as_slice()),
        other => Cow::Owned(vec![vec![other.clone()]]),
    }
}

fn table_dims(table: &Table) -> (usize, usize) {
    let rows = table.len();
    let cols = table.first().map(|r| r.len()).unwrap_or(0);
    (rows, cols)
}

/// How a vector search picks its hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    Exact,
    /// Largest value less than or equal to the target
    Below,
    /// Smallest value greater than or equal to the target
    Above,
}

/// Search a vector, returning the 0-based position of the hit
fn find_position<'a>(
    target: &FormulaValue,
    values: impl Iterator<Item = &'a FormulaValue>,
    mode: MatchMode,
) -> Option<usize> {
    let mut best: Option<(usize, &FormulaValue)> = None;
    for (i, v) in values.enumerate() {
        match mode {
            MatchMode::Exact => {
                if values_equal(target, v) {
                    return Some(i);
                }
            }
            MatchMode::Below | MatchMode::Above => {
                let keep = match ordered(v, target) {
                    Some(Ordering::Equal) => true,
                    Some(Ordering::Less) => mode == MatchMode::Below,
                    Some(Ordering::Greater) => mode == MatchMode::Above,
                    None => false,
                };
                if !keep {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((_, current)) => match (mode, ordered(v, current)) {
                        (MatchMode::Below, Some(Ordering::Greater)) => true,
                        (MatchMode::Above, Some(Ordering::Less)) => true,
                        _ => false,
                    },
                };
                if better {
                    best = Some((i, v));
                }
            }
        }
    }
    best.map(|(i, _)| i)
}

/// Lookup value argument: errors propagate, ranges are rejected
fn lookup_value<'a>(args: &'a [FormulaValue], name: &str) -> FormulaResult<Result<&'a FormulaValue, CellError>> {
    Ok(match arg(args, 0, name)? {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) => Err(CellError::Value),
        v => Ok(v),
    })
}

/// Optional range_lookup flag of VLOOKUP/HLOOKUP; defaults to exact
fn approximate_flag(args: &[FormulaValue], index: usize) -> Result<bool, CellError> {
    match args.get(index) {
        None => Ok(false),
        Some(FormulaValue::Error(e)) => Err(*e),
        Some(v) => v.truthy().ok_or(CellError::Value),
    }
}

/// Shared body of VLOOKUP and HLOOKUP; `vertical` searches the first column
fn table_lookup(args: &[FormulaValue], name: &str, vertical: bool) -> FormulaResult<FormulaValue> {
    let target = match lookup_value(args, name)? {
        Ok(v) => v,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let table_arg = arg(args, 1, name)?;
    if let FormulaValue::Error(e) = table_arg {
        return Ok(FormulaValue::Error(*e));
    }
    let table = as_table(table_arg);
    let (rows, cols) = table_dims(&table);
    if rows == 0 || cols == 0 {
        return Ok(FormulaValue::Error(CellError::Na));
    }

    let index_arg = arg(args, 2, name)?;
    if let FormulaValue::Error(e) = index_arg {
        return Ok(FormulaValue::Error(*e));
    }
    let index = match to_i64_trunc(index_arg) {
        Some(i) if i >= 1 => (i - 1) as usize,
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };
    let span = if vertical { cols } else { rows };
    if index >= span {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let mode = match approximate_flag(args, 3) {
        Ok(true) => MatchMode::Below,
        Ok(false) => MatchMode::Exact,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    let hit = if vertical {
        let first_col = table.iter().map(|row| row.first().unwrap_or(&EMPTY));
        find_position(target, first_col, mode)
    } else {
        find_position(target, table[0].iter(), mode)
    };

    Ok(match hit {
        Some(pos) => {
            let cell = if vertical {
                table[pos].get(index)
            } else {
                table[index].get(pos)
            };
            cell.cloned().unwrap_or(FormulaValue::Empty)
        }
        None => FormulaValue::Error(CellError::Na),
    })
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    table_lookup(args, "VLOOKUP", true)
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    table_lookup(args, "HLOOKUP", false)
}

/// INDEX(array, row_num, [column_num])
///
/// With the column omitted, a single-row array is indexed by `row_num` along
/// its columns; any other array takes column 1.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = args.iter().find_map(FormulaValue::error) {
        return Ok(FormulaValue::Error(e));
    }

    let table = as_table(arg(args, 0, "INDEX")?);
    let (rows, cols) = table_dims(&table);
    if rows == 0 || cols == 0 {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let first = match to_i64_trunc(arg(args, 1, "INDEX")?) {
        Some(n) if n >= 1 => n as usize,
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };

    let (r, c) = match args.get(2) {
        Some(v) => match to_i64_trunc(v) {
            Some(n) if n >= 1 => (first, n as usize),
            _ => return Ok(FormulaValue::Error(CellError::Value)),
        },
        None if rows == 1 && cols > 1 => (1, first),
        None => (first, 1),
    };

    if r > rows || c > cols {
        return Ok(FormulaValue::Error(CellError::Ref));
    }
    Ok(table[r - 1].get(c - 1).cloned().unwrap_or(FormulaValue::Empty))
}

/// MATCH(lookup_value, lookup_array, [match_type])
///
/// `match_type` 0 is exact, 1 (the default) finds the largest value not above
/// the target, -1 the smallest value not below it. The result is 1-based.
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let target = match lookup_value(args, "MATCH")? {
        Ok(v) => v,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let array_arg = arg(args, 1, "MATCH")?;
    if let FormulaValue::Error(e) = array_arg {
        return Ok(FormulaValue::Error(*e));
    }
    let table = as_table(array_arg);
    let (rows, cols) = table_dims(&table);
    if rows == 0 || cols == 0 {
        return Ok(FormulaValue::Error(CellError::Na));
    }

    let mode = match args.get(2) {
        None => MatchMode::Below,
        Some(FormulaValue::Error(e)) => return Ok(FormulaValue::Error(*e)),
        Some(v) => match to_i64_trunc(v) {
            Some(0) => MatchMode::Exact,
            Some(n) if n > 0 => MatchMode::Below,
            Some(_) => MatchMode::Above,
            None => return Ok(FormulaValue::Error(CellError::Value)),
        },
    };

    // MATCH searches a vector: a single row or a single column
    let hit = if rows == 1 {
        find_position(target, table[0].iter(), mode)
    } else if cols == 1 {
        let column = table.iter().map(|row| row.first().unwrap_or(&EMPTY));
        find_position(target, column, mode)
    } else {
        return Ok(FormulaValue::Error(CellError::Na));
    };

    Ok(match hit {
        Some(pos) => FormulaValue::from((pos + 1) as i64),
        None => FormulaValue::Error(CellError::Na),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::resolver::EmptyLookup;
    use pretty_assertions::assert_eq;

    fn call(
        f: fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>,
        args: &[FormulaValue],
    ) -> FormulaValue {
        let registry = FunctionRegistry::empty();
        let ctx = EvaluationContext::new(&EmptyLookup, &registry);
        f(args, &ctx).unwrap()
    }

    fn n(v: i64) -> FormulaValue {
        FormulaValue::from(v)
    }

    fn t(s: &str) -> FormulaValue {
        FormulaValue::from(s)
    }

    fn column(values: Vec<FormulaValue>) -> FormulaValue {
        FormulaValue::Array(values.into_iter().map(|v| vec![v]).collect())
    }

    fn row(values: Vec<FormulaValue>) -> FormulaValue {
        FormulaValue::Array(vec![values])
    }

    fn fruit_table() -> FormulaValue {
        FormulaValue::Array(vec![
            vec![t("apple"), n(3), t("red")],
            vec![t("banana"), n(5), t("yellow")],
            vec![t("cherry"), n(7), t("dark red")],
        ])
    }

    const NA: FormulaValue = FormulaValue::Error(CellError::Na);

    #[test]
    fn test_match_exact_and_approximate() {
        let values = row(vec![n(1), n(3), n(5), n(7)]);
        assert_eq!(call(fn_match, &[n(5), values.clone(), n(0)]), n(3));
        assert_eq!(call(fn_match, &[n(6), values.clone(), n(1)]), n(3));
        assert_eq!(call(fn_match, &[n(6), values.clone()]), n(3));
        assert_eq!(call(fn_match, &[n(0), values.clone(), n(1)]), NA);
        assert_eq!(call(fn_match, &[n(6), values, n(0)]), NA);
    }

    #[test]
    fn test_match_descending() {
        let values = column(vec![n(9), n(6), n(4), n(1)]);
        assert_eq!(call(fn_match, &[n(5), values.clone(), n(-1)]), n(2));
        assert_eq!(call(fn_match, &[n(10), values, n(-1)]), NA);
    }

    #[test]
    fn test_match_text_is_case_insensitive() {
        let values = column(vec![t("Alpha"), t("Beta")]);
        assert_eq!(call(fn_match, &[t("beta"), values, n(0)]), n(2));
    }

    #[test]
    fn test_vlookup() {
        assert_eq!(call(fn_vlookup, &[t("banana"), fruit_table(), n(3)]), t("yellow"));
        assert_eq!(
            call(fn_vlookup, &[t("BANANA"), fruit_table(), n(2), FormulaValue::Boolean(false)]),
            n(5)
        );
        assert_eq!(call(fn_vlookup, &[t("kiwi"), fruit_table(), n(2)]), NA);
        assert_eq!(
            call(fn_vlookup, &[t("apple"), fruit_table(), n(4)]),
            FormulaValue::Error(CellError::Ref)
        );
        assert_eq!(
            call(fn_vlookup, &[t("apple"), fruit_table(), n(0)]),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_vlookup_approximate() {
        let brackets = FormulaValue::Array(vec![
            vec![n(0), t("F")],
            vec![n(60), t("D")],
            vec![n(70), t("C")],
            vec![n(80), t("B")],
            vec![n(90), t("A")],
        ]);
        let approx = FormulaValue::Boolean(true);
        assert_eq!(call(fn_vlookup, &[n(85), brackets.clone(), n(2), approx.clone()]), t("B"));
        assert_eq!(call(fn_vlookup, &[n(60), brackets.clone(), n(2), approx.clone()]), t("D"));
        assert_eq!(call(fn_vlookup, &[n(-5), brackets, n(2), approx]), NA);
    }

    #[test]
    fn test_hlookup() {
        let table = FormulaValue::Array(vec![
            vec![t("q1"), t("q2"), t("q3")],
            vec![n(10), n(20), n(30)],
        ]);
        assert_eq!(call(fn_hlookup, &[t("q2"), table.clone(), n(2)]), n(20));
        assert_eq!(call(fn_hlookup, &[t("q4"), table.clone(), n(2)]), NA);
        assert_eq!(
            call(fn_hlookup, &[t("q1"), table, n(3)]),
            FormulaValue::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_index() {
        assert_eq!(call(fn_index, &[fruit_table(), n(2), n(3)]), t("yellow"));
        assert_eq!(call(fn_index, &[fruit_table(), n(3)]), t("cherry"));
        assert_eq!(call(fn_index, &[row(vec![n(4), n(5), n(6)]), n(2)]), n(5));
        assert_eq!(
            call(fn_index, &[fruit_table(), n(4), n(1)]),
            FormulaValue::Error(CellError::Ref)
        );
        assert_eq!(
            call(fn_index, &[fruit_table(), n(0)]),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_lookup_errors_propagate() {
        let div0 = FormulaValue::Error(CellError::Div0);
        assert_eq!(call(fn_match, &[div0.clone(), fruit_table(), n(0)]), div0);
        assert_eq!(call(fn_vlookup, &[div0.clone(), fruit_table(), n(2)]), div0);
        assert_eq!(call(fn_index, &[fruit_table(), div0.clone()]), div0);
    }
}
