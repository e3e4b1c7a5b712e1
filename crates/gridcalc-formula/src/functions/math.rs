//! Math functions

use super::{arg, first_error};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use crate::number;
use gridcalc_core::CellError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Numeric reading of an aggregate argument
///
/// Values typed directly as arguments are coerced more eagerly than values
/// read out of a range: `SUM(TRUE, "2")` is 3, but booleans and text inside
/// a range are skipped.
fn numeric(value: &FormulaValue, direct: bool) -> Option<Decimal> {
    match value {
        FormulaValue::Number(n) => Some(*n),
        FormulaValue::Date(d) => Some(number::date_to_serial(d)),
        FormulaValue::Boolean(b) if direct => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        FormulaValue::Text(s) if direct => number::parse_decimal(s),
        _ => None,
    }
}

/// Visit every scalar argument, flattening ranges
fn for_each_value(args: &[FormulaValue], mut f: impl FnMut(&FormulaValue, bool)) {
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    f(cell, false);
                }
            }
            other => f(other, true),
        }
    }
}

fn numbers(args: &[FormulaValue]) -> Vec<Decimal> {
    let mut out = Vec::new();
    for_each_value(args, |v, direct| {
        if let Some(n) = numeric(v, direct) {
            out.push(n);
        }
    });
    out
}

fn checked_sum(values: &[Decimal]) -> Option<Decimal> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, n| acc.checked_add(*n))
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }

    Ok(match checked_sum(&numbers(args)) {
        Some(sum) => FormulaValue::Number(sum),
        None => FormulaValue::Error(CellError::Num),
    })
}

/// AVERAGE function
///
/// Divides by the number of supplied values, not just the numeric ones;
/// empty cells are left out. With nothing to average the result is #DIV/0!.
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }

    let mut sum = Some(Decimal::ZERO);
    let mut count = 0u64;
    for_each_value(args, |v, direct| {
        if matches!(v, FormulaValue::Empty) {
            return;
        }
        count += 1;
        if let Some(n) = numeric(v, direct) {
            sum = sum.and_then(|s| s.checked_add(n));
        }
    });

    if count == 0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    match sum {
        Some(sum) => Ok(sum
            .checked_div(Decimal::from(count))
            .map(FormulaValue::Number)
            .unwrap_or(FormulaValue::Error(CellError::Num))),
        None => Ok(FormulaValue::Error(CellError::Num)),
    }
}

/// MIN function
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }
    let min = numbers(args).into_iter().min().unwrap_or(Decimal::ZERO);
    Ok(FormulaValue::Number(min))
}

/// MAX function
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }
    let max = numbers(args).into_iter().max().unwrap_or(Decimal::ZERO);
    Ok(FormulaValue::Number(max))
}

/// COUNT function - counts numeric values; errors are skipped, not raised
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut count = 0i64;
    for_each_value(args, |v, direct| {
        if numeric(v, direct).is_some() {
            count += 1;
        }
    });
    Ok(FormulaValue::from(count))
}

/// ROUND(number, [num_digits])
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }

    let value = arg(args, 0, "ROUND")?;
    if matches!(value, FormulaValue::Array(_)) {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let n = number::to_decimal(value)?;

    let digits = match args.get(1) {
        None => 0,
        Some(v) => match number::to_decimal(v)?.trunc().to_i64() {
            Some(d) => d,
            None => return Ok(FormulaValue::Error(CellError::Num)),
        },
    };

    Ok(match number::round(n, digits) {
        Some(r) => FormulaValue::Number(r),
        None => FormulaValue::Error(CellError::Num),
    })
}
