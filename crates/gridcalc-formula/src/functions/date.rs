//! Date functions
//!
//! Dates are [`FormulaValue::Date`]; arithmetic sees them as serial numbers
//! (days since 1899-12-30). YEAR, MONTH and DAY accept dates, serial
//! numbers or date strings.

use super::arg;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use crate::number;
use chrono::{Datelike, NaiveDateTime, NaiveTime};
use gridcalc_core::CellError;

fn date_part(
    args: &[FormulaValue],
    name: &str,
    part: fn(&NaiveDateTime) -> i64,
) -> FormulaResult<FormulaValue> {
    let v = arg(args, 0, name)?;
    if let FormulaValue::Error(e) = v {
        return Ok(FormulaValue::Error(*e));
    }
    Ok(match number::to_date(v) {
        Some(date) => FormulaValue::from(part(&date)),
        None => FormulaValue::Error(CellError::Value),
    })
}

/// TODAY() - current date at midnight (volatile)
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Date(ctx.now.date().and_time(NaiveTime::MIN)))
}

/// NOW() - current date and time (volatile)
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Date(ctx.now))
}

/// YEAR(date)
pub fn fn_year(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, "YEAR", |d| d.year() as i64)
}

/// MONTH(date)
pub fn fn_month(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, "MONTH", |d| d.month() as i64)
}

/// DAY(date)
pub fn fn_day(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, "DAY", |d| d.day() as i64)
}

/// DATEVALUE(date_text)
pub fn fn_datevalue(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match arg(args, 0, "DATEVALUE")? {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        FormulaValue::Date(d) => FormulaValue::Date(*d),
        FormulaValue::Text(s) => match number::parse_date(s) {
            Some(d) => FormulaValue::Date(d),
            None => FormulaValue::Error(CellError::Value),
        },
        _ => FormulaValue::Error(CellError::Value),
    })
}
