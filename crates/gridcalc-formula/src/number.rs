//! Decimal arithmetic and date serial numbers
//!
//! All formula arithmetic goes through these helpers so results stay in
//! [`Decimal`]. Overflow produces `#NUM!` rather than panicking.

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::FormulaValue;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use gridcalc_core::CellError;
use rust_decimal::prelude::{MathematicalOps, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

const SECONDS_PER_DAY: i64 = 86_400;

/// Largest serial number accepted when converting back to a date
const MAX_SERIAL_DAYS: i64 = 2_958_465; // 9999-12-31

/// Day zero of the serial date system
fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Coerce an operand for arithmetic
///
/// Empty counts as zero, booleans as 0/1, dates as serial numbers and text
/// only when it parses as a number.
pub fn to_decimal(value: &FormulaValue) -> FormulaResult<Decimal> {
    match value {
        FormulaValue::Number(n) => Ok(*n),
        FormulaValue::Empty => Ok(Decimal::ZERO),
        FormulaValue::Boolean(b) => Ok(if *b { Decimal::ONE } else { Decimal::ZERO }),
        FormulaValue::Date(d) => Ok(date_to_serial(d)),
        FormulaValue::Text(s) => parse_decimal(s)
            .ok_or_else(|| FormulaError::TypeMismatch(format!("cannot use text \"{}\" as a number", s))),
        FormulaValue::Array(_) => Err(FormulaError::TypeMismatch(
            "cannot use a range as a single number".into(),
        )),
        FormulaValue::Error(e) => Err(FormulaError::TypeMismatch(format!(
            "cannot use error {} as a number",
            e
        ))),
    }
}

/// Parse numeric text, allowing surrounding whitespace and a leading sign
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<Decimal>().ok()
}

fn overflow_or(result: Option<Decimal>) -> FormulaValue {
    match result {
        Some(n) => FormulaValue::Number(n),
        None => FormulaValue::Error(CellError::Num),
    }
}

pub fn add(a: Decimal, b: Decimal) -> FormulaValue {
    overflow_or(a.checked_add(b))
}

pub fn subtract(a: Decimal, b: Decimal) -> FormulaValue {
    overflow_or(a.checked_sub(b))
}

pub fn multiply(a: Decimal, b: Decimal) -> FormulaValue {
    overflow_or(a.checked_mul(b))
}

/// Divide, failing with [`FormulaError::DivisionByZero`] on a zero divisor
pub fn divide(a: Decimal, b: Decimal) -> FormulaResult<FormulaValue> {
    if b.is_zero() {
        return Err(FormulaError::DivisionByZero);
    }
    Ok(overflow_or(a.checked_div(b)))
}

/// Raise `base` to `exponent`
///
/// Integral exponents are computed exactly. Fractional exponents of a
/// negative base have no real result and give `#NUM!`.
pub fn power(base: Decimal, exponent: Decimal) -> FormulaResult<FormulaValue> {
    if exponent.fract().is_zero() {
        if base.is_zero() && exponent.is_sign_negative() {
            return Err(FormulaError::DivisionByZero);
        }
        return Ok(match exponent.to_i64() {
            Some(exp) => overflow_or(base.checked_powi(exp)),
            None => FormulaValue::Error(CellError::Num),
        });
    }
    if base.is_sign_negative() && !base.is_zero() {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    if base.is_zero() {
        return Ok(FormulaValue::Number(Decimal::ZERO));
    }
    Ok(overflow_or(base.checked_powd(exponent)))
}

/// Round half away from zero to `digits` places; negative `digits` round to
/// the left of the decimal point (`ROUND(1250, -2)` is 1300)
pub fn round(value: Decimal, digits: i64) -> Option<Decimal> {
    if digits >= 0 {
        let dp = digits.min(28) as u32;
        return Some(value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero));
    }

    let places = digits.unsigned_abs();
    if places > 28 {
        return Some(Decimal::ZERO);
    }
    let factor = Decimal::TEN.checked_powi(places as i64)?;
    let scaled = value.checked_div(factor)?;
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(factor)
}

/// Convert a date to its serial number (days since 1899-12-30, with the
/// time of day as a fraction)
pub fn date_to_serial(date: &NaiveDateTime) -> Decimal {
    let days = (date.date() - epoch()).num_days();
    let seconds = date.num_seconds_from_midnight() as i64;
    let serial = Decimal::from(days);
    if seconds == 0 {
        return serial;
    }
    serial + Decimal::from(seconds) / Decimal::from(SECONDS_PER_DAY)
}

/// Convert a serial number back to a date, or `None` outside 0001..=9999
pub fn serial_to_date(serial: Decimal) -> Option<NaiveDateTime> {
    let days = serial.floor();
    let whole_days = days.to_i64()?;
    if whole_days.abs() > MAX_SERIAL_DAYS {
        return None;
    }
    let seconds = ((serial - days) * Decimal::from(SECONDS_PER_DAY))
        .round()
        .to_i64()?;

    let date = epoch().checked_add_signed(Duration::days(whole_days))?;
    date.and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::seconds(seconds))
}

/// Coerce a value to a date: dates pass through, numbers are serial
/// numbers and text is parsed as a date string
pub fn to_date(value: &FormulaValue) -> Option<NaiveDateTime> {
    match value {
        FormulaValue::Date(d) => Some(*d),
        FormulaValue::Number(n) => serial_to_date(*n),
        FormulaValue::Text(s) => parse_date(s),
        _ => None,
    }
}

/// Parse the date formats accepted by DATEVALUE
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y", "%d-%b-%Y"];

    let s = s.trim();
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}
