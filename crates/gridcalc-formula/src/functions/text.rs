//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::{arg, first_error};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use crate::number;
use gridcalc_core::CellError;
use rust_decimal::prelude::ToPrimitive;

fn to_int_trunc(v: &FormulaValue) -> Option<i64> {
    number::to_decimal(v).ok().and_then(|n| n.trunc().to_i64())
}

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if n >= len {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

fn take_mid(s: &str, start_1based: usize, n: usize) -> String {
    s.chars().skip(start_1based - 1).take(n).collect()
}

/// The text argument at `index`, rejecting ranges
fn text_arg(args: &[FormulaValue], index: usize, name: &str) -> FormulaResult<Result<String, CellError>> {
    Ok(match arg(args, index, name)? {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) => Err(CellError::Value),
        v => Ok(v.as_text()),
    })
}

/// Optional character count, defaulting to 1; negative counts are #VALUE!
fn count_arg(args: &[FormulaValue], index: usize) -> Result<usize, CellError> {
    match args.get(index) {
        None => Ok(1),
        Some(FormulaValue::Error(e)) => Err(*e),
        Some(v) => match to_int_trunc(v) {
            Some(n) if n >= 0 => Ok(n as usize),
            _ => Err(CellError::Value),
        },
    }
}

/// CONCATENATE(text1, ...)
pub fn fn_concatenate(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if let Some(e) = first_error(args) {
        return Ok(FormulaValue::Error(e));
    }

    let mut out = String::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    out.push_str(&cell.as_text());
                }
            }
            other => out.push_str(&other.as_text()),
        }
    }
    Ok(FormulaValue::Text(out))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = match text_arg(args, 0, "LEFT")? {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    Ok(match count_arg(args, 1) {
        Ok(n) => FormulaValue::Text(take_left(&text, n)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = match text_arg(args, 0, "RIGHT")? {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    Ok(match count_arg(args, 1) {
        Ok(n) => FormulaValue::Text(take_right(&text, n)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = match text_arg(args, 0, "MID")? {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let start = arg(args, 1, "MID")?;
    let count = arg(args, 2, "MID")?;
    if let Some(e) = first_error(&[start.clone(), count.clone()]) {
        return Ok(FormulaValue::Error(e));
    }

    let start_i = to_int_trunc(start).unwrap_or(0);
    let count_i = to_int_trunc(count).unwrap_or(-1);
    if start_i < 1 || count_i < 0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    Ok(FormulaValue::Text(take_mid(
        &text,
        start_i as usize,
        count_i as usize,
    )))
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match text_arg(args, 0, "LEN")? {
        Ok(s) => FormulaValue::from(s.chars().count() as i64),
        Err(e) => FormulaValue::Error(e),
    })
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match text_arg(args, 0, "LOWER")? {
        Ok(s) => FormulaValue::Text(s.to_lowercase()),
        Err(e) => FormulaValue::Error(e),
    })
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match text_arg(args, 0, "UPPER")? {
        Ok(s) => FormulaValue::Text(s.to_uppercase()),
        Err(e) => FormulaValue::Error(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::functions::FunctionRegistry;
    use crate::resolver::EmptyLookup;
    use crate::tokenizer::tokenize;

    fn eval(formula: &str) -> FormulaValue {
        let registry = FunctionRegistry::new();
        let ctx = EvaluationContext::new(&EmptyLookup, &registry);
        evaluate(&tokenize(formula).unwrap(), &ctx).unwrap()
    }

    fn text(s: &str) -> FormulaValue {
        FormulaValue::from(s)
    }

    #[test]
    fn test_concatenate() {
        assert_eq!(
            eval("=CONCATENATE(\"a\", 1.50, TRUE, \"-\")"),
            text("a1.5TRUE-")
        );
    }

    #[test]
    fn test_left_right() {
        assert_eq!(eval("=LEFT(\"hello\", 2)"), text("he"));
        assert_eq!(eval("=LEFT(\"hello\")"), text("h"));
        assert_eq!(eval("=RIGHT(\"hello\", 3)"), text("llo"));
        assert_eq!(eval("=RIGHT(\"hi\", 10)"), text("hi"));
        assert_eq!(
            eval("=LEFT(\"hello\", -1)"),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_mid() {
        assert_eq!(eval("=MID(\"spreadsheet\", 7, 5)"), text("sheet"));
        assert_eq!(eval("=MID(\"abc\", 5, 2)"), text(""));
        assert_eq!(
            eval("=MID(\"abc\", 0, 2)"),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_len_counts_characters() {
        assert_eq!(eval("=LEN(\"héllo\")"), FormulaValue::from(5i64));
        assert_eq!(eval("=LEN(12.5)"), FormulaValue::from(4i64));
    }

    #[test]
    fn test_case() {
        assert_eq!(eval("=LOWER(\"MiXeD\")"), text("mixed"));
        assert_eq!(eval("=UPPER(\"MiXeD\")"), text("MIXED"));
    }
}
