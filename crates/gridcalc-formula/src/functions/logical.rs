//! Logical functions

use super::{arg, first_error};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// IF function
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = arg(args, 0, "IF")?;
    let if_true = arg(args, 1, "IF")?;
    let if_false = args.get(2);

    let condition = match condition {
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        other => match other.truthy() {
            Some(b) => b,
            None => return Ok(FormulaValue::Error(CellError::Value)),
        },
    };

    if condition {
        Ok(if_true.clone())
    } else {
        Ok(if_false.cloned().unwrap_or(FormulaValue::Boolean(false)))
    }
}

/// Truth values of every argument, ranges flattened. Empty cells inside a
/// range are ignored rather than counted as FALSE.
fn truth_values(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    if let Some(e) = first_error(args) {
        return Err(e);
    }

    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    if matches!(cell, FormulaValue::Empty) {
                        continue;
                    }
                    out.push(cell.truthy().ok_or(CellError::Value)?);
                }
            }
            other => out.push(other.truthy().ok_or(CellError::Value)?),
        }
    }
    Ok(out)
}

/// AND function
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match truth_values(args) {
        Ok(values) => FormulaValue::Boolean(values.iter().all(|b| *b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// OR function
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match truth_values(args) {
        Ok(values) => FormulaValue::Boolean(values.iter().any(|b| *b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// NOT function
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match arg(args, 0, "NOT")? {
        FormulaValue::Error(e) => Ok(FormulaValue::Error(*e)),
        other => Ok(match other.truthy() {
            Some(b) => FormulaValue::Boolean(!b),
            None => FormulaValue::Error(CellError::Value),
        }),
    }
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

    #[test]
    fn test_if() {
        assert_eq!(eval("=IF(1>0, \"yes\", \"no\")"), FormulaValue::from("yes"));
        assert_eq!(eval("=IF(0, \"yes\", \"no\")"), FormulaValue::from("no"));
        assert_eq!(eval("=IF(FALSE, 1)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=IF(\"TRUE\", 1, 2)"), FormulaValue::from(1i64));
        assert_eq!(eval("=IF(\"\", 1, 2)"), FormulaValue::from(2i64));
        assert_eq!(eval("=IF(\"anything\", 1, 2)"), FormulaValue::from(1i64));
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(eval("=AND(TRUE, 1, \"x\")"), FormulaValue::Boolean(true));
        assert_eq!(eval("=AND(TRUE, 0)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE, 0, \"false\")"), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE, 2)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=NOT(0)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=NOT(\"TRUE\")"), FormulaValue::Boolean(false));
    }

    #[test]
    fn test_errors_propagate() {
        let registry = FunctionRegistry::empty();
        let ctx = EvaluationContext::new(&EmptyLookup, &registry);
        let err = FormulaValue::Error(CellError::Div0);
        assert_eq!(
            fn_and(&[FormulaValue::Boolean(true), err.clone()], &ctx).unwrap(),
            err
        );
        assert_eq!(fn_if(&[err.clone(), FormulaValue::from(1i64)], &ctx).unwrap(), err);
        assert_eq!(fn_not(&[err.clone()], &ctx).unwrap(), err);
    }
}
