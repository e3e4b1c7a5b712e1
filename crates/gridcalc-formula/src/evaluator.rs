//! Formula evaluator
//!
//! Evaluates token sequences with a two-stack (shunting-yard) algorithm:
//! operands are resolved and pushed as they are read, operators wait on a
//! second stack until an operator of lower binding strength, a closing
//! parenthesis, or the end of the sequence forces them to apply.

use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use crate::number;
use crate::resolver::{resolve, CellLookup};
use crate::token::{Operator, Paren, Token};
use chrono::{Local, NaiveDateTime};
use gridcalc_core::{CellError, CellValue};
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(Decimal),
    Text(String),
    Boolean(bool),
    Date(NaiveDateTime),
    Error(CellError),
    /// Range contents, rows outer
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to a number, if possible (lenient: numeric text and dates count)
    pub fn as_decimal(&self) -> Option<Decimal> {
        number::to_decimal(self).ok()
    }

    /// Truthiness used by IF, AND, OR and NOT
    ///
    /// Numbers are true when non-zero, empty is false, text is read as
    /// TRUE/FALSE when it spells one and is otherwise true when non-empty,
    /// dates are true. Errors and arrays have no truth value.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(!n.is_zero()),
            FormulaValue::Empty => Some(false),
            FormulaValue::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Some(false)
                } else {
                    Some(!s.is_empty())
                }
            }
            FormulaValue::Date(_) => Some(true),
            FormulaValue::Error(_) | FormulaValue::Array(_) => None,
        }
    }

    /// Convert to display text
    pub fn as_text(&self) -> String {
        match self {
            FormulaValue::Number(n) => n.normalize().to_string(),
            FormulaValue::Text(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Date(_) => CellValue::from(self.clone()).to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => CellError::Value.to_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FormulaValue::Number(_) => "number",
            FormulaValue::Text(_) => "text",
            FormulaValue::Boolean(_) => "boolean",
            FormulaValue::Date(_) => "date",
            FormulaValue::Error(_) => "error",
            FormulaValue::Array(_) => "range",
            FormulaValue::Empty => "empty",
        }
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::Text(s) => FormulaValue::Text(s.as_str().to_string()),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
            CellValue::Date(d) => FormulaValue::Date(d),
            CellValue::Error(e) => FormulaValue::Error(e),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::Text(s) => CellValue::text(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Date(d) => CellValue::Date(d),
            FormulaValue::Error(e) => CellValue::Error(e),
            // a single cell cannot show a whole range
            FormulaValue::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

impl From<Decimal> for FormulaValue {
    fn from(n: Decimal) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<i64> for FormulaValue {
    fn from(n: i64) -> Self {
        FormulaValue::Number(Decimal::from(n))
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::Text(s.to_string())
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::Text(s)
    }
}

/// Context for formula evaluation
///
/// Carries everything a formula may read: the cells, the functions it may
/// call and the clock volatile functions report.
pub struct EvaluationContext<'a> {
    /// Cell values referenced by the formula
    pub lookup: &'a dyn CellLookup,
    /// Functions the formula may call
    pub registry: &'a FunctionRegistry,
    /// Current time as seen by TODAY and NOW
    pub now: NaiveDateTime,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context reading the local clock
    pub fn new(lookup: &'a dyn CellLookup, registry: &'a FunctionRegistry) -> Self {
        Self {
            lookup,
            registry,
            now: Local::now().naive_local(),
        }
    }

    /// Pin the clock, for reproducible results
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }
}

/// Entries on the operator stack
#[derive(Debug, Clone, Copy)]
enum Pending {
    Operator(Operator),
    Open,
}

/// Evaluate a token sequence
///
/// # Example
/// ```rust
/// use gridcalc_formula::{evaluate, tokenize, EmptyLookup, EvaluationContext, FunctionRegistry};
///
/// let registry = FunctionRegistry::new();
/// let ctx = EvaluationContext::new(&EmptyLookup, &registry);
/// let value = evaluate(&tokenize("=2^3^2").unwrap(), &ctx).unwrap();
/// assert_eq!(value.as_text(), "512");
/// ```
pub fn evaluate(tokens: &[Token], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut operands: Vec<FormulaValue> = Vec::new();
    let mut operators: Vec<Pending> = Vec::new();

    for token in tokens {
        match token {
            Token::Value(_) | Token::Reference(_) | Token::Range(_) => {
                operands.push(resolve(token, ctx.lookup)?);
            }
            Token::Function { name, args } => {
                operands.push(call_function(name, args, ctx)?);
            }
            Token::Operator(op) => {
                // prefix operators bind to what follows, so they never reduce
                if !op.is_unary() {
                    while let Some(Pending::Operator(top)) = operators.last().copied() {
                        let reduces = if op.is_right_associative() {
                            top.precedence() > op.precedence()
                        } else {
                            top.precedence() >= op.precedence()
                        };
                        if !reduces {
                            break;
                        }
                        operators.pop();
                        apply(top, &mut operands)?;
                    }
                }
                operators.push(Pending::Operator(*op));
            }
            Token::Paren(Paren::Open) => operators.push(Pending::Open),
            Token::Paren(Paren::Close) => loop {
                match operators.pop() {
                    Some(Pending::Open) => break,
                    Some(Pending::Operator(op)) => apply(op, &mut operands)?,
                    None => {
                        return Err(FormulaError::UnbalancedParentheses(
                            "')' without matching '('".into(),
                        ))
                    }
                }
            },
        }
    }

    while let Some(pending) = operators.pop() {
        match pending {
            Pending::Operator(op) => apply(op, &mut operands)?,
            Pending::Open => {
                return Err(FormulaError::UnbalancedParentheses(
                    "'(' is never closed".into(),
                ))
            }
        }
    }

    let result = operands
        .pop()
        .ok_or_else(|| FormulaError::MalformedExpression("expression has no value".into()))?;
    if !operands.is_empty() {
        return Err(FormulaError::MalformedExpression(format!(
            "{} values left without an operator",
            operands.len() + 1
        )));
    }
    Ok(result)
}

/// Evaluate a token sequence, turning failures into a cell error value
///
/// Used during recalculation so one failing formula cannot abort the rest.
pub fn evaluate_to_value(tokens: &[Token], ctx: &EvaluationContext) -> FormulaValue {
    match evaluate(tokens, ctx) {
        Ok(value) => value,
        Err(err) => FormulaValue::Error(err.cell_error()),
    }
}

fn call_function(
    name: &str,
    args: &[Vec<Token>],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = ctx
        .registry
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    func.check_arity(args.len())?;

    // a failing argument reaches the function as an error value, so
    // functions like IF can ignore the branch they do not take
    let evaluated_args: Vec<FormulaValue> =
        args.iter().map(|arg| evaluate_to_value(arg, ctx)).collect();

    (func.implementation)(&evaluated_args, ctx)
}

/// Pop the operands of `op`, apply it and push the result
fn apply(op: Operator, operands: &mut Vec<FormulaValue>) -> FormulaResult<()> {
    let missing = || {
        FormulaError::MalformedExpression(format!("operator '{}' is missing an operand", op))
    };

    if op.is_unary() {
        let value = operands.pop().ok_or_else(missing)?;
        operands.push(negate(value)?);
        return Ok(());
    }

    let right = operands.pop().ok_or_else(missing)?;
    let left = operands.pop().ok_or_else(missing)?;
    operands.push(binary_op(op, left, right)?);
    Ok(())
}

fn negate(value: FormulaValue) -> FormulaResult<FormulaValue> {
    if let FormulaValue::Error(e) = value {
        return Ok(FormulaValue::Error(e));
    }
    let n = number::to_decimal(&value)?;
    Ok(FormulaValue::Number(-n))
}

fn binary_op(op: Operator, left: FormulaValue, right: FormulaValue) -> FormulaResult<FormulaValue> {
    // Propagate errors
    if let FormulaValue::Error(e) = left {
        return Ok(FormulaValue::Error(e));
    }
    if let FormulaValue::Error(e) = right {
        return Ok(FormulaValue::Error(e));
    }

    if op.is_comparison() {
        let ordering = compare_values(&left, &right)?;
        let result = match op {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::LessThan => ordering == Ordering::Less,
            Operator::LessEqual => ordering != Ordering::Greater,
            Operator::GreaterThan => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Ok(FormulaValue::Boolean(result));
    }

    let l = number::to_decimal(&left)?;
    let r = number::to_decimal(&right)?;
    match op {
        Operator::Add => Ok(number::add(l, r)),
        Operator::Subtract => Ok(number::subtract(l, r)),
        Operator::Multiply => Ok(number::multiply(l, r)),
        Operator::Divide => number::divide(l, r),
        Operator::Power => number::power(l, r),
        _ => Err(FormulaError::MalformedExpression(format!(
            "'{}' is not a binary operator",
            op
        ))),
    }
}

/// Compare two values for ordering
///
/// Numbers (and dates, as serial numbers) sort before text, text before
/// booleans. Text compares case-insensitively. An empty operand takes the
/// type of the other side.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> FormulaResult<Ordering> {
    let left = empty_as(left, right);
    let right = empty_as(right, &left);

    match (&left, &right) {
        (FormulaValue::Text(l), FormulaValue::Text(r)) => Ok(l.to_lowercase().cmp(&r.to_lowercase())),
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => Ok(l.cmp(r)),
        (FormulaValue::Array(_), _) | (_, FormulaValue::Array(_)) => Err(
            FormulaError::TypeMismatch("cannot compare a range".into()),
        ),
        (FormulaValue::Error(l), FormulaValue::Error(r)) => Ok(l.as_str().cmp(r.as_str())),
        _ => {
            let (lr, rr) = (type_rank(&left), type_rank(&right));
            if lr != rr {
                return Ok(lr.cmp(&rr));
            }
            let l = number::to_decimal(&left)?;
            let r = number::to_decimal(&right)?;
            Ok(l.cmp(&r))
        }
    }
}

fn empty_as(value: &FormulaValue, other: &FormulaValue) -> FormulaValue {
    match (value, other) {
        (FormulaValue::Empty, FormulaValue::Text(_)) => FormulaValue::Text(String::new()),
        (FormulaValue::Empty, FormulaValue::Boolean(_)) => FormulaValue::Boolean(false),
        (FormulaValue::Empty, _) => FormulaValue::Number(Decimal::ZERO),
        (v, _) => v.clone(),
    }
}

fn type_rank(value: &FormulaValue) -> u8 {
    match value {
        FormulaValue::Text(_) => 1,
        FormulaValue::Boolean(_) => 2,
        FormulaValue::Error(_) => 3,
        _ => 0,
    }
}
