//! Formula token types
//!
//! A formula is held as a flat token sequence. Grouping parentheses stay in
//! the sequence; function calls own one nested sequence per argument.

use chrono::NaiveDateTime;
use gridcalc_core::{CellAddress, CellRange};
use rust_decimal::Decimal;
use std::fmt;

/// A single lexical unit of a formula
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal value
    Value(Literal),
    /// Single cell reference
    Reference(CellAddress),
    /// Rectangular range (normalized so start <= end)
    Range(CellRange),
    /// Arithmetic, comparison or prefix operator
    Operator(Operator),
    /// Function call with one token sequence per argument
    Function { name: String, args: Vec<Vec<Token>> },
    /// Grouping parenthesis
    Paren(Paren),
}

impl Token {
    /// Create a number literal token
    pub fn number(n: impl Into<Decimal>) -> Self {
        Token::Value(Literal::Number(n.into()))
    }

    /// Create a text literal token
    pub fn text(s: impl Into<String>) -> Self {
        Token::Value(Literal::Text(s.into()))
    }

    /// Does this token produce a value on its own?
    pub fn is_operand(&self) -> bool {
        matches!(
            self,
            Token::Value(_) | Token::Reference(_) | Token::Range(_) | Token::Function { .. }
        )
    }
}

/// Literal values written directly in a formula
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(Decimal),
    Text(String),
    Boolean(bool),
    Date(NaiveDateTime),
    Null,
}

/// Operators, including prefix negation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    /// Prefix `-`
    Negate,
}

impl Operator {
    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Equal
            | Operator::NotEqual
            | Operator::LessThan
            | Operator::LessEqual
            | Operator::GreaterThan
            | Operator::GreaterEqual => 1,
            Operator::Add | Operator::Subtract => 2,
            Operator::Multiply | Operator::Divide => 3,
            Operator::Power => 4,
            Operator::Negate => 5,
        }
    }

    /// `^` and prefix negation group right to left
    pub fn is_right_associative(&self) -> bool {
        matches!(self, Operator::Power | Operator::Negate)
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::Negate)
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 1
    }

    /// Source text of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract | Operator::Negate => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Power => "^",
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Paren {
    Open,
    Close,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n.normalize()),
            Literal::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Date(d) => write!(f, "\"{}\"", d.format("%Y-%m-%d %H:%M:%S")),
            Literal::Null => f.write_str("\"\""),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Value(lit) => write!(f, "{}", lit),
            Token::Reference(addr) => write!(f, "{}", addr),
            Token::Range(range) => write!(f, "{}", range),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&tokens_to_string(arg))?;
                }
                f.write_str(")")
            }
            Token::Paren(Paren::Open) => f.write_str("("),
            Token::Paren(Paren::Close) => f.write_str(")"),
        }
    }
}

/// Serialize a token sequence back to formula text (without the leading `=`)
///
/// Tokens are separated by single spaces, so the output is the canonical
/// whitespace-normalized form of the formula.
pub fn tokens_to_string(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(Operator::Equal.precedence() < Operator::Add.precedence());
        assert!(Operator::Add.precedence() < Operator::Multiply.precedence());
        assert!(Operator::Multiply.precedence() < Operator::Power.precedence());
        assert!(Operator::Power.precedence() < Operator::Negate.precedence());
        assert!(Operator::Power.is_right_associative());
        assert!(!Operator::Subtract.is_right_associative());
    }

    #[test]
    fn test_display() {
        let tokens = vec![
            Token::Operator(Operator::Negate),
            Token::Reference(CellAddress::new(1, 1)),
            Token::Operator(Operator::LessEqual),
            Token::Function {
                name: "SUM".into(),
                args: vec![
                    vec![Token::Range(CellRange::new(
                        CellAddress::new(1, 2),
                        CellAddress::new(3, 2),
                    ))],
                    vec![Token::text("say \"hi\"")],
                ],
            },
        ];
        assert_eq!(
            tokens_to_string(&tokens),
            "- A1 <= SUM(B1:B3, \"say \"\"hi\"\"\")"
        );
    }

    #[test]
    fn test_number_display_is_normalized() {
        let n: Decimal = "2.500".parse().unwrap();
        assert_eq!(Token::number(n).to_string(), "2.5");
    }
}
