//! Formula tokenizer
//!
//! A hand-written scanner that turns formula text into a flat [`Token`]
//! sequence. Function arguments are scanned recursively into their own
//! sequences, so argument separators never appear as tokens.

use crate::config::EngineConfig;
use crate::error::{FormulaError, FormulaResult};
use crate::token::{Literal, Operator, Paren, Token};
use gridcalc_core::{CellAddress, CellRange};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::trace;

/// Tokenize a formula using the default [`EngineConfig`]
///
/// # Example
/// ```rust
/// use gridcalc_formula::{tokenize, Token};
///
/// let tokens = tokenize("=SUM(A1:A3) * 2").unwrap();
/// assert_eq!(tokens.len(), 3);
/// assert!(matches!(tokens[0], Token::Function { .. }));
/// ```
pub fn tokenize(expression: &str) -> FormulaResult<Vec<Token>> {
    tokenize_with_config(expression, &EngineConfig::default())
}

/// Tokenize a formula, enforcing the length and grid limits of `config`
pub fn tokenize_with_config(expression: &str, config: &EngineConfig) -> FormulaResult<Vec<Token>> {
    let length = expression.chars().count();
    if length > config.max_formula_length {
        return Err(FormulaError::tokenize(
            format!(
                "Formula is {} characters long, the limit is {}",
                length, config.max_formula_length
            ),
            "",
            config.max_formula_length,
        ));
    }

    // Leading '=' is optional
    let leading_ws = expression.len() - expression.trim_start().len();
    let mut start = leading_ws;
    if expression[start..].starts_with('=') {
        start += 1;
    }

    let mut tokenizer = Tokenizer {
        input: expression,
        pos: start,
        config,
    };
    let (tokens, _) = tokenizer.scan_sequence(false)?;
    trace!(expression, count = tokens.len(), "tokenized formula");
    Ok(tokens)
}

/// Why a token sequence ended
enum Stop {
    End,
    Comma,
    Close,
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    config: &'a EngineConfig,
}

impl<'a> Tokenizer<'a> {
    /// Scan tokens until the end of input, or, inside a function argument
    /// list, until a top-level `,` or the closing `)`.
    fn scan_sequence(&mut self, in_args: bool) -> FormulaResult<(Vec<Token>, Stop)> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut depth = 0usize;

        loop {
            self.skip_whitespace();
            let start = self.pos;
            let c = match self.peek_char() {
                Some(c) => c,
                None if in_args => {
                    return Err(self.error_at("Unterminated function argument list", start))
                }
                None => return Ok((tokens, Stop::End)),
            };

            let unary_position = matches!(
                tokens.last(),
                None | Some(Token::Operator(_)) | Some(Token::Paren(Paren::Open))
            );

            match c {
                '+' => {
                    self.advance();
                    // unary plus is a no-op
                    if !unary_position {
                        tokens.push(Token::Operator(Operator::Add));
                    }
                }
                '-' => {
                    self.advance();
                    tokens.push(Token::Operator(if unary_position {
                        Operator::Negate
                    } else {
                        Operator::Subtract
                    }));
                }
                '*' => {
                    self.advance();
                    tokens.push(Token::Operator(Operator::Multiply));
                }
                '/' => {
                    self.advance();
                    tokens.push(Token::Operator(Operator::Divide));
                }
                '^' => {
                    self.advance();
                    tokens.push(Token::Operator(Operator::Power));
                }
                '<' => {
                    self.advance();
                    let op = match self.peek_char() {
                        Some('=') => {
                            self.advance();
                            Operator::LessEqual
                        }
                        Some('>') => {
                            self.advance();
                            Operator::NotEqual
                        }
                        _ => Operator::LessThan,
                    };
                    tokens.push(Token::Operator(op));
                }
                '>' => {
                    self.advance();
                    let op = if self.peek_char() == Some('=') {
                        self.advance();
                        Operator::GreaterEqual
                    } else {
                        Operator::GreaterThan
                    };
                    tokens.push(Token::Operator(op));
                }
                '=' => {
                    self.advance();
                    tokens.push(Token::Operator(Operator::Equal));
                }
                '(' => {
                    self.advance();
                    depth += 1;
                    tokens.push(Token::Paren(Paren::Open));
                }
                ')' => {
                    if in_args && depth == 0 {
                        self.advance();
                        return Ok((tokens, Stop::Close));
                    }
                    self.advance();
                    depth = depth.saturating_sub(1);
                    tokens.push(Token::Paren(Paren::Close));
                }
                ',' => {
                    if in_args && depth == 0 {
                        self.advance();
                        return Ok((tokens, Stop::Comma));
                    }
                    return Err(self.error_at("Unexpected ','", start));
                }
                ':' => return Err(self.error_at("Unexpected ':'", start)),
                '"' => tokens.push(self.scan_string()?),
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_char_at(1).map_or(false, |d| d.is_ascii_digit())) =>
                {
                    tokens.push(self.scan_number()?);
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    tokens.push(self.scan_identifier()?);
                }
                _ => {
                    self.advance();
                    return Err(self.error_at("Unrecognised character", start));
                }
            }
        }
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.advance();
                    // "" is an escaped quote
                    if self.peek_char() == Some('"') {
                        s.push('"');
                        self.advance();
                    } else {
                        return Ok(Token::Value(Literal::Text(s)));
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(self.error_at("Unterminated string", start)),
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let mut dots = 0;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' {
                dots += 1;
                self.advance();
            } else {
                break;
            }
        }

        if dots > 1 {
            return Err(self.error_at("Malformed number", start));
        }

        let text = &self.input[start..self.pos];
        Decimal::from_str(text)
            .map(|n| Token::Value(Literal::Number(n)))
            .map_err(|_| self.error_at("Number out of range", start))
    }

    fn scan_identifier(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.take_word();
        let word = &self.input[start..self.pos];

        // NAME( is a function call, whatever the name looks like
        if self.peek_char() == Some('(') {
            self.advance();
            let args = self.scan_arguments(start)?;
            return Ok(Token::Function {
                name: word.to_ascii_uppercase(),
                args,
            });
        }

        if word.eq_ignore_ascii_case("TRUE") {
            return Ok(Token::Value(Literal::Boolean(true)));
        }
        if word.eq_ignore_ascii_case("FALSE") {
            return Ok(Token::Value(Literal::Boolean(false)));
        }

        if !is_reference(word) {
            return Err(self.error_at("Unrecognised name", start));
        }
        let first = self.reference(word, start)?;

        if self.peek_char() != Some(':') {
            return Ok(Token::Reference(first));
        }
        self.advance();

        let second_start = self.pos;
        self.take_word();
        let second = &self.input[second_start..self.pos];
        if !is_reference(second) {
            return Err(self.error_at("Range end is not a cell reference", start));
        }
        let second = self.reference(second, second_start)?;

        Ok(Token::Range(CellRange::new(first, second)))
    }

    /// Scan the arguments after `NAME(`, up to and including the matching `)`
    fn scan_arguments(&mut self, name_start: usize) -> FormulaResult<Vec<Vec<Token>>> {
        self.skip_whitespace();
        if self.peek_char() == Some(')') {
            self.advance();
            return Ok(Vec::new());
        }

        let mut args = Vec::new();
        loop {
            let (arg, stop) = self.scan_sequence(true)?;
            args.push(arg);
            match stop {
                Stop::Comma => continue,
                Stop::Close => return Ok(args),
                Stop::End => {
                    return Err(self.error_at("Unterminated function argument list", name_start))
                }
            }
        }
    }

    fn reference(&self, word: &str, start: usize) -> FormulaResult<CellAddress> {
        let addr = CellAddress::parse(word)
            .and_then(|addr| {
                addr.check_bounds(self.config.max_rows, self.config.max_columns)?;
                Ok(addr)
            })
            .map_err(|e| FormulaError::tokenize(e.to_string(), word, start))?;
        Ok(addr)
    }

    fn error_at(&self, message: &str, start: usize) -> FormulaError {
        let end = self.pos.max(start);
        let fragment = self.input.get(start..end).unwrap_or_default();
        FormulaError::tokenize(message, fragment, start)
    }

    // === Helper methods ===

    fn take_word(&mut self) {
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

/// `[A-Za-z]+[0-9]+`
fn is_reference(word: &str) -> bool {
    let letters = word.bytes().take_while(|b| b.is_ascii_alphabetic()).count();
    let digits = word[letters..].bytes().take_while(|b| b.is_ascii_digit()).count();
    letters > 0 && digits > 0 && letters + digits == word.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokens_to_string;
    use pretty_assertions::assert_eq;

    fn num(n: i64) -> Token {
        Token::number(n)
    }

    fn cell(s: &str) -> Token {
        Token::Reference(CellAddress::parse(s).unwrap())
    }

    fn op(op: Operator) -> Token {
        Token::Operator(op)
    }

    #[test]
    fn test_tokenize_arithmetic() {
        assert_eq!(
            tokenize("=1+2*3").unwrap(),
            vec![
                num(1),
                op(Operator::Add),
                num(2),
                op(Operator::Multiply),
                num(3)
            ]
        );
    }

    #[test]
    fn test_leading_equals_is_optional() {
        assert_eq!(tokenize("  = A1").unwrap(), tokenize("A1").unwrap());
    }

    #[test]
    fn test_comparison_operators_are_greedy() {
        let tokens = tokenize("A1<=B1<>C1>=D1<E1>F1=G1").unwrap();
        let ops: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Operator(op) => Some(*op),
                _ => None,
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                Operator::LessEqual,
                Operator::NotEqual,
                Operator::GreaterEqual,
                Operator::LessThan,
                Operator::GreaterThan,
                Operator::Equal,
            ]
        );
    }

    #[test]
    fn test_unary_minus_and_plus() {
        assert_eq!(
            tokenize("=-A1*(+2--3)").unwrap(),
            vec![
                op(Operator::Negate),
                cell("A1"),
                op(Operator::Multiply),
                Token::Paren(Paren::Open),
                num(2),
                op(Operator::Subtract),
                op(Operator::Negate),
                num(3),
                Token::Paren(Paren::Close),
            ]
        );
    }

    #[test]
    fn test_references_and_ranges() {
        let tokens = tokenize("=b2 + C3:a1").unwrap();
        assert_eq!(tokens[0], cell("B2"));
        assert_eq!(
            tokens[2],
            Token::Range(CellRange::parse("A1:C3").unwrap())
        );
    }

    #[test]
    fn test_function_arguments_are_nested() {
        let tokens = tokenize("=IF(A1>0, SUM(B1:B3, (1+2)), \"no\")").unwrap();
        assert_eq!(tokens.len(), 1);
        let Token::Function { name, args } = &tokens[0] else {
            panic!("expected function, got {:?}", tokens[0]);
        };
        assert_eq!(name, "IF");
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], vec![cell("A1"), op(Operator::GreaterThan), num(0)]);
        assert_eq!(args[2], vec![Token::text("no")]);

        let Token::Function { name, args: inner } = &args[1][0] else {
            panic!("expected nested function");
        };
        assert_eq!(name, "SUM");
        assert_eq!(inner[1].len(), 5);
    }

    #[test]
    fn test_zero_argument_function() {
        assert_eq!(
            tokenize("=today( )").unwrap(),
            vec![Token::Function {
                name: "TODAY".into(),
                args: vec![],
            }]
        );
    }

    #[test]
    fn test_function_names_with_digits_and_dots() {
        let tokens = tokenize("=LOG10(100)+STDEV.S(A1:A2)").unwrap();
        assert!(matches!(&tokens[0], Token::Function { name, .. } if name == "LOG10"));
        assert!(matches!(&tokens[2], Token::Function { name, .. } if name == "STDEV.S"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            tokenize("=true").unwrap(),
            vec![Token::Value(Literal::Boolean(true))]
        );
        assert_eq!(
            tokenize("=\"say \"\"hi\"\"\"").unwrap(),
            vec![Token::text("say \"hi\"")]
        );
        assert_eq!(
            tokenize("=.5").unwrap(),
            vec![Token::number("0.5".parse::<Decimal>().unwrap())]
        );
    }

    #[test]
    fn test_tokenize_errors() {
        let err = tokenize("=1.2.3").unwrap_err();
        assert!(matches!(
            err,
            FormulaError::Tokenize { ref fragment, position: 1, .. } if fragment == "1.2.3"
        ));

        assert!(matches!(
            tokenize("=\"open").unwrap_err(),
            FormulaError::Tokenize { .. }
        ));
        assert!(matches!(
            tokenize("=SUM(1,2").unwrap_err(),
            FormulaError::Tokenize { .. }
        ));
        assert!(matches!(
            tokenize("=1 , 2").unwrap_err(),
            FormulaError::Tokenize { .. }
        ));
        assert!(matches!(
            tokenize("=A1 & B1").unwrap_err(),
            FormulaError::Tokenize { .. }
        ));
        assert!(matches!(
            tokenize("=foo + 1").unwrap_err(),
            FormulaError::Tokenize { .. }
        ));
        assert!(matches!(
            tokenize("=A1:").unwrap_err(),
            FormulaError::Tokenize { .. }
        ));
    }

    #[test]
    fn test_grid_limits() {
        let config = EngineConfig {
            max_rows: 100,
            max_columns: 10,
            ..EngineConfig::default()
        };
        assert!(tokenize_with_config("=J100", &config).is_ok());
        assert!(tokenize_with_config("=A101", &config).is_err());
        assert!(tokenize_with_config("=K1", &config).is_err());
        assert!(tokenize("=XFD1048576").is_ok());
        assert!(tokenize("=XFE1").is_err());
    }

    #[test]
    fn test_length_limit() {
        let config = EngineConfig {
            max_formula_length: 10,
            ..EngineConfig::default()
        };
        assert!(tokenize_with_config("=1+2+3+4+5", &config).is_ok());
        assert!(tokenize_with_config("=1+2+3+4+56", &config).is_err());
    }

    #[test]
    fn test_round_trip() {
        let formula = "=IF( a1 >= 10 ,\"big\",-SUM(B1:b3)^2 )";
        let tokens = tokenize(formula).unwrap();
        let text = tokens_to_string(&tokens);
        assert_eq!(text, "IF(A1 >= 10, \"big\", - SUM(B1:B3) ^ 2)");
        assert_eq!(tokenize(&text).unwrap(), tokens);
    }
}
