//! Structural validation of token sequences
//!
//! Validation is purely syntactic: nothing is resolved or evaluated, so a
//! formula that validates can still produce an error value at run time.

use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use crate::token::{Paren, Token};

/// Outcome of [`validate`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FormulaError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<FormulaError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// `Ok(())` when valid, otherwise the first error found
    pub fn into_result(self) -> FormulaResult<()> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Validate a token sequence against a function registry
///
/// # Example
/// ```rust
/// use gridcalc_formula::{tokenize, validate, FunctionRegistry};
///
/// let registry = FunctionRegistry::new();
/// assert!(validate(&tokenize("=SUM(A1:A3) * 2").unwrap(), &registry).valid);
/// assert!(!validate(&tokenize("=1 + * 2").unwrap(), &registry).valid);
/// ```
pub fn validate(tokens: &[Token], registry: &FunctionRegistry) -> ValidationResult {
    let mut errors = Vec::new();
    check_sequence(tokens, registry, &mut errors);
    ValidationResult::from_errors(errors)
}

/// What the previous token allows next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// Start of a sequence, after an operator or after `(`
    Operand,
    /// After a value, reference, range, function call or `)`
    Operator,
}

fn check_sequence(tokens: &[Token], registry: &FunctionRegistry, errors: &mut Vec<FormulaError>) {
    if tokens.is_empty() {
        errors.push(FormulaError::InvalidTokenSequence("empty expression".into()));
        return;
    }

    let mut depth = 0usize;
    let mut expect = Expect::Operand;
    let mut sequence_error: Option<FormulaError> = None;

    for (i, token) in tokens.iter().enumerate() {
        let next = match (token, expect) {
            (Token::Value(_) | Token::Reference(_) | Token::Range(_), Expect::Operand) => {
                Some(Expect::Operator)
            }
            (Token::Function { name, args }, Expect::Operand) => {
                check_function(name, args, registry, errors);
                Some(Expect::Operator)
            }
            (Token::Operator(op), Expect::Operand) if op.is_unary() => Some(Expect::Operand),
            (Token::Operator(op), Expect::Operator) if !op.is_unary() => Some(Expect::Operand),
            (Token::Paren(Paren::Open), Expect::Operand) => {
                depth += 1;
                Some(Expect::Operand)
            }
            (Token::Paren(Paren::Close), Expect::Operator) => {
                if depth == 0 {
                    errors.push(FormulaError::UnbalancedParentheses(format!(
                        "')' at token {} has no matching '('",
                        i + 1
                    )));
                } else {
                    depth -= 1;
                }
                Some(Expect::Operator)
            }
            _ => None,
        };

        match next {
            Some(next) => expect = next,
            None => {
                // report only the first sequence error per sequence
                if sequence_error.is_none() {
                    sequence_error = Some(FormulaError::InvalidTokenSequence(format!(
                        "unexpected '{}' at token {}",
                        token,
                        i + 1
                    )));
                }
                // resynchronise on the token we just saw
                expect = if token.is_operand() || matches!(token, Token::Paren(Paren::Close)) {
                    Expect::Operator
                } else {
                    Expect::Operand
                };
                if let Token::Paren(Paren::Open) = token {
                    depth += 1;
                }
                if let Token::Paren(Paren::Close) = token {
                    depth = depth.saturating_sub(1);
                }
            }
        }
    }

    if expect == Expect::Operand && sequence_error.is_none() {
        sequence_error = Some(FormulaError::InvalidTokenSequence(format!(
            "expression ends with '{}'",
            tokens[tokens.len() - 1]
        )));
    }
    if depth > 0 {
        errors.push(FormulaError::UnbalancedParentheses(format!(
            "{} unclosed '('",
            depth
        )));
    }
    errors.extend(sequence_error);
}

fn check_function(
    name: &str,
    args: &[Vec<Token>],
    registry: &FunctionRegistry,
    errors: &mut Vec<FormulaError>,
) {
    match registry.get(name) {
        Some(def) => {
            if let Err(err) = def.check_arity(args.len()) {
                errors.push(err);
            }
        }
        None => errors.push(FormulaError::UnknownFunction(name.to_string())),
    }

    for arg in args {
        check_sequence(arg, registry, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{tokens_to_string, Operator};
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn check(formula: &str) -> ValidationResult {
        validate(&tokenize(formula).unwrap(), &FunctionRegistry::new())
    }

    #[test]
    fn test_valid_formulas() {
        for formula in [
            "=1",
            "=A1+B2*3",
            "=-(A1)",
            "=--2",
            "=SUM(A1:B3, 2) / COUNT(A1:B3)",
            "=IF(A1>=10, \"big\", LEFT(\"small\", 2))",
            "=TODAY()",
            "=((1))",
        ] {
            let result = check(formula);
            assert!(result.valid, "{} -> {:?}", formula, result.errors);
        }
    }

    #[test]
    fn test_operator_sequences() {
        assert!(matches!(
            check("=1 + * 2").into_result(),
            Err(FormulaError::InvalidTokenSequence(_))
        ));
        assert!(matches!(
            check("=1 2").into_result(),
            Err(FormulaError::InvalidTokenSequence(_))
        ));
        assert!(matches!(
            check("=1 +").into_result(),
            Err(FormulaError::InvalidTokenSequence(_))
        ));
        assert!(matches!(
            check("=()").into_result(),
            Err(FormulaError::InvalidTokenSequence(_))
        ));
    }

    #[test]
    fn test_empty_sequences() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            validate(&[], &registry).into_result(),
            Err(FormulaError::InvalidTokenSequence("empty expression".into()))
        );
        let empty_arg = vec![Token::Function {
            name: "SUM".into(),
            args: vec![vec![Token::number(1)], vec![]],
        }];
        assert!(!validate(&empty_arg, &registry).valid);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let tokens = vec![
            Token::Paren(Paren::Open),
            Token::number(1),
            Token::Operator(Operator::Add),
            Token::number(2),
        ];
        let result = validate(&tokens, &FunctionRegistry::new());
        assert!(!result.valid);
        assert!(matches!(
            result.errors[0],
            FormulaError::UnbalancedParentheses(_)
        ));

        let tokens = vec![Token::number(1), Token::Paren(Paren::Close)];
        assert!(matches!(
            validate(&tokens, &FunctionRegistry::new()).into_result(),
            Err(FormulaError::UnbalancedParentheses(_))
        ));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert_eq!(
            check("=FROB(1)").into_result(),
            Err(FormulaError::UnknownFunction("FROB".into()))
        );
        assert_eq!(
            check("=NOT(1, 2)").into_result(),
            Err(FormulaError::ArityMismatch {
                function: "NOT".into(),
                expected: "1".into(),
                actual: 2,
            })
        );
        // nested arguments are checked too
        assert_eq!(
            check("=SUM(1, NOPE())").into_result(),
            Err(FormulaError::UnknownFunction("NOPE".into()))
        );
    }

    #[test]
    fn test_collects_every_error() {
        let result = check("=FROB(1) + NOT(1, 2)");
        assert_eq!(result.errors.len(), 2);
    }

    fn formula_strategy() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            (0u32..1000).prop_map(|n| n.to_string()),
            (1u32..50, 0u32..26).prop_map(|(row, col)| {
                format!("{}{}", (b'A' + col as u8) as char, row)
            }),
            "[a-z]{0,5}".prop_map(|s| format!("\"{}\"", s)),
            Just("TRUE".to_string()),
        ];
        leaf.prop_recursive(4, 32, 3, |inner| {
            prop_oneof![
                (inner.clone(), prop_oneof![Just("+"), Just("-"), Just("*"), Just("/"), Just("^"), Just("<="), Just("<>"), Just("=")], inner.clone())
                    .prop_map(|(l, op, r)| format!("{}{}{}", l, op, r)),
                inner.clone().prop_map(|e| format!("({})", e)),
                inner.clone().prop_map(|e| format!("-{}", e)),
                prop::collection::vec(inner, 1..4)
                    .prop_map(|args| format!("SUM({})", args.join(","))),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_display_round_trips(formula in formula_strategy()) {
            let tokens = tokenize(&formula).unwrap();
            prop_assert!(validate(&tokens, &FunctionRegistry::new()).valid);
            let reparsed = tokenize(&tokens_to_string(&tokens)).unwrap();
            prop_assert_eq!(reparsed, tokens);
        }
    }
}
