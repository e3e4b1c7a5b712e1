//! Parsed formulas with their dependencies and cached result

use crate::config::EngineConfig;
use crate::dependency::extract_dependencies;
use crate::error::FormulaResult;
use crate::evaluator::{evaluate_to_value, EvaluationContext, FormulaValue};
use crate::functions::FunctionRegistry;
use crate::token::Token;
use crate::tokenizer::tokenize_with_config;
use crate::validator::validate;
use gridcalc_core::CellAddress;
use std::collections::BTreeSet;

/// A validated formula
///
/// Holds the original text, its tokens, the distinct cells it reads and
/// the last computed result. Only formulas that tokenize and validate can
/// be constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expression: String,
    tokens: Vec<Token>,
    dependencies: BTreeSet<CellAddress>,
    volatile: bool,
    cached: Option<FormulaValue>,
}

impl Formula {
    /// Tokenize and validate `expression`
    ///
    /// # Example
    /// ```rust
    /// use gridcalc_formula::{EmptyLookup, EngineConfig, EvaluationContext, Formula, FunctionRegistry};
    ///
    /// let registry = FunctionRegistry::new();
    /// let mut formula = Formula::parse("=ROUND(10/3, 2)", &registry, &EngineConfig::default()).unwrap();
    /// assert!(formula.cached_result().is_none());
    ///
    /// let ctx = EvaluationContext::new(&EmptyLookup, &registry);
    /// assert_eq!(formula.evaluate(&ctx).as_text(), "3.33");
    /// ```
    pub fn parse(
        expression: &str,
        registry: &FunctionRegistry,
        config: &EngineConfig,
    ) -> FormulaResult<Self> {
        let tokens = tokenize_with_config(expression, config)?;
        validate(&tokens, registry).into_result()?;

        Ok(Self {
            expression: expression.to_string(),
            dependencies: extract_dependencies(&tokens),
            volatile: calls_volatile(&tokens, registry),
            tokens,
            cached: None,
        })
    }

    /// Replace the expression
    ///
    /// On failure the formula keeps its previous expression and result.
    pub fn set_expression(
        &mut self,
        expression: &str,
        registry: &FunctionRegistry,
        config: &EngineConfig,
    ) -> FormulaResult<()> {
        *self = Self::parse(expression, registry, config)?;
        Ok(())
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Distinct cells the formula reads
    pub fn dependencies(&self) -> &BTreeSet<CellAddress> {
        &self.dependencies
    }

    /// Whether the formula calls TODAY, NOW or another volatile function
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    pub fn cached_result(&self) -> Option<&FormulaValue> {
        self.cached.as_ref()
    }

    /// Forget the cached result
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Store a result computed elsewhere, replacing any cached one
    pub fn set_result(&mut self, value: FormulaValue) {
        self.cached = Some(value);
    }

    /// Evaluate without touching the cache
    ///
    /// Failures become error values, so this always yields a result.
    pub fn compute(&self, ctx: &EvaluationContext) -> FormulaValue {
        evaluate_to_value(&self.tokens, ctx)
    }

    /// Evaluate unless a result is already cached
    pub fn evaluate(&mut self, ctx: &EvaluationContext) -> &FormulaValue {
        let tokens = &self.tokens;
        self.cached
            .get_or_insert_with(|| evaluate_to_value(tokens, ctx))
    }
}

fn calls_volatile(tokens: &[Token], registry: &FunctionRegistry) -> bool {
    tokens.iter().any(|token| match token {
        Token::Function { name, args } => {
            registry.get(name).map_or(false, |f| f.volatile)
                || args.iter().any(|arg| calls_volatile(arg, registry))
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use crate::resolver::EmptyLookup;
    use gridcalc_core::{CellError, CellValue};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn parse(expression: &str) -> FormulaResult<Formula> {
        Formula::parse(expression, &FunctionRegistry::new(), &EngineConfig::default())
    }

    #[test]
    fn test_parse_collects_dependencies() {
        let formula = parse("=A1 + SUM(A1:A2)").unwrap();
        assert_eq!(formula.expression(), "=A1 + SUM(A1:A2)");
        assert_eq!(formula.tokens().len(), 3);
        let deps: Vec<String> = formula.dependencies().iter().map(|a| a.to_string()).collect();
        assert_eq!(deps, vec!["A1", "A2"]);
        assert!(!formula.is_volatile());
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(
            parse("=FROB(1)").unwrap_err(),
            FormulaError::UnknownFunction("FROB".into())
        );
        assert!(matches!(
            parse("=1.2.3").unwrap_err(),
            FormulaError::Tokenize { .. }
        ));
    }

    #[test]
    fn test_volatility_is_detected_in_arguments() {
        assert!(parse("=TODAY()").unwrap().is_volatile());
        assert!(parse("=YEAR(NOW()) + 1").unwrap().is_volatile());
    }

    #[test]
    fn test_set_expression_failure_keeps_state() {
        let registry = FunctionRegistry::new();
        let config = EngineConfig::default();
        let mut formula = Formula::parse("=A1", &registry, &config).unwrap();

        assert!(formula.set_expression("=(", &registry, &config).is_err());
        assert_eq!(formula.expression(), "=A1");

        formula.set_expression("=B2*2", &registry, &config).unwrap();
        assert_eq!(formula.expression(), "=B2*2");
        assert!(formula.dependencies().contains(&CellAddress::new(2, 2)));
    }

    #[test]
    fn test_cached_result_until_invalidated() {
        let registry = FunctionRegistry::new();
        let mut formula = parse("=A1*2").unwrap();

        let mut cells = HashMap::new();
        cells.insert(CellAddress::new(1, 1), CellValue::from(21));
        let ctx = EvaluationContext::new(&cells, &registry);
        assert_eq!(formula.evaluate(&ctx), &FormulaValue::from(42i64));

        cells.insert(CellAddress::new(1, 1), CellValue::from(1));
        let ctx = EvaluationContext::new(&cells, &registry);
        assert_eq!(formula.evaluate(&ctx), &FormulaValue::from(42i64));

        formula.invalidate();
        assert!(formula.cached_result().is_none());
        assert_eq!(formula.evaluate(&ctx), &FormulaValue::from(2i64));
    }

    #[test]
    fn test_evaluation_errors_become_values() {
        let registry = FunctionRegistry::new();
        let mut formula = parse("=5/0").unwrap();
        let ctx = EvaluationContext::new(&EmptyLookup, &registry);
        assert_eq!(formula.evaluate(&ctx), &FormulaValue::Error(CellError::Div0));
    }
}
