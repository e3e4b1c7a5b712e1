//! Formula engine facade
//!
//! Bundles a function registry with the engine limits so callers do not
//! have to thread both through every tokenize/validate/evaluate call.

use crate::config::EngineConfig;
use crate::dependency::extract_dependencies;
use crate::error::FormulaResult;
use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
use crate::formula::Formula;
use crate::functions::FunctionRegistry;
use crate::resolver::CellLookup;
use crate::token::Token;
use crate::tokenizer::tokenize_with_config;
use crate::validator::{validate, ValidationResult};
use gridcalc_core::CellAddress;
use std::collections::BTreeSet;
use tracing::debug;

/// Formula engine
///
/// Each engine owns its own [`FunctionRegistry`]; functions registered on one
/// engine are invisible to another.
///
/// # Example
/// ```rust
/// use gridcalc_core::{CellAddress, CellValue};
/// use gridcalc_formula::{FormulaEngine, FormulaValue};
/// use std::collections::HashMap;
///
/// let engine = FormulaEngine::new();
/// let mut cells = HashMap::new();
/// cells.insert(CellAddress::parse("A1").unwrap(), CellValue::from(10));
/// cells.insert(CellAddress::parse("B1").unwrap(), CellValue::from(20));
///
/// let value = engine.evaluate("=SUM(A1, B1)", &cells).unwrap();
/// assert_eq!(value, FormulaValue::from(30i64));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormulaEngine {
    registry: FunctionRegistry,
    config: EngineConfig,
}

impl FormulaEngine {
    /// Engine with the built-in functions and default limits
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: FunctionRegistry::new(),
            config,
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a custom function on this engine
    pub fn register_fn<F>(&mut self, name: &str, min_args: usize, max_args: Option<usize>, f: F)
    where
        F: Fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>
            + Send
            + Sync
            + 'static,
    {
        debug!(name, "registering custom function");
        self.registry.register_fn(name, min_args, max_args, f);
    }

    pub fn tokenize(&self, expression: &str) -> FormulaResult<Vec<Token>> {
        tokenize_with_config(expression, &self.config)
    }

    pub fn validate(&self, tokens: &[Token]) -> ValidationResult {
        validate(tokens, &self.registry)
    }

    /// Tokenize and validate into a [`Formula`]
    pub fn parse(&self, expression: &str) -> FormulaResult<Formula> {
        Formula::parse(expression, &self.registry, &self.config)
    }

    /// Tokenize, validate and evaluate `expression` against `lookup`
    pub fn evaluate(&self, expression: &str, lookup: &dyn CellLookup) -> FormulaResult<FormulaValue> {
        let tokens = self.tokenize(expression)?;
        self.validate(&tokens).into_result()?;
        evaluate(&tokens, &self.context(lookup))
    }

    /// Evaluation context over `lookup` using this engine's functions
    pub fn context<'a>(&'a self, lookup: &'a dyn CellLookup) -> EvaluationContext<'a> {
        EvaluationContext::new(lookup, &self.registry)
    }

    /// Distinct cells `expression` reads
    pub fn dependencies(&self, expression: &str) -> FormulaResult<BTreeSet<CellAddress>> {
        Ok(extract_dependencies(&self.tokenize(expression)?))
    }
}
