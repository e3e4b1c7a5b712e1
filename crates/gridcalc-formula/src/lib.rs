//! # gridcalc-formula
//!
//! Formula tokenizer, validator and evaluator for gridcalc.
//!
//! This crate provides:
//! - Tokenizing (text → flat token sequence)
//! - Validation against a function registry
//! - Shunting-yard evaluation with decimal arithmetic
//! - Built-in spreadsheet functions (math, logical, text, date, lookup)
//! - Dependency tracking with cycle rejection
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_formula::{evaluate, tokenize, EmptyLookup, EvaluationContext, FunctionRegistry};
//!
//! let registry = FunctionRegistry::new();
//! let tokens = tokenize("=1+2*3").unwrap();
//! let ctx = EvaluationContext::new(&EmptyLookup, &registry);
//! assert_eq!(evaluate(&tokens, &ctx).unwrap().as_text(), "7");
//! ```

pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod functions;
pub mod number;
pub mod resolver;
pub mod token;
pub mod tokenizer;
pub mod validator;

pub use config::EngineConfig;
pub use dependency::{extract_dependencies, DependencyGraph};
pub use engine::FormulaEngine;
pub use error::{ErrorKind, FormulaError, FormulaResult};
pub use evaluator::{evaluate, evaluate_to_value, EvaluationContext, FormulaValue};
pub use formula::Formula;
pub use functions::{FunctionDef, FunctionImpl, FunctionRegistry};
pub use resolver::{resolve, CellLookup, EmptyLookup};
pub use token::{tokens_to_string, Literal, Operator, Paren, Token};
pub use tokenizer::{tokenize, tokenize_with_config};
pub use validator::{validate, ValidationResult};
