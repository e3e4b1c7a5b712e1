//! Built-in functions and the function registry

pub mod date;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod text;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;
use gridcalc_core::CellError;
use std::fmt;
use std::sync::Arc;

/// Function implementation signature
///
/// Functions receive their arguments already evaluated, in order, and may
/// consult the evaluation context (for example the clock).
pub type FunctionImpl =
    Arc<dyn Fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue> + Send + Sync>;

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: String,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Create a non-volatile function definition
    pub fn new<F>(name: impl Into<String>, min_args: usize, max_args: Option<usize>, f: F) -> Self
    where
        F: Fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into().to_ascii_uppercase(),
            min_args,
            max_args,
            volatile: false,
            implementation: Arc::new(f),
        }
    }

    /// Mark the function as volatile
    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Check an argument count against the declared arity
    pub fn check_arity(&self, count: usize) -> FormulaResult<()> {
        let too_few = count < self.min_args;
        let too_many = self.max_args.map_or(false, |max| count > max);
        if too_few || too_many {
            return Err(FormulaError::ArityMismatch {
                function: self.name.clone(),
                expected: self.arity_description(),
                actual: count,
            });
        }
        Ok(())
    }

    fn arity_description(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("{}", max),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatile", &self.volatile)
            .finish_non_exhaustive()
    }
}

/// Function registry
///
/// Names are case-insensitive. Registering a name that already exists
/// replaces the earlier definition.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_date_functions();
        registry.register_lookup_functions();

        registry
    }

    /// Create a registry with no functions at all
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_ascii_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_ascii_uppercase(), def);
    }

    /// Register a closure as a function
    ///
    /// # Example
    /// ```rust
    /// use gridcalc_formula::{FormulaValue, FunctionRegistry};
    ///
    /// let mut registry = FunctionRegistry::new();
    /// registry.register_fn("DOUBLE", 1, Some(1), |args, _ctx| {
    ///     let n = args[0].as_decimal().unwrap_or_default();
    ///     Ok(FormulaValue::Number(n * rust_decimal::Decimal::TWO))
    /// });
    /// assert!(registry.contains("double"));
    /// ```
    pub fn register_fn<F>(&mut self, name: &str, min_args: usize, max_args: Option<usize>, f: F)
    where
        F: Fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>
            + Send
            + Sync
            + 'static,
    {
        self.register(FunctionDef::new(name, min_args, max_args, f));
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef::new("SUM", 1, None, math::fn_sum));
        self.register(FunctionDef::new("AVERAGE", 1, None, math::fn_average));
        self.register(FunctionDef::new("MAX", 1, None, math::fn_max));
        self.register(FunctionDef::new("MIN", 1, None, math::fn_min));
        self.register(FunctionDef::new("COUNT", 1, None, math::fn_count));
        self.register(FunctionDef::new("ROUND", 1, Some(2), math::fn_round));
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef::new("IF", 2, Some(3), logical::fn_if));
        self.register(FunctionDef::new("AND", 1, None, logical::fn_and));
        self.register(FunctionDef::new("OR", 1, None, logical::fn_or));
        self.register(FunctionDef::new("NOT", 1, Some(1), logical::fn_not));
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef::new("CONCATENATE", 1, None, text::fn_concatenate));
        self.register(FunctionDef::new("LEFT", 1, Some(2), text::fn_left));
        self.register(FunctionDef::new("RIGHT", 1, Some(2), text::fn_right));
        self.register(FunctionDef::new("MID", 3, Some(3), text::fn_mid));
        self.register(FunctionDef::new("LEN", 1, Some(1), text::fn_len));
        self.register(FunctionDef::new("LOWER", 1, Some(1), text::fn_lower));
        self.register(FunctionDef::new("UPPER", 1, Some(1), text::fn_upper));
    }

    fn register_date_functions(&mut self) {
        // TODAY and NOW read the clock, so they are volatile
        self.register(FunctionDef::new("TODAY", 0, Some(0), date::fn_today).volatile());
        self.register(FunctionDef::new("NOW", 0, Some(0), date::fn_now).volatile());
        self.register(FunctionDef::new("YEAR", 1, Some(1), date::fn_year));
        self.register(FunctionDef::new("MONTH", 1, Some(1), date::fn_month));
        self.register(FunctionDef::new("DAY", 1, Some(1), date::fn_day));
        self.register(FunctionDef::new("DATEVALUE", 1, Some(1), date::fn_datevalue));
    }

    fn register_lookup_functions(&mut self) {
        self.register(FunctionDef::new("VLOOKUP", 3, Some(4), lookup::fn_vlookup));
        self.register(FunctionDef::new("HLOOKUP", 3, Some(4), lookup::fn_hlookup));
        self.register(FunctionDef::new("INDEX", 2, Some(3), lookup::fn_index));
        self.register(FunctionDef::new("MATCH", 2, Some(3), lookup::fn_match));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Return the first error value among the arguments, looking inside arrays
pub(crate) fn first_error(args: &[FormulaValue]) -> Option<CellError> {
    args.iter().find_map(|arg| match arg {
        FormulaValue::Error(e) => Some(*e),
        FormulaValue::Array(rows) => rows.iter().flatten().find_map(FormulaValue::error),
        _ => None,
    })
}

/// Get a required argument; arity is checked before dispatch, so a missing
/// one means the function was called directly with too few arguments
pub(crate) fn arg<'a>(args: &'a [FormulaValue], index: usize, name: &str) -> FormulaResult<&'a FormulaValue> {
    args.get(index).ok_or_else(|| FormulaError::ArityMismatch {
        function: name.to_string(),
        expected: format!("at least {}", index + 1),
        actual: args.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::EmptyLookup;
    use rust_decimal::Decimal;

    #[test]
    fn test_builtins_registered() {
        let registry = FunctionRegistry::new();
        for name in [
            "SUM", "AVERAGE", "MAX", "MIN", "COUNT", "ROUND", "IF", "AND", "OR", "NOT",
            "CONCATENATE", "LEFT", "RIGHT", "MID", "LEN", "LOWER", "UPPER", "TODAY", "NOW",
            "YEAR", "MONTH", "DAY", "DATEVALUE", "VLOOKUP", "HLOOKUP", "INDEX", "MATCH",
        ] {
            assert!(registry.contains(name), "{} missing", name);
        }
        assert_eq!(registry.len(), 27);
        assert!(registry.get("today").map_or(false, |f| f.volatile));
        assert!(!registry.get("sum").map_or(true, |f| f.volatile));
    }

    #[test]
    fn test_register_is_case_insensitive_and_last_write_wins() {
        let mut registry = FunctionRegistry::empty();
        registry.register_fn("answer", 0, Some(0), |_, _| Ok(FormulaValue::from(1i64)));
        registry.register_fn("ANSWER", 0, Some(0), |_, _| Ok(FormulaValue::from(42i64)));
        assert_eq!(registry.names(), vec!["ANSWER"]);

        let func = registry.get("Answer").unwrap();
        let empty = FunctionRegistry::empty();
        let ctx = EvaluationContext::new(&EmptyLookup, &empty);
        assert_eq!(
            (func.implementation)(&[], &ctx).unwrap(),
            FormulaValue::Number(Decimal::from(42))
        );
    }

    #[test]
    fn test_check_arity() {
        let registry = FunctionRegistry::new();
        let round = registry.get("ROUND").unwrap();
        assert!(round.check_arity(1).is_ok());
        assert!(round.check_arity(2).is_ok());
        assert_eq!(
            round.check_arity(3),
            Err(FormulaError::ArityMismatch {
                function: "ROUND".into(),
                expected: "1 to 2".into(),
                actual: 3,
            })
        );
        assert!(registry.get("SUM").unwrap().check_arity(0).is_err());
    }

    #[test]
    fn test_registries_are_independent() {
        let mut a = FunctionRegistry::new();
        let b = FunctionRegistry::new();
        a.register_fn("CUSTOM", 0, None, |_, _| Ok(FormulaValue::Empty));
        assert!(a.contains("CUSTOM"));
        assert!(!b.contains("CUSTOM"));
    }
}
