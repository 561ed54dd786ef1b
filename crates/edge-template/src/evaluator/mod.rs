//! Expression evaluation for `{{ ... }}` substitutions.
//!
//! The compiler treats evaluation as an opaque capability behind the
//! [`Evaluator`] trait: an expression string, a [`Context`] and a
//! [`FunctionRegistry`] go in, a [`Value`] or an error comes out.
//!
//! [`DefaultEvaluator`] implements a small expression language:
//!
//! - literals: `42`, `2.5`, `"text"`, `'text'`, `true`, `false`, `nil`,
//!   `[1, 2]`, `{key: "value"}`
//! - variables and access: `user.name`, `items[0]`, `map["key"]`
//! - arithmetic: `+ - * / %` (`+` also joins strings and arrays)
//! - comparison and logic: `== != < <= > >= && || !`, `x in list`
//! - conditionals: `cond ? a : b`
//! - calls to registered functions: `upper(name)`
//!
//! Brackets, ternaries and unary operators nest at most [`MAX_DEPTH`]
//! levels deep; deeper input is an evaluation error, not a stack overflow.

mod interpreter;
mod lexer;
mod parser;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use edge_core::error::EdgeError;

use crate::context::{Context, Value};

pub use parser::{Access, Expr, MAX_DEPTH};

/// Evaluates expression text against a context.
pub trait Evaluator: Send + Sync {
    /// Evaluates `expression` with the variables in `context` and the
    /// callable `functions`.
    ///
    /// # Errors
    ///
    /// Returns `EdgeError::Evaluation` if the expression is invalid or refers
    /// to something the context or registry does not provide.
    fn evaluate(
        &self,
        expression: &str,
        context: &Context,
        functions: &FunctionRegistry,
    ) -> Result<Value, EdgeError>;
}

/// A function callable from expressions.
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, EdgeError> + Send + Sync>;

/// Named functions available to expressions.
///
/// # Examples
///
/// ```
/// use edge_template::evaluator::FunctionRegistry;
/// use edge_template::Value;
///
/// let mut functions = FunctionRegistry::new();
/// functions.register("double", |args| match args {
///     [Value::Integer(i)] => Ok(Value::Integer(i * 2)),
///     _ => Err(edge_core::EdgeError::Evaluation("double expects one integer".into())),
/// });
/// assert!(functions.contains("double"));
/// ```
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, EdgeError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(func));
    }

    /// Looks up a function by name.
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Returns `true` if a function with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// The built-in expression evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvaluator;

impl DefaultEvaluator {
    /// Parses an expression without evaluating it.
    ///
    /// # Errors
    ///
    /// Returns `EdgeError::Evaluation` describing the first syntax error.
    pub fn parse(expression: &str) -> Result<Expr, EdgeError> {
        let tokens = lexer::tokenize(expression)?;
        parser::parse(&tokens)
    }
}

impl Evaluator for DefaultEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        context: &Context,
        functions: &FunctionRegistry,
    ) -> Result<Value, EdgeError> {
        let expr = Self::parse(expression)?;
        interpreter::eval(&expr, context, functions)
    }
}
