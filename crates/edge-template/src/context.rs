//! Render context and dynamic values.
//!
//! Provides [`Context`], the name → value mapping handed to a render call,
//! and [`Value`], the dynamic value type that expressions produce and consume.

use std::collections::BTreeMap;
use std::fmt;

use edge_core::error::EdgeError;
use serde::Serialize;

/// A dynamic value in a render context or produced by an expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absence of a value.
    #[default]
    Nil,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit floating point number.
    Float(f64),
    /// A string value.
    String(String),
    /// An ordered list of values.
    Array(Vec<Value>),
    /// A key-value mapping with stable key order.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` if this value is considered "truthy".
    ///
    /// - `Nil` is falsy
    /// - Empty strings, empty arrays, empty objects are falsy
    /// - `Bool(false)`, `Integer(0)` and `Float(0.0)` are falsy
    /// - Everything else is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(a) => !a.is_empty(),
            Self::Object(o) => !o.is_empty(),
        }
    }

    /// Returns a short name for the value's type, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Converts this value to the text spliced into rendered output.
    ///
    /// `Nil` renders as nothing, floats use their shortest round-trip form
    /// (`3.0` renders as `3`), arrays and objects render as JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Nil => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::Array(_) | Self::Object(_) => self.to_json().to_string(),
        }
    }

    /// Converts this value into a `serde_json::Value`.
    ///
    /// Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Nil => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Looks up a member by key: object fields by name, array items by index.
    pub fn member(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Object(map) => map.get(key),
            Self::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        }
    }

    /// Attempts to convert this value to an f64.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Integer`.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string contents if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

// -- From implementations --

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Nil, Into::into)
    }
}

impl From<BTreeMap<String, Self>> for Value {
    fn from(map: BTreeMap<String, Self>) -> Self {
        Self::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Nil,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Nil),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// The variables visible to expressions during one render call.
///
/// # Examples
///
/// ```
/// use edge_template::context::{Context, Value};
///
/// let ctx = Context::new().with("title", "hello").with("count", 3);
/// assert_eq!(ctx.get("title"), Some(&Value::from("hello")));
/// assert_eq!(ctx.get("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: BTreeMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if the value fails to serialize or does
    /// not serialize to a map.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, EdgeError> {
        let json = serde_json::to_value(value)
            .map_err(|e| EdgeError::SerializationError(e.to_string()))?;
        Self::from_json(json)
    }

    /// Builds a context from a JSON object.
    ///
    /// `null` yields an empty context.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if `json` is neither an object nor `null`.
    pub fn from_json(json: serde_json::Value) -> Result<Self, EdgeError> {
        match Value::from(json) {
            Value::Object(vars) => Ok(Self { vars }),
            Value::Nil => Ok(Self::new()),
            other => Err(EdgeError::SerializationError(format!(
                "A render context must be a map, got {}",
                other.type_name()
            ))),
        }
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Looks up a top-level variable.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Returns `true` if the variable is defined.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Returns the number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if no variables are defined.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates over the variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(vars: BTreeMap<String, Value>) -> Self {
        Self { vars }
    }
}

impl TryFrom<serde_json::Value> for Context {
    type Error = EdgeError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(Value::from(2.5).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Value::Nil.to_display_string(), "");
        assert_eq!(Value::from(true).to_display_string(), "true");
        assert_eq!(Value::from(42).to_display_string(), "42");
        assert_eq!(Value::from(2.5).to_display_string(), "2.5");
        assert_eq!(Value::from(3.0).to_display_string(), "3");
        assert_eq!(Value::from("hi").to_display_string(), "hi");
        assert_eq!(Value::from(vec![1, 2]).to_display_string(), "[1,2]");
    }

    #[test]
    fn test_object_display_is_json() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::from(1));
        map.insert("b".to_string(), Value::from("x"));
        assert_eq!(Value::Object(map).to_display_string(), r#"{"a":1,"b":"x"}"#);
    }

    #[test]
    fn test_member_lookup() {
        let value = Value::from(serde_json::json!({"user": {"name": "ada"}, "tags": ["a", "b"]}));
        let user = value.member("user").unwrap();
        assert_eq!(user.member("name"), Some(&Value::from("ada")));
        let tags = value.member("tags").unwrap();
        assert_eq!(tags.member("1"), Some(&Value::from("b")));
        assert_eq!(tags.member("9"), None);
        assert_eq!(Value::from(1).member("x"), None);
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from(serde_json::json!(3)), Value::Integer(3));
        assert_eq!(Value::from(serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(serde_json::json!(null)), Value::Nil);
    }

    #[test]
    fn test_context_from_serialize() {
        #[derive(Serialize)]
        struct Page {
            title: String,
            views: u32,
        }

        let ctx = Context::from_serialize(&Page {
            title: "home".into(),
            views: 7,
        })
        .unwrap();
        assert_eq!(ctx.get("title"), Some(&Value::from("home")));
        assert_eq!(ctx.get("views"), Some(&Value::from(7)));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_context_from_non_map_fails() {
        let err = Context::from_serialize(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, EdgeError::SerializationError(_)));
        assert!(Context::from_json(serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_context_set_overwrites() {
        let mut ctx = Context::new();
        ctx.set("x", 1);
        ctx.set("x", "two");
        assert_eq!(ctx.get("x"), Some(&Value::from("two")));
        assert!(ctx.contains("x"));
    }
}
