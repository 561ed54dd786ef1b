//! Tree-walking interpreter for parsed expressions.

use std::cmp::Ordering;

use edge_core::error::EdgeError;

use super::parser::{Access, BinaryOp, Expr, UnaryOp};
use super::FunctionRegistry;
use crate::context::{Context, Value};

fn error(message: String) -> EdgeError {
    EdgeError::Evaluation(message)
}

/// Evaluates an expression tree.
pub fn eval(expr: &Expr, context: &Context, functions: &FunctionRegistry) -> Result<Value, EdgeError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| error(format!("Unknown variable '{name}'"))),
        Expr::Array(items) => items
            .iter()
            .map(|item| eval(item, context, functions))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Object(entries) => entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), eval(value, context, functions)?)))
            .collect::<Result<_, EdgeError>>()
            .map(Value::Object),
        Expr::Access(target, accessors) => {
            accessors
                .iter()
                .try_fold(eval(target, context, functions)?, |value, accessor| match accessor {
                    Access::Member(key) => member(&value, key),
                    Access::Index(index) => index_value(&value, &eval(index, context, functions)?),
                })
        }
        Expr::Call(name, args) => {
            let func = functions
                .get(name)
                .ok_or_else(|| error(format!("Unknown function '{name}'")))?;
            let args = args
                .iter()
                .map(|arg| eval(arg, context, functions))
                .collect::<Result<Vec<_>, _>>()?;
            func(&args)
        }
        Expr::Unary(op, operand) => {
            let operand = eval(operand, context, functions)?;
            unary(*op, operand)
        }
        Expr::Chain(first, rest) => {
            rest.iter()
                .try_fold(eval(first, context, functions)?, |left, (op, right)| {
                    binary(*op, &left, &eval(right, context, functions)?)
                })
        }
        Expr::And(operands) => {
            for operand in operands {
                if !eval(operand, context, functions)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Expr::Or(operands) => {
            for operand in operands {
                if eval(operand, context, functions)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Expr::Conditional(condition, then, otherwise) => {
            if eval(condition, context, functions)?.is_truthy() {
                eval(then, context, functions)
            } else {
                eval(otherwise, context, functions)
            }
        }
    }
}

fn member(target: &Value, key: &str) -> Result<Value, EdgeError> {
    target.member(key).cloned().ok_or_else(|| {
        error(format!(
            "Cannot access member '{key}' of {}",
            target.type_name()
        ))
    })
}

fn index_value(target: &Value, index: &Value) -> Result<Value, EdgeError> {
    match (target, index) {
        (Value::Array(items), Value::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(|| error(format!("Index {i} out of range for array of length {}", items.len()))),
        (Value::String(s), Value::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(|| error(format!("Index {i} out of range for string"))),
        (Value::Object(_), Value::String(key)) => member(target, key),
        _ => Err(error(format!(
            "Cannot index {} with {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value, EdgeError> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Integer(i)) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| error("Integer overflow".to_string())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Plus, value @ (Value::Integer(_) | Value::Float(_))) => Ok(value),
        (_, value) => Err(error(format!(
            "Cannot apply unary minus or plus to {}",
            value.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EdgeError> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(op, left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => {
            if right.as_integer() == Some(0) {
                return Err(error("Division by zero".to_string()));
            }
            arithmetic(op, left, right, i64::checked_div, |a, b| a / b)
        }
        BinaryOp::Rem => {
            if right.as_integer() == Some(0) {
                return Err(error("Division by zero".to_string()));
            }
            arithmetic(op, left, right, i64::checked_rem, |a, b| a % b)
        }
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::In => contains(right, left).map(Value::Bool),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, EdgeError> {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
            "{}{}",
            left.to_display_string(),
            right.to_display_string()
        ))),
        (Value::Array(a), Value::Array(b)) => Ok(Value::Array(a.iter().chain(b).cloned().collect())),
        _ => arithmetic(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Integer arithmetic when both sides are integers, float arithmetic when
/// either side is a float.
fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EdgeError> {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        return int_op(*a, *b)
            .map(Value::Integer)
            .ok_or_else(|| error("Integer overflow".to_string()));
    }
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
        _ => Err(error(format!(
            "Unsupported operand types for {op:?}: {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Equality that treats `1` and `1.0` as equal.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => {
            left.as_float() == right.as_float()
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, EdgeError> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => a
            .partial_cmp(&b)
            .ok_or_else(|| error("Cannot compare NaN".to_string())),
        _ => Err(error(format!(
            "Cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, EdgeError> {
    match (haystack, needle) {
        (Value::Array(items), _) => Ok(items.iter().any(|item| loose_eq(item, needle))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        _ => Err(error(format!(
            "Cannot test membership of {} in {}",
            needle.type_name(),
            haystack.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::DefaultEvaluator;

    fn run(expression: &str) -> Result<Value, EdgeError> {
        let ctx = Context::from_json(serde_json::json!({
            "list": [1, 2, 3],
            "map": {"a": 1},
            "word": "edge",
            "flag": false,
        }))
        .unwrap();
        let expr = DefaultEvaluator::parse(expression)?;
        eval(&expr, &ctx, &FunctionRegistry::new())
    }

    #[test]
    fn test_membership() {
        assert_eq!(run("2 in list").unwrap(), Value::Bool(true));
        assert_eq!(run("2.0 in list").unwrap(), Value::Bool(true));
        assert_eq!(run(r#""a" in map"#).unwrap(), Value::Bool(true));
        assert_eq!(run(r#""dg" in word"#).unwrap(), Value::Bool(true));
        assert!(run("1 in 2").is_err());
    }

    #[test]
    fn test_indexing() {
        assert_eq!(run("list[0]").unwrap(), Value::Integer(1));
        assert_eq!(run("word[1]").unwrap(), Value::from("d"));
        assert_eq!(run(r#"map["a"]"#).unwrap(), Value::Integer(1));
        assert!(run("list[5]").is_err());
        assert!(run("list[-1]").is_err());
        assert!(run("list.x").is_err());
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        assert_eq!(run("flag && missing").unwrap(), Value::Bool(false));
        assert_eq!(run("!flag || missing").unwrap(), Value::Bool(true));
        assert_eq!(run("flag ? missing : 1").unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_mixed_arithmetic() {
        assert_eq!(run("1 + 0.5").unwrap(), Value::Float(1.5));
        assert_eq!(run("list + [4]").unwrap(), Value::from(vec![1, 2, 3, 4]));
        assert_eq!(run("-(2 * 3)").unwrap(), Value::Integer(-6));
        assert!(run("9223372036854775807 + 1").is_err());
        assert!(run("1 % 0").is_err());
        assert!(run("-word").is_err());
    }

    #[test]
    fn test_chains_fold_left_to_right() {
        assert_eq!(run("8 - 2 - 1").unwrap(), Value::Integer(5));
        assert_eq!(run("2 * 3 % 4").unwrap(), Value::Integer(2));
        assert_eq!(run(r#"1 + 2 + "x" + 1 + 2"#).unwrap(), Value::from("3x12"));
        assert_eq!(run("flag || 0 || list[1]").unwrap(), Value::Bool(true));
        assert_eq!(run("1 && list && 0").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_long_chain_evaluates() {
        let source = vec!["1"; 50_000].join(" + ");
        assert_eq!(run(&source).unwrap(), Value::Integer(50_000));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run(r#""a" < "b""#).unwrap(), Value::Bool(true));
        assert_eq!(run("2 >= 2.0").unwrap(), Value::Bool(true));
        assert_eq!(run("[1, 2] == [1, 2.0]").unwrap(), Value::Bool(true));
        assert_eq!(run("nil == nil").unwrap(), Value::Bool(true));
        assert_eq!(run(r#"1 != "1""#).unwrap(), Value::Bool(true));
    }
}
