//! Expression parser.
//!
//! Recursive descent over the token list, lowest precedence first:
//! ternary, `||`, `&&`, equality, comparison, `in`, additive,
//! multiplicative, unary, postfix (member, index, call), primary.
//!
//! Operator chains and accessor chains are stored flat, so the height of
//! the tree grows only with nesting. Nesting (brackets, ternaries, unary
//! operators) is capped at [`MAX_DEPTH`] levels.

use edge_core::error::EdgeError;

use super::lexer::Token;
use crate::context::Value;

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

/// The deepest nesting the parser accepts.
pub const MAX_DEPTH: usize = 128;

/// A postfix accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// `.name`
    Member(String),
    /// `[index]`
    Index(Expr),
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// A context variable.
    Variable(String),
    /// An array literal.
    Array(Vec<Expr>),
    /// An object literal.
    Object(Vec<(String, Expr)>),
    /// A target followed by accessors, applied left to right.
    Access(Box<Expr>, Vec<Access>),
    /// `name(args...)`
    Call(String, Vec<Expr>),
    /// A unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// `first op1 e1 op2 e2 ...`, folded left to right.
    Chain(Box<Expr>, Vec<(BinaryOp, Expr)>),
    /// Short-circuit `&&` over two or more operands.
    And(Vec<Expr>),
    /// Short-circuit `||` over two or more operands.
    Or(Vec<Expr>),
    /// `cond ? then : otherwise`
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Parses a complete token list into an expression.
///
/// # Errors
///
/// Returns `EdgeError::Evaluation` on empty input, unexpected tokens,
/// trailing tokens after a complete expression, or nesting deeper than
/// [`MAX_DEPTH`].
pub fn parse(tokens: &[Token]) -> Result<Expr, EdgeError> {
    let mut pos = 0;
    let expr = parse_conditional(tokens, &mut pos, 0)?;
    if let Some(token) = tokens.get(pos) {
        return Err(syntax_error(&format!("unexpected {}", describe(token))));
    }
    Ok(expr)
}

fn syntax_error(message: &str) -> EdgeError {
    EdgeError::Evaluation(format!("Syntax error: {message}"))
}

fn nest(depth: usize) -> Result<usize, EdgeError> {
    if depth >= MAX_DEPTH {
        return Err(EdgeError::Evaluation(format!(
            "Expression nested more than {MAX_DEPTH} levels deep"
        )));
    }
    Ok(depth + 1)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Integer(i) => format!("number {i}"),
        Token::Float(f) => format!("number {f}"),
        Token::Str(s) => format!("string \"{s}\""),
        Token::Ident(name) => format!("'{name}'"),
        Token::Symbol(sym) => format!("'{sym}'"),
    }
}

fn peek_symbol(tokens: &[Token], pos: usize, symbol: &str) -> bool {
    matches!(tokens.get(pos), Some(Token::Symbol(s)) if *s == symbol)
}

fn expect_symbol(tokens: &[Token], pos: &mut usize, symbol: &str) -> Result<(), EdgeError> {
    if peek_symbol(tokens, *pos, symbol) {
        *pos += 1;
        Ok(())
    } else {
        let found = tokens
            .get(*pos)
            .map_or_else(|| "end of expression".to_string(), describe);
        Err(syntax_error(&format!("expected '{symbol}', found {found}")))
    }
}

type Operand = fn(&[Token], &mut usize, usize) -> Result<Expr, EdgeError>;

fn parse_conditional(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let depth = nest(depth)?;
    let condition = parse_or(tokens, pos, depth)?;

    if peek_symbol(tokens, *pos, "?") {
        *pos += 1;
        let then = parse_conditional(tokens, pos, depth)?;
        expect_symbol(tokens, pos, ":")?;
        let otherwise = parse_conditional(tokens, pos, depth)?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    } else {
        Ok(condition)
    }
}

/// Parses operands separated by `symbol` into a flat list.
fn parse_operands(
    tokens: &[Token],
    pos: &mut usize,
    depth: usize,
    symbol: &str,
    operand: Operand,
) -> Result<Vec<Expr>, EdgeError> {
    let mut operands = vec![operand(tokens, pos, depth)?];
    while peek_symbol(tokens, *pos, symbol) {
        *pos += 1;
        operands.push(operand(tokens, pos, depth)?);
    }
    Ok(operands)
}

fn parse_or(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let mut operands = parse_operands(tokens, pos, depth, "||", parse_and)?;
    Ok(match operands.len() {
        1 => operands.remove(0),
        _ => Expr::Or(operands),
    })
}

fn parse_and(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let mut operands = parse_operands(tokens, pos, depth, "&&", parse_equality)?;
    Ok(match operands.len() {
        1 => operands.remove(0),
        _ => Expr::And(operands),
    })
}

/// Parses a left-associative chain of the given operators.
fn parse_binary_chain(
    tokens: &[Token],
    pos: &mut usize,
    depth: usize,
    operators: &[(&str, BinaryOp)],
    operand: Operand,
) -> Result<Expr, EdgeError> {
    let first = operand(tokens, pos, depth)?;
    let mut rest = Vec::new();
    while let Some((_, op)) = operators
        .iter()
        .find(|(sym, _)| peek_symbol(tokens, *pos, sym))
    {
        *pos += 1;
        rest.push((*op, operand(tokens, pos, depth)?));
    }

    if rest.is_empty() {
        Ok(first)
    } else {
        Ok(Expr::Chain(Box::new(first), rest))
    }
}

fn parse_equality(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    parse_binary_chain(
        tokens,
        pos,
        depth,
        &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
        parse_comparison,
    )
}

fn parse_comparison(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    parse_binary_chain(
        tokens,
        pos,
        depth,
        &[
            ("<", BinaryOp::Lt),
            ("<=", BinaryOp::Le),
            (">", BinaryOp::Gt),
            (">=", BinaryOp::Ge),
        ],
        parse_in,
    )
}

fn parse_in(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let left = parse_additive(tokens, pos, depth)?;
    if matches!(tokens.get(*pos), Some(Token::Ident(word)) if word == "in") {
        *pos += 1;
        let right = parse_additive(tokens, pos, depth)?;
        return Ok(Expr::Chain(Box::new(left), vec![(BinaryOp::In, right)]));
    }
    Ok(left)
}

fn parse_additive(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    parse_binary_chain(
        tokens,
        pos,
        depth,
        &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
        parse_multiplicative,
    )
}

fn parse_multiplicative(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    parse_binary_chain(
        tokens,
        pos,
        depth,
        &[
            ("*", BinaryOp::Mul),
            ("/", BinaryOp::Div),
            ("%", BinaryOp::Rem),
        ],
        parse_unary,
    )
}

fn parse_unary(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let op = match tokens.get(*pos) {
        Some(Token::Symbol("-")) => Some(UnaryOp::Neg),
        Some(Token::Symbol("+")) => Some(UnaryOp::Plus),
        Some(Token::Symbol("!")) => Some(UnaryOp::Not),
        _ => None,
    };

    match op {
        Some(op) => {
            *pos += 1;
            let operand = parse_unary(tokens, pos, nest(depth)?)?;
            Ok(Expr::Unary(op, Box::new(operand)))
        }
        None => parse_postfix(tokens, pos, depth),
    }
}

fn parse_postfix(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let mut target = parse_primary(tokens, pos, depth)?;

    if peek_symbol(tokens, *pos, "(") {
        let Expr::Variable(name) = target else {
            return Err(syntax_error("only named functions can be called"));
        };
        *pos += 1;
        target = Expr::Call(name, parse_list(tokens, pos, depth, ")")?);
    }

    let mut accessors = Vec::new();
    loop {
        match tokens.get(*pos) {
            Some(Token::Symbol(".")) => {
                *pos += 1;
                let key = match tokens.get(*pos) {
                    Some(Token::Ident(name)) => name.clone(),
                    Some(Token::Integer(i)) => i.to_string(),
                    other => {
                        let found = other.map_or_else(|| "end of expression".to_string(), describe);
                        return Err(syntax_error(&format!(
                            "expected a member name after '.', found {found}"
                        )));
                    }
                };
                *pos += 1;
                accessors.push(Access::Member(key));
            }
            Some(Token::Symbol("[")) => {
                *pos += 1;
                let index = parse_conditional(tokens, pos, depth)?;
                expect_symbol(tokens, pos, "]")?;
                accessors.push(Access::Index(index));
            }
            Some(Token::Symbol("(")) => {
                return Err(syntax_error("only named functions can be called"));
            }
            _ => break,
        }
    }

    if accessors.is_empty() {
        Ok(target)
    } else {
        Ok(Expr::Access(Box::new(target), accessors))
    }
}

/// Parses comma-separated expressions up to and including `close`.
fn parse_list(
    tokens: &[Token],
    pos: &mut usize,
    depth: usize,
    close: &str,
) -> Result<Vec<Expr>, EdgeError> {
    let mut items = Vec::new();
    if peek_symbol(tokens, *pos, close) {
        *pos += 1;
        return Ok(items);
    }

    loop {
        items.push(parse_conditional(tokens, pos, depth)?);
        if peek_symbol(tokens, *pos, ",") {
            *pos += 1;
            continue;
        }
        expect_symbol(tokens, pos, close)?;
        return Ok(items);
    }
}

fn parse_object(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let mut entries = Vec::new();
    if peek_symbol(tokens, *pos, "}") {
        *pos += 1;
        return Ok(Expr::Object(entries));
    }

    loop {
        let key = match tokens.get(*pos) {
            Some(Token::Ident(name) | Token::Str(name)) => name.clone(),
            other => {
                let found = other.map_or_else(|| "end of expression".to_string(), describe);
                return Err(syntax_error(&format!("expected an object key, found {found}")));
            }
        };
        *pos += 1;
        expect_symbol(tokens, pos, ":")?;
        entries.push((key, parse_conditional(tokens, pos, depth)?));

        if peek_symbol(tokens, *pos, ",") {
            *pos += 1;
            continue;
        }
        expect_symbol(tokens, pos, "}")?;
        return Ok(Expr::Object(entries));
    }
}

fn parse_primary(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<Expr, EdgeError> {
    let Some(token) = tokens.get(*pos) else {
        return Err(syntax_error("unexpected end of expression"));
    };
    *pos += 1;

    match token {
        Token::Integer(i) => Ok(Expr::Literal(Value::Integer(*i))),
        Token::Float(f) => Ok(Expr::Literal(Value::Float(*f))),
        Token::Str(s) => Ok(Expr::Literal(Value::String(s.clone()))),
        Token::Ident(word) => match word.as_str() {
            "true" => Ok(Expr::Literal(Value::Bool(true))),
            "false" => Ok(Expr::Literal(Value::Bool(false))),
            "nil" => Ok(Expr::Literal(Value::Nil)),
            "in" => Err(syntax_error("unexpected 'in'")),
            _ => Ok(Expr::Variable(word.clone())),
        },
        Token::Symbol("(") => {
            let inner = parse_conditional(tokens, pos, depth)?;
            expect_symbol(tokens, pos, ")")?;
            Ok(inner)
        }
        Token::Symbol("[") => Ok(Expr::Array(parse_list(tokens, pos, depth, "]")?)),
        Token::Symbol("{") => parse_object(tokens, pos, depth),
        Token::Symbol(_) => Err(syntax_error(&format!("unexpected {}", describe(token)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::lexer::tokenize;

    fn parse_str(s: &str) -> Result<Expr, EdgeError> {
        parse(&tokenize(s)?)
    }

    fn int(i: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Integer(i)))
    }

    fn var(name: &str) -> Expr {
        Expr::Variable(name.into())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_str("1 + 2 * 3").unwrap(),
            Expr::Chain(
                int(1),
                vec![(BinaryOp::Add, Expr::Chain(int(2), vec![(BinaryOp::Mul, *int(3))]))]
            )
        );
    }

    #[test]
    fn test_chains_are_flat() {
        assert_eq!(
            parse_str("8 - 2 + 1").unwrap(),
            Expr::Chain(int(8), vec![(BinaryOp::Sub, *int(2)), (BinaryOp::Add, *int(1))])
        );
        assert_eq!(
            parse_str("a || b || c").unwrap(),
            Expr::Or(vec![var("a"), var("b"), var("c")])
        );
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(
            parse_str("a.b[0]").unwrap(),
            Expr::Access(
                Box::new(var("a")),
                vec![Access::Member("b".into()), Access::Index(*int(0))]
            )
        );
    }

    #[test]
    fn test_call_and_literals() {
        assert_eq!(
            parse_str(r#"f([1], {k: "v"})"#).unwrap(),
            Expr::Call(
                "f".into(),
                vec![
                    Expr::Array(vec![Expr::Literal(Value::Integer(1))]),
                    Expr::Object(vec![("k".into(), Expr::Literal(Value::from("v")))]),
                ]
            )
        );
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["", "1 +", "(1", "1 2", "a.", "f(1,", "{1: 2}", "(1)(2)", "a.b(1)", "f(1)(2)"] {
            assert!(parse_str(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |open: &str, close: &str, n: usize| {
            format!("{}1{}", open.repeat(n), close.repeat(n))
        };
        assert!(parse_str(&nested("(", ")", MAX_DEPTH - 1)).is_ok());

        for source in [
            nested("(", ")", 200_000),
            nested("[", "]", 200_000),
            nested("!", "", 200_000),
            nested("1 ? 1 : ", "", 200_000),
        ] {
            match parse_str(&source) {
                Err(EdgeError::Evaluation(message)) => {
                    assert!(message.contains("nested"), "{message}");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_long_flat_chain_is_shallow() {
        let source = vec!["1"; 100_000].join(" + ");
        match parse_str(&source).unwrap() {
            Expr::Chain(_, rest) => assert_eq!(rest.len(), 99_999),
            other => panic!("unexpected {other:?}"),
        }
    }
}
