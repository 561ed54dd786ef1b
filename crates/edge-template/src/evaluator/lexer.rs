//! Expression tokenizer.

use edge_core::error::EdgeError;

/// A token of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An integer literal.
    Integer(i64),
    /// A floating point literal.
    Float(f64),
    /// A quoted string literal with escapes resolved.
    Str(String),
    /// An identifier or keyword (`true`, `false`, `nil`, `in`).
    Ident(String),
    /// An operator or punctuation mark.
    Symbol(&'static str),
}

// Longest symbols first so `<=` wins over `<`.
const SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}", ",", ".", ":", "?", "+",
    "-", "*", "/", "%", "!", "<", ">",
];

/// Splits an expression into tokens.
///
/// # Errors
///
/// Returns `EdgeError::Evaluation` for unterminated strings, unknown
/// characters, and integer literals that do not fit in 64 bits.
pub fn tokenize(source: &str) -> Result<Vec<Token>, EdgeError> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while let Some(ch) = rest.chars().next() {
        if ch.is_whitespace() {
            rest = &rest[ch.len_utf8()..];
            continue;
        }

        if ch.is_ascii_digit() {
            // `items.0.1` is two member accesses, not the float `0.1`.
            let after_dot = tokens.last() == Some(&Token::Symbol("."));
            let (token, len) = lex_number(rest, after_dot)?;
            tokens.push(token);
            rest = &rest[len..];
            continue;
        }

        if ch == '"' || ch == '\'' {
            let (text, len) = lex_string(rest, ch)?;
            tokens.push(Token::Str(text));
            rest = &rest[len..];
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let len = rest
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..len].to_string()));
            rest = &rest[len..];
            continue;
        }

        match SYMBOLS.iter().find(|sym| rest.starts_with(**sym)) {
            Some(sym) => {
                tokens.push(Token::Symbol(*sym));
                rest = &rest[sym.len()..];
            }
            None => {
                return Err(EdgeError::Evaluation(format!(
                    "Unexpected character '{ch}' in expression"
                )));
            }
        }
    }

    Ok(tokens)
}

fn lex_number(s: &str, integer_only: bool) -> Result<(Token, usize), EdgeError> {
    let digits = |from: usize| {
        s[from..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(s.len(), |n| from + n)
    };

    let mut end = digits(0);
    let mut is_float = false;

    if !integer_only {
        let bytes = s.as_bytes();
        if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
            end = digits(end + 1);
            is_float = true;
        }
        if matches!(bytes.get(end), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
            if bytes.get(end + 1 + sign).is_some_and(u8::is_ascii_digit) {
                end = digits(end + 1 + sign);
                is_float = true;
            }
        }
    }

    let text = &s[..end];
    let token = if is_float {
        Token::Float(text.parse().map_err(|e| {
            EdgeError::Evaluation(format!("Invalid number '{text}': {e}"))
        })?)
    } else {
        Token::Integer(text.parse().map_err(|_| {
            EdgeError::Evaluation(format!("Integer literal '{text}' is out of range"))
        })?)
    };
    Ok((token, end))
}

fn lex_string(s: &str, quote: char) -> Result<(String, usize), EdgeError> {
    let mut text = String::new();
    let mut chars = s.char_indices().skip(1);

    while let Some((idx, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((text, idx + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, other)) => text.push(other),
                None => break,
            },
            c => text.push(c),
        }
    }

    Err(EdgeError::Evaluation(
        "Unterminated string literal in expression".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokenize("1 2.5 3e2").unwrap(),
            vec![Token::Integer(1), Token::Float(2.5), Token::Float(300.0)]
        );
    }

    #[test]
    fn test_member_digits_stay_integers() {
        assert_eq!(
            tokenize("a.0.1").unwrap(),
            vec![
                Token::Ident("a".into()),
                Token::Symbol("."),
                Token::Integer(0),
                Token::Symbol("."),
                Token::Integer(1),
            ]
        );
    }

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(
            tokenize(r#""a\"b" 'c\n'"#).unwrap(),
            vec![Token::Str("a\"b".into()), Token::Str("c\n".into())]
        );
    }

    #[test]
    fn test_two_char_symbols() {
        assert_eq!(
            tokenize("a<=b&&!c").unwrap(),
            vec![
                Token::Ident("a".into()),
                Token::Symbol("<="),
                Token::Ident("b".into()),
                Token::Symbol("&&"),
                Token::Symbol("!"),
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a # b").is_err());
        assert!(tokenize("99999999999999999999").is_err());
    }
}
