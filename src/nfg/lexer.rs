//! Tokenizer for the `.nfg` text format.

use crate::util::errors::{GambitError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LBrace,
    RBrace,
    /// A double-quoted string with escapes resolved
    Str(String),
    /// Any other run of non-space characters: keywords and numbers
    Word(String),
}

/// A token with the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Split `input` into tokens. Commas count as whitespace.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() || c == ',' => {
                chars.next();
            }
            '{' => {
                tokens.push(Spanned {
                    token: Token::LBrace,
                    line,
                });
                chars.next();
            }
            '}' => {
                tokens.push(Spanned {
                    token: Token::RBrace,
                    line,
                });
                chars.next();
            }
            '"' => {
                let start = line;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => {
                                if escaped == '\n' {
                                    line += 1;
                                }
                                text.push(escaped);
                            }
                            None => {
                                return Err(GambitError::parse(start, "unterminated string"))
                            }
                        },
                        Some(other) => {
                            if other == '\n' {
                                line += 1;
                            }
                            text.push(other);
                        }
                        None => return Err(GambitError::parse(start, "unterminated string")),
                    }
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    line: start,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, ',' | '{' | '}' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Spanned {
                    token: Token::Word(word),
                    line,
                });
            }
        }
    }

    Ok(tokens)
}

/// Parse a numeric literal: integer, decimal, exponent form, or `p/q`.
pub fn parse_number(text: &str) -> Option<f64> {
    if let Some((num, den)) = text.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    let value: f64 = text.parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds(r#"NFG 1 R "A game" { "P1" } { 2 }"#),
            vec![
                Token::Word("NFG".into()),
                Token::Word("1".into()),
                Token::Word("R".into()),
                Token::Str("A game".into()),
                Token::LBrace,
                Token::Str("P1".into()),
                Token::RBrace,
                Token::LBrace,
                Token::Word("2".into()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_commas_and_escapes() {
        assert_eq!(
            kinds(r#"{ "say \"hi\"" 1, -2 }"#),
            vec![
                Token::LBrace,
                Token::Str("say \"hi\"".into()),
                Token::Word("1".into()),
                Token::Word("-2".into()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("NFG\n\n1 \"a\nb\" R").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[2].line, 3);
        assert_eq!(tokens[3].line, 4);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("NFG 1 R \"oops").unwrap_err();
        assert!(matches!(err, GambitError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("3"), Some(3.0));
        assert_eq!(parse_number("-0.25"), Some(-0.25));
        assert_eq!(parse_number("1e2"), Some(100.0));
        assert_eq!(parse_number("3/4"), Some(0.75));
        assert_eq!(parse_number("1/0"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }
}
