//! Tokenizer.

use std::rc::Rc;

use crate::{ParseError, Pos, Result};

/// Multi-character punctuators, longest first.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=", "(",
    ")", "{", "}", "[", "]", ",", ";", ":", ".", "=", "<", ">", "+", "-", "*", "/", "%", "!",
];

/// Token kinds. Keywords are lexed as identifiers.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(Rc<str>),
    Ident(Rc<str>),
    Punct(&'static str),
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

impl Token {
    /// Whether this token is the given punctuator.
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(q) if q == p)
    }

    /// Whether this token is the given identifier or keyword.
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(id) if id.as_ref() == name)
    }
}

/// Source tokenizer tracking 1-based positions.
pub struct Lexer<'a> {
    url: &'a str,
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(url: &'a str, source: &str) -> Self {
        Self {
            url,
            chars: source.chars().collect(),
            idx: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole source. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let pos = self.pos();
            let Some(c) = self.peek(0) else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos,
                });
                return Ok(tokens);
            };

            let starts_number =
                c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|d| d.is_ascii_digit()));
            let kind = if starts_number {
                self.number(pos)?
            } else if c == '"' || c == '\'' {
                self.string(pos)?
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                self.ident()
            } else {
                self.punct(pos)?
            };
            tokens.push(Token { kind, pos });
        }
    }

    const fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, pos: Pos, message: impl Into<String>) -> ParseError {
        ParseError {
            url: self.url.to_string(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while self.peek(0).is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(0), self.peek(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => return Err(self.error(start, "unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self, pos: Pos) -> Result<TokenKind> {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            let exponent_sign = (c == '+' || c == '-') && text.ends_with(['e', 'E']);
            if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text.parse()
            .map(TokenKind::Number)
            .map_err(|_| self.error(pos, format!("invalid number literal '{text}'")))
    }

    fn string(&mut self, pos: Pos) -> Result<TokenKind> {
        let Some(quote) = self.bump() else {
            return Err(self.error(pos, "unterminated string"));
        };
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error(pos, "unterminated string")),
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(c) => c,
                        None => return Err(self.error(pos, "unterminated string")),
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
        }
        Ok(TokenKind::String(Rc::from(text)))
    }

    fn ident(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(Rc::from(text))
    }

    fn punct(&mut self, pos: Pos) -> Result<TokenKind> {
        for &p in PUNCTUATORS {
            let matches = p
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek(i) == Some(c));
            if matches {
                for _ in 0..p.len() {
                    self.bump();
                }
                return Ok(TokenKind::Punct(p));
            }
        }
        let c = self.peek(0).unwrap_or('\0');
        Err(self.error(pos, format!("unexpected character '{c}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new("test.js", src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokens() {
        assert_eq!(
            kinds("let x = 1.5;"),
            vec![
                TokenKind::Ident("let".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Punct("="),
                TokenKind::Number(1.5),
                TokenKind::Punct(";"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_punctuator_wins() {
        assert_eq!(
            kinds("a === b !== c++"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("==="),
                TokenKind::Ident("b".into()),
                TokenKind::Punct("!=="),
                TokenKind::Ident("c".into()),
                TokenKind::Punct("++"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_skip_comments() {
        let tokens = Lexer::new("t.js", "/* a */ x\n  // b\n  y")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].pos, Pos::new(1, 9));
        assert_eq!(tokens[1].pos, Pos::new(3, 3));
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'a' "b\"c\n""#),
            vec![
                TokenKind::String("a".into()),
                TokenKind::String("b\"c\n".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_numbers() {
        assert_eq!(
            kinds("1e3 2E-2"),
            vec![TokenKind::Number(1000.0), TokenKind::Number(0.02), TokenKind::Eof]
        );
    }

    #[test]
    fn test_errors() {
        let err = Lexer::new("bad.js", "let s = \"oops").tokenize().unwrap_err();
        assert_eq!((err.line, err.column), (1, 9));
        assert!(Lexer::new("bad.js", "a # b").tokenize().is_err());
        assert!(Lexer::new("bad.js", "/* never closed").tokenize().is_err());
    }
}
