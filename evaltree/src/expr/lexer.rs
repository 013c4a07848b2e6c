// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tokenizer shared by the parser and by reference scanning.
//!
//! The strict mode rejects anything the expression language does not know.
//! The lenient mode skips unknown characters instead, so identifier chains
//! can still be pulled out of script bodies written in a richer language.

use crate::error::ExecutionError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(Punct),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Punct {
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Nullish,
    Question,
    Colon,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) offset: usize,
}

/// Words that never start a reference.
const KEYWORDS: &[&str] = &[
    "true",
    "false",
    "null",
    "undefined",
    "this",
    "function",
    "return",
    "const",
    "let",
    "var",
    "if",
    "else",
    "new",
    "typeof",
    "async",
    "await",
    "export",
    "default",
];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, ExecutionError> {
    Lexer::new(src, false).collect()
}

pub(crate) fn tokenize_lenient(src: &str) -> Vec<Spanned> {
    Lexer::new(src, true).filter_map(Result::ok).collect()
}

/// Returns every `a.b.c` identifier chain in `src`, in source order.
///
/// Chains that start after a `.` (member access on a computed value) and
/// chains starting with a keyword are skipped.
pub(crate) fn identifier_chains(src: &str) -> Vec<String> {
    let tokens = tokenize_lenient(src);
    let mut chains = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let Token::Ident(name) = &tokens[i].token else {
            i += 1;
            continue;
        };
        let after_dot = i > 0 && tokens[i - 1].token == Token::Punct(Punct::Dot);
        if after_dot || is_keyword(name) {
            i += 1;
            continue;
        }
        let mut chain = name.clone();
        let mut j = i + 1;
        while j + 1 < tokens.len() && tokens[j].token == Token::Punct(Punct::Dot) {
            let Token::Ident(segment) = &tokens[j + 1].token else {
                break;
            };
            chain.push('.');
            chain.push_str(segment);
            j += 2;
        }
        chains.push(chain);
        i = j;
    }
    chains
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    lenient: bool,
    done: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, lenient: bool) -> Self {
        Self {
            src,
            pos: 0,
            lenient,
            done: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> ExecutionError {
        ExecutionError::Syntax {
            message: message.into(),
            offset,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while self.bump().is_some_and(|c| c != '\n') {}
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.eat('/') {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, ExecutionError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number {text:?}"), start))
    }

    fn string(&mut self, quote: char, start: usize) -> Result<Token, ExecutionError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string", start)),
                Some(c) if c == quote => return Ok(Token::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated string", start)),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn punct(&mut self, c: char, start: usize) -> Result<Token, ExecutionError> {
        let punct = match c {
            '.' => Punct::Dot,
            ',' => Punct::Comma,
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            '+' => Punct::Plus,
            '-' => Punct::Minus,
            '*' => Punct::Star,
            '/' => Punct::Slash,
            '%' => Punct::Percent,
            ':' => Punct::Colon,
            '=' if self.eat('=') => {
                self.eat('=');
                Punct::EqEq
            }
            '!' if self.eat('=') => {
                self.eat('=');
                Punct::NotEq
            }
            '!' => Punct::Bang,
            '<' if self.eat('=') => Punct::Le,
            '<' => Punct::Lt,
            '>' if self.eat('=') => Punct::Ge,
            '>' => Punct::Gt,
            '&' if self.eat('&') => Punct::AndAnd,
            '|' if self.eat('|') => Punct::OrOr,
            '?' if self.eat('?') => Punct::Nullish,
            '?' => Punct::Question,
            other => return Err(self.error(format!("unexpected character {other:?}"), start)),
        };
        Ok(Token::Punct(punct))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned, ExecutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            self.skip_trivia();
            let start = self.pos;
            let c = self.bump()?;
            let token = if c.is_ascii_digit() {
                self.number(start)
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                while self
                    .peek()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
                {
                    self.bump();
                }
                Ok(Token::Ident(self.src[start..self.pos].to_owned()))
            } else if matches!(c, '"' | '\'' | '`') {
                self.string(c, start)
            } else {
                self.punct(c, start)
            };
            match token {
                Ok(token) => return Some(Ok(Spanned { token, offset: start })),
                // Lenient scanning skips what it cannot read. An unterminated
                // string swallows the rest of the input.
                Err(_) if self.lenient => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenizes_operators() {
        assert_eq!(
            kinds("a === 1 && b !== 'x' ?? c"),
            vec![
                Token::Ident("a".into()),
                Token::Punct(Punct::EqEq),
                Token::Number(1.0),
                Token::Punct(Punct::AndAnd),
                Token::Ident("b".into()),
                Token::Punct(Punct::NotEq),
                Token::Str("x".into()),
                Token::Punct(Punct::Nullish),
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn numbers_and_member_dots() {
        assert_eq!(
            kinds("1.5e2 + a.b"),
            vec![
                Token::Number(150.0),
                Token::Punct(Punct::Plus),
                Token::Ident("a".into()),
                Token::Punct(Punct::Dot),
                Token::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn strict_mode_rejects_unknown_characters() {
        let err = tokenize("a = 1").unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Syntax {
                message: "unexpected character '='".into(),
                offset: 2,
            }
        );
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn chains_skip_members_of_computed_values() {
        assert_eq!(
            identifier_chains("Input1.text + (Table1.data).length + Api1.data[0].id"),
            vec!["Input1.text", "Table1.data", "Api1.data"]
        );
    }

    #[test]
    fn chains_from_script_bodies() {
        let src = "export default {\n  // Hidden.value\n  total: () => { return Input1.value * 2; },\n  label: 'Text1.text',\n}";
        assert_eq!(identifier_chains(src), vec!["total", "Input1.value", "label"]);
    }
}
