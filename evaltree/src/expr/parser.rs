// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pratt parser for the expression language.

use serde_json::Value as JsonValue;

use super::lexer::{self, Punct, Spanned, Token};
use crate::error::ExecutionError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(JsonValue),
    Undefined,
    /// An identifier followed by static member accesses: `Input1.text`.
    Path(Vec<String>),
    Member(Box<Self>, String),
    Index(Box<Self>, Box<Self>),
    Array(Vec<Self>),
    Unary(UnaryOp, Box<Self>),
    Binary(BinaryOp, Box<Self>, Box<Self>),
    Conditional(Box<Self>, Box<Self>, Box<Self>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Nullish,
}

const PREFIX_BP: u8 = 16;
/// Binding power of `?:`, the loosest operator.
const CONDITIONAL_BP: u8 = 1;
/// Deepest expression tree and deepest parser recursion accepted. Parsing,
/// evaluation and drop all recurse over the tree.
const MAX_DEPTH: usize = 256;

fn infix(punct: Punct) -> Option<(BinaryOp, u8, u8)> {
    let entry = match punct {
        Punct::Nullish => (BinaryOp::Nullish, 2, 3),
        Punct::OrOr => (BinaryOp::Or, 4, 5),
        Punct::AndAnd => (BinaryOp::And, 6, 7),
        Punct::EqEq => (BinaryOp::Eq, 8, 9),
        Punct::NotEq => (BinaryOp::NotEq, 8, 9),
        Punct::Lt => (BinaryOp::Lt, 10, 11),
        Punct::Le => (BinaryOp::Le, 10, 11),
        Punct::Gt => (BinaryOp::Gt, 10, 11),
        Punct::Ge => (BinaryOp::Ge, 10, 11),
        Punct::Plus => (BinaryOp::Add, 12, 13),
        Punct::Minus => (BinaryOp::Sub, 12, 13),
        Punct::Star => (BinaryOp::Mul, 14, 15),
        Punct::Slash => (BinaryOp::Div, 14, 15),
        Punct::Percent => (BinaryOp::Rem, 14, 15),
        _ => return None,
    };
    Some(entry)
}

/// Largest magnitude below which every integer is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Converts a number to JSON, storing integral values as integers.
#[allow(
    clippy::cast_possible_truncation,
    reason = "only integral values inside the safe integer range are cast"
)]
pub(crate) fn number_json(n: f64) -> Option<JsonValue> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Some(JsonValue::from(n as i64));
    }
    serde_json::Number::from_f64(n).map(JsonValue::Number)
}

/// Parses `src` into an expression tree. Blank input is `undefined`.
pub(crate) fn parse(src: &str) -> Result<Expr, ExecutionError> {
    let tokens = lexer::tokenize(src)?;
    if tokens.is_empty() {
        return Ok(Expr::Undefined);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
        nesting: 0,
    };
    let (expr, _) = parser.expression(0)?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(syntax(format!("unexpected {:?}", extra.token), extra.offset));
    }
    Ok(expr)
}

fn syntax(message: impl Into<String>, offset: usize) -> ExecutionError {
    ExecutionError::Syntax {
        message: message.into(),
        offset,
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    /// Open [`Parser::expression`] calls.
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn next(&mut self) -> Result<Spanned, ExecutionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| syntax("unexpected end of expression", self.end))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct) -> Result<(), ExecutionError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(syntax(format!("expected {punct:?}"), self.offset()))
        }
    }

    /// Parses one expression. Returns it with the depth of its tree.
    fn expression(&mut self, min_bp: u8) -> Result<(Expr, usize), ExecutionError> {
        if self.nesting == MAX_DEPTH {
            return Err(too_deep(self.offset()));
        }
        self.nesting += 1;
        let parsed = self.expression_inner(min_bp);
        self.nesting -= 1;
        parsed
    }

    fn expression_inner(&mut self, min_bp: u8) -> Result<(Expr, usize), ExecutionError> {
        let (mut lhs, mut depth) = self.prefix()?;
        loop {
            let Some(Token::Punct(punct)) = self.peek() else {
                break;
            };
            let punct = *punct;
            let offset = self.offset();
            if punct == Punct::Question {
                if min_bp > CONDITIONAL_BP {
                    break;
                }
                self.pos += 1;
                let (then, then_depth) = self.expression(0)?;
                self.expect(Punct::Colon)?;
                let (otherwise, otherwise_depth) = self.expression(CONDITIONAL_BP)?;
                depth = deeper(depth.max(then_depth).max(otherwise_depth), offset)?;
                lhs = Expr::Conditional(Box::new(lhs), Box::new(then), Box::new(otherwise));
                continue;
            }
            let Some((op, left_bp, right_bp)) = infix(punct) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.pos += 1;
            let (rhs, rhs_depth) = self.expression(right_bp)?;
            depth = deeper(depth.max(rhs_depth), offset)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok((lhs, depth))
    }

    fn prefix(&mut self) -> Result<(Expr, usize), ExecutionError> {
        let op = match self.peek() {
            Some(Token::Punct(Punct::Bang)) => Some(UnaryOp::Not),
            Some(Token::Punct(Punct::Minus)) => Some(UnaryOp::Neg),
            Some(Token::Punct(Punct::Plus)) => Some(UnaryOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            let offset = self.offset();
            self.pos += 1;
            let (operand, depth) = self.expression(PREFIX_BP)?;
            return Ok((Expr::Unary(op, Box::new(operand)), deeper(depth, offset)?));
        }
        let primary = self.primary()?;
        self.postfix(primary)
    }

    fn primary(&mut self) -> Result<(Expr, usize), ExecutionError> {
        let Spanned { token, offset } = self.next()?;
        let leaf = match token {
            Token::Number(n) => number_json(n).map_or(Expr::Undefined, Expr::Literal),
            Token::Str(s) => Expr::Literal(JsonValue::String(s)),
            Token::Ident(word) => match word.as_str() {
                "true" => Expr::Literal(JsonValue::Bool(true)),
                "false" => Expr::Literal(JsonValue::Bool(false)),
                "null" => Expr::Literal(JsonValue::Null),
                "undefined" => Expr::Undefined,
                _ => Expr::Path(vec![word]),
            },
            Token::Punct(Punct::LParen) => {
                let inner = self.expression(0)?;
                self.expect(Punct::RParen)?;
                return Ok(inner);
            }
            Token::Punct(Punct::LBracket) => {
                let mut items = Vec::new();
                let mut depth = 0;
                while !self.eat(Punct::RBracket) {
                    let (item, item_depth) = self.expression(0)?;
                    items.push(item);
                    depth = depth.max(item_depth);
                    if !self.eat(Punct::Comma) {
                        self.expect(Punct::RBracket)?;
                        break;
                    }
                }
                return Ok((Expr::Array(items), deeper(depth, offset)?));
            }
            other => return Err(syntax(format!("unexpected {other:?}"), offset)),
        };
        Ok((leaf, 1))
    }

    fn postfix(
        &mut self,
        (mut expr, mut depth): (Expr, usize),
    ) -> Result<(Expr, usize), ExecutionError> {
        loop {
            let offset = self.offset();
            if self.eat(Punct::Dot) {
                let Spanned { token, offset } = self.next()?;
                let Token::Ident(name) = token else {
                    return Err(syntax("expected a property name", offset));
                };
                expr = match expr {
                    Expr::Path(mut segments) => {
                        segments.push(name);
                        Expr::Path(segments)
                    }
                    other => {
                        depth = deeper(depth, offset)?;
                        Expr::Member(Box::new(other), name)
                    }
                };
            } else if self.eat(Punct::LBracket) {
                let (index, index_depth) = self.expression(0)?;
                self.expect(Punct::RBracket)?;
                depth = deeper(depth.max(index_depth), offset)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek() == Some(&Token::Punct(Punct::LParen)) {
                return Err(syntax("function calls are not supported", self.offset()));
            } else {
                return Ok((expr, depth));
            }
        }
    }
}

/// One level above a subtree of `depth`, failing past [`MAX_DEPTH`].
fn deeper(depth: usize, offset: usize) -> Result<usize, ExecutionError> {
    if depth >= MAX_DEPTH {
        Err(too_deep(offset))
    } else {
        Ok(depth + 1)
    }
}

fn too_deep(offset: usize) -> ExecutionError {
    syntax("expression is nested too deeply", offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(segments: &[&str]) -> Expr {
        Expr::Path(segments.iter().map(|s| (*s).to_owned()).collect())
    }

    fn num(n: i64) -> Expr {
        Expr::Literal(json!(n))
    }

    #[test]
    fn member_chains_collapse_into_paths() {
        assert_eq!(parse("Input1.text").unwrap(), path(&["Input1", "text"]));
        assert_eq!(
            parse("Table1.data[0].name").unwrap(),
            Expr::Member(
                Box::new(Expr::Index(
                    Box::new(path(&["Table1", "data"])),
                    Box::new(num(0))
                )),
                "name".into()
            )
        );
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            parse("1 + 2 * 3 - 4").unwrap(),
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(
                    BinaryOp::Add,
                    Box::new(num(1)),
                    Box::new(Expr::Binary(BinaryOp::Mul, Box::new(num(2)), Box::new(num(3))))
                )),
                Box::new(num(4))
            )
        );
    }

    #[test]
    fn conditional_is_right_associative() {
        let parsed = parse("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Conditional(_, _, otherwise) = parsed else {
            panic!("expected a conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional(..)));
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        assert_eq!(
            parse("-a.b + 1").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Unary(UnaryOp::Neg, Box::new(path(&["a", "b"])))),
                Box::new(num(1))
            )
        );
    }

    #[test]
    fn integral_literals_are_integers() {
        assert_eq!(parse("2").unwrap(), num(2));
        assert_eq!(parse("2.5").unwrap(), Expr::Literal(json!(2.5)));
    }

    #[test]
    fn arrays_and_blank_input() {
        assert_eq!(parse("[1, 'x',]").unwrap(), Expr::Array(vec![num(1), Expr::Literal(json!("x"))]));
        assert_eq!(parse("   ").unwrap(), Expr::Undefined);
    }

    #[test]
    fn errors_carry_offsets() {
        assert!(matches!(parse("1 +"), Err(ExecutionError::Syntax { offset: 3, .. })));
        assert!(matches!(parse("(1"), Err(ExecutionError::Syntax { offset: 2, .. })));
        assert!(matches!(parse("a b"), Err(ExecutionError::Syntax { offset: 2, .. })));
        assert!(matches!(parse("f(1)"), Err(ExecutionError::Syntax { offset: 1, .. })));
    }

    fn is_too_deep(result: Result<Expr, ExecutionError>) -> bool {
        matches!(
            result,
            Err(ExecutionError::Syntax { ref message, .. }) if message.contains("too deeply")
        )
    }

    #[test]
    fn nesting_is_bounded() {
        let n = 100_000;
        assert!(is_too_deep(parse(&format!("{}1{}", "(".repeat(n), ")".repeat(n)))));
        assert!(is_too_deep(parse(&format!("{}1", "-".repeat(n)))));
        assert!(is_too_deep(parse(&format!("{}1{}", "[".repeat(n), "]".repeat(n)))));
        assert!(is_too_deep(parse(&format!("1{}", " + 1".repeat(n)))));
        assert!(is_too_deep(parse(&format!("a{}", "[0]".repeat(n)))));
        assert!(is_too_deep(parse(&format!("1{}", " ? 1 : 1".repeat(n)))));
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let n = 100;
        assert_eq!(parse(&format!("{}1{}", "(".repeat(n), ")".repeat(n))).unwrap(), num(1));
        assert!(parse(&format!("1{}", " + 1".repeat(n))).is_ok());
        assert!(parse(&format!("a{}", ".b".repeat(10 * n))).is_ok());
    }
}
