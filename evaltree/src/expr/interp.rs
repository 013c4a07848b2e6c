// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree-walking interpreter behind [`SimpleEngine`].

use core::cmp::Ordering;

use serde_json::Value as JsonValue;

use super::parser::{self, BinaryOp, Expr, UnaryOp};
use super::{Budget, ExpressionEngine, Scope};
use crate::error::ExecutionError;
use crate::value::Value;

/// The bundled tree-walking expression engine.
///
/// Semantics follow JavaScript where they are cheap to follow: `&&`, `||`
/// and `??` return an operand, `+` concatenates when either side is a
/// string, and `==` compares numbers numerically and everything else
/// structurally. Reading a property of `undefined` or `null` is a runtime
/// error, as is naming an entity that does not exist.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimpleEngine;

impl ExpressionEngine for SimpleEngine {
    fn evaluate(
        &self,
        code: &str,
        scope: &dyn Scope,
        budget: &mut Budget,
    ) -> Result<Value, ExecutionError> {
        let expr = parser::parse(code)?;
        Interpreter { scope, budget }.eval(&expr)
    }
}

struct Interpreter<'a> {
    scope: &'a dyn Scope,
    budget: &'a mut Budget,
}

fn runtime(message: impl Into<String>) -> ExecutionError {
    ExecutionError::Runtime(message.into())
}

impl Interpreter<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, ExecutionError> {
        self.budget.tick()?;
        match expr {
            Expr::Literal(v) => Ok(Value::Data(v.clone())),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Path(segments) => self.path(segments),
            Expr::Member(base, name) => {
                let base = self.eval(base)?;
                member(&base, name)
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                match index.as_json() {
                    Some(JsonValue::Number(n)) => {
                        let key = number_value(n.as_f64().unwrap_or(f64::NAN))?;
                        member(&base, &key.to_display_string())
                    }
                    Some(JsonValue::String(s)) => member(&base, s),
                    _ => Err(runtime(format!(
                        "cannot index with {}",
                        index.to_display_string()
                    ))),
                }
            }
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?.to_json());
                }
                Ok(Value::Data(JsonValue::Array(out)))
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Data(JsonValue::Bool(!v.truthy()))),
                    UnaryOp::Neg => number_value(-as_number(&v, "-")?),
                    UnaryOp::Plus => number_value(as_number(&v, "+")?),
                }
            }
            Expr::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
            Expr::Conditional(cond, then, otherwise) => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    /// Resolves `a.b.c` from the longest prefix the scope knows, then walks
    /// the remaining segments as member accesses.
    fn path(&mut self, segments: &[String]) -> Result<Value, ExecutionError> {
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        for end in (1..=segments.len()).rev() {
            let Some(found) = self.scope.lookup(&segments[..end]) else {
                continue;
            };
            if found.is_undefined() && end > 1 {
                continue;
            }
            let mut value = found;
            for name in &segments[end..] {
                value = member(&value, name)?;
            }
            return Ok(value);
        }
        let root = segments[0];
        if !self.scope.is_defined(root) {
            return Err(runtime(format!("{root} is not defined")));
        }
        Ok(Value::Undefined)
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, ExecutionError> {
        let left = self.eval(lhs)?;
        match op {
            BinaryOp::And if !left.truthy() => return Ok(left),
            BinaryOp::Or if left.truthy() => return Ok(left),
            BinaryOp::Nullish if !left.is_nullish() => return Ok(left),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => return self.eval(rhs),
            _ => {}
        }
        let right = self.eval(rhs)?;
        match op {
            BinaryOp::Add => add(&left, &right),
            BinaryOp::Sub => number_value(as_number(&left, "-")? - as_number(&right, "-")?),
            BinaryOp::Mul => number_value(as_number(&left, "*")? * as_number(&right, "*")?),
            BinaryOp::Div | BinaryOp::Rem => {
                let symbol = if op == BinaryOp::Div { "/" } else { "%" };
                let (a, b) = (as_number(&left, symbol)?, as_number(&right, symbol)?);
                if b == 0.0 {
                    return Err(runtime("division by zero"));
                }
                number_value(if op == BinaryOp::Div { a / b } else { a % b })
            }
            BinaryOp::Eq => Ok(bool_value(loose_eq(&left, &right))),
            BinaryOp::NotEq => Ok(bool_value(!loose_eq(&left, &right))),
            BinaryOp::Lt => Ok(bool_value(compare(&left, &right) == Some(Ordering::Less))),
            BinaryOp::Le => Ok(bool_value(matches!(
                compare(&left, &right),
                Some(Ordering::Less | Ordering::Equal)
            ))),
            BinaryOp::Gt => Ok(bool_value(compare(&left, &right) == Some(Ordering::Greater))),
            BinaryOp::Ge => Ok(bool_value(matches!(
                compare(&left, &right),
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => {
                unreachable!("short-circuit operators return above")
            }
        }
    }
}

fn member(base: &Value, name: &str) -> Result<Value, ExecutionError> {
    match base.as_json() {
        None => Err(runtime(format!("cannot read property '{name}' of undefined"))),
        Some(JsonValue::Null) => Err(runtime(format!("cannot read property '{name}' of null"))),
        Some(JsonValue::String(s)) if name == "length" => Ok(count(s.chars().count())),
        Some(JsonValue::Array(items)) if name == "length" => Ok(count(items.len())),
        Some(_) => Ok(base.navigate(&[name])),
    }
}

fn count(n: usize) -> Value {
    Value::Data(JsonValue::from(n))
}

fn bool_value(b: bool) -> Value {
    Value::Data(JsonValue::Bool(b))
}

fn as_number(v: &Value, op: &str) -> Result<f64, ExecutionError> {
    match v.as_json() {
        Some(JsonValue::Number(n)) => n.as_f64().ok_or_else(|| runtime("number out of range")),
        Some(JsonValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        Some(JsonValue::Null) => Ok(0.0),
        Some(JsonValue::String(s)) if !s.trim().is_empty() => s
            .trim()
            .parse::<f64>()
            .map_err(|_| runtime(format!("cannot apply '{op}' to {s:?}"))),
        _ => Err(runtime(format!(
            "cannot apply '{op}' to {}",
            v.to_display_string()
        ))),
    }
}

fn number_value(n: f64) -> Result<Value, ExecutionError> {
    parser::number_json(n)
        .map(Value::Data)
        .ok_or_else(|| runtime("arithmetic produced a non-finite number"))
}

fn add(left: &Value, right: &Value) -> Result<Value, ExecutionError> {
    let is_string = |v: &Value| matches!(v.as_json(), Some(JsonValue::String(_)));
    if is_string(left) || is_string(right) {
        let mut out = left.to_display_string();
        out.push_str(&right.to_display_string());
        return Ok(Value::Data(JsonValue::String(out)));
    }
    number_value(as_number(left, "+")? + as_number(right, "+")?)
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.as_json(), right.as_json()) {
        (None | Some(JsonValue::Null), None | Some(JsonValue::Null)) => true,
        (Some(JsonValue::Number(a)), Some(JsonValue::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left.as_json()?, right.as_json()?) {
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (a, b) => {
            let a = as_number(&Value::Data(a.clone()), "<").ok()?;
            let b = as_number(&Value::Data(b.clone()), "<").ok()?;
            a.partial_cmp(&b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Data(JsonValue);

    impl Scope for Data {
        fn lookup(&self, segments: &[&str]) -> Option<Value> {
            let (root, rest) = segments.split_first()?;
            let entity = self.0.get(*root)?;
            Some(Value::Data(entity.clone()).navigate(rest))
        }

        fn is_defined(&self, root: &str) -> bool {
            self.0.get(root).is_some()
        }
    }

    fn scope() -> Data {
        Data(json!({
            "Input1": { "text": "5", "value": 5, "empty": "" },
            "Table1": { "data": [{ "name": "a" }, { "name": "b" }], "selected": null },
        }))
    }

    fn eval(code: &str) -> Result<Value, ExecutionError> {
        SimpleEngine.evaluate(code, &scope(), &mut Budget::unlimited())
    }

    fn ok(code: &str) -> JsonValue {
        eval(code).unwrap().to_json()
    }

    #[test]
    fn arithmetic_keeps_integers_integral() {
        assert_eq!(ok("Input1.value * 2 + 1"), json!(11));
        assert_eq!(ok("7 / 2"), json!(3.5));
        assert_eq!(ok("7 % 4"), json!(3));
        assert_eq!(ok("-Input1.value"), json!(-5));
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(ok("'n=' + Input1.value"), json!("n=5"));
        assert_eq!(ok("Input1.text + 1"), json!("51"));
    }

    #[test]
    fn logic_returns_operands() {
        assert_eq!(ok("Input1.empty || 'fallback'"), json!("fallback"));
        assert_eq!(ok("Input1.value && 'yes'"), json!("yes"));
        assert_eq!(ok("Table1.selected ?? 'none'"), json!("none"));
        assert_eq!(ok("Input1.empty ?? 'none'"), json!(""));
        assert_eq!(ok("!Input1.empty"), json!(true));
    }

    #[test]
    fn comparisons() {
        assert_eq!(ok("Input1.value == 5.0"), json!(true));
        assert_eq!(ok("Input1.text == 5"), json!(false));
        assert_eq!(ok("Input1.value >= 5 ? 'big' : 'small'"), json!("big"));
        assert_eq!(ok("'abc' < 'abd'"), json!(true));
        assert_eq!(ok("undefined == null"), json!(true));
    }

    #[test]
    fn indexing_and_length() {
        assert_eq!(ok("Table1.data[1].name"), json!("b"));
        assert_eq!(ok("Table1.data.length"), json!(2));
        assert_eq!(ok("Table1.data[0]['name']"), json!("a"));
        assert_eq!(ok("Input1.text.length"), json!(1));
        assert_eq!(ok("[Input1.value, Input1.missing]"), json!([5, null]));
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(
            eval("Missing1.text"),
            Err(ExecutionError::Runtime("Missing1 is not defined".into()))
        );
        assert_eq!(
            eval("Table1.selected.name"),
            Err(ExecutionError::Runtime("cannot read property 'name' of null".into()))
        );
        assert_eq!(
            eval("1 / 0"),
            Err(ExecutionError::Runtime("division by zero".into()))
        );
    }

    #[test]
    fn budget_is_charged_per_node() {
        let mut budget = Budget::new(3, None);
        let err = SimpleEngine
            .evaluate("1 + 2 + 3", &scope(), &mut budget)
            .unwrap_err();
        assert_eq!(err, ExecutionError::BudgetExceeded);
    }
}
