// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaluated values.

use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// The evaluated value of one path.
///
/// Plain data compares by deep equality. Values the entity configuration
/// hints as opaque (large bulk payloads such as query results) are shared
/// behind an [`Arc`] and compare by pointer, so an unchanged payload is never
/// walked during diffing.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value: a failed first evaluation, or a reference to nothing.
    #[default]
    Undefined,
    /// Plain data, compared deeply.
    Data(JsonValue),
    /// Bulk data, compared by reference.
    Opaque(Arc<JsonValue>),
}

impl Value {
    /// Wraps `value` as an opaque value.
    #[must_use]
    pub fn opaque(value: JsonValue) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// Returns `true` for [`Value::Undefined`].
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns `true` for `undefined` and `null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self.as_json(), None | Some(JsonValue::Null))
    }

    /// Returns the underlying JSON, if there is one.
    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Undefined => None,
            Self::Data(v) => Some(v),
            Self::Opaque(v) => Some(v),
        }
    }

    /// Returns the value as JSON, mapping `undefined` to `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        self.as_json().cloned().unwrap_or(JsonValue::Null)
    }

    /// JavaScript-style truthiness.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self.as_json() {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Some(JsonValue::String(s)) => !s.is_empty(),
            Some(JsonValue::Array(_) | JsonValue::Object(_)) => true,
        }
    }

    /// Renders the value for string concatenation.
    ///
    /// Strings render without quotes, structured data as compact JSON and
    /// `undefined` as the literal `undefined`.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self.as_json() {
            None => "undefined".to_owned(),
            Some(JsonValue::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Renders the value for substitution into a template.
    ///
    /// Like [`to_display_string`](Self::to_display_string), except that
    /// `undefined` and `null` substitute as an empty string.
    #[must_use]
    pub fn to_template_string(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_display_string()
        }
    }

    /// Walks into structured data along `segments`.
    ///
    /// Object keys and array indices are both accepted; a missing step yields
    /// [`Value::Undefined`].
    #[must_use]
    pub fn navigate(&self, segments: &[&str]) -> Self {
        let Some(mut current) = self.as_json() else {
            return Self::Undefined;
        };
        for segment in segments {
            let next = match current {
                JsonValue::Object(map) => map.get(*segment),
                JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(v) => current = v,
                None => return Self::Undefined,
            }
        }
        Self::Data(current.clone())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Self::Data(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined => serializer.serialize_unit(),
            Self::Data(v) => v.serialize(serializer),
            Self::Opaque(v) => v.serialize(serializer),
        }
    }
}
