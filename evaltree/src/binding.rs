// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding detection and reference scanning.
//!
//! A template value such as `"Hello {{ Input1.text }}"` is split into text
//! and binding segments. The code of each binding is scanned for identifier
//! chains, and each chain is resolved to the longest prefix that names a
//! known path. Chains that resolve to nothing are dropped.

use serde_json::Value as JsonValue;

use crate::entity::BindingSyntax;
use crate::expr::lexer;
use crate::tree::KnownPaths;

/// One piece of a template.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text.
    Text(&'a str),
    /// The code between `{{` and `}}`, untrimmed.
    Binding(&'a str),
}

/// Returns `true` if `text` contains at least one complete `{{ }}` binding.
#[must_use]
pub fn is_dynamic_value(text: &str) -> bool {
    segments(text)
        .iter()
        .any(|s| matches!(s, Segment::Binding(_)))
}

/// Splits a template into text and binding segments.
///
/// Braces nested inside a binding (object literals, blocks) and quoted
/// strings are skipped when looking for the closing `}}`. An unclosed `{{`
/// is kept as text.
///
/// ```
/// use evaltree::binding::{segments, Segment};
///
/// assert_eq!(
///     segments("Hi {{ name }}!"),
///     vec![Segment::Text("Hi "), Segment::Binding(" name "), Segment::Text("!")],
/// );
/// ```
#[must_use]
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let code_start = open + 2;
        let Some(len) = binding_len(&rest[code_start..]) else {
            break;
        };
        if open > 0 {
            out.push(Segment::Text(&rest[..open]));
        }
        out.push(Segment::Binding(&rest[code_start..code_start + len]));
        rest = &rest[code_start + len + 2..];
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Length of the binding code before its closing `}}`.
fn binding_len(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0_usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth > 0 => depth -= 1,
                b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Returns the pieces of code held by `value` under `syntax`.
///
/// Templates contribute the code of each binding. Script values are code in
/// their entirety. Non-string values hold no code.
#[must_use]
pub fn code_fragments(value: &JsonValue, syntax: BindingSyntax) -> Vec<&str> {
    let Some(text) = value.as_str() else {
        return Vec::new();
    };
    match syntax {
        BindingSyntax::Script => vec![text],
        BindingSyntax::Template => segments(text)
            .into_iter()
            .filter_map(|s| match s {
                Segment::Binding(code) => Some(code),
                Segment::Text(_) => None,
            })
            .collect(),
    }
}

/// Returns every identifier chain referenced by `value`, unresolved.
#[must_use]
pub fn referenced_chains(value: &JsonValue, syntax: BindingSyntax) -> Vec<String> {
    code_fragments(value, syntax)
        .into_iter()
        .flat_map(lexer::identifier_chains)
        .collect()
}

/// Resolves the references in `value` against `known`, appending each
/// resolved path to `out` unless it is already there.
pub fn collect_references(
    value: &JsonValue,
    syntax: BindingSyntax,
    known: &KnownPaths,
    out: &mut Vec<String>,
) {
    for chain in referenced_chains(value, syntax) {
        if let Some(resolved) = known.resolve(&chain) {
            push_unique(out, resolved);
        }
    }
}

pub(crate) fn push_unique(out: &mut Vec<String>, path: &str) {
    if !out.iter().any(|p| p == path) {
        out.push(path.to_owned());
    }
}
