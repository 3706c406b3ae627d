//! Purpose: Structured success payloads returned by dispatched commands.
//! Exports: `Outcome`, `SpanInfo`, `Offsets`.
//! Role: Replaces the engine's overloaded integer results with explicit variants.
//! Invariants: "done", "count", "value", and "paths" are never the same shape.
//! Invariants: JSON form is `{"kind": ..., "value": ...}`; fields are additive-only.
use serde::Serialize;

use crate::core::engine::RawSpan;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// A freshly issued handle token.
    Token(String),
    /// Success with nothing to report.
    Done,
    /// The value of exactly one node; `None` when the node has no value.
    Value(Option<String>),
    /// Number of nodes changed, removed, or renamed.
    Count(usize),
    /// Matching paths; may be empty.
    Paths(Vec<String>),
    Span(SpanInfo),
    /// Live tokens of the session.
    Handles(Vec<String>),
}

impl Outcome {
    pub fn token(&self) -> Option<&str> {
        match self {
            Outcome::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            Outcome::Count(count) => Some(*count),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<Option<&str>> {
        match self {
            Outcome::Value(value) => Some(value.as_deref()),
            _ => None,
        }
    }

    pub fn paths(&self) -> Option<&[String]> {
        match self {
            Outcome::Paths(paths) | Outcome::Handles(paths) => Some(paths),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Offsets {
    pub start: u32,
    pub end: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SpanInfo {
    pub filename: String,
    pub label: Offsets,
    pub value: Offsets,
    pub span: Offsets,
}

impl From<RawSpan> for SpanInfo {
    fn from(raw: RawSpan) -> Self {
        Self {
            filename: raw.filename,
            label: Offsets {
                start: raw.label_start,
                end: raw.label_end,
            },
            value: Offsets {
                start: raw.value_start,
                end: raw.value_end,
            },
            span: Offsets {
                start: raw.span_start,
                end: raw.span_end,
            },
        }
    }
}
