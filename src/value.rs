//! Typed payloads and path-bound values.
//!
//! A Value binds a payload to the path that identifies where it came from
//! (a term binding, an inline literal, or an upstream operation result).
//! Mixed int/float arithmetic promotes to float; the promotion helpers here
//! are the single place that rule lives.

use crate::path::Path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload kind tags, used by slot descriptors and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    Text,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Text => "text",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Float)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed payload. Untagged so JSON scalars map directly:
/// 3 => Int, 3.5 => Float, true => Bool, "x" => Text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Payload {
    pub fn kind(&self) -> ValueKind {
        match self {
            Payload::Int(_) => ValueKind::Int,
            Payload::Float(_) => ValueKind::Float,
            Payload::Bool(_) => ValueKind::Bool,
            Payload::Text(_) => ValueKind::Text,
        }
    }

    /// Numeric view with int-to-float promotion. None for bool/text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Payload::Int(v) => Some(*v as f64),
            Payload::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Canonical text form, used by concat and in rendered reports.
    pub fn canonical_text(&self) -> String {
        match self {
            Payload::Int(v) => v.to_string(),
            Payload::Float(v) => v.to_string(),
            Payload::Bool(v) => v.to_string(),
            Payload::Text(v) => v.clone(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_text())
    }
}

/// A path-identified, typed input binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Value {
    pub path: Path,
    pub payload: Payload,
}

impl Value {
    pub fn new(path: Path, payload: Payload) -> Self {
        Self { path, payload }
    }

    pub fn kind(&self) -> ValueKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_scalars_map_to_payload_variants() {
        assert_eq!(serde_json::from_str::<Payload>("3").unwrap(), Payload::Int(3));
        assert_eq!(
            serde_json::from_str::<Payload>("3.5").unwrap(),
            Payload::Float(3.5)
        );
        assert_eq!(
            serde_json::from_str::<Payload>("true").unwrap(),
            Payload::Bool(true)
        );
        assert_eq!(
            serde_json::from_str::<Payload>("\"x\"").unwrap(),
            Payload::Text("x".to_string())
        );
    }

    #[test]
    fn numeric_promotion() {
        assert_eq!(Payload::Int(2).as_f64(), Some(2.0));
        assert_eq!(Payload::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Payload::Bool(true).as_f64(), None);
        assert_eq!(Payload::Text("2".into()).as_f64(), None);
    }

    #[test]
    fn canonical_text_forms() {
        assert_eq!(Payload::Int(-4).canonical_text(), "-4");
        assert_eq!(Payload::Float(2.5).canonical_text(), "2.5");
        assert_eq!(Payload::Float(3.0).canonical_text(), "3");
        assert_eq!(Payload::Bool(false).canonical_text(), "false");
        assert_eq!(Payload::Text("ab".into()).canonical_text(), "ab");
    }

    #[test]
    fn kind_tags() {
        assert!(ValueKind::Int.is_numeric());
        assert!(ValueKind::Float.is_numeric());
        assert!(!ValueKind::Text.is_numeric());
        assert_eq!(ValueKind::Float.to_string(), "float");
    }
}
