//! Validation problems accumulated by operations and transformations.
//!
//! Problems are recomputed eagerly on every input mutation; results are the
//! lazy half of the protocol. The aggregate state of a collection is
//! ok (empty), warning (warnings only), or error.

use serde::Serialize;
use std::fmt;
use std::slice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Aggregate state of a Problems collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Ok => "ok",
            State::Warning => "warning",
            State::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub severity: Severity,
    /// Operation id or slot the problem was recorded against.
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Problems {
    items: Vec<Problem>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.items.push(Problem {
            severity: Severity::Warning,
            source: source.into(),
            message: message.into(),
        });
    }

    pub fn error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.items.push(Problem {
            severity: Severity::Error,
            source: source.into(),
            message: message.into(),
        });
    }

    pub fn state(&self) -> State {
        let mut state = State::Ok;
        for p in &self.items {
            match p.severity {
                Severity::Error => return State::Error,
                Severity::Warning => state = State::Warning,
            }
        }
        state
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|p| p.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|p| p.severity == Severity::Warning)
    }

    pub fn is_ok(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Problem> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a> IntoIterator for &'a Problems {
    type Item = &'a Problem;
    type IntoIter = slice::Iter<'a, Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{} [{}]: {}", tag, self.source, self.message)
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for p in &self.items {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}", p)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_collection_is_ok() {
        let p = Problems::new();
        assert_eq!(p.state(), State::Ok);
        assert!(p.is_ok());
        assert!(!p.has_errors());
    }

    #[test]
    fn warnings_only_aggregate_to_warning() {
        let mut p = Problems::new();
        p.warning("terms", "mixed int and float inputs promote to float");
        assert_eq!(p.state(), State::Warning);
        assert!(p.has_warnings());
        assert!(!p.has_errors());
    }

    #[test]
    fn any_error_dominates() {
        let mut p = Problems::new();
        p.warning("terms", "w");
        p.error("terms", "requires at least 2 values, has 1");
        assert_eq!(p.state(), State::Error);
        assert!(p.has_errors());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn display_joins_problems() {
        let mut p = Problems::new();
        p.error("terms", "bad");
        p.warning("digits", "odd");
        assert_eq!(
            p.to_string(),
            "error [terms]: bad; warning [digits]: odd"
        );
    }
}
