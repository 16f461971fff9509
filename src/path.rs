//! Path identifiers for terms and operations.
//!
//! Example: /invoice/subtotal  =>  Path("/invoice/subtotal")
//!
//! A path is one or more `/`-prefixed segments. We validate the syntax on
//! construction and derive ordering so paths can be used in BTreeSet/Map.

use crate::error::EngineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

// Segment: leading letter or underscore, then letters/digits/`_.-`.
const PATH_RE: &str = r"^(/[A-Za-z_][A-Za-z0-9_.\-]*)+$";

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PATH_RE).expect("PATH_RE is a valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Path(String);

impl Path {
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        if path_re().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(EngineError::InvalidPath(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments without the separators: "/a/b" => ["a", "b"].
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Final segment, the local name of the term or operation.
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or_default()
    }

    /// Child path: "/a".join("b") => "/a/b". Fails on bad segment syntax.
    pub fn join(&self, segment: &str) -> Result<Self, EngineError> {
        Self::parse(&format!("{}/{}", self.0, segment))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Path {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Validate on deserialization so a bad path in a spec file fails loudly.
impl<'de> Deserialize<'de> for Path {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Path::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_valid_paths() {
        for ok in ["/a", "/invoice/subtotal", "/m1/term_2", "/x/y.z-w"] {
            assert_eq!(Path::parse(ok).unwrap().as_str(), ok);
        }
    }

    #[test]
    fn rejects_invalid_paths() {
        for bad in ["", "/", "a/b", "/a//b", "/1st", "/a/", "/a b"] {
            assert!(Path::parse(bad).is_err(), "should reject {:?}", bad);
        }
    }

    #[test]
    fn name_is_last_segment() {
        let p = Path::parse("/invoice/subtotal").unwrap();
        assert_eq!(p.name(), "subtotal");
        assert_eq!(p.segments().collect::<Vec<_>>(), vec!["invoice", "subtotal"]);
    }

    #[test]
    fn join_builds_child_paths() {
        let p = Path::parse("/calc").unwrap();
        assert_eq!(p.join("lit0").unwrap().as_str(), "/calc/lit0");
        assert!(p.join("bad seg").is_err());
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = Path::parse("/a").unwrap();
        let b = Path::parse("/a/b").unwrap();
        let c = Path::parse("/c").unwrap();
        let mut v = vec![c.clone(), b.clone(), a.clone()];
        v.sort();
        assert_eq!(v, vec![a, b, c]);
    }

    #[test]
    fn deserializes_with_validation() {
        let p: Path = serde_json::from_str("\"/a/b\"").unwrap();
        assert_eq!(p.as_str(), "/a/b");
        assert!(serde_json::from_str::<Path>("\"no-slash\"").is_err());
    }
}
