//! Transformation spec (transform.json): raw JSON shapes + validation into
//! an in-memory Transformation.
//!
//! JSON shape:
//! {
//!   "terms": [
//!     { "path": "/invoice/subtotal", "type": "float", "value": 100.5 }
//!   ],
//!   "operations": [
//!     { "id": "/calc/tax", "op": "multiply",
//!       "inputs": [ { "term": "/invoice/subtotal" }, { "value": 0.21 } ] },
//!     { "id": "/calc/total", "op": "add",
//!       "inputs": [ { "term": "/invoice/subtotal" }, { "ref": "/calc/tax" } ] }
//!   ]
//! }
//!
//! Each input names exactly one of term/value/ref, plus an optional slot
//! (defaults to the kind's first declared slot). We validate ids, bind
//! terms, wire references between operations, and reject cycles.

use crate::Result;
use crate::diagnostics;
use crate::ops::{OpKind, Operation};
use crate::path::Path;
use crate::transform::Transformation;
use crate::value::{Payload, Value, ValueKind};

use anyhow::{Context, bail};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct TransformSpec {
    #[serde(default)]
    pub terms: Vec<RawTerm>,

    #[serde(default)]
    pub operations: Vec<RawOperation>,
}

/// Raw term binding as it appears in transform.json.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTerm {
    pub path: Path,

    /// Optional declared kind; the literal must agree (int literals coerce
    /// to a declared float).
    #[serde(rename = "type", default)]
    pub kind: Option<ValueKind>,

    pub value: Payload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOperation {
    pub id: Path,

    /// Kind name: "add", "absolute-value", ...
    pub op: String,

    #[serde(default)]
    pub inputs: Vec<RawInput>,
}

/// One input entry. Exactly one of term/value/ref must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInput {
    #[serde(default)]
    pub slot: Option<String>,

    #[serde(default)]
    pub term: Option<Path>,

    #[serde(default)]
    pub value: Option<Payload>,

    #[serde(default, rename = "ref")]
    pub reference: Option<Path>,
}

/// Read + parse a transform.json file.
pub fn load(path: &str) -> Result<TransformSpec> {
    let text = fs::read_to_string(path)
        .with_context(|| diagnostics::error_message(format!("read spec file {}", path)))?;
    let spec: TransformSpec = serde_json::from_str(&text)
        .with_context(|| diagnostics::error_message(format!("parse spec file {}", path)))?;
    Ok(spec)
}

impl TransformSpec {
    /// Bind terms, create and wire operations, and reject cycles.
    ///
    /// Three phases:
    /// 1) Bind terms (unique paths, declared kind agreement).
    /// 2) Create operations (unique ids, known kinds), wire term/literal
    ///    inputs, collect references.
    /// 3) Wire references and check the graph is acyclic.
    pub fn validate_and_build(&self) -> Result<Transformation> {
        let mut xf = Transformation::new();

        // Phase 1: terms.
        for raw in &self.terms {
            let payload = coerce_term(raw)?;
            xf.bind_term(Value::new(raw.path.clone(), payload))
                .map_err(|e| anyhow::anyhow!(diagnostics::error_message(e.to_string())))?;
        }

        if self.operations.is_empty() {
            bail!(
                "{}",
                diagnostics::error_message("spec contained no operations")
            );
        }

        // Phase 2: operations + direct inputs. References wait until every
        // operation exists.
        let mut seen: BTreeSet<&Path> = BTreeSet::new();
        let mut refs: Vec<(Path, String, Path)> = Vec::new();

        for raw in &self.operations {
            if !seen.insert(&raw.id) {
                bail!(
                    "{}",
                    diagnostics::error_message(format!("duplicate operation id: {}", raw.id))
                );
            }
            let kind = OpKind::parse(&raw.op).map_err(|_| {
                anyhow::anyhow!(diagnostics::error_message(format!(
                    "operation {} has unknown kind {:?}",
                    raw.id, raw.op
                )))
            })?;
            xf.add_operation(Operation::new(raw.id.clone(), kind))
                .map_err(|e| anyhow::anyhow!(diagnostics::error_message(e.to_string())))?;

            for (i, input) in raw.inputs.iter().enumerate() {
                let slot = input
                    .slot
                    .clone()
                    .unwrap_or_else(|| kind.descriptor().first_slot().id.to_string());

                match (&input.term, &input.value, &input.reference) {
                    (Some(term), None, None) => {
                        xf.add_term_input(&raw.id, &slot, term).with_context(|| {
                            diagnostics::error_message(format!(
                                "wiring input #{} of operation {}",
                                i, raw.id
                            ))
                        })?;
                    }
                    (None, Some(value), None) => {
                        let lit_path = raw.id.join(&format!("lit{}", i))?;
                        xf.add_literal_input(
                            &raw.id,
                            &slot,
                            Value::new(lit_path, value.clone()),
                        )
                        .with_context(|| {
                            diagnostics::error_message(format!(
                                "wiring input #{} of operation {}",
                                i, raw.id
                            ))
                        })?;
                    }
                    (None, None, Some(target)) => {
                        refs.push((raw.id.clone(), slot, target.clone()));
                    }
                    _ => {
                        bail!(
                            "{}",
                            diagnostics::error_message(format!(
                                "input #{} of operation {} must set exactly one of term/value/ref",
                                i, raw.id
                            ))
                        );
                    }
                }
            }
        }

        // Phase 3: references + cycle check.
        for (consumer, slot, producer) in refs {
            if xf.operation(&producer).is_none() {
                bail!(
                    "{}",
                    diagnostics::error_message(format!(
                        "operation {} references unknown operation {}",
                        consumer, producer
                    ))
                );
            }
            xf.link(&producer, &consumer, &slot).with_context(|| {
                diagnostics::error_message(format!(
                    "wiring reference {} -> {}",
                    producer, consumer
                ))
            })?;
        }

        xf.check_acyclic()
            .map_err(|e| anyhow::anyhow!(diagnostics::error_message(e.to_string())))?;

        for problem in xf.problems() {
            diagnostics::warn(format!("{}", problem));
        }

        Ok(xf)
    }
}

// Declared-kind agreement; int literals widen to a declared float.
fn coerce_term(raw: &RawTerm) -> Result<Payload> {
    let Some(declared) = raw.kind else {
        return Ok(raw.value.clone());
    };
    let actual = raw.value.kind();
    if actual == declared {
        return Ok(raw.value.clone());
    }
    if declared == ValueKind::Float {
        if let Payload::Int(v) = raw.value {
            return Ok(Payload::Float(v as f64));
        }
    }
    bail!(
        "{}",
        diagnostics::error_message(format!(
            "term {} declares {} but value is {}",
            raw.path, declared, actual
        ))
    );
}
