//! Report model: combine the operation graph with evaluation outcomes.

use crate::ops::Operation;
use crate::path::Path;
use crate::problems::{Problem, Severity, State};
use crate::transform::{Outcome, Transformation};
use crate::value::Payload;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct InputView {
    pub slot: String,
    pub path: String,
    pub kind: String,
    pub value: Payload,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationView {
    pub id: String,
    pub op: String,
    pub description: String,
    pub state: State,
    pub inputs: Vec<InputView>,
    pub problems: Vec<Problem>,

    /// Upstream operations this one references (the drill-down edge).
    pub operands: Vec<String>,

    /// Downstream operations consuming this result.
    pub consumers: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermView {
    pub path: String,
    pub kind: String,
    pub value: Payload,
    pub consumers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalsView {
    pub operations: usize,
    pub terms: usize,
    pub evaluated: usize,
    pub invalid: usize,
    pub failed: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    /// Drill-down roots: operations no other operation consumes.
    pub roots: Vec<String>,
    pub nodes: BTreeMap<String, OperationView>,
    pub terms: BTreeMap<String, TermView>,
    /// Transformation-level problems (unconsumed terms).
    pub problems: Vec<Problem>,
    pub totals: TotalsView,
}

/// Build report data from an evaluated transformation. Every operation gets
/// a view regardless of outcome so the report shows the whole graph.
pub fn build_report_data(
    xf: &Transformation,
    outcomes: &BTreeMap<Path, Outcome>,
) -> ReportData {
    let mut nodes: BTreeMap<String, OperationView> = BTreeMap::new();

    let mut evaluated = 0usize;
    let mut invalid = 0usize;
    let mut failed = 0usize;
    let mut warnings = 0usize;

    for (id, op) in xf.operations() {
        let (result, failure) = match outcomes.get(id) {
            Some(Outcome::Value(p)) => {
                evaluated += 1;
                (Some(p.clone()), None)
            }
            Some(Outcome::Invalid(_)) => {
                invalid += 1;
                (None, None)
            }
            Some(Outcome::Failed(msg)) => {
                failed += 1;
                (None, Some(msg.clone()))
            }
            None => (None, None),
        };
        warnings += op
            .problems()
            .iter()
            .filter(|p| p.severity == Severity::Warning)
            .count();

        nodes.insert(id.to_string(), operation_view(xf, id, op, result, failure));
    }

    let mut terms: BTreeMap<String, TermView> = BTreeMap::new();
    for (path, value) in xf.terms() {
        terms.insert(
            path.to_string(),
            TermView {
                path: path.to_string(),
                kind: value.kind().name().to_string(),
                value: value.payload.clone(),
                consumers: term_consumers(xf, path),
            },
        );
    }

    let problems: Vec<Problem> = xf.problems().iter().cloned().collect();
    warnings += problems.len();

    // Roots of the drill-down tree: results nothing downstream consumes.
    let roots: Vec<String> = xf
        .operations()
        .keys()
        .filter(|id| xf.consumers_of(id).is_empty())
        .map(|id| id.to_string())
        .collect();

    ReportData {
        roots,
        totals: TotalsView {
            operations: xf.operations().len(),
            terms: xf.terms().len(),
            evaluated,
            invalid,
            failed,
            warnings,
        },
        nodes,
        terms,
        problems,
    }
}

fn operation_view(
    xf: &Transformation,
    id: &Path,
    op: &Operation,
    result: Option<Payload>,
    failure: Option<String>,
) -> OperationView {
    let mut inputs: Vec<InputView> = Vec::new();
    for (slot, values) in op.inputs() {
        for v in values {
            inputs.push(InputView {
                slot: slot.clone(),
                path: v.path.to_string(),
                kind: v.kind().name().to_string(),
                value: v.payload.clone(),
            });
        }
    }

    let mut operands: Vec<String> = xf
        .producers_of(id)
        .iter()
        .map(|p| p.to_string())
        .collect();
    operands.sort();
    operands.dedup();

    let mut consumers: Vec<String> = xf
        .consumers_of(id)
        .iter()
        .map(|p| p.to_string())
        .collect();
    consumers.sort();
    consumers.dedup();

    OperationView {
        id: id.to_string(),
        op: op.kind().name().to_string(),
        description: op.descriptor().description.to_string(),
        state: op.state(),
        inputs,
        problems: op.problems().iter().cloned().collect(),
        operands,
        consumers,
        result,
        failure,
    }
}

fn term_consumers(xf: &Transformation, term: &Path) -> Vec<String> {
    let mut out: Vec<String> = xf
        .operations()
        .iter()
        .filter(|(_, op)| {
            op.inputs()
                .values()
                .any(|vs| vs.iter().any(|v| &v.path == term))
        })
        .map(|(id, _)| id.to_string())
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpKind;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn sample() -> (Transformation, BTreeMap<Path, Outcome>) {
        let mut xf = Transformation::new();
        xf.bind_term(Value::new(p("/t/a"), Payload::Int(2))).unwrap();

        xf.add_operation(Operation::new(p("/calc/double"), OpKind::Multiply))
            .unwrap();
        xf.add_term_input(&p("/calc/double"), "terms", &p("/t/a")).unwrap();
        xf.add_literal_input(
            &p("/calc/double"),
            "terms",
            Value::new(p("/calc/double/lit1"), Payload::Int(2)),
        )
        .unwrap();

        xf.add_operation(Operation::new(p("/calc/out"), OpKind::AbsoluteValue))
            .unwrap();
        xf.link(&p("/calc/double"), &p("/calc/out"), "terms").unwrap();

        let outcomes = xf.evaluate().unwrap();
        (xf, outcomes)
    }

    #[test]
    fn totals_and_roots() {
        let (xf, outcomes) = sample();
        let data = build_report_data(&xf, &outcomes);
        assert_eq!(data.totals.operations, 2);
        assert_eq!(data.totals.terms, 1);
        assert_eq!(data.totals.evaluated, 2);
        assert_eq!(data.totals.invalid, 0);
        assert_eq!(data.totals.failed, 0);
        // Only the sink is a root of the drill-down tree.
        assert_eq!(data.roots, vec!["/calc/out".to_string()]);
    }

    #[test]
    fn operation_views_carry_edges_and_results() {
        let (xf, outcomes) = sample();
        let data = build_report_data(&xf, &outcomes);

        let double = &data.nodes["/calc/double"];
        assert_eq!(double.result, Some(Payload::Int(4)));
        assert_eq!(double.consumers, vec!["/calc/out".to_string()]);
        assert!(double.operands.is_empty());

        let out = &data.nodes["/calc/out"];
        assert_eq!(out.result, Some(Payload::Int(4)));
        assert_eq!(out.operands, vec!["/calc/double".to_string()]);
        // The resolved reference shows up as a concrete input.
        assert_eq!(out.inputs.len(), 1);
        assert_eq!(out.inputs[0].path, "/calc/double");
    }

    #[test]
    fn term_views_list_consumers() {
        let (xf, outcomes) = sample();
        let data = build_report_data(&xf, &outcomes);
        let t = &data.terms["/t/a"];
        assert_eq!(t.value, Payload::Int(2));
        assert_eq!(t.consumers, vec!["/calc/double".to_string()]);
    }

    #[test]
    fn report_serializes_to_json() {
        let (xf, outcomes) = sample();
        let data = build_report_data(&xf, &outcomes);
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"/calc/double\""));
        assert!(json.contains("\"state\":\"ok\""));
    }
}
