//! Plain-text report for terminal output.

use crate::report::ReportData;

/// Render an aligned summary of operations, problems, and totals.
pub fn render_text_report(data: &ReportData) -> String {
    let mut out = String::new();

    let id_w = data
        .nodes
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(2)
        .max("id".len());
    let op_w = data
        .nodes
        .values()
        .map(|n| n.op.len())
        .max()
        .unwrap_or(2)
        .max("op".len());

    out.push_str(&format!(
        "{:<id_w$}  {:<op_w$}  {:<7}  result\n",
        "id", "op", "state"
    ));
    for node in data.nodes.values() {
        let value = match (&node.result, &node.failure) {
            (Some(p), _) => p.to_string(),
            (None, Some(f)) => format!("failed: {}", f),
            (None, None) => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<id_w$}  {:<op_w$}  {:<7}  {}\n",
            node.id, node.op, node.state, value
        ));
    }

    let mut problem_lines: Vec<String> = Vec::new();
    for node in data.nodes.values() {
        for p in &node.problems {
            problem_lines.push(format!("  {}  ({})", p, node.id));
        }
    }
    for p in &data.problems {
        problem_lines.push(format!("  {}", p));
    }
    if !problem_lines.is_empty() {
        out.push_str("problems:\n");
        for line in problem_lines {
            out.push_str(&line);
            out.push('\n');
        }
    }

    let t = &data.totals;
    out.push_str(&format!(
        "totals: {} operation(s), {} term(s), {} evaluated, {} invalid, {} failed, {} warning(s)\n",
        t.operations, t.terms, t.evaluated, t.invalid, t.failed, t.warnings
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{OpKind, Operation};
    use crate::path::Path;
    use crate::report::build_report_data;
    use crate::transform::Transformation;
    use crate::value::{Payload, Value};

    #[test]
    fn lists_operations_and_totals() {
        let mut xf = Transformation::new();
        let id = Path::parse("/calc/total").unwrap();
        xf.add_operation(Operation::new(id.clone(), OpKind::Add)).unwrap();
        xf.add_literal_input(&id, "terms", Value::new(Path::parse("/a").unwrap(), Payload::Int(1)))
            .unwrap();
        xf.add_literal_input(&id, "terms", Value::new(Path::parse("/b").unwrap(), Payload::Int(2)))
            .unwrap();
        let outcomes = xf.evaluate().unwrap();
        let text = render_text_report(&build_report_data(&xf, &outcomes));

        assert!(text.contains("/calc/total"), "got: {text}");
        assert!(text.contains("ok"), "got: {text}");
        assert!(text.contains("totals: 1 operation(s)"), "got: {text}");
    }

    #[test]
    fn shows_problems_for_invalid_operations() {
        let mut xf = Transformation::new();
        let id = Path::parse("/calc/total").unwrap();
        xf.add_operation(Operation::new(id, OpKind::Add)).unwrap();
        let outcomes = xf.evaluate().unwrap();
        let text = render_text_report(&build_report_data(&xf, &outcomes));

        assert!(text.contains("problems:"), "got: {text}");
        assert!(
            text.contains("requires at least 2 value(s), has 0"),
            "got: {text}"
        );
    }
}
