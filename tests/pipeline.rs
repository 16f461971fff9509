//! End-to-end: a transform.json on disk, through load -> validate ->
//! evaluate -> report -> render.

use pretty_assertions::assert_eq;
use std::fs;
use termflow::transform::Outcome;
use termflow::{Path, Payload, State, build_report_data, render, spec};

fn write_spec(dir: &tempfile::TempDir, name: &str, json: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, json).unwrap();
    path.to_string_lossy().into_owned()
}

const INVOICE_SPEC: &str = r#"{
    "terms": [
        { "path": "/invoice/subtotal", "type": "float", "value": 100.0 },
        { "path": "/invoice/items", "type": "int", "value": 4 }
    ],
    "operations": [
        { "id": "/calc/tax", "op": "multiply",
          "inputs": [ { "term": "/invoice/subtotal" }, { "value": 0.21 } ] },
        { "id": "/calc/total", "op": "add",
          "inputs": [ { "term": "/invoice/subtotal" }, { "ref": "/calc/tax" } ] },
        { "id": "/calc/rounded", "op": "round",
          "inputs": [ { "slot": "value", "ref": "/calc/total" },
                      { "slot": "digits", "value": 2 } ] },
        { "id": "/calc/per-item", "op": "divide",
          "inputs": [ { "term": "/invoice/subtotal" }, { "term": "/invoice/items" } ] },
        { "id": "/calc/summary", "op": "concat",
          "inputs": [ { "value": "total=" }, { "ref": "/calc/rounded" } ] }
    ]
}"#;

#[test]
fn full_pipeline_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let spec_path = write_spec(&dir, "transform.json", INVOICE_SPEC);

    let loaded = spec::load(&spec_path).unwrap();
    let mut xf = loaded.validate_and_build().unwrap();
    let outcomes = xf.evaluate().unwrap();

    let p = |s: &str| Path::parse(s).unwrap();
    assert_eq!(
        outcomes.get(&p("/calc/tax")),
        Some(&Outcome::Value(Payload::Float(21.0)))
    );
    assert_eq!(
        outcomes.get(&p("/calc/total")),
        Some(&Outcome::Value(Payload::Float(121.0)))
    );
    assert_eq!(
        outcomes.get(&p("/calc/rounded")),
        Some(&Outcome::Value(Payload::Float(121.0)))
    );
    assert_eq!(
        outcomes.get(&p("/calc/per-item")),
        Some(&Outcome::Value(Payload::Float(25.0)))
    );
    assert_eq!(
        outcomes.get(&p("/calc/summary")),
        Some(&Outcome::Value(Payload::Text("total=121".to_string())))
    );

    let data = build_report_data(&xf, &outcomes);
    assert_eq!(data.totals.operations, 5);
    assert_eq!(data.totals.evaluated, 5);
    assert_eq!(data.totals.invalid, 0);
    assert_eq!(data.totals.failed, 0);
    // Sinks of the graph: per-item and summary.
    assert_eq!(
        data.roots,
        vec!["/calc/per-item".to_string(), "/calc/summary".to_string()]
    );

    // Both renderers accept the same data.
    let html = render::render_html_report(&data).unwrap();
    assert!(html.contains("\"/calc/summary\""));
    let text = render::render_text_report(&data);
    assert!(text.contains("/calc/per-item"));
    assert!(text.contains("totals: 5 operation(s)"));
}

#[test]
fn report_survives_invalid_operations() {
    let dir = tempfile::tempdir().unwrap();
    let spec_path = write_spec(
        &dir,
        "transform.json",
        r#"{
        "operations": [
            { "id": "/calc/bad", "op": "add",
              "inputs": [ { "value": 1 } ] },
            { "id": "/calc/after", "op": "absolute-value",
              "inputs": [ { "ref": "/calc/bad" } ] },
            { "id": "/calc/fine", "op": "count" }
        ]
    }"#,
    );

    let mut xf = spec::load(&spec_path).unwrap().validate_and_build().unwrap();
    let outcomes = xf.evaluate().unwrap();
    let data = build_report_data(&xf, &outcomes);

    assert_eq!(data.totals.evaluated, 1);
    assert_eq!(data.totals.invalid, 1);
    assert_eq!(data.totals.failed, 1);
    assert_eq!(data.nodes["/calc/bad"].state, State::Error);
    assert_eq!(
        data.nodes["/calc/after"].failure.as_deref(),
        Some("reference /calc/bad produced no value")
    );
    assert_eq!(data.nodes["/calc/fine"].result, Some(Payload::Int(0)));
}

#[test]
fn load_rejects_malformed_paths() {
    let dir = tempfile::tempdir().unwrap();
    let spec_path = write_spec(
        &dir,
        "transform.json",
        r#"{ "operations": [ { "id": "no-slash", "op": "count" } ] }"#,
    );

    let err = format!("{:#}", spec::load(&spec_path).unwrap_err());
    assert!(err.contains("invalid path"), "got: {err}");
}

#[test]
fn load_reports_missing_files() {
    let err = format!("{:#}", spec::load("/no/such/file.json").unwrap_err());
    assert!(err.contains("read spec file"), "got: {err}");
}
