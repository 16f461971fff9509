use crate::report::ReportData;

/// Render a self-contained HTML report (data embedded as JSON).
///
/// Important: we avoid `format!()` because the HTML contains many `{}` from JS
/// template literals (e.g., `${x}`), which would conflict with Rust formatting.
pub fn render_html_report(data: &ReportData) -> anyhow::Result<String> {
    // Keep "</script>" inside payload text inert within the inline script.
    let json = serde_json::to_string(data)?.replace("</", "<\\/");

    const TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>termflow report</title>
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 0; }
  header { padding: 12px 16px; border-bottom: 1px solid #ddd; }
  .container { display: flex; height: calc(100vh - 58px); }
  .sidebar { width: 380px; border-right: 1px solid #ddd; padding: 12px; overflow: auto; }
  .main { flex: 1; padding: 12px; overflow: auto; }

  .summary { display: flex; gap: 16px; flex-wrap: wrap; font-size: 14px; color: #333; }
  .pill { padding: 4px 8px; border: 1px solid #ddd; border-radius: 999px; background: #fafafa; }
  .pill.bad { border-color: #e8bcbc; background: #fdf3f3; color: #a33; }
  .pill.warn { border-color: #e6d9a8; background: #fdf9ec; color: #875; }

  .tree-node { cursor: pointer; user-select: none; padding: 2px 4px; border-radius: 4px; white-space: nowrap; }
  .tree-node:hover { background: #f3f3f3; }
  .tree-node.selected { background: #e9f2ff; border: 1px solid #cfe3ff; }
  .indent { display: inline-block; width: 16px; }
  .toggle { display: inline-block; width: 16px; text-align: center; color: #666; }
  .muted { color: #777; font-size: 12px; }

  .dot { display: inline-block; width: 8px; height: 8px; border-radius: 50%; margin-right: 6px; }
  .dot.ok { background: #4a4; }
  .dot.warning { background: #ca3; }
  .dot.error { background: #c44; }

  .callout { margin: 8px 0; padding: 8px 10px; border-radius: 6px; font-size: 14px; }
  .callout.result { background: #eef7ee; border: 1px solid #cde3cd; }
  .callout.failure { background: #fdf3f3; border: 1px solid #e8bcbc; }

  .link { color: #27c; cursor: pointer; }
  .link:hover { text-decoration: underline; }

  table { border-collapse: collapse; width: 100%; margin-top: 8px; }
  th, td { border-bottom: 1px solid #eee; padding: 6px 8px; text-align: left; font-size: 14px; }
  th { position: sticky; top: 0; background: white; border-bottom: 1px solid #ddd; }
  .num { text-align: right; font-variant-numeric: tabular-nums; }
  code { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 13px; }
  ul.problems { margin: 8px 0; padding-left: 20px; font-size: 14px; }
  h3 { margin: 16px 0 4px 0; font-size: 14px; color: #555; }
</style>
</head>
<body>
<header>
  <div class="summary" id="summary"></div>
</header>

<div class="container">
  <div class="sidebar">
    <div style="display:flex; gap: 8px; margin-bottom: 8px;">
      <input id="search" placeholder="Search operation..." style="flex:1; padding: 6px 8px; border: 1px solid #ddd; border-radius: 6px;">
      <button id="expandAll" style="padding: 6px 10px;">Expand</button>
      <button id="collapseAll" style="padding: 6px 10px;">Collapse</button>
    </div>
    <div id="tree"></div>
    <h3>Terms</h3>
    <div id="terms"></div>
  </div>

  <div class="main">
    <h2 id="title">Select an operation</h2>
    <div id="meta" class="muted"></div>
    <div id="detail"></div>
  </div>
</div>

<script>
// Embedded report data (JSON object literal)
const DATA = __DATA__;

const state = {
  expanded: new Set(),
  selected: null,
  search: ""
};

function escapeHtml(s) {
  return String(s)
    .replaceAll("&", "&amp;")
    .replaceAll("<", "&lt;")
    .replaceAll(">", "&gt;")
    .replaceAll('"', "&quot;")
    .replaceAll("'", "&#39;");
}

function payloadText(v) {
  return typeof v === "string" ? v : JSON.stringify(v);
}

function renderSummary() {
  const t = DATA.totals;
  const el = document.getElementById("summary");
  const bad = t.invalid + t.failed;
  el.innerHTML = `
    <span class="pill">operations: <b>${t.operations}</b></span>
    <span class="pill">terms: <b>${t.terms}</b></span>
    <span class="pill">evaluated: <b>${t.evaluated}</b></span>
    <span class="pill${bad ? " bad" : ""}">invalid/failed: <b>${bad}</b></span>
    <span class="pill${t.warnings ? " warn" : ""}">warnings: <b>${t.warnings}</b></span>
  `;
}

function nodeMatches(id, node) {
  if (!state.search) return true;
  const s = state.search.toLowerCase();
  return id.toLowerCase().includes(s) || node.op.toLowerCase().includes(s);
}

// Drill-down tree: roots are the sink operations, children their operands.
function renderTree() {
  const root = document.getElementById("tree");
  root.innerHTML = "";

  // If search is active, show matches + ancestors in the drill-down tree.
  const mustShow = new Set();
  if (state.search) {
    const parent = new Map();
    for (const [id, node] of Object.entries(DATA.nodes)) {
      for (const c of node.operands) parent.set(c, id);
    }
    for (const [id, node] of Object.entries(DATA.nodes)) {
      if (nodeMatches(id, node)) {
        let cur = id;
        while (cur) {
          mustShow.add(cur);
          cur = parent.get(cur);
        }
      }
    }
  }

  function renderSubtree(id, depth) {
    const node = DATA.nodes[id];
    if (!node) return;

    if (state.search && !mustShow.has(id)) return;

    const isExpanded = state.expanded.has(id);
    const hasKids = node.operands && node.operands.length > 0;

    const row = document.createElement("div");
    row.className = "tree-node" + (state.selected === id ? " selected" : "");
    row.onclick = () => selectNode(id);

    const indent = document.createElement("span");
    indent.className = "indent";
    indent.style.width = (depth * 16) + "px";
    row.appendChild(indent);

    const toggle = document.createElement("span");
    toggle.className = "toggle";
    toggle.textContent = hasKids ? (isExpanded ? "▾" : "▸") : " ";
    toggle.onclick = (e) => {
      e.stopPropagation();
      if (!hasKids) return;
      if (isExpanded) state.expanded.delete(id);
      else state.expanded.add(id);
      renderTree();
    };
    row.appendChild(toggle);

    const value = node.result !== undefined ? " = " + payloadText(node.result) : "";
    const label = document.createElement("span");
    label.innerHTML = `<span class="dot ${node.state}"></span><code>${escapeHtml(id)}</code> <span class="muted">${escapeHtml(node.op)}${escapeHtml(value)}</span>`;
    row.appendChild(label);

    root.appendChild(row);

    if (hasKids && isExpanded) {
      for (const c of node.operands) renderSubtree(c, depth + 1);
    }
  }

  for (const r of DATA.roots) renderSubtree(r, 0);
}

function renderTerms() {
  const el = document.getElementById("terms");
  el.innerHTML = "";
  for (const [path, t] of Object.entries(DATA.terms)) {
    const row = document.createElement("div");
    row.className = "muted";
    row.innerHTML = `<code>${escapeHtml(path)}</code> : ${escapeHtml(t.kind)} = <code>${escapeHtml(payloadText(t.value))}</code>`;
    el.appendChild(row);
  }
  for (const p of DATA.problems) {
    const row = document.createElement("div");
    row.className = "muted";
    row.innerHTML = `&#9888; ${escapeHtml(p.message)} (<code>${escapeHtml(p.source)}</code>)`;
    el.appendChild(row);
  }
}

function opLinks(ids) {
  return ids
    .map((id) => `<span class="link" data-goto="${escapeHtml(id)}"><code>${escapeHtml(id)}</code></span>`)
    .join(" ");
}

function selectNode(id) {
  state.selected = id;
  const node = DATA.nodes[id];
  document.getElementById("title").innerHTML = `<code>${escapeHtml(id)}</code>`;
  document.getElementById("meta").textContent =
    `${node.op} | ${node.description} | state: ${node.state}`;

  let html = "";
  if (node.result !== undefined) {
    html += `<div class="callout result">result: <code>${escapeHtml(payloadText(node.result))}</code></div>`;
  } else if (node.failure !== undefined) {
    html += `<div class="callout failure">${escapeHtml(node.failure)}</div>`;
  }

  if (node.problems.length) {
    html += `<h3>Problems</h3><ul class="problems">`;
    for (const p of node.problems) {
      html += `<li>${escapeHtml(p.severity)} [${escapeHtml(p.source)}]: ${escapeHtml(p.message)}</li>`;
    }
    html += `</ul>`;
  }

  html += `<h3>Inputs</h3>`;
  if (node.inputs.length) {
    html += `<table><thead><tr><th>slot</th><th>path</th><th>kind</th><th class="num">value</th></tr></thead><tbody>`;
    for (const i of node.inputs) {
      html += `
        <tr>
          <td>${escapeHtml(i.slot)}</td>
          <td><code>${escapeHtml(i.path)}</code></td>
          <td>${escapeHtml(i.kind)}</td>
          <td class="num"><code>${escapeHtml(payloadText(i.value))}</code></td>
        </tr>
      `;
    }
    html += `</tbody></table>`;
  } else {
    html += `<div class="muted">none</div>`;
  }

  if (node.operands.length) html += `<h3>Operands</h3>` + opLinks(node.operands);
  if (node.consumers.length) html += `<h3>Consumed by</h3>` + opLinks(node.consumers);

  const detail = document.getElementById("detail");
  detail.innerHTML = html;
  for (const l of detail.querySelectorAll(".link")) {
    l.onclick = () => selectNode(l.dataset.goto);
  }

  renderTree();
}

function expandAll() {
  for (const [id, node] of Object.entries(DATA.nodes)) {
    if (node.operands && node.operands.length) state.expanded.add(id);
  }
  renderTree();
}

function collapseAll() {
  state.expanded.clear();
  renderTree();
}

document.getElementById("search").addEventListener("input", (e) => {
  state.search = e.target.value || "";
  renderTree();
});

document.getElementById("expandAll").onclick = expandAll;
document.getElementById("collapseAll").onclick = collapseAll;

renderSummary();
renderTerms();
for (const r of DATA.roots) state.expanded.add(r);
renderTree();
if (DATA.roots.length) selectNode(DATA.roots[0]);
</script>
</body>
</html>
"#;

    Ok(TEMPLATE.replace("__DATA__", &json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{OpKind, Operation};
    use crate::path::Path;
    use crate::report::build_report_data;
    use crate::transform::Transformation;
    use crate::value::{Payload, Value};

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn embeds_report_data_as_json() {
        let mut xf = Transformation::new();
        let id = p("/calc/total");
        xf.add_operation(Operation::new(id.clone(), OpKind::Add)).unwrap();
        xf.add_literal_input(&id, "terms", Value::new(p("/a"), Payload::Int(1)))
            .unwrap();
        xf.add_literal_input(&id, "terms", Value::new(p("/b"), Payload::Int(2)))
            .unwrap();
        let outcomes = xf.evaluate().unwrap();

        let html = render_html_report(&build_report_data(&xf, &outcomes)).unwrap();
        assert!(html.starts_with("<!doctype html>"));
        assert!(!html.contains("__DATA__"));
        assert!(html.contains("\"/calc/total\""));
    }

    #[test]
    fn script_closers_in_payloads_stay_inert() {
        let mut xf = Transformation::new();
        let id = p("/calc/label");
        xf.add_operation(Operation::new(id.clone(), OpKind::Concat)).unwrap();
        xf.add_literal_input(
            &id,
            "terms",
            Value::new(p("/a"), Payload::Text("</script>".into())),
        )
        .unwrap();
        xf.add_literal_input(&id, "terms", Value::new(p("/b"), Payload::Text("x".into())))
            .unwrap();
        let outcomes = xf.evaluate().unwrap();

        let html = render_html_report(&build_report_data(&xf, &outcomes)).unwrap();
        assert!(html.contains("<\\/script>"));
    }
}
