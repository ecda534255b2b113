//! Standalone HTML page drawing a [`VisualGraph`] with vis-network.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use super::VisualGraph;

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("failed to serialize graph for export: {message}")]
    #[diagnostic(code(knowtree::export::serialize))]
    Serialize { message: String },

    #[error("failed to write export: {path}")]
    #[diagnostic(
        code(knowtree::export::write),
        help("Ensure the target directory exists and you have write permissions.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;

const VIS_NETWORK_URL: &str =
    "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js";

/// Render the full HTML document.
pub fn page(visual: &VisualGraph, title: &str) -> ExportResult<String> {
    let nodes: Vec<serde_json::Value> = visual
        .nodes
        .iter()
        .map(|n| {
            let mut node = serde_json::json!({
                "id": n.id,
                "label": n.label,
                "size": n.size,
                "color": n.color,
                "font": n.font,
                "shape": "dot",
            });
            if let Some(ref title) = n.title {
                node["title"] = serde_json::Value::String(title.clone());
            }
            node
        })
        .collect();

    let edges: Vec<serde_json::Value> = visual
        .edges
        .iter()
        .map(|e| {
            serde_json::json!({
                "from": e.source,
                "to": e.target,
                "label": e.label.as_deref().unwrap_or(""),
                "arrows": if visual.layout.directed { "to" } else { "" },
            })
        })
        .collect();

    let options = serde_json::json!({
        "layout": {
            "hierarchical": {
                "enabled": visual.layout.hierarchical,
                "direction": "UD",
                "sortMethod": "directed",
            }
        },
        "physics": { "enabled": visual.layout.physics },
        "interaction": { "hover": true },
    });

    let nodes_json = script_json(&nodes)?;
    let edges_json = script_json(&edges)?;
    let options_json = script_json(&options)?;
    let title = escape_html(title);
    let width = escape_html(&visual.layout.width);
    let height = visual.layout.height;
    let node_count = visual.nodes.len();
    let edge_count = visual.edges.len();

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <script src="{VIS_NETWORK_URL}"></script>
    <style>
        body {{ margin: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0e1117; color: #e0e0e0; }}
        header {{ padding: 12px 24px; border-bottom: 1px solid rgba(255,255,255,0.08); display: flex; align-items: baseline; gap: 16px; }}
        header h1 {{ font-size: 1.1em; margin: 0; color: #32CD32; }}
        header span {{ font-size: 0.8em; color: #888; }}
        #graph {{ width: {width}; height: {height}px; }}
        #selection {{ padding: 8px 24px; font-size: 0.85em; color: #aaa; }}
    </style>
</head>
<body>
    <header>
        <h1>{title}</h1>
        <span>{node_count} nodes &middot; {edge_count} edges</span>
    </header>
    <div id="graph"></div>
    <div id="selection"></div>
    <script>
        const nodes = new vis.DataSet({nodes_json});
        const edges = new vis.DataSet({edges_json});
        const network = new vis.Network(document.getElementById("graph"), {{ nodes, edges }}, {options_json});
        network.on("click", (params) => {{
            const target = document.getElementById("selection");
            if (params.nodes.length === 0) {{ target.textContent = ""; return; }}
            const node = nodes.get(params.nodes[0]);
            target.textContent = node.title ? `${{node.label}}: ${{node.title}}` : node.label;
        }});
    </script>
</body>
</html>
"#
    ))
}

/// Render and write the page to `path`.
pub fn export_html(visual: &VisualGraph, title: &str, path: &Path) -> ExportResult<PathBuf> {
    let html = page(visual, title)?;
    std::fs::write(path, html).map_err(|e| ExportError::Write {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), nodes = visual.nodes.len(), "mind map exported");
    Ok(path.to_path_buf())
}

/// JSON safe to inline inside a `<script>` element.
fn script_json<T: serde::Serialize>(value: &T) -> ExportResult<String> {
    serde_json::to_string(value)
        .map(|s| s.replace("</", "<\\/"))
        .map_err(|e| ExportError::Serialize {
            message: e.to_string(),
        })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Graph, Node};
    use crate::render::LayoutConfig;

    fn visual() -> VisualGraph {
        let mut root = Node::new("1", "Sistema Solar").with_importance(5);
        root.description = Some("Planetas e o Sol".into());
        let graph = Graph::new(
            vec![root, Node::new("2", "Terra").with_level(1)],
            vec![Edge::new("1", "2")],
        );
        VisualGraph::from_graph(&graph, &LayoutConfig::default())
    }

    #[test]
    fn page_embeds_nodes_edges_and_layout() {
        let html = page(&visual(), "Sistema Solar").unwrap();
        assert!(html.contains("<title>Sistema Solar</title>"));
        assert!(html.contains(r##""label":"Terra""##));
        assert!(html.contains(r##""color":"#228B22""##));
        assert!(html.contains(r##""from":"1""##));
        assert!(html.contains(r##""arrows":"to""##));
        assert!(html.contains(r##""title":"Planetas e o Sol""##));
        assert!(html.contains("2 nodes &middot; 1 edges"));
        assert!(html.contains("height: 500px"));
    }

    #[test]
    fn undirected_layout_drops_arrows() {
        let mut v = visual();
        v.layout.directed = false;
        let html = page(&v, "t").unwrap();
        assert!(html.contains(r##""arrows":"""##));
    }

    #[test]
    fn script_breakout_is_escaped() {
        let mut v = visual();
        v.nodes[0].label = "</script><b>".into();
        let html = page(&v, "<Título>").unwrap();
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("&lt;Título&gt;"));
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("map.html");
        let written = export_html(&visual(), "Mapa", &path).unwrap();
        let content = std::fs::read_to_string(written).unwrap();
        assert!(content.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn export_to_missing_dir_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent").join("map.html");
        assert!(matches!(
            export_html(&visual(), "Mapa", &path),
            Err(ExportError::Write { .. })
        ));
    }
}
