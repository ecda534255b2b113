//! Graph rendering: deterministic visual attributes for mind-map nodes.
//!
//! Node radius grows with importance and color cycles through a fixed green
//! palette by hierarchy level. The resulting [`VisualGraph`] is handed to a
//! drawing collaborator: the vis-network page in [`html`], or the terminal
//! outline used by the CLI and TUI.

pub mod html;

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, Node};

/// Colors by hierarchy level, darkest at the top.
pub const PALETTE: [&str; 5] = ["#006400", "#228B22", "#32CD32", "#7CFC00", "#ADFF2F"];

const BASE_NODE_SIZE: u32 = 15;
const SIZE_PER_IMPORTANCE: u32 = 5;

/// Shown instead of a canvas when there is nothing to draw.
pub const PLACEHOLDER: &str =
    "Enter a topic and generate a mind map to see it here.";

/// Radius for a node of the given importance.
pub fn node_size(importance: u8) -> u32 {
    BASE_NODE_SIZE + u32::from(importance) * SIZE_PER_IMPORTANCE
}

/// Palette color for a hierarchy level.
pub fn node_color(level: u32) -> &'static str {
    PALETTE[level as usize % PALETTE.len()]
}

/// `#RRGGBB` to components.
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontStyle {
    pub color: &'static str,
    pub size: u32,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            color: "white",
            size: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualNode {
    pub id: String,
    pub label: String,
    pub size: u32,
    pub color: &'static str,
    pub font: FontStyle,
    /// Hover text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&Node> for VisualNode {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            size: node_size(node.importance),
            color: node_color(node.level),
            font: FontStyle::default(),
            title: node.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Canvas settings for the drawing collaborator; also the `[render]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// CSS width of the canvas.
    pub width: String,
    /// Canvas height in pixels.
    pub height: u32,
    pub directed: bool,
    pub physics: bool,
    pub hierarchical: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: "100%".into(),
            height: 500,
            directed: true,
            physics: true,
            hierarchical: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualGraph {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub layout: LayoutConfig,
}

impl VisualGraph {
    pub fn from_graph(graph: &Graph, layout: &LayoutConfig) -> Self {
        Self {
            nodes: graph.nodes.iter().map(VisualNode::from).collect(),
            edges: graph
                .edges
                .iter()
                .map(|e| VisualEdge {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    label: e.label.clone(),
                })
                .collect(),
            layout: layout.clone(),
        }
    }
}

/// What the display surface should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Canvas(VisualGraph),
    Placeholder(&'static str),
}

/// Map a graph to its visual form, or a placeholder when there is none.
pub fn render(graph: Option<&Graph>, layout: &LayoutConfig) -> Rendered {
    match graph {
        Some(g) if !g.is_empty() => Rendered::Canvas(VisualGraph::from_graph(g, layout)),
        _ => Rendered::Placeholder(PLACEHOLDER),
    }
}

/// Indented text outline of the hierarchy, one line per node.
pub fn outline_lines(graph: &Graph) -> Vec<String> {
    graph
        .outline()
        .into_iter()
        .map(|row| {
            let node = &graph.nodes[row.node];
            format!(
                "{}{} {} [{}]",
                "  ".repeat(row.depth),
                if row.depth == 0 { "◆" } else { "•" },
                node.label,
                "★".repeat(usize::from(node.importance)),
            )
        })
        .collect()
}
