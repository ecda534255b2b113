//! Mind-map graph model: concept nodes, directed edges, and structural checks.
//!
//! Nodes and edges decode leniently from language-model output: ids may be
//! strings or numbers, `importance` and `level` fall back to documented
//! defaults and are clamped into range. Structural problems (dangling edges,
//! duplicate ids, cycles, oversized maps) are *reported* through
//! [`Graph::issues`] rather than rejected, since the renderer can still draw
//! a partially inconsistent map.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Importance assigned to nodes that omit the field.
pub const DEFAULT_IMPORTANCE: u8 = 1;
/// Smallest importance a node can carry.
pub const MIN_IMPORTANCE: u8 = 1;
/// Largest importance a node can carry.
pub const MAX_IMPORTANCE: u8 = 5;
/// Hierarchy level assigned to nodes that omit the field.
pub const DEFAULT_LEVEL: u32 = 0;
/// Node count the generation prompt asks the model to stay under.
pub const MAX_PROMPTED_NODES: usize = 30;

/// A single concept in the mind map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawNode")]
pub struct Node {
    /// Identifier, unique within a well-formed graph.
    pub id: String,
    /// Display name.
    pub label: String,
    /// Weight in `1..=5`.
    pub importance: u8,
    /// Hierarchical depth, 0 at the top.
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Node {
    /// Create a node with default importance and level.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            importance: DEFAULT_IMPORTANCE,
            level: DEFAULT_LEVEL,
            description: None,
        }
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }
}

/// A directed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEdge")]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }
}

/// Wire shape of a node as emitted by the model.
#[derive(Deserialize)]
struct RawNode {
    #[serde(deserialize_with = "de_identifier")]
    id: String,
    #[serde(default, deserialize_with = "de_opt_text", alias = "name")]
    label: Option<String>,
    #[serde(default, deserialize_with = "de_opt_integer")]
    importance: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_integer")]
    level: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_text")]
    description: Option<String>,
}

impl From<RawNode> for Node {
    fn from(raw: RawNode) -> Self {
        let importance = raw
            .importance
            .map(|i| i.clamp(i64::from(MIN_IMPORTANCE), i64::from(MAX_IMPORTANCE)) as u8)
            .unwrap_or(DEFAULT_IMPORTANCE);
        let level = raw
            .level
            .map(|l| l.clamp(0, i64::from(u32::MAX)) as u32)
            .unwrap_or(DEFAULT_LEVEL);
        let label = raw
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| raw.id.clone());
        Self {
            id: raw.id,
            label,
            importance,
            level,
            description: raw.description,
        }
    }
}

/// Wire shape of an edge as emitted by the model.
#[derive(Deserialize)]
struct RawEdge {
    #[serde(deserialize_with = "de_identifier", alias = "from")]
    source: String,
    #[serde(deserialize_with = "de_identifier", alias = "to")]
    target: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    label: Option<String>,
}

impl From<RawEdge> for Edge {
    fn from(raw: RawEdge) -> Self {
        Self {
            source: raw.source,
            target: raw.target,
            label: raw.label,
        }
    }
}

/// Accept a JSON string or number as an identifier.
fn de_identifier<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number identifier, found {}",
            json_kind(&other)
        ))),
    }
}

fn de_opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected text, found {}",
            json_kind(&other)
        ))),
    }
}

/// Integers may arrive as numbers (possibly fractional) or numeric strings.
fn de_opt_integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("number {n} is out of range"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| Some(f.round() as i64))
            .map_err(|_| de::Error::custom(format!("expected an integer, found \"{s}\""))),
        other => Err(de::Error::custom(format!(
            "expected an integer, found {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A structural problem found in a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// Two or more nodes share an id.
    DuplicateId { id: String },
    /// An edge endpoint names no node.
    DanglingEdge {
        edge: usize,
        endpoint: String,
    },
    /// The map has more nodes than the prompt allows.
    TooManyNodes { count: usize, max: usize },
    /// The edge set contains a directed cycle.
    Cycle,
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::DuplicateId { id } => write!(f, "duplicate node id \"{id}\""),
            GraphIssue::DanglingEdge { edge, endpoint } => {
                write!(f, "edge #{edge} references unknown node \"{endpoint}\"")
            }
            GraphIssue::TooManyNodes { count, max } => {
                write!(f, "{count} nodes exceed the requested maximum of {max}")
            }
            GraphIssue::Cycle => write!(f, "edges form a directed cycle"),
        }
    }
}

/// One row of a hierarchical outline: a node position and its depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineRow {
    pub depth: usize,
    /// Index into [`Graph::nodes`].
    pub node: usize,
}

/// A mind map: nodes plus directed edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Report structural problems. An empty vec means the graph is consistent.
    pub fn issues(&self) -> Vec<GraphIssue> {
        let mut issues = Vec::new();

        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) && reported.insert(node.id.as_str()) {
                issues.push(GraphIssue::DuplicateId {
                    id: node.id.clone(),
                });
            }
        }

        for (i, edge) in self.edges.iter().enumerate() {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    issues.push(GraphIssue::DanglingEdge {
                        edge: i,
                        endpoint: endpoint.clone(),
                    });
                }
            }
        }

        if self.nodes.len() > MAX_PROMPTED_NODES {
            issues.push(GraphIssue::TooManyNodes {
                count: self.nodes.len(),
                max: MAX_PROMPTED_NODES,
            });
        }

        let (dag, _) = self.to_petgraph();
        if petgraph::algo::is_cyclic_directed(&dag) {
            issues.push(GraphIssue::Cycle);
        }

        issues
    }

    /// Build a petgraph view. Node weights are positions in `self.nodes`;
    /// edge weights are positions in `self.edges`. Dangling edges are skipped
    /// and duplicate ids resolve to their first occurrence.
    pub fn to_petgraph(&self) -> (DiGraph<usize, usize>, HashMap<&str, NodeIndex>) {
        let mut dag = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for (pos, node) in self.nodes.iter().enumerate() {
            let ix = dag.add_node(pos);
            index.entry(node.id.as_str()).or_insert(ix);
        }
        for (pos, edge) in self.edges.iter().enumerate() {
            if let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) {
                dag.add_edge(s, t, pos);
            }
        }
        (dag, index)
    }

    /// Depth-first outline starting from nodes without incoming edges.
    ///
    /// Each node appears once. Children follow edge order; nodes only
    /// reachable through a cycle are appended as extra roots.
    pub fn outline(&self) -> Vec<OutlineRow> {
        let (dag, _) = self.to_petgraph();
        let mut rows = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; dag.node_count()];

        let roots: Vec<NodeIndex> = dag
            .node_indices()
            .filter(|&ix| {
                dag.edges_directed(ix, Direction::Incoming)
                    .all(|e| e.source() == ix)
            })
            .collect();

        let rest: Vec<NodeIndex> = dag.node_indices().collect();
        for start in roots.into_iter().chain(rest) {
            if visited[start.index()] {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            while let Some((ix, depth)) = stack.pop() {
                if visited[ix.index()] {
                    continue;
                }
                visited[ix.index()] = true;
                rows.push(OutlineRow {
                    depth,
                    node: dag[ix],
                });

                let mut children: Vec<(usize, NodeIndex)> = dag
                    .edges_directed(ix, Direction::Outgoing)
                    .map(|e| (*e.weight(), e.target()))
                    .filter(|(_, t)| !visited[t.index()])
                    .collect();
                children.sort_by_key(|(order, _)| *order);
                // Reverse so the first edge is popped first.
                for (_, child) in children.into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }

        rows
    }
}
