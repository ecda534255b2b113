//! Response extraction: turn a free-text completion into a validated [`Graph`].
//!
//! The model is instructed to answer with a bare JSON object, but completions
//! routinely arrive wrapped in prose, code fences, or followed by a remark.
//! Extraction scans for brace-balanced candidate spans (string-aware, so braces
//! inside JSON strings do not confuse nesting), parses them in order, and keeps
//! the first object carrying both `nodes` and `edges`.

use std::ops::Range;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::graph::{Edge, Graph, Node};

/// Key holding the node list.
pub const NODES_KEY: &str = "nodes";
/// Key holding the edge list.
pub const EDGES_KEY: &str = "edges";

/// A successful extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub graph: Graph,
    /// Byte range of the JSON payload within the raw text.
    pub span: Range<usize>,
    /// The parsed payload, as the model wrote it.
    pub json: Value,
}

/// Locate, parse and validate the mind-map JSON inside `raw`.
pub fn extract(raw: &str) -> Result<Extraction, ExtractionError> {
    let mut first_parse_error: Option<String> = None;
    let mut first_missing_key: Option<&'static str> = None;
    // End of the furthest span that failed to parse. Objects nested inside it
    // are fragments of a broken payload, not candidates to report on.
    let mut failed_until = 0;
    // Without a single balanced span the text holds no JSON at all.
    let mut any_balanced = false;

    let mut cursor = 0;
    while let Some(offset) = raw[cursor..].find('{') {
        let start = cursor + offset;
        let span = match matching_close(raw.as_bytes(), start) {
            Some(close) => {
                any_balanced = true;
                start..close + 1
            }
            // Unbalanced: hand serde the rest so it reports the truncation.
            None => start..raw.len(),
        };

        match serde_json::from_str::<Value>(&raw[span.clone()]) {
            Ok(json) => {
                match missing_key(&json) {
                    None => {
                        tracing::debug!(start = span.start, end = span.end, "mind-map JSON located");
                        let graph = coerce(&json, raw)?;
                        return Ok(Extraction { graph, span, json });
                    }
                    Some(key) if span.start >= failed_until => {
                        first_missing_key.get_or_insert(key);
                    }
                    Some(_) => {}
                }
                // Nested objects belong to this one; resume after it.
                cursor = span.end;
            }
            Err(e) => {
                first_parse_error.get_or_insert_with(|| e.to_string());
                failed_until = failed_until.max(span.end);
                cursor = start + 1;
            }
        }
    }

    let raw = raw.to_string();
    Err(if let Some(key) = first_missing_key {
        ExtractionError::MissingKey { key, raw }
    } else if let Some(message) = first_parse_error.filter(|_| any_balanced) {
        ExtractionError::MalformedJson { message, raw }
    } else {
        ExtractionError::NoJsonFound { raw }
    })
}

/// Index of the `}` closing the object opened at `start`, skipping string
/// contents. `None` when the text ends first.
fn matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn missing_key(json: &Value) -> Option<&'static str> {
    [NODES_KEY, EDGES_KEY]
        .into_iter()
        .find(|key| json.get(key).is_none())
}

fn coerce(json: &Value, raw: &str) -> Result<Graph, ExtractionError> {
    let invalid = |key: &'static str, e: serde_json::Error| ExtractionError::InvalidShape {
        key,
        message: e.to_string(),
        raw: raw.to_string(),
    };
    let nodes = Vec::<Node>::deserialize(&json[NODES_KEY]).map_err(|e| invalid(NODES_KEY, e))?;
    let edges = Vec::<Edge>::deserialize(&json[EDGES_KEY]).map_err(|e| invalid(EDGES_KEY, e))?;
    Ok(Graph::new(nodes, edges))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_surrounded_by_noise() {
        let raw = r#"noise {"nodes":[{"id":"1","label":"A","importance":3,"level":0}],"edges":[]} trailing"#;
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.graph.nodes.len(), 1);
        assert_eq!(extraction.graph.edges.len(), 0);
        let node = &extraction.graph.nodes[0];
        assert_eq!(node.id, "1");
        assert_eq!(node.importance, 3);
        assert_eq!(node.level, 0);
        assert_eq!(&raw[extraction.span.clone()], &raw[6..raw.len() - 9]);
    }

    #[test]
    fn prose_without_braces_is_no_json() {
        let err = extract("sorry, I cannot do that").unwrap_err();
        assert!(matches!(err, ExtractionError::NoJsonFound { .. }));
        assert_eq!(err.raw_text(), "sorry, I cannot do that");
    }

    #[test]
    fn unmatched_braces_are_no_json() {
        for raw in ["Desculpe { não consigo", "} oops {", "{"] {
            let err = extract(raw).unwrap_err();
            assert!(
                matches!(err, ExtractionError::NoJsonFound { .. }),
                "{raw:?} gave {err:?}"
            );
            assert_eq!(err.raw_text(), raw);
        }
    }

    #[test]
    fn balanced_prose_braces_are_malformed() {
        let err = extract("Resposta: {sem mapa}").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedJson { .. }));
    }

    #[test]
    fn missing_edges_key_is_reported() {
        let err = extract(r#"{"nodes":[]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingKey { key: "edges", .. }));
    }

    #[test]
    fn missing_nodes_is_checked_first() {
        let err = extract(r#"{"links":[]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingKey { key: "nodes", .. }));
    }

    #[test]
    fn truncated_completion_is_malformed() {
        let err = extract(r#"{"nodes":[{"id":"1","label":"A"}],"edges":[{"source":"1""#).unwrap_err();
        match err {
            ExtractionError::MalformedJson { message, .. } => {
                assert!(message.contains("EOF"), "unexpected message: {message}");
            }
            other => panic!("expected MalformedJson, got {other:?}"),
        }
    }

    #[test]
    fn stray_prose_braces_are_skipped() {
        let raw = r#"Here is the {mind map} you asked for:
{"nodes":[{"id":"a","label":"A"},{"id":"b","label":"B"}],"edges":[{"source":"a","target":"b"}]}
Hope it helps {:"#;
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.graph.nodes.len(), 2);
        assert_eq!(extraction.graph.edges.len(), 1);
    }

    #[test]
    fn unbalanced_prose_brace_does_not_hide_payload() {
        let raw = r#"use { to open: {"nodes":[],"edges":[]}"#;
        let extraction = extract(raw).unwrap();
        assert!(extraction.graph.is_empty());
    }

    #[test]
    fn prose_brace_then_incomplete_object_reports_missing_key() {
        let err = extract(r#"A {draft} first, then {"nodes":[]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingKey { key: "edges", .. }));
    }

    #[test]
    fn first_complete_candidate_wins_over_later_ones() {
        let raw = r#"{"note":"draft"} {"nodes":[{"id":"x"}],"edges":[]} {"nodes":[],"edges":[]}"#;
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.graph.nodes.len(), 1);
        assert_eq!(extraction.graph.nodes[0].label, "x");
    }

    #[test]
    fn braces_inside_strings_do_not_break_nesting() {
        let raw = r#"{"nodes":[{"id":"1","label":"set {a, b} and \"}\""}],"edges":[]}"#;
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.graph.nodes[0].label, r#"set {a, b} and "}""#);
        assert_eq!(extraction.span, 0..raw.len());
    }

    #[test]
    fn code_fenced_payload_is_extracted() {
        let raw = "```json\n{\"nodes\":[{\"id\":1,\"label\":\"Um\"}],\"edges\":[]}\n```";
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.graph.nodes[0].id, "1");
    }

    #[test]
    fn wrong_shape_is_invalid() {
        let err = extract(r#"{"nodes":{"id":"1"},"edges":[]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidShape { key: "nodes", .. }));

        let err = extract(r#"{"nodes":[],"edges":[{"source":"1"}]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidShape { key: "edges", .. }));
    }

    #[test]
    fn extra_keys_are_ignored() {
        let raw = r#"{"title":"Física","nodes":[],"edges":[],"notes":"x"}"#;
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.json["title"], "Física");
    }

    #[test]
    fn multibyte_text_before_payload_is_handled() {
        let raw = "Mapa mental sobre ação e reação → {\"nodes\":[{\"id\":\"ç\"}],\"edges\":[]}";
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.graph.nodes[0].id, "ç");
    }
}
