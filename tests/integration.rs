//! End-to-end integration tests for knowtree.
//!
//! These tests drive the public API from raw model text through extraction,
//! history, rendering and HTML export, with scripted stand-ins for the
//! language model and the encyclopedia.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use knowtree::config::KnowtreeConfig;
use knowtree::error::{ExtractionError, HistoryError, SessionError};
use knowtree::extract::extract;
use knowtree::graph::Node;
use knowtree::history::{History, HistoryEntry};
use knowtree::knowledge::{Excerpt, KnowledgeBase, LookupError};
use knowtree::llm::{CompletionModel, CompletionRequest, LlmError};
use knowtree::message::{MemorySink, Message, MessageSink};
use knowtree::render::html::export_html;
use knowtree::render::{LayoutConfig, PALETTE, Rendered, VisualNode, render};
use knowtree::session::{Session, SessionOptions};

struct ScriptedModel {
    replies: RefCell<VecDeque<String>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().map(|r| r.to_string()).collect()),
        }
    }
}

impl CompletionModel for ScriptedModel {
    fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or(LlmError::RequestFailed {
                message: "no scripted reply left".into(),
            })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct StaticWiki;

impl KnowledgeBase for StaticWiki {
    fn lookup(&self, topic: &str) -> Result<Vec<Excerpt>, LookupError> {
        Ok(vec![
            Excerpt::new(topic, "Artigo principal."),
            Excerpt::new(format!("{topic} (desambiguação)"), "Outros usos."),
        ])
    }
}

fn map_json(root: &str) -> String {
    format!(
        r#"{{"nodes":[{{"id":1,"label":"{root}","importance":5,"level":0}},{{"id":2,"label":"Filho","importance":2,"level":1}},{{"id":3,"label":"Neto","level":2}}],"edges":[{{"source":1,"target":2}},{{"source":2,"target":3}}]}}"#
    )
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[test]
fn extract_single_object_amid_noise() {
    let raw = r#"noise {"nodes":[{"id":"1","label":"A","importance":3,"level":0}],"edges":[]} trailing"#;
    let extraction = extract(raw).unwrap();
    assert_eq!(extraction.graph.nodes.len(), 1);
    assert_eq!(extraction.graph.edges.len(), 0);
    let node = &extraction.graph.nodes[0];
    assert_eq!(node.id, "1");
    assert_eq!(node.importance, 3);
    assert_eq!(node.level, 0);
    assert_eq!(&raw[extraction.span], r#"{"nodes":[{"id":"1","label":"A","importance":3,"level":0}],"edges":[]}"#);
}

#[test]
fn extract_prose_without_json_fails() {
    let err = extract("sorry, I cannot do that").unwrap_err();
    assert!(matches!(err, ExtractionError::NoJsonFound { .. }));
    assert_eq!(err.raw_text(), "sorry, I cannot do that");

    // An opening brace that never closes is still prose.
    let err = extract("Desculpe { não consigo gerar o mapa").unwrap_err();
    assert!(matches!(err, ExtractionError::NoJsonFound { .. }));
}

#[test]
fn extract_object_without_edges_fails() {
    let err = extract(r#"{"nodes":[]}"#).unwrap_err();
    assert!(matches!(err, ExtractionError::MissingKey { key: "edges", .. }));
}

#[test]
fn extract_counts_match_array_lengths() {
    let raw = format!("Aqui está o mapa:\n{}\nEspero que ajude!", map_json("Raiz"));
    let graph = extract(&raw).unwrap().graph;
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 2);
    assert!(graph.issues().is_empty());
}

// ---------------------------------------------------------------------------
// Rendering defaults
// ---------------------------------------------------------------------------

#[test]
fn node_without_importance_or_level_renders_with_defaults() {
    let node: Node = serde_json::from_str(r#"{"id":"x","label":"Sem peso"}"#).unwrap();
    let visual = VisualNode::from(&node);
    assert_eq!(visual.size, 20);
    assert_eq!(visual.color, PALETTE[0]);
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[test]
fn history_select_returns_kth_append() {
    let mut history = History::new();
    let queries = ["um", "dois", "três", "quatro"];
    for q in queries {
        let graph = extract(&map_json(q)).unwrap().graph;
        history.append(HistoryEntry::new(q, q, graph, ""));
    }
    for (k, q) in queries.iter().enumerate() {
        assert_eq!(history.select(k).unwrap().query, *q);
    }
    assert!(matches!(
        history.select(queries.len()),
        Err(HistoryError::IndexOutOfRange { index: 4, len: 4 })
    ));

    let before = history.select(1).unwrap();
    history.append(HistoryEntry::new("cinco", "cinco", Default::default(), ""));
    assert_eq!(history.select(1).unwrap(), before);
    assert_eq!(history.len(), 5);
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[test]
fn session_generates_picks_and_exports() {
    let a = map_json("Sistema Solar");
    let b = map_json("Fotossíntese");
    let model = ScriptedModel::new(&["Sistema Solar", a.as_str(), "Fotossíntese", b.as_str()]);
    let sink = Arc::new(MemorySink::new());
    let mut session = Session::new(
        &model,
        StaticWiki,
        Arc::clone(&sink) as Arc<dyn MessageSink>,
        SessionOptions::default(),
    );

    session.submit("sistema solar").unwrap();
    session.submit("fotossintese").unwrap();
    assert_eq!(session.history().labels(), vec!["sistema solar", "fotossintese"]);
    assert!(
        session
            .state()
            .current_knowledge_context
            .starts_with("Page: Fotossíntese\nSummary: Artigo principal.")
    );

    // Re-selecting the same entry yields the identical graph.
    let first = session.pick(0).unwrap().response.clone();
    let second = session.pick(0).unwrap().response.clone();
    assert_eq!(first, second);
    assert_eq!(session.state().current_graph.as_ref(), Some(&first));
    assert_eq!(session.history().len(), 2);

    let Rendered::Canvas(visual) = session.render(&LayoutConfig::default()) else {
        panic!("expected a canvas after a successful generation");
    };
    assert_eq!(visual.nodes[0].label, "Sistema Solar");
    assert_eq!(visual.nodes[0].size, 40);
    assert_eq!(visual.nodes[2].color, PALETTE[2]);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("sistema-solar.html");
    export_html(&visual, "sistema solar", &path).unwrap();
    let html = std::fs::read_to_string(&path).unwrap();
    for node in &visual.nodes {
        assert!(html.contains(&format!("\"label\":\"{}\"", node.label)));
    }

    let ready = sink
        .messages()
        .into_iter()
        .filter(|m| matches!(m, Message::MapReady { .. }))
        .count();
    assert_eq!(ready, 4);
}

#[test]
fn session_failure_surfaces_raw_text_and_keeps_state() {
    let good = map_json("Rust");
    let model = ScriptedModel::new(&["Rust", good.as_str(), "Go", r#"{"nodes":[{"id":1}]}"#]);
    let sink = Arc::new(MemorySink::new());
    let mut session = Session::new(
        &model,
        StaticWiki,
        Arc::clone(&sink) as Arc<dyn MessageSink>,
        SessionOptions::default(),
    );

    session.submit("rust").unwrap();
    let err = session.submit("go").unwrap_err();
    let SessionError::Extraction(ref extraction) = err else {
        panic!("expected an extraction error, got {err:?}");
    };
    assert!(matches!(extraction, ExtractionError::MissingKey { key: "edges", .. }));
    assert_eq!(extraction.raw_text(), r#"{"nodes":[{"id":1}]}"#);

    assert_eq!(session.state().current_query, "rust");
    assert_eq!(session.history().len(), 1);
    assert_eq!(
        session.state().last_raw_response.as_deref(),
        Some(r#"{"nodes":[{"id":1}]}"#)
    );
}

#[test]
fn nothing_rendered_without_a_graph() {
    assert!(matches!(
        render(None, &LayoutConfig::default()),
        Rendered::Placeholder(_)
    ));
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn config_file_drives_session_options() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"
[knowledge]
language = "en"
top_k_results = 1

[history]
capacity = 2

[account]
subscribed = false

[render]
height = 800
"#,
    )
    .unwrap();

    let config = KnowtreeConfig::load(&path).unwrap();
    assert_eq!(config.knowledge.endpoint(), "https://en.wikipedia.org/w/api.php");
    assert_eq!(config.render.height, 800);
    assert_eq!(config.render.width, "100%");
    assert_eq!(config.llm.model, "gpt-4");

    let options = SessionOptions::from(&config);
    assert_eq!(options.top_k_results, 1);
    assert_eq!(options.history_capacity, Some(2));

    let model = ScriptedModel::new(&[]);
    let mut session = Session::new(
        &model,
        StaticWiki,
        Arc::new(MemorySink::new()) as Arc<dyn MessageSink>,
        options,
    );
    assert!(matches!(session.submit("tema"), Err(SessionError::NotSubscribed)));
}

#[test]
fn default_config_round_trips_through_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("knowtree").join("config.toml");
    KnowtreeConfig::default().save(&path).unwrap();
    let loaded = KnowtreeConfig::load_or_default(&path).unwrap();
    assert_eq!(loaded, KnowtreeConfig::default());
}
