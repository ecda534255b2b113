//! One user's session: the submit and history-pick state machine.
//!
//! A [`Session`] owns the [`SessionState`] for its lifetime. `submit` runs the
//! whole pipeline (refine, look up, generate, extract) and only on success
//! appends to history and promotes the new entry to current. Any failure
//! leaves the current map exactly as it was; the raw completion is kept in
//! `last_raw_response` so the user can inspect what the model produced.

use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;

use crate::config::KnowtreeConfig;
use crate::error::{SessionError, SessionResult};
use crate::extract::extract;
use crate::generate::MapGenerator;
use crate::graph::Graph;
use crate::history::{History, HistoryEntry};
use crate::knowledge::{KnowledgeBase, compose_context};
use crate::llm::CompletionModel;
use crate::message::{Message, MessageSink, Notice};
use crate::refine::QueryRefiner;
use crate::render::{LayoutConfig, Rendered, render};

/// Tunables for one session, usually taken from [`KnowtreeConfig`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub refine_max_tokens: u32,
    pub generate_max_tokens: Option<u32>,
    pub top_k_results: usize,
    pub doc_content_chars_max: usize,
    pub history_capacity: Option<usize>,
    pub subscribed: bool,
    pub account_email: Option<String>,
}

impl From<&KnowtreeConfig> for SessionOptions {
    fn from(config: &KnowtreeConfig) -> Self {
        Self {
            refine_max_tokens: config.llm.refine_max_tokens,
            generate_max_tokens: config.llm.generate_max_tokens,
            top_k_results: config.knowledge.top_k_results,
            doc_content_chars_max: config.knowledge.doc_content_chars_max,
            history_capacity: config.history.capacity,
            subscribed: config.account.subscribed,
            account_email: config.account.email.clone(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&KnowtreeConfig::default())
    }
}

/// Everything the display surfaces read.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Topic of the displayed map, as typed. Empty before the first map.
    pub current_query: String,
    pub current_refined_query: String,
    pub current_graph: Option<Graph>,
    pub current_knowledge_context: String,
    /// Text of the most recent generation call, successful or not.
    pub last_raw_response: Option<String>,
    pub history: History,
    pub is_subscribed: bool,
    pub account_email: Option<String>,
}

impl SessionState {
    fn new(options: &SessionOptions) -> Self {
        Self {
            history: History::bounded(options.history_capacity),
            is_subscribed: options.subscribed,
            account_email: options.account_email.clone(),
            ..Default::default()
        }
    }

    fn promote(&mut self, entry: &HistoryEntry) {
        self.current_query = entry.query.clone();
        self.current_refined_query = entry.refined_query.clone();
        self.current_graph = Some(entry.response.clone());
        self.current_knowledge_context = entry.knowledge_context.clone();
    }
}

/// Wires the model and knowledge base into the generation pipeline.
pub struct Session<M, K> {
    model: M,
    knowledge: K,
    sink: Arc<dyn MessageSink>,
    options: SessionOptions,
    state: SessionState,
}

impl<M: CompletionModel, K: KnowledgeBase> Session<M, K> {
    pub fn new(model: M, knowledge: K, sink: Arc<dyn MessageSink>, options: SessionOptions) -> Self {
        let state = SessionState::new(&options);
        Self {
            model,
            knowledge,
            sink,
            options,
            state,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.state.history
    }

    pub fn set_subscribed(&mut self, subscribed: bool) {
        self.state.is_subscribed = subscribed;
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Generate a map for `topic`; on success it becomes current and is
    /// appended to history.
    pub fn submit(&mut self, topic: &str) -> SessionResult<Arc<HistoryEntry>> {
        if !self.state.is_subscribed {
            return Err(self.report(SessionError::NotSubscribed));
        }
        let topic: String = topic.trim().nfc().collect();
        if topic.is_empty() {
            return Err(self.report(SessionError::EmptyTopic));
        }
        tracing::info!(topic = %topic, "generation requested");

        self.sink.emit(&Message::stage("refine", topic.as_str()));
        let refiner = QueryRefiner::new(&self.model, self.options.refine_max_tokens);
        let refinement = match refiner.refine(&topic) {
            Ok(r) => r,
            Err(e) => return Err(self.report(e.into())),
        };
        if let Some(reason) = refinement.skipped {
            self.sink.emit(&Message::notice(Notice::RefinementSkipped {
                reason: reason.to_string(),
            }));
        }
        let refined = refinement.topic;

        self.sink.emit(&Message::stage("lookup", refined.as_str()));
        let context = match self.knowledge.lookup(&refined) {
            Ok(excerpts) => {
                tracing::debug!(topic = %refined, excerpts = excerpts.len(), "knowledge found");
                compose_context(
                    &excerpts,
                    self.options.top_k_results,
                    self.options.doc_content_chars_max,
                )
            }
            Err(e) => {
                tracing::warn!(topic = %refined, error = %e, "knowledge lookup failed");
                self.sink.emit(&Message::notice(Notice::LookupFailed {
                    reason: e.to_string(),
                }));
                String::new()
            }
        };

        self.sink.emit(&Message::stage("generate", refined.as_str()));
        let generator = MapGenerator::new(&self.model, self.options.generate_max_tokens);
        let raw = match generator.generate(&refined, &context) {
            Ok(raw) => raw,
            Err(e) => return Err(self.report(e.into())),
        };
        self.state.last_raw_response = Some(raw.clone());

        let extraction = match extract(&raw) {
            Ok(x) => x,
            Err(e) => {
                tracing::warn!(topic = %refined, error = %e, "mind-map extraction failed");
                return Err(self.report(e.into()));
            }
        };

        for issue in extraction.graph.issues() {
            tracing::warn!(topic = %refined, %issue, "mind-map issue");
            self.sink.emit(&Message::Issue {
                text: issue.to_string(),
            });
        }

        let entry = self.state.history.append(HistoryEntry::new(
            topic,
            refined,
            extraction.graph,
            context,
        ));
        self.state.promote(&entry);
        tracing::info!(
            query = %entry.query,
            refined = %entry.refined_query,
            nodes = entry.response.nodes.len(),
            edges = entry.response.edges.len(),
            history = self.state.history.len(),
            "mind map ready"
        );
        self.announce(&entry);
        Ok(entry)
    }

    /// Make history entry `index` current. History itself is unchanged.
    pub fn pick(&mut self, index: usize) -> SessionResult<Arc<HistoryEntry>> {
        let entry = match self.state.history.select(index) {
            Ok(entry) => entry,
            Err(e) => return Err(self.report(e.into())),
        };
        self.state.promote(&entry);
        tracing::debug!(index, query = %entry.query, "history entry selected");
        self.announce(&entry);
        Ok(entry)
    }

    /// Visual form of the current map.
    pub fn render(&self, layout: &LayoutConfig) -> Rendered {
        render(self.state.current_graph.as_ref(), layout)
    }

    fn announce(&self, entry: &HistoryEntry) {
        self.sink.emit(&Message::MapReady {
            query: entry.query.clone(),
            refined_query: entry.refined_query.clone(),
            nodes: entry.response.nodes.len(),
            edges: entry.response.edges.len(),
        });
    }

    fn report(&self, err: SessionError) -> SessionError {
        let raw = match &err {
            SessionError::Extraction(e) => Some(e.raw_text()),
            _ => None,
        };
        self.sink.emit(&Message::from_diagnostic(&err, raw));
        err
    }
}

impl<M, K> std::fmt::Debug for Session<M, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
