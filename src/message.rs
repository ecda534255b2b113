//! Structured message protocol for session output.
//!
//! A [`Session`](crate::session::Session) never prints. Every stage of a
//! generation emits a typed [`Message`] to a [`MessageSink`]: styled lines on
//! the terminal, newline-delimited JSON, or an in-memory buffer drained by the
//! TUI and by tests.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

// ── Message types ───────────────────────────────────────────────────────

/// Degradations that let a generation continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Notice {
    /// The refiner could not run; the original topic was used.
    RefinementSkipped { reason: String },
    /// The knowledge base failed; generation ran without context.
    LookupFailed { reason: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RefinementSkipped { reason } => {
                write!(f, "refinement skipped, using the topic as typed: {reason}")
            }
            Self::LookupFailed { reason } => {
                write!(f, "knowledge lookup failed, generating without context: {reason}")
            }
        }
    }
}

/// A structured message emitted by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Pipeline progress.
    Stage {
        stage: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A degradation the user should know about.
    Notice { notice: Notice },
    /// Structural problem in an accepted graph.
    Issue { text: String },
    /// A generation (or history pick) became current.
    MapReady {
        query: String,
        refined_query: String,
        nodes: usize,
        edges: usize,
    },
    /// System status or informational message.
    System { text: String },
    /// Error message, with the model output that caused it when there is one.
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        help: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
}

// ── MessageSink trait ───────────────────────────────────────────────────

/// A destination for session messages.
pub trait MessageSink: Send + Sync {
    fn emit(&self, msg: &Message);
}

// ── StdoutSink ──────────────────────────────────────────────────────────

/// Plain terminal output: progress on stdout, errors and notices on stderr.
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn emit(&self, msg: &Message) {
        match msg {
            Message::Stage { stage, detail } => match detail {
                Some(d) => println!("[{stage}] {d}"),
                None => println!("[{stage}]"),
            },
            Message::Notice { notice } => eprintln!("[notice] {notice}"),
            Message::Issue { text } => eprintln!("[issue] {text}"),
            Message::MapReady {
                query,
                refined_query,
                nodes,
                edges,
            } => {
                if query == refined_query {
                    println!("[map] {query}: {nodes} nodes, {edges} edges");
                } else {
                    println!("[map] {query} ({refined_query}): {nodes} nodes, {edges} edges");
                }
            }
            Message::System { text } => println!("{text}"),
            Message::Error {
                code,
                message,
                help,
                raw,
            } => {
                eprintln!("[error:{code}] {message}");
                if let Some(h) = help {
                    eprintln!("  help: {h}");
                }
                if let Some(r) = raw {
                    eprintln!("  model output:\n{r}");
                }
            }
        }
    }
}

// ── JsonSink ────────────────────────────────────────────────────────────

/// Newline-delimited JSON on stdout.
pub struct JsonSink;

impl MessageSink for JsonSink {
    fn emit(&self, msg: &Message) {
        if let Ok(json) = serde_json::to_string(msg) {
            println!("{json}");
        }
    }
}

// ── MemorySink ──────────────────────────────────────────────────────────

/// Buffers messages until drained.
pub struct MemorySink {
    pending: Mutex<Vec<Message>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        // A panic while pushing cannot leave the Vec half-written.
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of buffered messages.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Take all buffered messages.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSink for MemorySink {
    fn emit(&self, msg: &Message) {
        self.lock().push(msg.clone());
    }
}

// ── Convenience constructors ────────────────────────────────────────────

impl Message {
    pub fn stage(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn notice(notice: Notice) -> Self {
        Self::Notice { notice }
    }

    /// Error message built from a diagnostic, carrying its code and help.
    pub fn from_diagnostic(diag: &dyn miette::Diagnostic, raw: Option<&str>) -> Self {
        Self::Error {
            code: diag
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "knowtree".to_string()),
            message: diag.to_string(),
            help: diag.help().map(|h| h.to_string()),
            raw: raw.map(str::to_string),
        }
    }
}
