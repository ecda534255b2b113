// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # knowtree
//!
//! Mind maps for any topic, generated by a language model and grounded in
//! Wikipedia.
//!
//! ## Architecture
//!
//! - **Refinement** (`refine`): rewrite the topic into an encyclopedia-friendly query
//! - **Knowledge** (`knowledge`): MediaWiki search and bounded excerpt context
//! - **Generation** (`generate`): one JSON-only completion per topic
//! - **Extraction** (`extract`): locate, parse and coerce the JSON into a [`graph::Graph`]
//! - **History** (`history`): append-only log of past maps
//! - **Rendering** (`render`): deterministic size/color mapping, vis-network HTML
//! - **Session** (`session`): the submit and history-pick state machine
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use knowtree::config::KnowtreeConfig;
//! use knowtree::knowledge::WikipediaClient;
//! use knowtree::llm::OpenAiClient;
//! use knowtree::message::StdoutSink;
//! use knowtree::session::{Session, SessionOptions};
//!
//! let config = KnowtreeConfig::default();
//! let mut session = Session::new(
//!     OpenAiClient::new(config.llm.clone()),
//!     WikipediaClient::new(config.knowledge.clone()),
//!     Arc::new(StdoutSink),
//!     SessionOptions::from(&config),
//! );
//! let entry = session.submit("Sistema Solar").unwrap();
//! println!("{} nodes", entry.response.nodes.len());
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod generate;
pub mod graph;
pub mod history;
pub mod knowledge;
pub mod llm;
pub mod message;
pub mod paths;
pub mod refine;
pub mod render;
pub mod session;
pub mod tui;
