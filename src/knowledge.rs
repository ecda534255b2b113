//! Encyclopedia lookup that grounds the mind-map prompt.
//!
//! [`WikipediaClient`] searches one Wikipedia language edition through the
//! MediaWiki API, then fetches a plain-text extract for each hit in search
//! order. [`compose_context`] turns the excerpts into a single bounded context
//! string for the generation prompt.

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::KnowledgeConfig;

/// Errors from the knowledge lookup.
#[derive(Debug, Error, Diagnostic)]
pub enum LookupError {
    #[error("knowledge lookup request failed: {message}")]
    #[diagnostic(
        code(knowtree::knowledge::request_failed),
        help("Check network connectivity and the configured Wikipedia language.")
    )]
    RequestFailed { message: String },

    #[error("knowledge base returned HTTP {status}")]
    #[diagnostic(
        code(knowtree::knowledge::status),
        help("The encyclopedia API rejected the request; retry later.")
    )]
    Status { status: u16 },

    #[error("failed to parse knowledge base response: {message}")]
    #[diagnostic(
        code(knowtree::knowledge::parse_error),
        help("The encyclopedia API returned an unexpected response format.")
    )]
    ParseError { message: String },
}

/// One article excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Excerpt {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            page_id: None,
            url: None,
        }
    }
}

/// A source of reference text for a topic.
pub trait KnowledgeBase {
    /// Excerpts for `topic`, most relevant first. No hits is `Ok(vec![])`.
    fn lookup(&self, topic: &str) -> Result<Vec<Excerpt>, LookupError>;
}

impl<K: KnowledgeBase + ?Sized> KnowledgeBase for &K {
    fn lookup(&self, topic: &str) -> Result<Vec<Excerpt>, LookupError> {
        (**self).lookup(topic)
    }
}

/// Join up to `max_results` excerpts into one context string, each summary
/// cut to `chars_max` characters.
pub fn compose_context(excerpts: &[Excerpt], max_results: usize, chars_max: usize) -> String {
    excerpts
        .iter()
        .take(max_results)
        .map(|e| {
            format!(
                "Page: {}\nSummary: {}",
                e.title,
                truncate_chars(e.summary.trim(), chars_max)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// At most `max` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// MediaWiki-backed knowledge base.
pub struct WikipediaClient {
    config: KnowledgeConfig,
    agent: ureq::Agent,
}

impl WikipediaClient {
    pub fn new(config: KnowledgeConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        Self { config, agent }
    }

    fn get(&self, params: &[(&str, &str)]) -> Result<String, LookupError> {
        let endpoint = self.config.endpoint();
        let mut req = self
            .agent
            .get(&endpoint)
            .query("format", "json")
            .query("formatversion", "2");
        for (k, v) in params {
            req = req.query(k, v);
        }
        match req.call() {
            Ok(resp) => resp.into_string().map_err(|e| LookupError::ParseError {
                message: e.to_string(),
            }),
            Err(ureq::Error::Status(status, _)) => Err(LookupError::Status { status }),
            Err(ureq::Error::Transport(transport)) => Err(LookupError::RequestFailed {
                message: transport.to_string(),
            }),
        }
    }

    fn search(&self, topic: &str) -> Result<Vec<SearchHit>, LookupError> {
        let limit = self.config.top_k_results.to_string();
        let body = self.get(&[
            ("action", "query"),
            ("list", "search"),
            ("srsearch", topic),
            ("srlimit", &limit),
            ("srprop", ""),
        ])?;
        parse_search(&body)
    }

    fn page(&self, title: &str) -> Result<Option<Excerpt>, LookupError> {
        let mut params = vec![
            ("action", "query"),
            ("prop", "extracts|info"),
            ("explaintext", "1"),
            ("redirects", "1"),
            ("titles", title),
        ];
        if self.config.load_all_available_meta {
            params.push(("inprop", "url"));
        }
        let body = self.get(&params)?;
        parse_page(&body, self.config.load_all_available_meta)
    }
}

impl KnowledgeBase for WikipediaClient {
    fn lookup(&self, topic: &str) -> Result<Vec<Excerpt>, LookupError> {
        let hits = self.search(topic)?;
        tracing::debug!(topic, hits = hits.len(), language = %self.config.language, "wikipedia search");

        let mut excerpts = Vec::with_capacity(hits.len());
        for hit in hits.iter().take(self.config.top_k_results) {
            if let Some(excerpt) = self.page(&hit.title)? {
                excerpts.push(excerpt);
            }
        }
        Ok(excerpts)
    }
}

impl std::fmt::Debug for WikipediaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikipediaClient")
            .field("endpoint", &self.config.endpoint())
            .field("top_k_results", &self.config.top_k_results)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct PageResponse {
    #[serde(default)]
    query: Option<PageQuery>,
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    pageid: Option<u64>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    missing: bool,
}

fn parse_search(body: &str) -> Result<Vec<SearchHit>, LookupError> {
    let parsed: SearchResponse = serde_json::from_str(body).map_err(|e| LookupError::ParseError {
        message: e.to_string(),
    })?;
    Ok(parsed.query.map(|q| q.search).unwrap_or_default())
}

/// First present page with a non-blank extract. `with_meta` keeps the page id
/// and URL.
fn parse_page(body: &str, with_meta: bool) -> Result<Option<Excerpt>, LookupError> {
    let parsed: PageResponse = serde_json::from_str(body).map_err(|e| LookupError::ParseError {
        message: e.to_string(),
    })?;
    Ok(parsed
        .query
        .and_then(|q| q.pages.into_iter().find(|p| !p.missing))
        .and_then(|p| {
            let summary = p.extract.filter(|s| !s.trim().is_empty())?;
            Some(Excerpt {
                title: p.title,
                summary,
                page_id: p.pageid.filter(|_| with_meta),
                url: p.fullurl.filter(|_| with_meta),
            })
        }))
}
