//! Rich diagnostic error types for knowtree.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know what went wrong and what
//! to try next. Extraction errors always carry the raw model response so it can
//! be shown verbatim for inspection.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::knowledge::LookupError;
use crate::llm::LlmError;
use crate::paths::PathError;
use crate::render::html::ExportError;

/// Top-level error type for knowtree.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum KnowtreeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Paths(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),

    #[error("failed to read {path}")]
    #[diagnostic(
        code(knowtree::input),
        help("Pass a file holding a saved model response or graph JSON.")
    )]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("terminal I/O failed")]
    #[diagnostic(code(knowtree::terminal))]
    Terminal(#[from] std::io::Error),

    #[error("failed to serialize output: {message}")]
    #[diagnostic(code(knowtree::output))]
    Output { message: String },
}

impl KnowtreeError {
    /// Session errors reach the session's message sink before they are
    /// returned, so the front end has already shown them.
    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl From<serde_json::Error> for KnowtreeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Output {
            message: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExtractionError {
    #[error("the model response contains no JSON object")]
    #[diagnostic(
        code(knowtree::extract::no_json),
        help(
            "The model answered in prose instead of JSON. \
             Inspect the raw response below and try again, possibly with a more specific topic."
        )
    )]
    NoJsonFound { raw: String },

    #[error("the model response contains malformed JSON: {message}")]
    #[diagnostic(
        code(knowtree::extract::malformed_json),
        help(
            "The JSON payload could not be parsed. A truncated completion usually means \
             the map was too large for the model's output budget."
        )
    )]
    MalformedJson { message: String, raw: String },

    #[error("the model JSON is missing the \"{key}\" key")]
    #[diagnostic(
        code(knowtree::extract::missing_key),
        help("A mind map must be a JSON object with both \"nodes\" and \"edges\".")
    )]
    MissingKey { key: &'static str, raw: String },

    #[error("the model JSON has an invalid \"{key}\" value: {message}")]
    #[diagnostic(
        code(knowtree::extract::invalid_shape),
        help(
            "\"nodes\" must be a list of objects with an \"id\"; \
             \"edges\" must be a list of objects with \"source\" and \"target\"."
        )
    )]
    InvalidShape {
        key: &'static str,
        message: String,
        raw: String,
    },
}

impl ExtractionError {
    /// The raw model response that failed extraction.
    pub fn raw_text(&self) -> &str {
        match self {
            ExtractionError::NoJsonFound { raw }
            | ExtractionError::MalformedJson { raw, .. }
            | ExtractionError::MissingKey { raw, .. }
            | ExtractionError::InvalidShape { raw, .. } => raw,
        }
    }
}

// ---------------------------------------------------------------------------
// History errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum HistoryError {
    #[error("history index {index} is out of range (history holds {len} entries)")]
    #[diagnostic(
        code(knowtree::history::index_out_of_range),
        help("Pick an entry between 0 and the number of past generations minus one.")
    )]
    IndexOutOfRange { index: usize, len: usize },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("the topic is empty")]
    #[diagnostic(
        code(knowtree::session::empty_topic),
        help("Type a subject to build a mind map for.")
    )]
    EmptyTopic,

    #[error("this session has no active subscription")]
    #[diagnostic(
        code(knowtree::session::not_subscribed),
        help("Set `subscribed = true` under [account] in the configuration file.")
    )]
    NotSubscribed,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    History(#[from] HistoryError),
}

pub type KnowtreeResult<T> = std::result::Result<T, KnowtreeError>;
pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_session_errors_count_as_reported() {
        assert!(KnowtreeError::from(SessionError::EmptyTopic).is_reported());

        let input = KnowtreeError::Input {
            path: "resposta.txt".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!input.is_reported());
        assert!(!KnowtreeError::from(HistoryError::IndexOutOfRange { index: 3, len: 1 }).is_reported());
    }

    #[test]
    fn umbrella_keeps_subsystem_code() {
        let err = KnowtreeError::from(ExtractionError::NoJsonFound { raw: String::new() });
        let code = miette::Diagnostic::code(&err).map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("knowtree::extract::no_json"));
    }
}
