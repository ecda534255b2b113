//! Query refinement: rewrite the user's topic into an encyclopedia-friendly one.

use crate::llm::{CompletionModel, CompletionRequest, LlmError};

const REFINE_INSTRUCTION: &str = "\
Você é um assistente de pesquisa que revisa a consulta do usuário para uma busca na Wikipedia.
Corrija a ortografia para a língua portuguesa, se necessário.
Torne a consulta objetiva, de modo que possa ser pesquisada na Wikipedia.
Responda apenas com o tema ajustado, sem explicações.";

/// Build the refinement prompt for `topic`.
pub fn refinement_prompt(topic: &str) -> String {
    format!("{REFINE_INSTRUCTION}\n\nConsulta do usuário: \"{topic}\"")
}

/// Outcome of a refinement call.
#[derive(Debug)]
pub struct Refinement {
    /// The topic to look up and generate for.
    pub topic: String,
    /// Set when refinement was skipped and `topic` is the original.
    pub skipped: Option<LlmError>,
}

impl Refinement {
    fn unchanged(topic: &str, reason: Option<LlmError>) -> Self {
        Self {
            topic: topic.to_string(),
            skipped: reason,
        }
    }
}

/// Sends the topic through the model with a short, deterministic budget.
pub struct QueryRefiner<M> {
    model: M,
    max_tokens: u32,
}

impl<M: CompletionModel> QueryRefiner<M> {
    pub fn new(model: M, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    /// Refine `topic`. A missing credential degrades to the original topic;
    /// other model failures propagate.
    pub fn refine(&self, topic: &str) -> Result<Refinement, LlmError> {
        let prompt = refinement_prompt(topic);
        let request =
            CompletionRequest::deterministic(&prompt).with_max_tokens(Some(self.max_tokens));

        match self.model.complete(&request) {
            Ok(text) => {
                let refined = clean_refinement(&text);
                if refined.is_empty() {
                    tracing::warn!(topic, "model returned an empty refinement, keeping topic");
                    return Ok(Refinement::unchanged(topic, None));
                }
                tracing::info!(topic, refined = %refined, "topic refined");
                Ok(Refinement {
                    topic: refined,
                    skipped: None,
                })
            }
            Err(e @ LlmError::MissingCredential { .. }) => {
                tracing::warn!(error = %e, "refinement skipped");
                Ok(Refinement::unchanged(topic, Some(e)))
            }
            Err(e) => Err(e),
        }
    }
}

/// The whole reply, trimmed, without wrapping quotes. A reply wrapped over
/// several lines is rejoined with single spaces.
fn clean_refinement(text: &str) -> String {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let line = joined.as_str();

    const QUOTES: [(char, char); 5] = [
        ('"', '"'),
        ('\'', '\''),
        ('“', '”'),
        ('«', '»'),
        ('`', '`'),
    ];
    for (open, close) in QUOTES {
        if let Some(inner) = line
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    line.to_string()
}
