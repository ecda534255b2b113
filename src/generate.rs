//! Mind-map generation: one completion call with a fixed JSON-only prompt.

use crate::graph::MAX_PROMPTED_NODES;
use crate::llm::{CompletionModel, CompletionRequest, LlmError};

/// Build the generation prompt for `topic`, grounded on `context`.
pub fn mindmap_prompt(topic: &str, context: &str) -> String {
    format!(
        "\
Você é especialista em mapas mentais: árvores de conteúdos principais (\"nodes\") e suas conexões,
organizadas de forma didática.

Use as informações a seguir como contexto para o mapa mental:

{context}

1. Para cada conceito, informe o nome, a importância (número de 1 a 5) e o nível hierárquico (level).
2. Relacione os conceitos de forma coesa, refletindo a interdependência entre eles.
3. Siga uma hierarquia lógica: conceitos mais amplos no topo, subconceitos abaixo.
4. A saída deve ser JSON com exatamente duas chaves: \"nodes\" e \"edges\".
   - \"nodes\" é uma lista de objetos com \"id\", \"label\", \"importance\" e \"level\".
   - \"edges\" é uma lista de objetos com \"source\" e \"target\".
5. O JSON deve estar completo e válido, sem cortes.
6. Não escreva explicações nem texto antes ou depois do JSON, e não use blocos de código.
7. Não use indentação no JSON.
8. Use no máximo {MAX_PROMPTED_NODES} nodes.

Gere um mapa mental estruturado e detalhado para o tópico \"{topic}\"."
    )
}

/// Calls the model once at temperature 0 and returns the raw completion.
pub struct MapGenerator<M> {
    model: M,
    max_tokens: Option<u32>,
}

impl<M: CompletionModel> MapGenerator<M> {
    pub fn new(model: M, max_tokens: Option<u32>) -> Self {
        Self { model, max_tokens }
    }

    pub fn generate(&self, topic: &str, context: &str) -> Result<String, LlmError> {
        let prompt = mindmap_prompt(topic, context);
        let request = CompletionRequest::deterministic(&prompt).with_max_tokens(self.max_tokens);
        let raw = self.model.complete(&request)?;
        tracing::info!(
            topic,
            model = self.model.model_name(),
            response_chars = raw.chars().count(),
            "mind map generated"
        );
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn prompt_embeds_topic_context_and_contract() {
        let prompt = mindmap_prompt("Sistema Solar", "Page: Sol\nSummary: Estrela.");
        assert!(prompt.contains("\"Sistema Solar\""));
        assert!(prompt.contains("Page: Sol\nSummary: Estrela."));
        assert!(prompt.contains("\"nodes\" e \"edges\""));
        assert!(prompt.contains("\"source\" e \"target\""));
        assert!(prompt.contains("no máximo 30 nodes"));
    }

    #[test]
    fn prompt_tolerates_empty_context() {
        let prompt = mindmap_prompt("Vazio", "");
        assert!(prompt.contains("contexto para o mapa mental:\n\n\n\n1."));
    }

    struct Echo {
        max_tokens: Cell<Option<Option<u32>>>,
    }

    impl CompletionModel for Echo {
        fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
            self.max_tokens.set(Some(request.max_tokens));
            Ok(format!("{{\"nodes\":[],\"edges\":[]}} <- {}", request.prompt.len()))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn generate_returns_raw_text_uncapped_by_default() {
        let model = Echo {
            max_tokens: Cell::new(None),
        };
        let raw = MapGenerator::new(&model, None).generate("Tema", "").unwrap();
        assert!(raw.starts_with("{\"nodes\":[],\"edges\":[]}"));
        assert_eq!(model.max_tokens.get(), Some(None));
    }
}
