use loa_core::config::{Config, Tunables};
use loa_core::domain::ConversationTurn;
use loa_core::error::AppError;
use loa_core::validate;
use serde::{Deserialize, Serialize};

use crate::embeddings::{with_retries, Embedder, HttpEmbedder, DEFAULT_RETRIES};
use crate::index::{HttpIndex, RetrievalHit, VectorIndex};
use crate::llm::{ChatModel, HttpChatModel};
use crate::retrieve;
use crate::triage::{TriageDecision, TriageEngine, TriageOutcome, TriageRules};

pub mod prompts;

/// One cited source of a grounded answer. Wire field names follow the
/// query-endpoint contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub law_name: String,
    pub article: Option<String>,
    pub category: String,
    pub url: Option<String>,
    pub similarity: f32,
}

impl Citation {
    fn from_hit(hit: &RetrievalHit) -> Self {
        Self {
            law_name: hit.title.clone(),
            article: hit.article_number.clone(),
            category: hit.category.clone(),
            url: hit.url.clone(),
            similarity: hit.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantResponse {
    pub text: String,
    pub tokens_used: u32,
    pub rag_enabled: bool,
    pub sources: Vec<Citation>,
    pub triage: TriageDecision,
}

/// The response assembler: one query in, one structured response out.
/// Retrieval failures degrade to a no-RAG triage pass; model failures
/// surface to the caller.
pub struct Assistant {
    embedder: Box<dyn Embedder>,
    index: Box<dyn VectorIndex>,
    model: Box<dyn ChatModel>,
    triage: TriageEngine,
    tunables: Tunables,
}

impl Assistant {
    pub fn new(
        embedder: Box<dyn Embedder>,
        index: Box<dyn VectorIndex>,
        model: Box<dyn ChatModel>,
        triage: TriageEngine,
        tunables: Tunables,
    ) -> Self {
        Self {
            embedder,
            index,
            model,
            triage,
            tunables,
        }
    }

    /// Wire the HTTP-backed components from configuration. Missing keys
    /// surface as fatal configuration errors here, at startup.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let timeout = std::time::Duration::from_secs(config.tunables.request_timeout_secs);
        let embedder = HttpEmbedder::new(
            &config.embeddings_url,
            config.require_embeddings_key()?,
            &config.embedding_model,
        );
        let index = HttpIndex::new(
            config.require_vector_index_url()?,
            config.require_vector_index_key()?,
        );
        let model = HttpChatModel::new(
            &config.completions_url,
            config.require_completions_key()?,
            &config.completion_model,
        )
        .with_timeout(timeout);
        let triage = TriageEngine::new(TriageRules::bundled()?, &config.tunables)?;

        Ok(Self::new(
            Box::new(embedder),
            Box::new(index),
            Box::new(model),
            triage,
            config.tunables.clone(),
        ))
    }

    /// Answer one user turn given the prior conversation (without the
    /// current turn; it is appended to the model messages exactly once).
    pub fn answer(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<AssistantResponse, AppError> {
        let q = validate::sanitize_message(message, &self.tunables)?;
        validate::validate_history(history, &self.tunables)?;

        let hits = match with_retries(DEFAULT_RETRIES, || {
            retrieve::search_hits(
                self.embedder.as_ref(),
                self.index.as_ref(),
                &q,
                self.tunables.top_k,
                None,
            )
        }) {
            Ok(hits) => hits,
            Err(e) => {
                // Degrade to no-RAG; never fabricate context.
                tracing::warn!(error = %e, "retrieval unavailable; continuing without context");
                Vec::new()
            }
        };

        let decision = self.triage.classify(&q, &hits, history);

        match decision.outcome {
            TriageOutcome::RespondWithSources => self.grounded_answer(&q, history, decision),
            _ => Ok(canned_answer(decision)),
        }
    }

    fn grounded_answer(
        &self,
        q: &str,
        history: &[ConversationTurn],
        decision: TriageDecision,
    ) -> Result<AssistantResponse, AppError> {
        let system = prompts::grounded_system_prompt(&decision.sources_found);

        let mut messages: Vec<ConversationTurn> = history.to_vec();
        messages.push(ConversationTurn::user(q));

        let completion = with_retries(DEFAULT_RETRIES, || {
            self.model.complete(&system, &messages)
        })?;

        let sources = decision.sources_found.iter().map(Citation::from_hit).collect();
        Ok(AssistantResponse {
            text: completion.text,
            tokens_used: completion.tokens_used,
            rag_enabled: true,
            sources,
            triage: decision,
        })
    }
}

/// Canned outcomes never touch the language model and never carry
/// citations.
fn canned_answer(decision: TriageDecision) -> AssistantResponse {
    // The engine supplies a canned response for every non-grounded outcome.
    let text = decision.suggested_response.clone().unwrap_or_default();
    AssistantResponse {
        text,
        tokens_used: 0,
        rag_enabled: false,
        sources: Vec::new(),
        triage: decision,
    }
}
