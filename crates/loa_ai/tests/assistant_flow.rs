use std::sync::{Arc, Mutex};

use loa_ai::assistant::Assistant;
use loa_ai::embeddings::Embedder;
use loa_ai::index::{IndexStats, MetadataFilter, RetrievalHit, VectorIndex};
use loa_ai::llm::{ChatCompletion, ChatModel};
use loa_ai::triage::{TriageEngine, TriageOutcome, TriageRules};
use loa_core::config::Tunables;
use loa_core::domain::{ConversationTurn, EmbeddedChunk};
use loa_core::error::AppError;
use pretty_assertions::assert_eq;

struct FixedEmbedder;

impl Embedder for FixedEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn model(&self) -> &str {
        "mock"
    }
}

struct StaticIndex {
    hits: Vec<RetrievalHit>,
}

impl VectorIndex for StaticIndex {
    fn upsert(&self, _chunks: &[EmbeddedChunk]) -> Result<usize, AppError> {
        Ok(0)
    }

    fn search(
        &self,
        _vector: &[f32],
        top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalHit>, AppError> {
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }

    fn stats(&self) -> Result<IndexStats, AppError> {
        Ok(IndexStats {
            vectors: self.hits.len() as u64,
            dims: Some(2),
        })
    }
}

struct FailingIndex;

impl VectorIndex for FailingIndex {
    fn upsert(&self, _chunks: &[EmbeddedChunk]) -> Result<usize, AppError> {
        Err(AppError::new("AI_INDEX_BACKEND_FAILED", "index down"))
    }

    fn search(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalHit>, AppError> {
        Err(AppError::new("AI_SEARCH_FAILED", "index down").with_retryable(true))
    }

    fn stats(&self) -> Result<IndexStats, AppError> {
        Err(AppError::new("AI_INDEX_BACKEND_FAILED", "index down"))
    }
}

type RecordedCall = (String, Vec<ConversationTurn>);

struct RecordingModel {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    reply: String,
}

impl ChatModel for RecordingModel {
    fn complete(
        &self,
        system: &str,
        messages: &[ConversationTurn],
    ) -> Result<ChatCompletion, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), messages.to_vec()));
        Ok(ChatCompletion {
            text: self.reply.clone(),
            tokens_used: 42,
        })
    }
}

struct FailingModel;

impl ChatModel for FailingModel {
    fn complete(
        &self,
        _system: &str,
        _messages: &[ConversationTurn],
    ) -> Result<ChatCompletion, AppError> {
        Err(AppError::new("AI_COMPLETION_FAILED", "model unavailable"))
    }
}

fn finiquito_hit(score: f32) -> RetrievalHit {
    RetrievalHit {
        chunk_id: "guia_finiquito_0".to_string(),
        score,
        title: "Guía sobre Finiquito".to_string(),
        category: "laboral".to_string(),
        article_number: None,
        url: Some("https://www.dt.gob.cl/finiquito".to_string()),
        source_id: "guia_finiquito".to_string(),
        text: "El finiquito debe constar por escrito y ratificarse ante ministro de fe."
            .to_string(),
    }
}

fn assistant_with(
    index: Box<dyn VectorIndex>,
    model: Box<dyn ChatModel>,
) -> Assistant {
    let tunables = Tunables::default();
    let triage = TriageEngine::new(TriageRules::bundled().unwrap(), &tunables).unwrap();
    Assistant::new(Box::new(FixedEmbedder), index, model, triage, tunables)
}

#[test]
fn grounded_answer_calls_the_model_with_context_and_history() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let model = RecordingModel {
        calls: Arc::clone(&calls),
        reply: "El finiquito es el documento de término laboral [Fuente 1].".to_string(),
    };
    let assistant = assistant_with(
        Box::new(StaticIndex {
            hits: vec![finiquito_hit(0.88)],
        }),
        Box::new(model),
    );

    let history = vec![
        ConversationTurn::user("hola"),
        ConversationTurn::assistant("Hola, ¿en qué te puedo orientar?"),
    ];
    let resp = assistant.answer("¿Qué es el finiquito?", &history).unwrap();

    assert!(resp.rag_enabled);
    assert_eq!(resp.tokens_used, 42);
    assert_eq!(resp.sources.len(), 1);
    assert_eq!(resp.sources[0].law_name, "Guía sobre Finiquito");
    assert_eq!(resp.sources[0].category, "laboral");
    assert_eq!(resp.triage.outcome, TriageOutcome::RespondWithSources);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (system, messages) = &calls[0];
    assert!(system.contains("CONTEXTO LEGAL RELEVANTE"));
    assert!(system.contains("[Fuente 1] Guía sobre Finiquito"));
    // History is passed through and the current turn is appended exactly once.
    assert_eq!(messages.len(), history.len() + 1);
    assert_eq!(messages.last().unwrap().content, "¿Qué es el finiquito?");
}

#[test]
fn canned_outcomes_never_call_the_model_and_carry_no_sources() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let model = RecordingModel {
        calls: Arc::clone(&calls),
        reply: "nunca debería generarse".to_string(),
    };
    // Even with high-scoring hits available, the guard rule wins.
    let assistant = assistant_with(
        Box::new(StaticIndex {
            hits: vec![finiquito_hit(0.92)],
        }),
        Box::new(model),
    );

    let resp = assistant
        .answer("Me despidieron sin finiquito, ¿qué hago?", &[])
        .unwrap();

    assert_eq!(resp.triage.outcome, TriageOutcome::RequiresLawyer);
    assert!(!resp.rag_enabled);
    assert_eq!(resp.tokens_used, 0);
    assert!(resp.sources.is_empty());
    assert!(!resp.text.is_empty());
    assert_eq!(calls.lock().unwrap().len(), 0);
}

#[test]
fn search_failure_degrades_to_no_info_instead_of_grounded() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let model = RecordingModel {
        calls: Arc::clone(&calls),
        reply: "sin uso".to_string(),
    };
    let assistant = assistant_with(Box::new(FailingIndex), Box::new(model));

    let resp = assistant.answer("¿Qué es el finiquito?", &[]).unwrap();

    assert_eq!(resp.triage.outcome, TriageOutcome::NoInfoAvailable);
    assert!(!resp.rag_enabled);
    assert!(resp.sources.is_empty());
    assert_eq!(calls.lock().unwrap().len(), 0);
}

#[test]
fn model_failure_surfaces_as_an_error() {
    let assistant = assistant_with(
        Box::new(StaticIndex {
            hits: vec![finiquito_hit(0.88)],
        }),
        Box::new(FailingModel),
    );

    let err = assistant.answer("¿Qué es el finiquito?", &[]).unwrap_err();
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
}

#[test]
fn partial_info_hit_returns_the_canned_template() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let model = RecordingModel {
        calls: Arc::clone(&calls),
        reply: "sin uso".to_string(),
    };
    let assistant = assistant_with(
        Box::new(StaticIndex {
            hits: vec![finiquito_hit(0.749)],
        }),
        Box::new(model),
    );

    let resp = assistant.answer("¿Qué es el finiquito?", &[]).unwrap();

    assert_eq!(resp.triage.outcome, TriageOutcome::NoInfoAvailable);
    assert!(resp.text.contains("Guía sobre Finiquito"));
    assert!(resp.sources.is_empty());
    assert_eq!(calls.lock().unwrap().len(), 0);
}

#[test]
fn invalid_input_is_rejected_before_any_call() {
    let assistant = assistant_with(
        Box::new(FailingIndex),
        Box::new(FailingModel),
    );

    let err = assistant.answer("", &[]).unwrap_err();
    assert_eq!(err.code, "INPUT_MESSAGE_EMPTY");

    let err = assistant.answer(" \u{0000}\u{0007} ", &[]).unwrap_err();
    assert_eq!(err.code, "INPUT_MESSAGE_EMPTY");

    let long_history: Vec<ConversationTurn> = (0..51)
        .map(|i| ConversationTurn::user(format!("turno {i}")))
        .collect();
    let err = assistant.answer("hola", &long_history).unwrap_err();
    assert_eq!(err.code, "INPUT_HISTORY_TOO_LONG");
}
