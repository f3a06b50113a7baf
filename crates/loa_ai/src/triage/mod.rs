use loa_core::config::Tunables;
use loa_core::domain::{ConversationTurn, SpecialtyTag};
use loa_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::index::RetrievalHit;

pub mod history;
pub mod rules;
pub mod specialty;

pub use history::{PhraseOfferDetector, PriorOfferDetector};
pub use rules::{CompiledRules, ResponseTemplates, TriageRules};

/// The decision modes of the anti-hallucination gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriageOutcome {
    RespondWithSources,
    NoInfoAvailable,
    RequiresLawyer,
    UrgentMatter,
    SensitiveTopic,
    DirectLawyerRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageDecision {
    pub outcome: TriageOutcome,
    pub confidence: f32,
    pub reason: String,
    pub suggested_response: Option<String>,
    pub suggested_specialties: Vec<SpecialtyTag>,
    pub sources_found: Vec<RetrievalHit>,
}

/// The guard rules, in strict priority order. Each one is a predicate over
/// the turn; the dispatcher walks them in declared order and the first
/// match wins, before retrieval quality is even considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardRule {
    DirectLawyerRequest,
    UrgentMatter,
    SensitiveTopic,
    FormalAdvice,
    ConcreteProblem,
}

const GUARD_ORDER: [GuardRule; 5] = [
    GuardRule::DirectLawyerRequest,
    GuardRule::UrgentMatter,
    GuardRule::SensitiveTopic,
    GuardRule::FormalAdvice,
    GuardRule::ConcreteProblem,
];

impl GuardRule {
    fn matches(&self, ctx: &TurnContext<'_>, engine: &TriageEngine) -> bool {
        match self {
            GuardRule::DirectLawyerRequest => {
                (ctx.is_affirmation
                    && engine.detector.prior_turn_offered_lawyer(ctx.history))
                    || engine.rules.matches_direct_request(&ctx.lowered)
            }
            GuardRule::UrgentMatter => engine.rules.matches_urgency(&ctx.lowered),
            GuardRule::SensitiveTopic => engine.rules.matches_sensitive(&ctx.lowered),
            GuardRule::FormalAdvice => engine.rules.matches_formal_advice(&ctx.lowered),
            GuardRule::ConcreteProblem => engine.rules.matches_concrete_problem(&ctx.lowered),
        }
    }
}

struct TurnContext<'a> {
    lowered: String,
    is_affirmation: bool,
    history: &'a [ConversationTurn],
}

/// Rule-ordered, first-match-wins triage. Deterministic for a fixed
/// `(q, hits, history)` and never fails: a missing retrieval result is the
/// same as an empty one.
pub struct TriageEngine {
    rules: CompiledRules,
    detector: Box<dyn PriorOfferDetector>,
    similarity_threshold: f32,
    partial_info_threshold: f32,
}

impl TriageEngine {
    pub fn new(rules: TriageRules, tunables: &Tunables) -> Result<Self, AppError> {
        let detector = PhraseOfferDetector::new(&rules.lawyer_offer_phrases);
        let compiled = rules.compile()?;
        Ok(Self {
            rules: compiled,
            detector: Box::new(detector),
            similarity_threshold: tunables.similarity_threshold,
            partial_info_threshold: tunables.partial_info_threshold,
        })
    }

    pub fn with_detector(mut self, detector: Box<dyn PriorOfferDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn classify(
        &self,
        q: &str,
        hits: &[RetrievalHit],
        history: &[ConversationTurn],
    ) -> TriageDecision {
        let lowered = q.to_lowercase();
        let ctx = TurnContext {
            is_affirmation: self.rules.is_affirmation(&lowered),
            lowered,
            history,
        };

        for rule in GUARD_ORDER {
            if rule.matches(&ctx, self) {
                return self.guard_decision(rule, &ctx);
            }
        }

        self.evaluate_retrieval(&ctx, hits)
    }

    fn guard_decision(&self, rule: GuardRule, ctx: &TurnContext<'_>) -> TriageDecision {
        // Lawyer handoffs derive their specialty from the conversation when
        // the turn itself carries no signal ("sí", "dame un abogado").
        let scan_history = rule == GuardRule::DirectLawyerRequest;
        let specialties =
            specialty::infer_specialties(&ctx.lowered, ctx.history, &self.rules, scan_history);
        let display = specialties[0].display_name();
        let templates = &self.rules.rules.templates;

        let (outcome, confidence, reason, template) = match rule {
            GuardRule::DirectLawyerRequest => (
                TriageOutcome::DirectLawyerRequest,
                0.95,
                "direct lawyer request or affirmation after a referral offer",
                &templates.direct_lawyer,
            ),
            GuardRule::UrgentMatter => (
                TriageOutcome::UrgentMatter,
                0.9,
                "urgency keyword in the current turn",
                &templates.urgent,
            ),
            GuardRule::SensitiveTopic => (
                TriageOutcome::SensitiveTopic,
                0.9,
                "sensitive topic in the current turn",
                &templates.sensitive,
            ),
            GuardRule::FormalAdvice => (
                TriageOutcome::RequiresLawyer,
                0.85,
                "request for formal legal action",
                &templates.formal_advice,
            ),
            GuardRule::ConcreteProblem => (
                TriageOutcome::RequiresLawyer,
                0.85,
                "concrete legal problem described",
                &templates.concrete_problem,
            ),
        };

        TriageDecision {
            outcome,
            confidence,
            reason: reason.to_string(),
            suggested_response: Some(CompiledRules::render(template, display, "")),
            suggested_specialties: specialties,
            sources_found: Vec::new(),
        }
    }

    /// Rule 6: only here does retrieval quality matter.
    fn evaluate_retrieval(&self, ctx: &TurnContext<'_>, hits: &[RetrievalHit]) -> TriageDecision {
        let specialties =
            specialty::infer_specialties(&ctx.lowered, ctx.history, &self.rules, false);
        let display = specialties[0].display_name();
        let templates = &self.rules.rules.templates;

        if hits.is_empty() {
            return TriageDecision {
                outcome: TriageOutcome::NoInfoAvailable,
                confidence: 1.0,
                reason: "no retrieval hits".to_string(),
                suggested_response: Some(CompiledRules::render(&templates.no_info, display, "")),
                suggested_specialties: specialties,
                sources_found: Vec::new(),
            };
        }

        let relevant: Vec<RetrievalHit> = hits
            .iter()
            .filter(|h| h.score >= self.similarity_threshold)
            .cloned()
            .collect();
        let top_score = hits[0].score;

        if relevant.is_empty() {
            if top_score >= self.partial_info_threshold {
                return TriageDecision {
                    outcome: TriageOutcome::NoInfoAvailable,
                    confidence: 0.7,
                    reason: "best hit below the similarity threshold".to_string(),
                    suggested_response: Some(CompiledRules::render(
                        &templates.partial_info,
                        display,
                        &hits[0].title,
                    )),
                    suggested_specialties: specialties,
                    sources_found: Vec::new(),
                };
            }
            return TriageDecision {
                outcome: TriageOutcome::NoInfoAvailable,
                confidence: 0.8,
                reason: "all hits well below the similarity threshold".to_string(),
                suggested_response: Some(CompiledRules::render(&templates.no_info, display, "")),
                suggested_specialties: specialties,
                sources_found: Vec::new(),
            };
        }

        TriageDecision {
            outcome: TriageOutcome::RespondWithSources,
            confidence: top_score.min(0.95),
            reason: "relevant sources above the similarity threshold".to_string(),
            suggested_response: None,
            suggested_specialties: specialties,
            sources_found: relevant,
        }
    }
}
