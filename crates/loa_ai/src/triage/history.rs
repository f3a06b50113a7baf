use loa_core::domain::{ConversationTurn, Role};

/// Seam for detecting that the assistant's previous turn offered a lawyer
/// referral. The phrase-list implementation is deliberately simple; smarter
/// detection can be swapped in here without touching the rule set.
pub trait PriorOfferDetector: Send + Sync {
    fn prior_turn_offered_lawyer(&self, history: &[ConversationTurn]) -> bool;
}

pub struct PhraseOfferDetector {
    phrases: Vec<String>,
}

impl PhraseOfferDetector {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl PriorOfferDetector for PhraseOfferDetector {
    fn prior_turn_offered_lawyer(&self, history: &[ConversationTurn]) -> bool {
        let Some(last_assistant) = history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
        else {
            return false;
        };
        let lowered = last_assistant.content.to_lowercase();
        self.phrases.iter().any(|p| lowered.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PhraseOfferDetector {
        PhraseOfferDetector::new(&[
            "te conecto con un abogado".to_string(),
            "te muestro abogados".to_string(),
        ])
    }

    #[test]
    fn detects_offer_in_most_recent_assistant_turn() {
        let history = vec![
            ConversationTurn::user("me despidieron"),
            ConversationTurn::assistant("Entiendo tu situación. ¿Te conecto con un abogado?"),
        ];
        assert!(detector().prior_turn_offered_lawyer(&history));
    }

    #[test]
    fn only_the_last_assistant_turn_counts() {
        let history = vec![
            ConversationTurn::assistant("¿Te muestro abogados disponibles?"),
            ConversationTurn::user("primero cuéntame del finiquito"),
            ConversationTurn::assistant("El finiquito es el documento de término laboral."),
        ];
        assert!(!detector().prior_turn_offered_lawyer(&history));
    }

    #[test]
    fn empty_history_never_offers() {
        assert!(!detector().prior_turn_offered_lawyer(&[]));
    }
}
