use loa_core::domain::{ConversationTurn, Role, SpecialtyTag};

use super::rules::CompiledRules;

/// How far back the history fallback looks when the current turn carries no
/// specialty signal of its own.
const HISTORY_FALLBACK_TURNS: usize = 4;

/// Specialties inferred from the current turn, falling back to recent
/// history for content-free turns (short affirmations), and finally to
/// `Civil y Contratos`.
///
/// The fallback scans assistant turns before user turns, preserving the
/// upstream ordering of that heuristic.
pub fn infer_specialties(
    lowered_turn: &str,
    history: &[ConversationTurn],
    rules: &CompiledRules,
    scan_history: bool,
) -> Vec<SpecialtyTag> {
    let found = rules.specialties_in(lowered_turn);
    if !found.is_empty() {
        return found;
    }

    if scan_history {
        let recent: Vec<&ConversationTurn> = history
            .iter()
            .rev()
            .take(HISTORY_FALLBACK_TURNS)
            .collect();

        for role in [Role::Assistant, Role::User] {
            for turn in recent.iter().filter(|t| t.role == role) {
                let found = rules.specialties_in(&turn.content.to_lowercase());
                if !found.is_empty() {
                    return found;
                }
            }
        }
    }

    vec![SpecialtyTag::CivilYContratos]
}
