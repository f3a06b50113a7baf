use std::fs;
use std::path::Path;

use loa_core::domain::SpecialtyTag;
use loa_core::error::AppError;
use regex::Regex;
use serde::{Deserialize, Serialize};

const BUNDLED_RULES: &str = include_str!("../../assets/triage_rules.json");

/// Canned responses are data, not control flow. The interpolation contract
/// is two placeholders: `{specialty}` (display name) and `{best_source}`
/// (title of the best partial hit).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseTemplates {
    pub direct_lawyer: String,
    pub urgent: String,
    pub sensitive: String,
    pub formal_advice: String,
    pub concrete_problem: String,
    pub no_info: String,
    pub partial_info: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialtyKeywords {
    pub specialty: SpecialtyTag,
    pub keywords: Vec<String>,
}

/// The whole rule set is constructor input; the bundled asset is only the
/// versioned default. Keyword lists are matched case-insensitively on an
/// accent-preserving lowercased copy of the turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriageRules {
    pub version: u32,
    pub affirmations: Vec<String>,
    pub lawyer_offer_phrases: Vec<String>,
    pub direct_request_patterns: Vec<String>,
    pub urgency_keywords: Vec<String>,
    pub sensitive_keywords: Vec<String>,
    pub formal_advice_patterns: Vec<String>,
    pub concrete_problem_patterns: Vec<String>,
    pub specialty_keywords: Vec<SpecialtyKeywords>,
    pub templates: ResponseTemplates,
}

impl TriageRules {
    pub fn bundled() -> Result<Self, AppError> {
        serde_json::from_str(BUNDLED_RULES).map_err(|e| {
            AppError::new(
                "AI_TRIAGE_RULES_INVALID",
                "Failed to decode the bundled triage rules",
            )
            .with_details(e.to_string())
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("AI_TRIAGE_RULES_INVALID", "Failed to read triage rules file")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::new("AI_TRIAGE_RULES_INVALID", "Failed to decode triage rules file")
                .with_details(format!("path={}; err={e}", path.display()))
        })
    }

    pub fn compile(self) -> Result<CompiledRules, AppError> {
        let direct_request = compile_patterns(&self.direct_request_patterns)?;
        let urgency = compile_keywords(&self.urgency_keywords)?;
        let sensitive = compile_keywords(&self.sensitive_keywords)?;
        let formal_advice = compile_patterns(&self.formal_advice_patterns)?;
        let concrete_problem = compile_patterns(&self.concrete_problem_patterns)?;
        let specialties = self
            .specialty_keywords
            .iter()
            .map(|group| Ok((group.specialty, compile_keywords(&group.keywords)?)))
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(CompiledRules {
            rules: self,
            direct_request,
            urgency,
            sensitive,
            formal_advice,
            concrete_problem,
            specialties,
        })
    }
}

/// Rule set with every pattern compiled once. Matching functions expect the
/// already-lowercased turn text.
pub struct CompiledRules {
    pub rules: TriageRules,
    direct_request: Vec<Regex>,
    urgency: Vec<Regex>,
    sensitive: Vec<Regex>,
    formal_advice: Vec<Regex>,
    concrete_problem: Vec<Regex>,
    specialties: Vec<(SpecialtyTag, Vec<Regex>)>,
}

impl CompiledRules {
    /// Short affirmations: the whole (de-punctuated) turn is in the list,
    /// or the turn is at most four words and opens with one.
    pub fn is_affirmation(&self, lowered: &str) -> bool {
        let stripped = strip_punctuation(lowered);
        if stripped.is_empty() {
            return false;
        }
        if self.rules.affirmations.iter().any(|a| a == &stripped) {
            return true;
        }
        let words: Vec<&str> = stripped.split_whitespace().collect();
        words.len() <= 4
            && self
                .rules
                .affirmations
                .iter()
                .any(|a| a == words[0])
    }

    pub fn matches_direct_request(&self, lowered: &str) -> bool {
        any_match(&self.direct_request, lowered)
    }

    pub fn matches_urgency(&self, lowered: &str) -> bool {
        any_match(&self.urgency, lowered)
    }

    pub fn matches_sensitive(&self, lowered: &str) -> bool {
        any_match(&self.sensitive, lowered)
    }

    pub fn matches_formal_advice(&self, lowered: &str) -> bool {
        any_match(&self.formal_advice, lowered)
    }

    pub fn matches_concrete_problem(&self, lowered: &str) -> bool {
        any_match(&self.concrete_problem, lowered)
    }

    /// Specialties mentioned in the text, in declared map order, deduped.
    pub fn specialties_in(&self, lowered: &str) -> Vec<SpecialtyTag> {
        let mut out = Vec::new();
        for (specialty, patterns) in &self.specialties {
            if any_match(patterns, lowered) && !out.contains(specialty) {
                out.push(*specialty);
            }
        }
        out
    }

    pub fn render(template: &str, specialty: &str, best_source: &str) -> String {
        template
            .replace("{specialty}", specialty)
            .replace("{best_source}", best_source)
    }
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Keywords are escaped literals wrapped in word boundaries.
fn compile_keywords(keywords: &[String]) -> Result<Vec<Regex>, AppError> {
    keywords
        .iter()
        .map(|kw| compile_boundary(&regex::escape(&kw.to_lowercase())))
        .collect()
}

/// Pattern entries are regex fragments (alternations, optional groups);
/// they get the same word-boundary wrapping.
fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, AppError> {
    patterns
        .iter()
        .map(|p| compile_boundary(&p.to_lowercase()))
        .collect()
}

fn compile_boundary(fragment: &str) -> Result<Regex, AppError> {
    Regex::new(&format!(r"\b(?:{fragment})\b")).map_err(|e| {
        AppError::new("AI_TRIAGE_RULES_INVALID", "Triage pattern failed to compile")
            .with_details(format!("pattern={fragment}; err={e}"))
    })
}

fn strip_punctuation(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bundled_rules_compile() {
        let compiled = TriageRules::bundled().unwrap().compile().unwrap();
        assert!(compiled.rules.version >= 1);
        assert!(!compiled.rules.affirmations.is_empty());
    }

    #[test]
    fn keyword_matching_is_word_boundary_aware() {
        let compiled = TriageRules::bundled().unwrap().compile().unwrap();
        // "hoy" is an urgency keyword; "hoyo" must not trigger it.
        assert!(compiled.matches_urgency("necesito resolverlo hoy"));
        assert!(!compiled.matches_urgency("se cayó en un hoyo"));
    }

    #[test]
    fn affirmations_allow_trailing_politeness() {
        let compiled = TriageRules::bundled().unwrap().compile().unwrap();
        assert!(compiled.is_affirmation("sí"));
        assert!(compiled.is_affirmation("¡sí, por favor!"));
        assert!(compiled.is_affirmation("dale"));
        assert!(!compiled.is_affirmation("sí pero antes quiero entender qué es el finiquito"));
        assert!(!compiled.is_affirmation("¿qué es el finiquito?"));
    }

    #[test]
    fn template_interpolation_contract() {
        let out = CompiledRules::render(
            "Abogado de {specialty}: revisa \"{best_source}\".",
            "Laboral",
            "Guía sobre Finiquito",
        );
        assert_eq!(out, "Abogado de Laboral: revisa \"Guía sobre Finiquito\".");
    }
}
