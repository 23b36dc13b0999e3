use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::coaching::CoachingType;
use crate::infrastructure::error::AppResult;

const DEFAULT_GLOBAL_INSTRUCTIONS: &str = "You are an expert business coach helping small and \
medium-sized businesses present themselves to job seekers. Be encouraging, concrete and honest. \
Write in the same language as the user's request. Never invent facts about the business: only \
build on what the user provides.";

const DEFAULT_MISSION_INSTRUCTIONS: &str = "Help the business articulate its mission statement. \
Focus on purpose, the people it serves and the difference it makes. Keep it to two or three \
sentences a candidate can remember.";

const DEFAULT_CULTURE_INSTRUCTIONS: &str = "Help the business describe its workplace culture. \
Highlight values, collaboration style, growth opportunities and what a typical day feels like. \
Prefer specific examples over generic adjectives.";

const DEFAULT_BENEFITS_INSTRUCTIONS: &str = "Help the business present its benefits and perks. \
Group them clearly (compensation, time off, flexibility, development, wellbeing) and explain why \
each one matters to employees.";

const DEFAULT_GENERAL_INSTRUCTIONS: &str = "Help the business improve its profile copy. Suggest \
clearer wording, a friendly professional tone and content that makes the business attractive to \
candidates.";

const DEFAULT_COVER_LETTER_INSTRUCTIONS: &str = "Help the job seeker write a cover letter for the \
position described in the context. Connect their experience to the role's requirements, keep a \
confident tone and stay under 350 words.";

const DEFAULT_OUTPUT_FORMAT: &str = "Respond with ready-to-use text in plain paragraphs. Do not use \
markdown headings. When you propose alternatives, offer at most two, clearly separated.";

/// Consignes de l'assistant de coaching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachingInstructions {
    pub global_instructions: String,
    pub field_instructions: HashMap<CoachingType, String>,
    pub output_format: String,
}

impl CoachingInstructions {
    /// Gabarits codés en dur, utilisés quand la configuration est indisponible
    pub fn defaults() -> Self {
        let field_instructions = CoachingType::ALL
            .iter()
            .map(|coaching_type| (*coaching_type, default_field_instructions(*coaching_type).to_string()))
            .collect();

        Self {
            global_instructions: DEFAULT_GLOBAL_INSTRUCTIONS.to_string(),
            field_instructions,
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }

    /// Consignes propres au type, avec repli sur le gabarit `general`
    pub fn field(&self, coaching_type: CoachingType) -> &str {
        self.field_instructions
            .get(&coaching_type)
            .or_else(|| self.field_instructions.get(&CoachingType::General))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Complète les champs vides d'un enregistrement avec les valeurs par défaut
    fn fill_from(mut self, defaults: CoachingInstructions) -> Self {
        if self.global_instructions.trim().is_empty() {
            self.global_instructions = defaults.global_instructions;
        }
        if self.output_format.trim().is_empty() {
            self.output_format = defaults.output_format;
        }

        self.field_instructions.retain(|_, text| !text.trim().is_empty());
        for (coaching_type, text) in defaults.field_instructions {
            self.field_instructions.entry(coaching_type).or_insert(text);
        }

        self
    }
}

fn default_field_instructions(coaching_type: CoachingType) -> &'static str {
    match coaching_type {
        CoachingType::Mission => DEFAULT_MISSION_INSTRUCTIONS,
        CoachingType::Culture => DEFAULT_CULTURE_INSTRUCTIONS,
        CoachingType::Benefits => DEFAULT_BENEFITS_INSTRUCTIONS,
        CoachingType::General => DEFAULT_GENERAL_INSTRUCTIONS,
        CoachingType::CoverLetter => DEFAULT_COVER_LETTER_INSTRUCTIONS,
    }
}

/// Choisit les consignes à partir du résultat de la lecture de configuration
///
/// Un échec de lecture ou une absence d'enregistrement donne les valeurs par
/// défaut; un enregistrement partiel est complété par celles-ci.
pub fn resolve_instructions(fetch: AppResult<Option<CoachingInstructions>>) -> CoachingInstructions {
    match fetch {
        Ok(Some(instructions)) => instructions.fill_from(CoachingInstructions::defaults()),
        Ok(None) | Err(_) => CoachingInstructions::defaults(),
    }
}

/// Consigne système: globale, puis propre au champ, puis format de sortie
pub fn compose_system_instruction(
    instructions: &CoachingInstructions,
    coaching_type: CoachingType,
) -> String {
    [
        instructions.global_instructions.trim(),
        instructions.field(coaching_type).trim(),
        instructions.output_format.trim(),
    ]
    .iter()
    .filter(|section| !section.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join("\n\n")
}
