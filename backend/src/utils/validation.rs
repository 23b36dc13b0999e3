// utils/validation.rs
use crate::domain::coaching::ConversationTurn;
use crate::infrastructure::error::{bad_request, AppResult};
use validator::ValidationError;

/// Nombre maximal d'échanges acceptés dans l'historique
pub const MAX_HISTORY_TURNS: usize = 50;

/// Longueur maximale d'un échange de l'historique
pub const MAX_TURN_LENGTH: usize = 8000;

/// Valider le prompt et le type reçus sur le WebSocket
///
/// Un prompt vide est traité comme absent.
pub fn validate_prompt<'a>(
    prompt: Option<&'a str>,
    coaching_type: Option<&'a str>,
) -> AppResult<(&'a str, &'a str)> {
    match (prompt.filter(|p| !p.is_empty()), coaching_type.filter(|t| !t.is_empty())) {
        (Some(prompt), Some(coaching_type)) => Ok((prompt, coaching_type)),
        _ => Err(bad_request("Missing required fields: prompt and type")),
    }
}

/// Valider l'historique de conversation (utilisé par `validator`)
pub fn validate_history(history: &[ConversationTurn]) -> Result<(), ValidationError> {
    if history.len() > MAX_HISTORY_TURNS {
        let mut err = ValidationError::new("conversation_history");
        err.message = Some(
            format!("L'historique ne doit pas dépasser {} échanges", MAX_HISTORY_TURNS).into(),
        );
        return Err(err);
    }

    if history.iter().any(|turn| turn.content.chars().count() > MAX_TURN_LENGTH) {
        let mut err = ValidationError::new("conversation_history");
        err.message = Some(
            format!("Chaque échange doit faire au plus {} caractères", MAX_TURN_LENGTH).into(),
        );
        return Err(err);
    }

    Ok(())
}
