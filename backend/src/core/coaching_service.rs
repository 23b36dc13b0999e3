use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::domain::{
    compose_system_instruction, compose_user_message, resolve_instructions, ChatMessage,
    CoachingInput, CoachingInstructions, CoachingRequest, CoachingResponse, ConversationTurn,
};
use crate::infrastructure::database::InstructionSource;
use crate::infrastructure::error::AppResult;
use crate::infrastructure::llm::{CompletionProvider, TokenStream};

/// Service de coaching IA pour les profils d'entreprise
#[derive(Clone)]
pub struct CoachingService {
    provider: Arc<dyn CompletionProvider>,
    instructions: Arc<dyn InstructionSource>,
    history_limit: usize,
}

impl CoachingService {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        instructions: Arc<dyn InstructionSource>,
        history_limit: usize,
    ) -> Self {
        Self {
            provider,
            instructions,
            history_limit,
        }
    }

    /// Lit la configuration de l'assistant; ne peut pas échouer
    pub async fn load_instructions(&self) -> CoachingInstructions {
        let fetched = self.instructions.fetch_instructions().await;

        match &fetched {
            Ok(Some(_)) => {}
            Ok(None) => info!("Aucune configuration d'assistant active, consignes par défaut"),
            Err(e) => warn!("⚠️  {}", e.log_with_context("lecture des consignes, repli sur les valeurs par défaut")),
        }

        resolve_instructions(fetched)
    }

    /// Messages envoyés en amont: système, historique récent, demande
    pub fn build_messages(
        &self,
        instructions: &CoachingInstructions,
        input: &CoachingInput,
        history: &[ConversationTurn],
    ) -> Vec<ChatMessage> {
        let skip = history.len().saturating_sub(self.history_limit);

        let mut messages = Vec::with_capacity(history.len() - skip + 2);
        messages.push(ChatMessage::system(compose_system_instruction(
            instructions,
            input.coaching_type,
        )));
        messages.extend(history.iter().skip(skip).filter_map(ConversationTurn::to_chat_message));
        messages.push(ChatMessage::user(compose_user_message(
            &input.prompt,
            input.context.as_deref(),
        )));

        messages
    }

    /// Coaching non-streamé (repli quand le WebSocket est indisponible)
    pub async fn coach(&self, request: CoachingRequest) -> AppResult<CoachingResponse> {
        request.validate()?;

        let input = request.to_input();
        let instructions = self.load_instructions().await;
        let messages = self.build_messages(&instructions, &input, &request.conversation_history);

        info!("🧠 Coaching '{}' (non-streamé)", input.coaching_type);
        let coaching = self.provider.complete(messages).await?;

        Ok(CoachingResponse { coaching })
    }

    /// Ouvre une génération streamée pour une entrée déjà validée
    pub async fn stream(&self, input: &CoachingInput) -> AppResult<TokenStream> {
        let instructions = self.load_instructions().await;
        let messages = self.build_messages(&instructions, input, &[]);

        info!("🧠 Coaching '{}' (streamé)", input.coaching_type);
        self.provider.stream_completion(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatRole, CoachingType};
    use crate::infrastructure::database::StaticInstructions;
    use crate::infrastructure::error::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl CompletionProvider for RecordingProvider {
        async fn stream_completion(&self, messages: Vec<ChatMessage>) -> AppResult<TokenStream> {
            self.calls.lock().unwrap().push(messages);
            Err(AppError::InternalError("not used".to_string()))
        }

        async fn complete(&self, messages: Vec<ChatMessage>) -> AppResult<String> {
            self.calls.lock().unwrap().push(messages);
            Ok("Here is a sharper mission statement.".to_string())
        }
    }

    fn service(provider: Arc<RecordingProvider>, history_limit: usize) -> CoachingService {
        CoachingService::new(provider, Arc::new(StaticInstructions), history_limit)
    }

    fn turn(role: &str, content: &str) -> ConversationTurn {
        ConversationTurn { role: role.to_string(), content: content.to_string() }
    }

    #[test]
    fn history_is_trimmed_to_most_recent_turns() {
        let svc = service(Arc::new(RecordingProvider::default()), 2);
        let input = CoachingInput {
            prompt: "Next step?".to_string(),
            context: None,
            coaching_type: CoachingType::General,
        };
        let history = vec![turn("user", "one"), turn("assistant", "two"), turn("user", "three")];

        let messages = svc.build_messages(&CoachingInstructions::defaults(), &input, &history);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].content, "two");
        assert_eq!(messages[2].content, "three");
        assert_eq!(messages[3], ChatMessage::user("Next step?"));
    }

    #[tokio::test]
    async fn coach_returns_upstream_text() {
        let provider = Arc::new(RecordingProvider::default());
        let svc = service(provider.clone(), 10);

        let request: CoachingRequest = serde_json::from_value(serde_json::json!({
            "prompt": "Rewrite our mission",
            "context": "Family bakery since 1982",
            "type": "mission"
        }))
        .unwrap();

        let response = svc.coach(request).await.unwrap();
        assert_eq!(response.coaching, "Here is a sharper mission statement.");

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0][1].content.contains("Family bakery since 1982"));
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_upstream() {
        let provider = Arc::new(RecordingProvider::default());
        let svc = service(provider.clone(), 10);

        let request: CoachingRequest = serde_json::from_value(serde_json::json!({
            "prompt": "",
            "type": "mission"
        }))
        .unwrap();

        assert!(matches!(svc.coach(request).await, Err(AppError::ValidationError(_))));
        assert!(provider.calls.lock().unwrap().is_empty());
    }
}
