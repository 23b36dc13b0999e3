//! Relais de streaming de fragments pour le coaching IA.
//!
//! Une connexion WebSocket = une `RelayConnection`. Les messages sont traités
//! l'un après l'autre: au plus une génération amont en cours par connexion.
//! Si le client raccroche pendant une génération, le flux amont est abandonné
//! sans trame terminale.
//!
//! ```text
//! OPENED --message--> STREAMING --stream_end|error--> IDLE --message--> STREAMING ...
//!    \__________________________________________________\______________--> CLOSED
//! ```

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::coaching_service::CoachingService;
use crate::domain::{CoachingInput, CoachingType};
use crate::utils::validation::validate_prompt;

/// Trame JSON envoyée au navigateur
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    ConnectionEstablished,
    StreamStart,
    StreamToken { content: String },
    StreamEnd,
    Error { error: String },
}

impl RelayFrame {
    pub fn error(message: impl Into<String>) -> Self {
        RelayFrame::Error { error: message.into() }
    }

    /// Vrai pour `stream_end` et `error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayFrame::StreamEnd | RelayFrame::Error { .. })
    }
}

/// Message reçu du navigateur; les champs requis sont vérifiés explicitement
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientMessage {
    pub prompt: Option<String>,
    pub context: Option<String>,
    #[serde(rename = "type")]
    pub coaching_type: Option<String>,
}

impl ClientMessage {
    fn into_input(self) -> Result<CoachingInput, String> {
        let (prompt, coaching_type) =
            validate_prompt(self.prompt.as_deref(), self.coaching_type.as_deref())
                .map_err(|e| e.user_friendly_message())?;

        Ok(CoachingInput {
            prompt: prompt.to_string(),
            context: self.context,
            coaching_type: CoachingType::from_tag(coaching_type),
        })
    }
}

/// État d'une connexion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Opened,
    Streaming,
    Idle,
    Closed,
}

/// Événement entrant, déjà extrait de la trame WebSocket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Text(String),
    Close,
    /// Trame refusée par le transport (taille, protocole): la connexion se termine
    Rejected(String),
}

/// Le client a fermé la socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("socket closed by peer")]
pub struct SinkClosed;

/// Destination des trames sortantes
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: &RelayFrame) -> Result<(), SinkClosed>;
}

#[async_trait]
impl FrameSink for actix_ws::Session {
    async fn send_frame(&mut self, frame: &RelayFrame) -> Result<(), SinkClosed> {
        let text = serde_json::to_string(frame).map_err(|e| {
            warn!("Trame non sérialisable: {}", e);
            SinkClosed
        })?;
        self.text(text).await.map_err(|_| SinkClosed)
    }
}

/// Machine à états d'une connexion du relais
pub struct RelayConnection<S: FrameSink> {
    sink: S,
    service: CoachingService,
    state: ConnectionState,
    hangup: Option<watch::Receiver<bool>>,
}

impl<S: FrameSink> RelayConnection<S> {
    /// Annonce la connexion au client: toujours la première trame envoyée
    pub async fn open(mut sink: S, service: CoachingService) -> Result<Self, SinkClosed> {
        sink.send_frame(&RelayFrame::ConnectionEstablished).await?;

        Ok(Self {
            sink,
            service,
            state: ConnectionState::Opened,
            hangup: None,
        })
    }

    /// Signal levé quand le client s'en va: une génération en cours est alors abandonnée
    pub fn watch_hangup(mut self, hangup: watch::Receiver<bool>) -> Self {
        self.hangup = Some(hangup);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Point d'entrée unique pour les événements entrants
    pub async fn handle_event(&mut self, event: ClientEvent) -> ConnectionState {
        if self.state == ConnectionState::Closed {
            return self.state;
        }

        match event {
            ClientEvent::Close => {
                debug!("Connexion fermée par le client");
                self.state = ConnectionState::Closed;
            }
            ClientEvent::Rejected(reason) => {
                warn!("Trame refusée: {}", reason);
                let _ = self.sink.send_frame(&RelayFrame::error(reason)).await;
                self.state = ConnectionState::Closed;
            }
            ClientEvent::Text(text) => {
                if self.handle_text(&text).await.is_err() {
                    info!("Client parti pendant l'envoi, connexion close");
                    self.state = ConnectionState::Closed;
                }
            }
        }

        self.state
    }

    async fn handle_text(&mut self, text: &str) -> Result<(), SinkClosed> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Message client illisible: {}", e);
                return self.finish(RelayFrame::error(format!("Invalid message format: {}", e))).await;
            }
        };

        let input = match message.into_input() {
            Ok(input) => input,
            Err(error) => return self.finish(RelayFrame::error(error)).await,
        };

        self.state = ConnectionState::Streaming;

        let mut tokens = match self.service.stream(&input).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("❌ {}", e.log_with_context("ouverture du flux amont"));
                return self.finish(RelayFrame::error(e.to_string())).await;
            }
        };

        self.sink.send_frame(&RelayFrame::StreamStart).await?;

        let mut relayed = 0usize;
        loop {
            let next = match self.hangup.as_mut() {
                Some(hangup) => tokio::select! {
                    biased;
                    _ = hung_up(hangup) => {
                        info!("Client parti pendant la génération, flux amont abandonné après {} fragments", relayed);
                        return Err(SinkClosed);
                    }
                    token = tokens.next() => token,
                },
                None => tokens.next().await,
            };
            let Some(token) = next else { break };

            match token {
                Ok(content) => {
                    self.sink.send_frame(&RelayFrame::StreamToken { content }).await?;
                    relayed += 1;
                }
                Err(e) => {
                    warn!("❌ {}", e.log_with_context("flux amont interrompu"));
                    return self.finish(RelayFrame::error(e.to_string())).await;
                }
            }
        }

        debug!("{} fragments relayés", relayed);
        self.finish(RelayFrame::StreamEnd).await
    }

    /// Envoie la trame terminale et rend la connexion disponible
    async fn finish(&mut self, frame: RelayFrame) -> Result<(), SinkClosed> {
        debug_assert!(frame.is_terminal());
        self.sink.send_frame(&frame).await?;
        self.state = ConnectionState::Idle;
        Ok(())
    }
}

/// Se résout quand le signal passe à `true`; un émetteur disparu ne compte pas
async fn hung_up(hangup: &mut watch::Receiver<bool>) {
    while !*hangup.borrow_and_update() {
        if hangup.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn frames_match_wire_shape() {
        assert_json_eq!(
            serde_json::to_value(RelayFrame::ConnectionEstablished).unwrap(),
            json!({ "type": "connection_established" })
        );
        assert_json_eq!(
            serde_json::to_value(RelayFrame::StreamToken { content: "Hel".into() }).unwrap(),
            json!({ "type": "stream_token", "content": "Hel" })
        );
        assert_json_eq!(
            serde_json::to_value(RelayFrame::error("boom")).unwrap(),
            json!({ "type": "error", "error": "boom" })
        );
        assert_json_eq!(
            serde_json::to_value(RelayFrame::StreamEnd).unwrap(),
            json!({ "type": "stream_end" })
        );
    }

    #[test]
    fn only_end_and_error_are_terminal() {
        assert!(RelayFrame::StreamEnd.is_terminal());
        assert!(RelayFrame::error("x").is_terminal());
        assert!(!RelayFrame::StreamStart.is_terminal());
        assert!(!RelayFrame::StreamToken { content: "x".into() }.is_terminal());
    }

    #[test]
    fn client_message_requires_prompt_and_type() {
        let missing_type: ClientMessage = serde_json::from_value(json!({ "prompt": "hi" })).unwrap();
        assert!(missing_type.into_input().is_err());

        let complete: ClientMessage =
            serde_json::from_value(json!({ "prompt": "hi", "type": "culture", "context": "c" })).unwrap();
        let input = complete.into_input().unwrap();
        assert_eq!(input.coaching_type, CoachingType::Culture);
        assert_eq!(input.context.as_deref(), Some("c"));
    }
}
