use actix_web::http::header::{HeaderMap, HeaderName, CONNECTION, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION, UPGRADE};
use actix_web::{get, web, HttpRequest, HttpResponse};
use actix_ws::{AggregatedMessage, AggregatedMessageStream, CloseCode, CloseReason, MessageStream, ProtocolError, Session};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::core::coaching_service::CoachingService;
use crate::core::relay::{ClientEvent, ConnectionState, RelayConnection};
use crate::AppState;

/// En-têtes de mise à niveau vus sur la requête, renvoyés en diagnostic
///
/// Certains proxys retirent ou réécrivent `Upgrade`/`Connection`: la
/// détection accepte n'importe lequel des indices ci-dessous, la poignée de
/// main WebSocket reste ensuite validée normalement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpgradeHeaders {
    pub upgrade: Option<String>,
    pub connection: Option<String>,
    pub sec_websocket_key: bool,
    pub sec_websocket_protocol: Option<String>,
    pub sec_websocket_version: Option<String>,
}

impl UpgradeHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        Self {
            upgrade: text(UPGRADE),
            connection: text(CONNECTION),
            sec_websocket_key: headers.contains_key(SEC_WEBSOCKET_KEY),
            sec_websocket_protocol: text(SEC_WEBSOCKET_PROTOCOL),
            sec_websocket_version: text(SEC_WEBSOCKET_VERSION),
        }
    }

    /// Détection tolérante d'une tentative de WebSocket
    pub fn looks_like_websocket(&self) -> bool {
        let upgrade = self
            .upgrade
            .as_deref()
            .map(|value| value.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false);
        let connection = self
            .connection
            .as_deref()
            .map(|value| value.to_ascii_lowercase().contains("upgrade"))
            .unwrap_or(false);

        upgrade || connection || self.sec_websocket_key || self.sec_websocket_protocol.is_some()
    }
}

#[derive(Serialize)]
struct HandshakeRejection<'a> {
    error: &'a str,
    details: String,
    headers: &'a UpgradeHeaders,
}

fn reject_handshake(error: &str, details: String, headers: &UpgradeHeaders) -> HttpResponse {
    HttpResponse::BadRequest().json(HandshakeRejection { error, details, headers })
}

/// Endpoint WebSocket du relais de coaching
#[get("/ai-coaching-stream")]
pub async fn coaching_stream(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> HttpResponse {
    let headers = UpgradeHeaders::from_headers(req.headers());

    if !headers.looks_like_websocket() {
        warn!("Requête sans en-tête de mise à niveau sur le relais: {:?}", headers);
        return reject_handshake(
            "Expected WebSocket upgrade request",
            "This endpoint only accepts WebSocket connections; use POST /api/ai-coaching for plain requests".to_string(),
            &headers,
        );
    }

    let (response, session, messages) = match actix_ws::handle(&req, body) {
        Ok(parts) => parts,
        Err(e) => {
            warn!("Poignée de main WebSocket refusée: {}", e);
            return reject_handshake("WebSocket handshake failed", e.to_string(), &headers);
        }
    };

    let connection_id = Uuid::new_v4();
    let span = info_span!("coaching_ws", %connection_id);
    actix_web::rt::spawn(
        run_connection(
            session,
            messages,
            state.coaching.clone(),
            state.config.max_message_bytes,
        )
        .instrument(span),
    );

    response
}

/// Messages entrants en attente pendant une génération
const INBOUND_BUFFER: usize = 16;

/// Ce que la tâche de lecture remonte à la boucle de connexion
enum Inbound {
    Event(ClientEvent),
    Closed(Option<CloseReason>),
    Failed(ProtocolError),
}

/// Boucle d'une connexion: traite les messages un par un
///
/// La socket est lue par une tâche séparée pour que la fermeture du client
/// soit vue même pendant une génération.
async fn run_connection(
    session: Session,
    messages: MessageStream,
    service: CoachingService,
    max_message_bytes: usize,
) {
    info!("🔗 Connexion WebSocket ouverte");

    let control = session.clone();
    let connection = match RelayConnection::open(session, service).await {
        Ok(connection) => connection,
        Err(_) => {
            info!("Client parti avant l'établissement de la connexion");
            return;
        }
    };

    let (hangup_tx, hangup_rx) = watch::channel(false);
    let (inbound_tx, mut inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let mut connection = connection.watch_hangup(hangup_rx);

    let messages = messages.max_frame_size(max_message_bytes).aggregate_continuations();
    let reader = actix_web::rt::spawn(
        read_socket(messages, control, max_message_bytes, inbound_tx, hangup_tx).in_current_span(),
    );

    let mut close_reason: Option<CloseReason> = None;

    while let Some(inbound) = inbound_rx.recv().await {
        let event = match inbound {
            Inbound::Event(event) => event,
            Inbound::Closed(reason) => {
                close_reason = reason;
                ClientEvent::Close
            }
            Inbound::Failed(error) => {
                let (code, message) = rejection(&error, max_message_bytes);
                close_reason = Some(code.into());
                ClientEvent::Rejected(message)
            }
        };

        if connection.handle_event(event).await == ConnectionState::Closed {
            break;
        }
    }

    // Une fermeture pendant une génération reste en file: on reprend sa raison
    while let Ok(inbound) = inbound_rx.try_recv() {
        if let Inbound::Closed(reason) = inbound {
            close_reason = close_reason.or(reason);
        }
    }

    reader.abort();
    let _ = connection.into_sink().close(close_reason).await;
    info!("🔌 Connexion WebSocket fermée");
}

/// Lit la socket: messages fragmentés réassemblés, pings servis sur place
async fn read_socket(
    mut messages: AggregatedMessageStream,
    mut control: Session,
    max_message_bytes: usize,
    inbound: mpsc::Sender<Inbound>,
    hangup: watch::Sender<bool>,
) {
    while let Some(message) = messages.next().await {
        let forwarded = match message {
            Ok(AggregatedMessage::Text(text)) if text.len() > max_message_bytes => {
                Inbound::Failed(ProtocolError::Overflow)
            }
            Ok(AggregatedMessage::Text(text)) => Inbound::Event(ClientEvent::Text(text.to_string())),
            Ok(AggregatedMessage::Ping(bytes)) => {
                if control.pong(&bytes).await.is_err() {
                    break;
                }
                continue;
            }
            Ok(AggregatedMessage::Close(reason)) => Inbound::Closed(reason),
            Ok(AggregatedMessage::Binary(_)) => {
                debug!("Trame binaire ignorée");
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("Erreur de protocole WebSocket: {}", e);
                Inbound::Failed(e)
            }
        };

        let last = !matches!(forwarded, Inbound::Event(_));
        if matches!(forwarded, Inbound::Closed(_)) {
            let _ = hangup.send(true);
        }
        if inbound.send(forwarded).await.is_err() || last {
            return;
        }
    }

    // Flux terminé sans trame Close
    let _ = hangup.send(true);
    let _ = inbound.send(Inbound::Closed(None)).await;
}

/// Code de fermeture et message d'erreur pour une trame refusée
fn rejection(error: &ProtocolError, max_message_bytes: usize) -> (CloseCode, String) {
    match error {
        ProtocolError::Overflow => (
            CloseCode::Size,
            format!("Message exceeds the maximum size of {} bytes", max_message_bytes),
        ),
        other => (CloseCode::Protocol, format!("Invalid WebSocket frame: {}", other)),
    }
}
