#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jobboard_backend::core::coaching_service::CoachingService;
use jobboard_backend::core::relay::{FrameSink, RelayFrame, SinkClosed};
use jobboard_backend::domain::{ChatMessage, CoachingInstructions};
use jobboard_backend::infrastructure::database::{InstructionSource, StaticInstructions};
use jobboard_backend::infrastructure::error::{AppError, AppResult};
use jobboard_backend::infrastructure::llm::{CompletionProvider, TokenStream};
use jobboard_backend::utils::config::Config;

/// Comportement scripté de l'amont
#[derive(Debug, Clone)]
pub enum Script {
    Tokens(Vec<&'static str>),
    RejectWith { status: u16, body: &'static str },
    BreakAfter(Vec<&'static str>),
    /// Émet les fragments puis ne répond plus
    Hang(Vec<&'static str>),
}

/// Fournisseur amont factice qui enregistre ses appels
pub struct StubProvider {
    script: Script,
    calls: AtomicUsize,
    last_messages: Mutex<Option<Vec<ChatMessage>>>,
}

impl StubProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.last_messages.lock().unwrap().clone()
    }

    fn record(&self, messages: Vec<ChatMessage>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = Some(messages);
    }
}

#[async_trait]
impl CompletionProvider for StubProvider {
    async fn stream_completion(&self, messages: Vec<ChatMessage>) -> AppResult<TokenStream> {
        self.record(messages);

        match &self.script {
            Script::Tokens(tokens) => {
                let items: Vec<AppResult<String>> = tokens.iter().map(|t| Ok(t.to_string())).collect();
                Ok(stream::iter(items).boxed())
            }
            Script::RejectWith { status, body } => Err(AppError::Upstream {
                status: *status,
                body: body.to_string(),
            }),
            Script::BreakAfter(tokens) => {
                let mut items: Vec<AppResult<String>> = tokens.iter().map(|t| Ok(t.to_string())).collect();
                items.push(Err(AppError::ConnectionError("upstream reset".to_string())));
                Ok(stream::iter(items).boxed())
            }
            Script::Hang(tokens) => {
                let items: Vec<AppResult<String>> = tokens.iter().map(|t| Ok(t.to_string())).collect();
                Ok(stream::iter(items).chain(stream::pending()).boxed())
            }
        }
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> AppResult<String> {
        self.record(messages);

        match &self.script {
            Script::Tokens(tokens) => Ok(tokens.concat()),
            Script::RejectWith { status, body } => Err(AppError::Upstream {
                status: *status,
                body: body.to_string(),
            }),
            Script::BreakAfter(_) => Err(AppError::ConnectionError("upstream reset".to_string())),
            Script::Hang(_) => futures_util::future::pending().await,
        }
    }
}

/// Source de configuration toujours en échec
pub struct FailingInstructions;

#[async_trait]
impl InstructionSource for FailingInstructions {
    async fn fetch_instructions(&self) -> AppResult<Option<CoachingInstructions>> {
        Err(AppError::InternalError("database unreachable".to_string()))
    }
}

/// Destination qui conserve les trames envoyées
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<RelayFrame>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<RelayFrame> {
        self.frames.lock().unwrap().clone()
    }

    /// Simule un client qui a quitté la page
    pub fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_frame(&mut self, frame: &RelayFrame) -> Result<(), SinkClosed> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkClosed);
        }
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

pub fn service_with(provider: Arc<StubProvider>) -> CoachingService {
    CoachingService::new(provider, Arc::new(StaticInstructions), 10)
}

pub fn service_with_source(
    provider: Arc<StubProvider>,
    source: Arc<dyn InstructionSource>,
) -> CoachingService {
    CoachingService::new(provider, source, 10)
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        _ => None,
    })
    .expect("test configuration")
}

/// Concatène le contenu des trames `stream_token`
pub fn reassemble(frames: &[RelayFrame]) -> String {
    frames
        .iter()
        .filter_map(|frame| match frame {
            RelayFrame::StreamToken { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}
