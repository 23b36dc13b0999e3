pub mod sse;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::ChatMessage;
use crate::infrastructure::error::{AppError, AppResult};
use crate::utils::config::Config;

pub use sse::{parse_chunk, ChunkParse, SseDecoder};

/// Flux de fragments de texte, dans l'ordre d'émission amont
pub type TokenStream = BoxStream<'static, AppResult<String>>;

/// Fournisseur de complétions de chat
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Ouvre une complétion streamée; une réponse non-succès est une erreur immédiate
    async fn stream_completion(&self, messages: Vec<ChatMessage>) -> AppResult<TokenStream>;

    /// Complétion classique requête/réponse
    async fn complete(&self, messages: Vec<ChatMessage>) -> AppResult<String>;
}

/// Paramètres du client de complétion
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&Config> for OpenAiSettings {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            model: config.openai_model.clone(),
            temperature: config.openai_temperature,
            max_tokens: config.openai_max_tokens,
            timeout: Duration::from_secs(config.openai_timeout_seconds),
        }
    }
}

/// Client pour une API compatible OpenAI `/chat/completions`
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: HttpClient,
    settings: OpenAiSettings,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> AppResult<Self> {
        // Pas de timeout global: il couperait les longues générations streamées
        let http_client = HttpClient::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ConfigurationError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }

    fn body<'a>(&'a self, messages: &'a [ChatMessage], stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream,
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> AppResult<reqwest::Response> {
        let mut request = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&self.body(messages, stream));

        if !stream {
            request = request.timeout(self.settings.timeout);
        }

        let response = request.send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("❌ API de complétion: statut {}", status);
            Err(AppError::Upstream { status, body })
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn stream_completion(&self, messages: Vec<ChatMessage>) -> AppResult<TokenStream> {
        let response = self.send(&messages, true).await?;
        debug!("Flux amont ouvert ({})", self.settings.model);

        Ok(decode_token_stream(response.bytes_stream()))
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> AppResult<String> {
        let response = self.send(&messages, false).await?;
        let completion: ChatCompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::InternalError("Empty completion returned by upstream".to_string()))
    }
}

/// Transforme un flux d'octets SSE en flux de fragments
///
/// Les lignes illisibles sont ignorées; `[DONE]` ou la fin du corps terminent le flux.
pub fn decode_token_stream<S, B, E>(bytes: S) -> TokenStream
where
    S: futures_util::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    struct DecodeState<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        finished: bool,
    }

    fn absorb(pending: &mut VecDeque<String>, parsed: Vec<ChunkParse>) -> bool {
        for chunk in parsed {
            match chunk {
                ChunkParse::Token(token) => pending.push_back(token),
                ChunkParse::Skip => {}
                ChunkParse::Done => return true,
            }
        }
        false
    }

    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.pending.pop_front() {
                return Some((Ok(token), state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let parsed = state.decoder.push(chunk.as_ref());
                    state.finished = absorb(&mut state.pending, parsed);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    let parsed = state.decoder.finish();
                    absorb(&mut state.pending, parsed);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}
