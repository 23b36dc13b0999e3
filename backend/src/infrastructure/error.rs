use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use validator::ValidationErrors;

/// Type de résultat standard pour l'application
pub type AppResult<T> = Result<T, AppError>;

/// Erreurs principales de l'application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Données invalides (422 Unprocessable Entity)
    #[error("Validation failed: {0}")]
    ValidationError(ValidationErrors),

    /// Requête mal formée (400 Bad Request)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Réponse non-succès de l'API de complétion (502 Bad Gateway)
    #[error("OpenAI API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// Erreur interne du serveur (500 Internal Server Error)
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// Erreur de base de données (500 Internal Server Error)
    #[error("Database error: {0}")]
    DatabaseError(#[source] SqlxError),

    /// Erreur de configuration (500 Internal Server Error)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Timeout d'opération (504 Gateway Timeout)
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Erreur de connexion (502 Bad Gateway)
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl AppError {
    /// Convertit l'erreur en code HTTP approprié
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ConnectionError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Convertit l'erreur en message destiné au client
    ///
    /// Les erreurs de l'API de complétion sont renvoyées telles quelles: le
    /// frontend affiche le texte amont dans sa notification.
    pub fn user_friendly_message(&self) -> String {
        match self {
            AppError::ValidationError(errors) => {
                let mut messages = Vec::new();
                for (_, field_errors) in errors.field_errors() {
                    for error in field_errors {
                        if let Some(msg) = error.message.as_ref() {
                            messages.push(msg.to_string());
                        }
                    }
                }
                if messages.is_empty() {
                    "Données invalides. Veuillez vérifier le format des champs.".to_string()
                } else {
                    messages.join("; ")
                }
            }
            AppError::BadRequest(message) => message.clone(),
            AppError::Upstream { .. } => self.to_string(),
            AppError::Timeout(_) => {
                "L'assistant a mis trop de temps à répondre. Veuillez réessayer.".to_string()
            }
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::ConfigurationError(_)
            | AppError::ConnectionError(_) => {
                "Une erreur interne est survenue. Notre équipe technique a été notifiée.".to_string()
            }
        }
    }

    /// Message de log enrichi d'un contexte
    pub fn log_with_context(&self, context: &str) -> String {
        match self {
            AppError::ValidationError(errors) => {
                let error_details: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errs)| {
                        errs.iter().map(move |err| {
                            format!(
                                "field '{}' - {}",
                                field,
                                err.message.as_deref().unwrap_or("unknown error")
                            )
                        })
                    })
                    .collect();
                format!("Validation error [{}]: {}", context, error_details.join(", "))
            }
            _ => format!("{} [{}]", self, context),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: self.user_friendly_message(),
            code: AppError::status_code(self).as_u16(),
        };

        HttpResponse::build(AppError::status_code(self)).json(error_response)
    }
}

/// Structure de réponse d'erreur standardisée
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

// Implémentations From pour les conversions automatiques

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        AppError::DatabaseError(error)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AppError::Timeout("Request timeout".to_string())
        } else if error.is_connect() {
            AppError::ConnectionError(format!("Connection failed: {}", error))
        } else {
            AppError::InternalError(format!("HTTP request error: {}", error))
        }
    }
}

// Helpers pour créer des erreurs courantes
pub fn bad_request<T: Into<String>>(message: T) -> AppError {
    AppError::BadRequest(message.into())
}

pub fn internal_error<T: Into<String>>(message: T) -> AppError {
    AppError::InternalError(message.into())
}
