// utils/config.rs
use crate::infrastructure::error::{AppError, AppResult};
use dotenv::dotenv;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Taille maximale par défaut d'un message entrant (JSON ou WebSocket)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // Environnement et serveur
    pub run_mode: String,
    pub server_host: String,
    pub server_port: u16,
    pub workers: usize,
    pub log_level: String,
    pub logging_format: String,
    pub max_message_bytes: usize,

    // Base de données (optionnelle: sans elle, les consignes par défaut s'appliquent)
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub database_connection_timeout: u64,
    pub coaching_assistant_slug: String,

    // API de complétion
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub openai_max_tokens: u32,
    pub openai_timeout_seconds: u64,

    // Coaching
    pub coaching_history_limit: usize,

    // URLs
    pub frontend_url: String,
}

impl Config {
    /// Charger la configuration depuis les variables d'environnement
    pub fn from_env() -> AppResult<Self> {
        // Charger le fichier .env si présent
        let _ = dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construit la configuration à partir d'une fonction de lecture des variables
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigurationError(
                    "Variable d'environnement requise manquante: OPENAI_API_KEY".to_string(),
                )
            })?;

        let run_mode = lookup("RUN_MODE").unwrap_or_else(|| "development".to_string());
        // Logs lisibles en développement, JSON ailleurs
        let default_logging_format = if run_mode == "development" { "compact" } else { "json" };

        let config = Config {
            // Environnement et serveur
            run_mode,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            workers: parse_or(&lookup, "WORKERS", 4)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            logging_format: lookup("LOGGING_FORMAT")
                .unwrap_or_else(|| default_logging_format.to_string()),
            max_message_bytes: parse_or(&lookup, "MAX_MESSAGE_BYTES", DEFAULT_MAX_MESSAGE_BYTES)?,

            // Base de données
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            database_connection_timeout: parse_or(&lookup, "DATABASE_CONNECTION_TIMEOUT", 5)?,
            coaching_assistant_slug: lookup("COACHING_ASSISTANT_SLUG")
                .unwrap_or_else(|| "business-coach".to_string()),

            // API de complétion
            openai_api_key,
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            openai_model: lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_temperature: parse_or(&lookup, "OPENAI_TEMPERATURE", 0.7)?,
            openai_max_tokens: parse_or(&lookup, "OPENAI_MAX_TOKENS", 1000)?,
            openai_timeout_seconds: parse_or(&lookup, "OPENAI_TIMEOUT_SECONDS", 60)?,

            // Coaching
            coaching_history_limit: parse_or(&lookup, "COACHING_HISTORY_LIMIT", 10)?,

            // URLs
            frontend_url: lookup("FRONTEND_URL").unwrap_or_else(|| "*".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Valide les paramètres critiques
    fn validate(&self) -> AppResult<()> {
        if self.server_port == 0 {
            return Err(AppError::ConfigurationError(
                "SERVER_PORT must be greater than 0".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(AppError::ConfigurationError(
                "WORKERS must be greater than 0".to_string(),
            ));
        }

        if self.max_message_bytes == 0 {
            return Err(AppError::ConfigurationError(
                "MAX_MESSAGE_BYTES must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.openai_temperature) {
            return Err(AppError::ConfigurationError(
                "OPENAI_TEMPERATURE must be between 0 and 2".to_string(),
            ));
        }

        Ok(())
    }

    /// Vérifier si on est en production
    pub fn is_production(&self) -> bool {
        self.run_mode == "production"
    }

    /// Vrai si le CORS doit accepter toutes les origines
    pub fn allows_any_origin(&self) -> bool {
        self.frontend_url == "*"
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigurationError(format!("{} must be a valid value: {}", key, e))
        }),
        None => Ok(default),
    }
}
