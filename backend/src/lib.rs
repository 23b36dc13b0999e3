// backend/src/lib.rs
// Modules principaux
pub mod api;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod utils;

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::coaching_service::CoachingService;
use crate::infrastructure::database::{AssistantsRepository, Database, InstructionSource, StaticInstructions};
use crate::infrastructure::error::AppResult;
use crate::infrastructure::llm::{OpenAiClient, OpenAiSettings};
use crate::utils::config::Config;

// Version de l'application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Job Board Coaching Backend";

/// État partagé entre les workers Actix
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub database: Option<Database>,
    pub coaching: CoachingService,
}

impl AppState {
    /// Construit l'état à partir de la configuration
    pub fn from_config(config: Config) -> AppResult<Self> {
        let database = match &config.database_url {
            Some(url) => Some(Database::new(
                url,
                config.database_max_connections,
                config.database_connection_timeout,
            )?),
            None => {
                warn!("⚠️  DATABASE_URL absent: les consignes par défaut seront utilisées");
                None
            }
        };

        let instructions: Arc<dyn InstructionSource> = match &database {
            Some(database) => Arc::new(AssistantsRepository::new(
                database.pool.clone(),
                config.coaching_assistant_slug.clone(),
            )),
            None => Arc::new(StaticInstructions),
        };

        let provider = Arc::new(OpenAiClient::new(OpenAiSettings::from(&config))?);
        info!("🤖 Modèle de coaching: {}", config.openai_model);

        let coaching = CoachingService::new(provider, instructions, config.coaching_history_limit);

        Ok(Self {
            config,
            database,
            coaching,
        })
    }

    /// État sans base de données, avec des dépendances fournies
    pub fn with_service(config: Config, coaching: CoachingService) -> Self {
        Self {
            config,
            database: None,
            coaching,
        }
    }
}
