pub mod assistants;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Error as SqlxError, Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use assistants::{AssistantsRepository, InstructionSource, StaticInstructions};

/// Gestion de la connexion à la base de données
#[derive(Clone)]
pub struct Database {
    pub pool: Arc<Pool<Postgres>>,
}

impl Database {
    /// Crée un pool paresseux: aucune connexion n'est ouverte avant la première requête
    pub fn new(database_url: &str, max_connections: u32, acquire_timeout_secs: u64) -> Result<Self, SqlxError> {
        info!("🔌 Préparation du pool PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .connect_lazy(database_url)?;

        info!("✅ Pool prêt (connexion à la demande)");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Vérifie que la base répond
    pub async fn ping(&self) -> Result<(), SqlxError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}
