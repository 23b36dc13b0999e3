use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, Pool, Postgres};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{CoachingInstructions, CoachingType};
use crate::infrastructure::error::AppResult;

/// Source de la configuration des consignes de l'assistant
#[async_trait]
pub trait InstructionSource: Send + Sync {
    /// `Ok(None)` quand aucun enregistrement actif n'existe
    async fn fetch_instructions(&self) -> AppResult<Option<CoachingInstructions>>;
}

/// Ligne de la table `ai_assistants`
#[derive(Debug, FromRow)]
struct AssistantRow {
    global_instructions: Option<String>,
    field_instructions: Option<Json<HashMap<String, String>>>,
    output_format: Option<String>,
}

impl From<AssistantRow> for CoachingInstructions {
    fn from(row: AssistantRow) -> Self {
        // Les clés inconnues sont ignorées plutôt que rabattues sur `general`
        let field_instructions = row
            .field_instructions
            .map(|Json(map)| map)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(tag, text)| {
                CoachingType::ALL
                    .into_iter()
                    .find(|coaching_type| coaching_type.as_str() == tag)
                    .map(|coaching_type| (coaching_type, text))
            })
            .collect();

        CoachingInstructions {
            global_instructions: row.global_instructions.unwrap_or_default(),
            field_instructions,
            output_format: row.output_format.unwrap_or_default(),
        }
    }
}

/// Repository pour la configuration des assistants IA
#[derive(Clone)]
pub struct AssistantsRepository {
    pool: Arc<Pool<Postgres>>,
    slug: String,
}

impl AssistantsRepository {
    /// Crée une nouvelle instance du repository
    pub fn new(pool: Arc<Pool<Postgres>>, slug: impl Into<String>) -> Self {
        Self { pool, slug: slug.into() }
    }
}

#[async_trait]
impl InstructionSource for AssistantsRepository {
    async fn fetch_instructions(&self) -> AppResult<Option<CoachingInstructions>> {
        let row = sqlx::query_as::<_, AssistantRow>(
            r#"
            SELECT global_instructions, field_instructions, output_format
            FROM ai_assistants
            WHERE slug = $1 AND is_active = TRUE
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(&self.slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(CoachingInstructions::from))
    }
}

/// Source utilisée sans base de données: les valeurs par défaut s'appliquent toujours
#[derive(Debug, Clone, Default)]
pub struct StaticInstructions;

#[async_trait]
impl InstructionSource for StaticInstructions {
    async fn fetch_instructions(&self) -> AppResult<Option<CoachingInstructions>> {
        Ok(None)
    }
}
