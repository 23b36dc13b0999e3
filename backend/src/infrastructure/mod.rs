pub mod database;
pub mod error;
pub mod llm;

pub use database::Database;
pub use error::{AppError, AppResult};
pub use llm::{CompletionProvider, OpenAiClient};
