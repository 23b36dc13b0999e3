// utils/mod.rs
pub mod config;
pub mod validation;

// Ré-exports pour faciliter l'import
pub use config::Config;
pub use validation::{validate_history, validate_prompt};
