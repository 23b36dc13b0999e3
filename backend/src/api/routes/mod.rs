pub mod coaching;
pub mod coaching_stream;
pub mod health;
