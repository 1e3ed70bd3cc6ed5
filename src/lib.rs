// Cooking blog - categories, posts, tags, comments and accounts over axum + SQLite

// HTTP surface
pub mod api;
pub mod handlers;
pub mod router;

// Storage and domain
pub mod database;
pub mod models;
pub mod forms;

// Identity, request context, media
pub mod infrastructure;

// Common utilities
pub mod app_state;
pub mod config;
pub mod data_seeder;
pub mod error;

// Re-exports for convenience
pub use app_state::AppState;
pub use error::{AppError, AppResult};
pub use router::create_router;
