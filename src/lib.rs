pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod store;
pub mod todos;

pub use app::build_app;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;
