use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use extractors::AuthUser;

/// Public routes: `/register`, `/login`.
pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}

/// Protected profile route: `/me`.
pub fn me_router(state: AppState) -> Router<AppState> {
    handlers::me_routes(state)
}
