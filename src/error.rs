use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{jwt::TokenError, password::PasswordError};
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a request can end in. Mapped to a status code and a
/// client-safe message at the handler boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user already exists")]
    DuplicateUser,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("missing or malformed Authorization header")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("caller does not own this resource")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Internal error text attached to 500 responses. Only surfaced to clients
/// by [`expose_internal_errors`].
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateUser => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::Unauthorized
            | AppError::InvalidToken
            | AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client. Authentication failures stay
    /// generic so callers cannot tell which check failed.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::DuplicateUser => "user already exists".into(),
            AppError::InvalidCredentials => "invalid email or password".into(),
            AppError::Unauthorized => "Unauthorized".into(),
            AppError::InvalidToken | AppError::TokenExpired => "Invalid token".into(),
            AppError::Forbidden => "Forbidden".into(),
            AppError::NotFound(what) => format!("{} not found", capitalize(what)),
            AppError::Internal(_) => "Internal server error".into(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.client_message() }));

        if let AppError::Internal(ref err) = self {
            tracing::error!(error = ?err, "request failed with internal error");
            let mut res = (status, body).into_response();
            res.extensions_mut()
                .insert(InternalErrorDetail(format!("{:#}", err)));
            return res;
        }

        (status, body).into_response()
    }
}

/// Response mapper that replaces the generic 500 body with the underlying
/// error text. Only installed for non-production diagnostics.
pub async fn expose_internal_errors(res: Response) -> Response {
    match res.extensions().get::<InternalErrorDetail>().cloned() {
        Some(InternalErrorDetail(detail)) => {
            (res.status(), Json(json!({ "error": detail }))).into_response()
        }
        None => res,
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) => AppError::InvalidToken,
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Signing(e) => {
                AppError::Internal(anyhow::Error::new(e).context("sign token"))
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateUser,
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e).context("store")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateUser.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("todo").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_failures_share_one_message() {
        assert_eq!(
            AppError::InvalidToken.client_message(),
            AppError::TokenExpired.client_message()
        );
    }

    #[test]
    fn internal_message_is_generic() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        assert_eq!(err.client_message(), "Internal server error");
        let res = err.into_response();
        let detail = res.extensions().get::<InternalErrorDetail>().expect("detail attached");
        assert!(detail.0.contains("connection refused"));
    }

    #[test]
    fn not_found_message_names_resource() {
        assert_eq!(AppError::NotFound("todo").client_message(), "Todo not found");
    }
}
