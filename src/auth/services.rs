use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    jwt::JwtKeys,
    password::{hash_password, verify_against_dummy, verify_password},
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::error::{AppError, AppResult};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Registration and login. Tokens are issued only after the user record is
/// durably stored or the password has been verified.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AppResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::validation("invalid email"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            warn!("password too short");
            return Err(AppError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.users.find_by_email(email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::DuplicateUser);
        }

        let password = password.to_owned();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("join password hashing task")??;

        // The unique index still guards against a concurrent registration.
        let user = self
            .users
            .create(NewUser {
                name: name.to_owned(),
                email: email.to_owned(),
                password_hash,
            })
            .await?;

        let token = self.keys.issue(user.id, OffsetDateTime::now_utc())?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(token)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<String> {
        let Some(user) = self.users.find_by_email(email).await? else {
            let password = password.to_owned();
            tokio::task::spawn_blocking(move || verify_against_dummy(&password))
                .await
                .context("join password verification task")?;
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let password = password.to_owned();
        let hash = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("join password verification task")??;

        if !ok {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id, OffsetDateTime::now_utc())?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(token)
    }

    /// Loads the caller's own record. A token whose subject was removed is
    /// treated as invalid.
    pub async fn profile(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidToken)
    }
}
