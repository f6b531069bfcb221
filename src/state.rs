use std::sync::Arc;

use crate::auth::{
    jwt::JwtKeys,
    repo::{MemoryUserStore, PgUserStore, UserStore},
    services::AuthService,
};
use crate::config::AppConfig;
use crate::db;
use crate::todos::{
    repo::{MemoryTodoStore, PgTodoStore, TodoStore},
    services::TodoService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub auth: AuthService,
    pub todos: TodoService,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the services.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await;

        let users = Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>;
        let todos = Arc::new(PgTodoStore::new(pool)) as Arc<dyn TodoStore>;
        Ok(Self::from_parts(Arc::new(config), users, todos))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        todos: Arc<dyn TodoStore>,
    ) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            auth: AuthService::new(users, keys.clone()),
            todos: TodoService::new(todos),
            keys,
            config,
        }
    }

    /// State backed by in-memory stores; nothing outside the process is touched.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(
            Arc::new(config),
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryTodoStore::new()),
        )
    }
}
