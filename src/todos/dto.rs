use serde::{Deserialize, Serialize};

use super::repo_types::Todo;
use super::services::{TodoPage, DEFAULT_LIMIT, DEFAULT_PAGE};

/// Body for create and update. Any owner field a client sends is ignored.
#[derive(Debug, Deserialize)]
pub struct TodoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct TodoListResponse {
    pub data: Vec<Todo>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl From<TodoPage> for TodoListResponse {
    fn from(p: TodoPage) -> Self {
        Self {
            data: p.items,
            page: p.page,
            limit: p.limit,
            total: p.total,
        }
    }
}
