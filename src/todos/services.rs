use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::todos::{
    repo::TodoStore,
    repo_types::{NewTodo, Todo, TodoChanges},
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Rejects `page < 1` and `limit < 1`; clamps `limit` to [`MAX_LIMIT`].
    pub fn new(page: i64, limit: i64) -> AppResult<Self> {
        if page < 1 {
            return Err(AppError::validation("page must be at least 1"));
        }
        if limit < 1 {
            return Err(AppError::validation("limit must be at least 1"));
        }
        let limit = limit.min(MAX_LIMIT);
        // Keeps the offset representable.
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::validation("page is out of range"));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug)]
pub struct TodoPage {
    pub items: Vec<Todo>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Clone)]
pub struct TodoService {
    todos: Arc<dyn TodoStore>,
}

fn require_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }
    Ok(())
}

impl TodoService {
    pub fn new(todos: Arc<dyn TodoStore>) -> Self {
        Self { todos }
    }

    /// The owner always comes from the authenticated caller.
    #[instrument(skip(self, description))]
    pub async fn create(&self, owner_id: Uuid, title: &str, description: &str) -> AppResult<Todo> {
        require_title(title)?;
        let todo = self
            .todos
            .create(NewTodo {
                owner_id,
                title: title.to_owned(),
                description: description.to_owned(),
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;
        info!(todo_id = %todo.id, %owner_id, "todo created");
        Ok(todo)
    }

    /// Fetch by id, check ownership, then write through the owner-scoped
    /// store update. Ownership is settled before the new title is looked at.
    #[instrument(skip(self, description))]
    pub async fn update(
        &self,
        todo_id: Uuid,
        caller_id: Uuid,
        title: &str,
        description: &str,
    ) -> AppResult<Todo> {
        let existing = self.authorize(todo_id, caller_id).await?;
        self.apply_update(&existing, title, description).await
    }

    /// Second half of `update`, for callers that already hold the authorized
    /// todo from [`TodoService::authorize`].
    pub async fn apply_update(
        &self,
        existing: &Todo,
        title: &str,
        description: &str,
    ) -> AppResult<Todo> {
        require_title(title)?;

        let changes = TodoChanges {
            title: title.to_owned(),
            description: description.to_owned(),
            updated_at: OffsetDateTime::now_utc(),
        };
        // A concurrent delete between the check and the write surfaces as 404.
        let todo = self
            .todos
            .update(existing.id, existing.owner_id, changes)
            .await?
            .ok_or(AppError::NotFound("todo"))?;
        info!(todo_id = %todo.id, owner_id = %todo.owner_id, "todo updated");
        Ok(todo)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, todo_id: Uuid, caller_id: Uuid) -> AppResult<()> {
        self.authorize(todo_id, caller_id).await?;
        if !self.todos.delete(todo_id, caller_id).await? {
            return Err(AppError::NotFound("todo"));
        }
        info!(%todo_id, %caller_id, "todo deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(&self, owner_id: Uuid, pagination: Pagination) -> AppResult<TodoPage> {
        let (items, total) = self
            .todos
            .list_by_owner(owner_id, pagination.offset(), pagination.limit)
            .await?;
        Ok(TodoPage {
            items,
            page: pagination.page,
            limit: pagination.limit,
            total,
        })
    }

    /// Missing todos are `NotFound`; someone else's are `Forbidden`.
    pub async fn authorize(&self, todo_id: Uuid, caller_id: Uuid) -> AppResult<Todo> {
        let existing = self
            .todos
            .find_by_id(todo_id)
            .await?
            .ok_or(AppError::NotFound("todo"))?;
        if existing.owner_id != caller_id {
            warn!(%todo_id, %caller_id, "caller does not own todo");
            return Err(AppError::Forbidden);
        }
        Ok(existing)
    }
}
