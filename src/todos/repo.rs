use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::StoreResult;
use crate::todos::repo_types::{NewTodo, Todo, TodoChanges};

/// Todo persistence. Every mutating call is keyed by `(id, owner_id)` so a
/// record owned by someone else is never matched.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create(&self, todo: NewTodo) -> StoreResult<Todo>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Todo>>;
    /// `None` when no todo matches both `id` and `owner_id`.
    async fn update(&self, id: Uuid, owner_id: Uuid, changes: TodoChanges)
        -> StoreResult<Option<Todo>>;
    /// `false` when no todo matches both `id` and `owner_id`.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool>;
    /// One page of the owner's todos, oldest first, plus the owner's total.
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Todo>, i64)>;
}

pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn create(&self, todo: NewTodo) -> StoreResult<Todo> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (id, title, description, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, title, description, owner_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.owner_id)
        .bind(todo.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, title, description, owner_id, created_at, updated_at
            FROM todos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: TodoChanges,
    ) -> StoreResult<Option<Todo>> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET title = $3, description = $4, updated_at = $5
             WHERE id = $1 AND owner_id = $2
            RETURNING id, title, description, owner_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.updated_at)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query(r#"DELETE FROM todos WHERE id = $1 AND owner_id = $2"#)
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Todo>, i64)> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, title, description, owner_id, created_at, updated_at
            FROM todos
            WHERE owner_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM todos WHERE owner_id = $1"#)
            .bind(owner_id)
            .fetch_one(&self.db)
            .await?;

        Ok((rows, total))
    }
}

#[derive(Default)]
pub struct MemoryTodoStore {
    todos: RwLock<HashMap<Uuid, Todo>>,
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn create(&self, todo: NewTodo) -> StoreResult<Todo> {
        let record = Todo {
            id: Uuid::new_v4(),
            title: todo.title,
            description: todo.description,
            owner_id: todo.owner_id,
            created_at: todo.created_at,
            updated_at: todo.created_at,
        };
        self.todos.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Todo>> {
        Ok(self.todos.read().await.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: TodoChanges,
    ) -> StoreResult<Option<Todo>> {
        let mut todos = self.todos.write().await;
        let Some(todo) = todos.get_mut(&id).filter(|t| t.owner_id == owner_id) else {
            return Ok(None);
        };
        todo.title = changes.title;
        todo.description = changes.description;
        todo.updated_at = changes.updated_at;
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        let mut todos = self.todos.write().await;
        match todos.get(&id) {
            Some(t) if t.owner_id == owner_id => {
                todos.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Todo>, i64)> {
        let todos = self.todos.read().await;
        let mut owned: Vec<&Todo> = todos.values().filter(|t| t.owner_id == owner_id).collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = owned.len() as i64;
        let page = owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn new_todo(owner_id: Uuid, title: &str, created_at: OffsetDateTime) -> NewTodo {
        NewTodo {
            owner_id,
            title: title.into(),
            description: String::new(),
            created_at,
        }
    }

    #[tokio::test]
    async fn update_and_delete_are_scoped_to_owner() {
        let store = MemoryTodoStore::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let todo = store
            .create(new_todo(owner, "mine", OffsetDateTime::now_utc()))
            .await
            .unwrap();

        let changes = TodoChanges {
            title: "stolen".into(),
            description: "x".into(),
            updated_at: OffsetDateTime::now_utc(),
        };
        assert!(store.update(todo.id, stranger, changes).await.unwrap().is_none());
        assert!(!store.delete(todo.id, stranger).await.unwrap());

        let kept = store.find_by_id(todo.id).await.unwrap().unwrap();
        assert_eq!(kept.title, "mine");
        assert!(store.delete(todo.id, owner).await.unwrap());
        assert!(store.find_by_id(todo.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_ordered_by_creation_and_counts_only_owner() {
        let store = MemoryTodoStore::new();
        let owner = Uuid::new_v4();
        let base = OffsetDateTime::now_utc();
        for i in (0..5).rev() {
            store
                .create(new_todo(owner, &format!("t{i}"), base + Duration::seconds(i)))
                .await
                .unwrap();
        }
        store
            .create(new_todo(Uuid::new_v4(), "other", base))
            .await
            .unwrap();

        let (items, total) = store.list_by_owner(owner, 1, 3).await.unwrap();
        assert_eq!(total, 5);
        let titles: Vec<_> = items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["t1", "t2", "t3"]);
    }
}
