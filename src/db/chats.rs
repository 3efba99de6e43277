use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::db::models::{Assistant, Chat, ChatGroup, ChatMessage, MessageRole};
use crate::error::AppError;

/// Chats, groups and messages of one assistant. Table names come from
/// [`Assistant`] and are never user input.
pub struct ChatRepository;

impl ChatRepository {
    pub async fn create_chat(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        project_id: &str,
        user_id: &str,
        title: &str,
    ) -> Result<Chat, AppError> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
INSERT INTO {} (id, project_id, user_id, group_id, title, total_tokens_used, created_at, updated_at)
VALUES (?, ?, ?, NULL, ?, 0, ?, ?)
RETURNING *
            "#,
            assistant.chats_table()
        );

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(&id)
            .bind(project_id)
            .bind(user_id)
            .bind(title)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await?;

        Ok(chat)
    }

    pub async fn get_chat(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
    ) -> Result<Option<Chat>, AppError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", assistant.chats_table());

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(chat_id)
            .fetch_optional(pool)
            .await?;

        Ok(chat)
    }

    /// Fetches a chat and checks that `user_id` owns it.
    pub async fn get_owned_chat(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Chat, AppError> {
        let chat = Self::get_chat(pool, assistant, chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

        if chat.user_id != user_id {
            return Err(AppError::Forbidden("Chat belongs to another user".to_string()));
        }

        Ok(chat)
    }

    pub async fn list_chats(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        project_id: &str,
        user_id: &str,
    ) -> Result<Vec<Chat>, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE project_id = ? AND user_id = ? ORDER BY updated_at DESC, created_at DESC",
            assistant.chats_table()
        );

        let chats = sqlx::query_as::<_, Chat>(&sql)
            .bind(project_id)
            .bind(user_id)
            .fetch_all(pool)
            .await?;

        Ok(chats)
    }

    pub async fn rename_chat(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
        title: &str,
    ) -> Result<Chat, AppError> {
        let sql = format!(
            "UPDATE {} SET title = ?, updated_at = ? WHERE id = ? RETURNING *",
            assistant.chats_table()
        );

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(title)
            .bind(chrono::Utc::now().timestamp())
            .bind(chat_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

        Ok(chat)
    }

    /// Moves a chat into a group, or out of any group when `group_id` is `None`.
    pub async fn set_chat_group(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
        group_id: Option<&str>,
    ) -> Result<Chat, AppError> {
        let sql = format!(
            "UPDATE {} SET group_id = ?, updated_at = ? WHERE id = ? RETURNING *",
            assistant.chats_table()
        );

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(group_id)
            .bind(chrono::Utc::now().timestamp())
            .bind(chat_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

        Ok(chat)
    }

    pub async fn add_tokens_used(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
        tokens: i64,
    ) -> Result<Chat, AppError> {
        let sql = format!(
            r#"
UPDATE {}
SET total_tokens_used = total_tokens_used + ?, updated_at = ?
WHERE id = ?
RETURNING *
            "#,
            assistant.chats_table()
        );

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(tokens)
            .bind(chrono::Utc::now().timestamp())
            .bind(chat_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

        Ok(chat)
    }

    pub async fn delete_chat(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
    ) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", assistant.chats_table());

        sqlx::query(&sql).bind(chat_id).execute(pool).await?;

        Ok(())
    }

    pub async fn add_message(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
        role: MessageRole,
        content: &str,
        tokens_used: i64,
        ai_model: Option<&str>,
    ) -> Result<ChatMessage, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
INSERT INTO {} (id, chat_id, role, content, tokens_used, ai_model, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
            assistant.messages_table()
        );

        let message = sqlx::query_as::<_, ChatMessage>(&sql)
            .bind(&id)
            .bind(chat_id)
            .bind(role.as_str())
            .bind(content)
            .bind(tokens_used)
            .bind(ai_model)
            .bind(created_at)
            .fetch_one(pool)
            .await?;

        Ok(message)
    }

    pub async fn list_messages(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        chat_id: &str,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE chat_id = ? ORDER BY created_at ASC, rowid ASC",
            assistant.messages_table()
        );

        let messages = sqlx::query_as::<_, ChatMessage>(&sql)
            .bind(chat_id)
            .fetch_all(pool)
            .await?;

        Ok(messages)
    }

    pub async fn create_group(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        project_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<ChatGroup, AppError> {
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp();

        let sql = format!(
            r#"
INSERT INTO {} (id, project_id, user_id, name, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING *
            "#,
            assistant.groups_table()
        );

        let group = sqlx::query_as::<_, ChatGroup>(&sql)
            .bind(&id)
            .bind(project_id)
            .bind(user_id)
            .bind(name)
            .bind(created_at)
            .fetch_one(pool)
            .await?;

        Ok(group)
    }

    pub async fn get_owned_group(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        group_id: &str,
        user_id: &str,
    ) -> Result<ChatGroup, AppError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", assistant.groups_table());

        let group = sqlx::query_as::<_, ChatGroup>(&sql)
            .bind(group_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat group not found".to_string()))?;

        if group.user_id != user_id {
            return Err(AppError::Forbidden("Chat group belongs to another user".to_string()));
        }

        Ok(group)
    }

    pub async fn list_groups(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        project_id: &str,
        user_id: &str,
    ) -> Result<Vec<ChatGroup>, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE project_id = ? AND user_id = ? ORDER BY name ASC",
            assistant.groups_table()
        );

        let groups = sqlx::query_as::<_, ChatGroup>(&sql)
            .bind(project_id)
            .bind(user_id)
            .fetch_all(pool)
            .await?;

        Ok(groups)
    }

    pub async fn rename_group(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        group_id: &str,
        name: &str,
    ) -> Result<ChatGroup, AppError> {
        let sql = format!(
            "UPDATE {} SET name = ? WHERE id = ? RETURNING *",
            assistant.groups_table()
        );

        let group = sqlx::query_as::<_, ChatGroup>(&sql)
            .bind(name)
            .bind(group_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat group not found".to_string()))?;

        Ok(group)
    }

    /// Deletes a group. Its chats survive, ungrouped.
    pub async fn delete_group(
        pool: &Pool<Sqlite>,
        assistant: Assistant,
        group_id: &str,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        let ungroup = format!(
            "UPDATE {} SET group_id = NULL WHERE group_id = ?",
            assistant.chats_table()
        );
        sqlx::query(&ungroup).bind(group_id).execute(&mut *tx).await?;

        let delete = format!("DELETE FROM {} WHERE id = ?", assistant.groups_table());
        sqlx::query(&delete).bind(group_id).execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(())
    }
}
