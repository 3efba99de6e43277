use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::ai::{generate_ai_response, GenerateRequest, GenerationResult};
use crate::api::double_option;
use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db::{Assistant, Chat, ChatGroup, ChatMessage, ChatRepository, ProjectRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub name: String,
}

/// `group_id: null` takes the chat out of its group.
#[derive(Debug, Deserialize)]
pub struct UpdateChatRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub group_id: Option<Option<String>>,
}

fn validate_label(value: &str, what: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 100 {
        return Err(AppError::Validation(format!("{} must be 1-100 characters", what)));
    }
    Ok(trimmed.to_string())
}

/// POST /api/projects/:id/assistants/:assistant/generate
pub async fn generate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, assistant)): Path<(String, Assistant)>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerationResult>, AppError> {
    let result = generate_ai_response(
        &state.db,
        state.generator.as_ref(),
        state.config.token_buffer,
        assistant,
        &user.id,
        &project_id,
        req,
    )
    .await?;

    Ok(Json(result))
}

/// GET /api/projects/:id/assistants/:assistant/chats
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, assistant)): Path<(String, Assistant)>,
) -> Result<Json<Vec<Chat>>, AppError> {
    ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;
    let chats = ChatRepository::list_chats(&state.db, assistant, &project_id, &user.id).await?;
    Ok(Json(chats))
}

/// GET /api/projects/:id/assistants/:assistant/groups
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, assistant)): Path<(String, Assistant)>,
) -> Result<Json<Vec<ChatGroup>>, AppError> {
    ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;
    let groups = ChatRepository::list_groups(&state.db, assistant, &project_id, &user.id).await?;
    Ok(Json(groups))
}

/// POST /api/projects/:id/assistants/:assistant/groups
pub async fn create_group(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, assistant)): Path<(String, Assistant)>,
    Json(req): Json<GroupRequest>,
) -> Result<(StatusCode, Json<ChatGroup>), AppError> {
    ProjectRepository::get_owned(&state.db, &project_id, &user.id).await?;
    let name = validate_label(&req.name, "Group name")?;

    let group =
        ChatRepository::create_group(&state.db, assistant, &project_id, &user.id, &name).await?;

    Ok((StatusCode::CREATED, Json(group)))
}

/// PATCH /api/assistants/:assistant/groups/:group_id
pub async fn rename_group(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((assistant, group_id)): Path<(Assistant, String)>,
    Json(req): Json<GroupRequest>,
) -> Result<Json<ChatGroup>, AppError> {
    ChatRepository::get_owned_group(&state.db, assistant, &group_id, &user.id).await?;
    let name = validate_label(&req.name, "Group name")?;

    let group = ChatRepository::rename_group(&state.db, assistant, &group_id, &name).await?;
    Ok(Json(group))
}

/// DELETE /api/assistants/:assistant/groups/:group_id
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((assistant, group_id)): Path<(Assistant, String)>,
) -> Result<StatusCode, AppError> {
    ChatRepository::get_owned_group(&state.db, assistant, &group_id, &user.id).await?;
    ChatRepository::delete_group(&state.db, assistant, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/assistants/:assistant/chats/:chat_id
pub async fn update_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((assistant, chat_id)): Path<(Assistant, String)>,
    Json(req): Json<UpdateChatRequest>,
) -> Result<Json<Chat>, AppError> {
    let mut chat = ChatRepository::get_owned_chat(&state.db, assistant, &chat_id, &user.id).await?;

    if let Some(title) = req.title.as_deref() {
        let title = validate_label(title, "Chat title")?;
        chat = ChatRepository::rename_chat(&state.db, assistant, &chat_id, &title).await?;
    }

    if let Some(group_id) = req.group_id {
        if let Some(group_id) = group_id.as_deref() {
            let group =
                ChatRepository::get_owned_group(&state.db, assistant, group_id, &user.id).await?;
            if group.project_id != chat.project_id {
                return Err(AppError::Validation(
                    "Chat and group belong to different projects".to_string(),
                ));
            }
        }
        chat = ChatRepository::set_chat_group(&state.db, assistant, &chat_id, group_id.as_deref())
            .await?;
    }

    Ok(Json(chat))
}

/// DELETE /api/assistants/:assistant/chats/:chat_id
pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((assistant, chat_id)): Path<(Assistant, String)>,
) -> Result<StatusCode, AppError> {
    ChatRepository::get_owned_chat(&state.db, assistant, &chat_id, &user.id).await?;
    ChatRepository::delete_chat(&state.db, assistant, &chat_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/assistants/:assistant/chats/:chat_id/messages
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((assistant, chat_id)): Path<(Assistant, String)>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    ChatRepository::get_owned_chat(&state.db, assistant, &chat_id, &user.id).await?;
    let messages = ChatRepository::list_messages(&state.db, assistant, &chat_id).await?;
    Ok(Json(messages))
}
