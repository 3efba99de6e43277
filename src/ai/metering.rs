//! Token-metered generation shared by the general and SQL assistants.
//!
//! The flow is: estimate the prompt cost, check it against the project's
//! active token pack, call the generation backend once, persist the
//! exchange, then charge the pack and append a usage log row.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use super::{estimate_tokens, system_instruction, AiModel, GenerationProvider};
use crate::db::{
    Assistant, ChatMessage, ChatRepository, MessageRole, NewUsage, ProjectRepository,
    TokenLedgerRepository, TokenPackRepository,
};
use crate::error::AppError;

const MAX_PROMPT_BYTES: usize = 32 * 1024;
const TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub chat_id: Option<String>,
    pub model: AiModel,
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub chat_id: String,
    pub user_message: Option<ChatMessage>,
    pub message: ChatMessage,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub tokens_used: i64,
    pub remaining_tokens: i64,
}

fn chat_title(prompt: &str) -> String {
    let title: String = prompt.trim().chars().take(TITLE_CHARS).collect();
    title.trim_end().to_string()
}

pub async fn generate_ai_response(
    db: &Pool<Sqlite>,
    generator: &dyn GenerationProvider,
    token_buffer: i64,
    assistant: Assistant,
    user_id: &str,
    project_id: &str,
    req: GenerateRequest,
) -> Result<GenerationResult, AppError> {
    // Charged and stored as sent; whitespace-only prompts are still rejected.
    let prompt = req.prompt.as_str();
    if prompt.trim().is_empty() || prompt.len() > MAX_PROMPT_BYTES {
        return Err(AppError::Validation(format!(
            "Prompt must be 1-{} bytes",
            MAX_PROMPT_BYTES
        )));
    }

    ProjectRepository::get_owned(db, project_id, user_id).await?;

    let existing_chat = match req.chat_id.as_deref() {
        Some(chat_id) => {
            let chat = ChatRepository::get_owned_chat(db, assistant, chat_id, user_id).await?;
            if chat.project_id != project_id {
                return Err(AppError::Validation("Chat belongs to another project".to_string()));
            }
            Some(chat)
        }
        None => None,
    };

    let model = req.model.as_str();
    let input_tokens = estimate_tokens(prompt);
    let required = input_tokens + token_buffer;

    let pack = TokenPackRepository::active_for_project(db, project_id).await?;
    let available = pack.as_ref().map(|p| p.remaining_for(model)).unwrap_or(0);

    let pack = match pack {
        Some(pack) if required <= available => pack,
        _ => {
            tracing::warn!(
                "Insufficient tokens for project {} on {}: {} required, {} available",
                project_id,
                model,
                required,
                available
            );
            return Err(AppError::InsufficientTokens { required, available });
        }
    };

    let text = generator
        .generate(system_instruction(assistant), prompt, req.model)
        .await?;
    let output_tokens = estimate_tokens(&text);
    let tokens_used = input_tokens + output_tokens;

    let chat = match existing_chat {
        Some(chat) => chat,
        None => {
            ChatRepository::create_chat(db, assistant, project_id, user_id, &chat_title(prompt))
                .await?
        }
    };

    let user_message = if req.regenerate {
        None
    } else {
        Some(
            ChatRepository::add_message(
                db,
                assistant,
                &chat.id,
                MessageRole::User,
                prompt,
                input_tokens,
                None,
            )
            .await?,
        )
    };

    let message = ChatRepository::add_message(
        db,
        assistant,
        &chat.id,
        MessageRole::Assistant,
        &text,
        output_tokens,
        Some(model),
    )
    .await?;

    ChatRepository::add_tokens_used(db, assistant, &chat.id, tokens_used).await?;

    let pack = TokenPackRepository::deduct(db, &pack.id, model, tokens_used).await?;

    TokenLedgerRepository::record_usage(
        db,
        NewUsage {
            project_id,
            user_id,
            chat_id: &chat.id,
            assistant: assistant.as_str(),
            model,
            input_tokens,
            output_tokens,
        },
    )
    .await?;

    let remaining_tokens = pack.remaining_for(model);
    tracing::info!(
        "Generated {} response in chat {} ({} tokens on {}, {} remaining)",
        assistant.as_str(),
        chat.id,
        tokens_used,
        model,
        remaining_tokens
    );

    Ok(GenerationResult {
        chat_id: chat.id,
        user_message,
        message,
        input_tokens,
        output_tokens,
        tokens_used,
        remaining_tokens,
    })
}
