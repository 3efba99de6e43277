use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Per-model token counts, keyed by model name.
pub type TokenBalances = BTreeMap<String, i64>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserMetadata {
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub metadata: Json<UserMetadata>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectMetadata {
    pub banner_url: Option<String>,
    pub icon_url: Option<String>,
    pub links: BTreeMap<String, String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: Json<ProjectMetadata>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TokenPack {
    pub id: String,
    pub project_id: String,
    pub tokens_purchased: Json<TokenBalances>,
    pub remaining_tokens: Json<TokenBalances>,
    pub price_paid: i64,
    pub expires_at: i64,
    pub created_at: i64,
}

impl TokenPack {
    pub fn remaining_for(&self, model: &str) -> i64 {
        self.remaining_tokens.get(model).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TokenTransaction {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub pack_id: String,
    pub stripe_session_id: String,
    pub model: String,
    pub tokens: i64,
    pub amount_cents: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TokenUsageLog {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub chat_id: String,
    pub assistant: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub created_at: i64,
}

/// Which assistant a chat belongs to. Each one owns its own set of tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assistant {
    #[serde(rename = "ai")]
    General,
    Sql,
}

impl Assistant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Assistant::General => "ai",
            Assistant::Sql => "sql",
        }
    }

    pub fn chats_table(&self) -> &'static str {
        match self {
            Assistant::General => "ai_chats",
            Assistant::Sql => "sql_chats",
        }
    }

    pub fn groups_table(&self) -> &'static str {
        match self {
            Assistant::General => "ai_chat_groups",
            Assistant::Sql => "sql_chat_groups",
        }
    }

    pub fn messages_table(&self) -> &'static str {
        match self {
            Assistant::General => "ai_messages",
            Assistant::Sql => "sql_messages",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub group_id: Option<String>,
    pub title: String,
    pub total_tokens_used: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatGroup {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub role: String,
    pub content: String,
    pub tokens_used: i64,
    pub ai_model: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConceptMetadata {
    pub tags: Vec<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub project_id: String,
    pub created_by: String,
    pub title: String,
    pub description: Option<String>,
    pub metadata: Json<ConceptMetadata>,
    pub scheduled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Update {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub tag: String,
    pub version: Option<String>,
    pub created_at: i64,
}
