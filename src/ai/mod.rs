pub mod gemini;
pub mod metering;

pub use gemini::GeminiClient;
pub use metering::{generate_ai_response, GenerateRequest, GenerationResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::Assistant;
use crate::error::AppError;

/// Models a project can buy tokens for and generate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiModel {
    #[serde(rename = "gemini-2.0-flash")]
    Gemini20Flash,
    #[serde(rename = "gemini-1.5-flash")]
    Gemini15Flash,
    #[serde(rename = "gemini-1.5-pro")]
    Gemini15Pro,
}

impl AiModel {
    pub const ALL: [AiModel; 3] = [
        AiModel::Gemini20Flash,
        AiModel::Gemini15Flash,
        AiModel::Gemini15Pro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiModel::Gemini20Flash => "gemini-2.0-flash",
            AiModel::Gemini15Flash => "gemini-1.5-flash",
            AiModel::Gemini15Pro => "gemini-1.5-pro",
        }
    }

    /// Token-pack price in cents per 1000 tokens.
    pub fn cents_per_thousand(&self) -> i64 {
        match self {
            AiModel::Gemini20Flash | AiModel::Gemini15Flash => 1,
            AiModel::Gemini15Pro => 5,
        }
    }
}

impl std::fmt::Display for AiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AiModel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AiModel::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown model: {}", s)))
    }
}

/// Token cost of a piece of text: one token per four bytes, rounded up.
pub fn estimate_tokens(text: &str) -> i64 {
    (text.len() as i64 + 3) / 4
}

pub fn system_instruction(assistant: Assistant) -> &'static str {
    match assistant {
        Assistant::General => {
            "You are a helpful assistant embedded in a project management dashboard. \
             Answer clearly and concisely, using Markdown where it helps readability."
        }
        Assistant::Sql => {
            "You are an expert SQL assistant. Answer with correct, idiomatic SQL inside \
             ```sql fenced blocks, followed by a short explanation of what the query does \
             and any assumptions about the schema."
        }
    }
}

/// Text generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
        model: AiModel,
    ) -> Result<String, AppError>;
}
