use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AiModel, GenerationProvider};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn build_url(&self, model: AiModel) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model.as_str())
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
        model: AiModel,
    ) -> Result<String, AppError> {
        let body = GenerateContentRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system_instruction.to_string() }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
        };

        let response = self
            .client
            .post(self.build_url(model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                AppError::Generation(format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to read Gemini error body: {}", e);
                    String::new()
                }
            };
            let message = serde_json::from_str::<GeminiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            tracing::error!("Gemini API error {}: {}", status, message);
            return Err(AppError::Generation(format!("API error {}: {}", status, message)));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            AppError::Generation(format!("Invalid response: {}", e))
        })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Generation("No candidates returned".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(AppError::Generation(format!("Empty response (finish reason: {})", reason)));
        }

        Ok(text)
    }
}
