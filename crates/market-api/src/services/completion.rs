//! AI 완성(completion) 제공자.
//!
//! 시장 분석 엔드포인트는 완성 제공자를 불투명한 협력자로 다룹니다.
//! [`OpenAiCompletion`]은 OpenAI 호환 `chat/completions` API를 호출합니다.

use async_trait::async_trait;
use market_core::AiConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// 시장 데이터 컨텍스트 최대 길이 (문자).
pub const MARKET_CONTEXT_LIMIT: usize = 5000;

/// 완성 제공자 에러.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("요청 한도 초과")]
    RateLimited,

    #[error("완성 요청 실패: HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("잘못된 응답: {0}")]
    InvalidResponse(String),

    #[error("네트워크 에러: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// 완성 제공자 trait.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 대화에 이어질 assistant 응답 한 개를 생성합니다.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;

    fn name(&self) -> &str;
}

/// 시장 데이터 컨텍스트를 담은 시스템 프롬프트.
pub fn system_prompt(market_data: Option<&serde_json::Value>) -> String {
    let context = market_data
        .map(|data| {
            let json = data.to_string();
            json.chars().take(MARKET_CONTEXT_LIMIT).collect::<String>()
        })
        .unwrap_or_else(|| "{}".to_string());

    format!(
        "You are an AI financial analyst for a market terminal dashboard.\n\
         You provide concise, insightful commentary and answer questions about market data.\n\
         Current market data context: {}\n\
         Keep responses brief, professional, and focused on financial insights.\n\
         Never provide investment advice or make specific trading recommendations.",
        context
    )
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI 호환 HTTP 완성 제공자.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompletion {
    pub fn new(api_key: impl Into<String>, config: &AiConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// API 키가 설정된 경우에만 생성합니다.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, CompletionError> {
        match config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Self::new(key, config).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, messages = messages.len(), "Requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                warn!("Completion provider rate limited");
                return Err(CompletionError::RateLimited);
            }
            error!(status = status.as_u16(), %body, "Completion request failed");
            return Err(CompletionError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("no choices".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: String) -> AiConfig {
        AiConfig {
            api_key: Some("sk-test".to_string()),
            base_url,
            ..Default::default()
        }
    }

    #[test]
    fn test_system_prompt_truncates_context() {
        let big = serde_json::json!({ "blob": "x".repeat(10_000) });
        let prompt = system_prompt(Some(&big));
        let context_line = prompt
            .lines()
            .find(|l| l.starts_with("Current market data context: "))
            .unwrap();
        assert_eq!(
            context_line.len(),
            "Current market data context: ".len() + MARKET_CONTEXT_LIMIT
        );
        assert!(system_prompt(None).contains("context: {}"));
        assert!(prompt.contains("Never provide investment advice"));
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(OpenAiCompletion::from_config(&AiConfig::default())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Markets are mixed."}}]}"#)
            .create_async()
            .await;

        let provider = OpenAiCompletion::new("sk-test", &config(server.url())).unwrap();
        let reply = provider
            .complete(&[ChatMessage::system("hi")])
            .await
            .unwrap();

        assert_eq!(reply, "Markets are mixed.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_maps_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let provider = OpenAiCompletion::new("sk-test", &config(server.url())).unwrap();
        let err = provider.complete(&[]).await.unwrap_err();
        assert!(matches!(err, CompletionError::RateLimited));
    }
}
