//! Chat-completion and image-analysis provider.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::models::{ChatMessage, OpenAiConfig, Role};

/// Language-model collaborator behind a chat session.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Answer the last user message of `history` under `system_prompt`.
    async fn complete(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> Result<String, ProviderError>;

    /// Describe `image` following `prompt`.
    async fn analyze_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: Role,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Content<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Provider for the OpenAI `/chat/completions` API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    chat_model: String,
    vision_model: String,
    vision_max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("OPENAI_API_KEY is not set".into()))?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| ProviderError::NotConfigured(format!("invalid OpenAI API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            vision_model: config.vision_model.clone(),
            vision_max_tokens: config.vision_max_tokens,
        })
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Api { status, message });
        }

        let parsed: ChatResponse = response.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        debug!(model = request.model, chars = answer.len(), "completion received");
        Ok(answer)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = completion_request(&self.chat_model, history, system_prompt);
        self.send(&request).await
    }

    async fn analyze_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = vision_request(
            &self.vision_model,
            self.vision_max_tokens,
            image_data_url(image, mime_type),
            prompt,
        );
        self.send(&request).await
    }
}

fn completion_request<'a>(
    model: &'a str,
    history: &'a [ChatMessage],
    system_prompt: &'a str,
) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(RequestMessage {
        role: Role::System,
        content: Content::Text(system_prompt),
    });
    messages.extend(history.iter().map(|m| RequestMessage {
        role: m.role,
        content: Content::Text(&m.content),
    }));
    ChatRequest {
        model,
        messages,
        max_tokens: None,
    }
}

fn vision_request<'a>(
    model: &'a str,
    max_tokens: u32,
    data_url: String,
    prompt: &'a str,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![RequestMessage {
            role: Role::User,
            content: Content::Parts(vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ]),
        }],
        max_tokens: Some(max_tokens),
    }
}

/// Inline an image as a `data:` URL.
pub fn image_data_url(image: &[u8], mime_type: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(image);
    format!("data:{mime_type};base64,{encoded}")
}

/// MIME type of a supported photo, by extension.
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = OpenAiProvider::new(&OpenAiConfig::default());
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_completion_request_shape() {
        let history = vec![
            ChatMessage::user("My sink is clogged"),
            ChatMessage::assistant("Try a plunger first."),
            ChatMessage::user("Didn't work"),
        ];
        let request = completion_request("gpt-4o", &history, "You are a plumber.");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are a plumber.");
        assert_eq!(body["messages"][3]["role"], "user");
        assert_eq!(body["messages"][3]["content"], "Didn't work");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_vision_request_shape() {
        let request = vision_request("gpt-4o", 500, image_data_url(b"abc", "image/png"), "Look");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["max_tokens"], 500);
        let parts = &body["messages"][0]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "Look");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(Path::new("ant.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("ant.jpeg")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("ant.png")), Some("image/png"));
        assert_eq!(image_mime_type(Path::new("ant.gif")), None);
        assert_eq!(image_mime_type(Path::new("ant")), None);
    }
}
