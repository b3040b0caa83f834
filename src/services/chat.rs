//! Conversation state for one assistant category.

use std::sync::Arc;

use tracing::{debug, warn};

use super::provider::ChatProvider;
use crate::models::{Category, ChatConfig, ChatMessage, Role};

/// Words that make the assistant ask for a photo instead of answering.
const PEST_KEYWORDS: &[&str] = &["bug", "pest", "insect", "rodent", "creature"];

pub const IMAGE_REQUEST: &str = "To better assist you, could you please provide a picture of \
the bug or pest you're dealing with? This will help me identify the species and provide more \
specific advice for control and treatment.";

/// What a user turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// The assistant answered (possibly with an `Error: ...` text).
    Reply(String),
    /// The assistant asked for a photo before answering.
    ImageRequested(String),
    /// The session is full; nothing was recorded.
    LimitReached { max_messages: usize },
}

pub struct ChatSession {
    category: Category,
    provider: Arc<dyn ChatProvider>,
    messages: Vec<ChatMessage>,
    waiting_for_image: bool,
    max_messages: usize,
    max_history: usize,
}

fn mentions_pest(text: &str) -> bool {
    let lower = text.to_lowercase();
    PEST_KEYWORDS.iter().any(|word| lower.contains(word))
}

impl ChatSession {
    pub fn new(category: Category, provider: Arc<dyn ChatProvider>, config: &ChatConfig) -> Self {
        Self {
            category,
            provider,
            messages: Vec::new(),
            waiting_for_image: false,
            max_messages: config.max_messages,
            max_history: config.max_history.max(1),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn waiting_for_image(&self) -> bool {
        self.waiting_for_image
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// User turns taken so far.
    pub fn message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    pub fn limit_reached(&self) -> bool {
        self.message_count() >= self.max_messages
    }

    /// Handle one user message.
    pub async fn send(&mut self, text: &str) -> Turn {
        if self.limit_reached() {
            return Turn::LimitReached {
                max_messages: self.max_messages,
            };
        }

        self.messages.push(ChatMessage::user(text));

        if mentions_pest(text) {
            debug!(category = self.category.slug(), "pest mentioned, requesting photo");
            self.waiting_for_image = true;
            self.messages.push(ChatMessage::assistant(IMAGE_REQUEST));
            return Turn::ImageRequested(IMAGE_REQUEST.to_string());
        }

        let start = self.messages.len().saturating_sub(self.max_history);
        let system_prompt = self.category.full_system_prompt();
        let reply = match self
            .provider
            .complete(&self.messages[start..], &system_prompt)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(category = self.category.slug(), error = %e, "completion failed");
                format!("Error: {e}")
            }
        };

        self.messages.push(ChatMessage::assistant(&reply));
        Turn::Reply(reply)
    }

    /// Analyze a user photo and record the analysis as an assistant message.
    pub async fn submit_image(&mut self, image: &[u8], mime_type: &str) -> String {
        let analysis = match self
            .provider
            .analyze_image(image, mime_type, self.category.image_prompt())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(category = self.category.slug(), error = %e, "image analysis failed");
                format!("Error analyzing image: {e}")
            }
        };

        self.waiting_for_image = false;
        self.messages.push(ChatMessage::assistant(&analysis));
        analysis
    }

    /// Start a new session in the same category.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.waiting_for_image = false;
    }
}
