use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body accepted by the relay and sent by the chat client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamRole {
    System,
    User,
    Assistant,
}

impl From<ChatRole> for UpstreamRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => UpstreamRole::User,
            ChatRole::Assistant => UpstreamRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamMessage {
    pub role: UpstreamRole,
    pub content: String,
}

/// OpenAI-shaped chat completion request, always streamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub stream: bool,
}

impl UpstreamRequest {
    pub fn with_system_prompt(model: &str, system_prompt: &str, conversation: &[ChatMessage]) -> Self {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(UpstreamMessage {
            role: UpstreamRole::System,
            content: system_prompt.to_string(),
        });
        messages.extend(conversation.iter().map(|message| UpstreamMessage {
            role: message.role.into(),
            content: message.content.clone(),
        }));
        Self {
            model: model.to_string(),
            messages,
            stream: true,
        }
    }
}
