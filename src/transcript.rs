use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::config::Persona;
use crate::domains::chat::{ChatMessage, ChatRequest, ChatRole};

/// The hand-off link is offered once the seeded greeting has been followed by a
/// few turns.
pub const HANDOFF_MIN_MESSAGES: usize = 4;

/// Everything except RFC 3986 unreserved characters; spaces become `%20`.
const HANDOFF_TEXT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    seeded: usize,
    streaming: Option<usize>,
}

impl Transcript {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(greeting)],
            seeded: 1,
            streaming: None,
        }
    }

    pub fn seeded(persona: &Persona) -> Self {
        Self::new(persona.greeting.clone())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.streaming = None;
        self.messages.push(ChatMessage::user(content));
    }

    /// Shows `accumulated` as the assistant reply of the current turn. The
    /// first call of a turn appends a message; later calls replace it.
    pub fn apply_assistant_text(&mut self, accumulated: &str) {
        match self.streaming {
            Some(index) => {
                if let Some(message) = self.messages.get_mut(index) {
                    message.content.clear();
                    message.content.push_str(accumulated);
                }
            }
            None => {
                self.messages.push(ChatMessage::assistant(accumulated));
                self.streaming = Some(self.messages.len() - 1);
            }
        }
    }

    pub fn finish_turn(&mut self) {
        self.streaming = None;
    }

    pub fn push_fallback(&mut self, fallback: &str) {
        self.finish_turn();
        self.messages.push(ChatMessage::assistant(fallback));
    }

    pub fn request(&self) -> ChatRequest {
        ChatRequest {
            messages: self.messages.clone(),
        }
    }

    /// Role-prefixed lines of every message after the seeded greeting.
    pub fn summary(&self, persona: &Persona) -> String {
        self.messages
            .iter()
            .skip(self.seeded)
            .map(|message| {
                let label = match message.role {
                    ChatRole::User => persona.client_label.as_str(),
                    ChatRole::Assistant => persona.assistant_label.as_str(),
                };
                format!("{label}: {}", message.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn handoff_url(&self, persona: &Persona) -> Option<Url> {
        if self.messages.len() < HANDOFF_MIN_MESSAGES {
            return None;
        }
        let handoff = &persona.handoff;
        let text = format!(
            "{}\n\n{}\n\n{}",
            handoff.intro,
            self.summary(persona),
            handoff.outro
        );
        let mut url = Url::parse(&format!("https://wa.me/{}", handoff.phone)).ok()?;
        let encoded = utf8_percent_encode(&text, HANDOFF_TEXT);
        url.set_query(Some(&format!("text={encoded}")));
        Some(url)
    }
}
