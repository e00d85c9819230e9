use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use url::Url;

use crate::chat_fsm::{transition, ChatAction, ChatPhase};
use crate::config::{Persona, DEFAULT_IDLE_TIMEOUT_SECS};
use crate::domains::chat::ChatRequest;
use crate::error::{ChatError, NayaError, Result};
use crate::sse::{Frame, SseDecoder};
use crate::transcript::Transcript;

/// HTTP side of the chat: posts a transcript to the relay and hands back the
/// streaming response.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    public_key: String,
    persona: Arc<Persona>,
    idle_timeout: Duration,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>, public_key: impl Into<String>, persona: Persona) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            public_key: public_key.into(),
            persona: Arc::new(persona),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Sends the request and waits for response headers. Any non-success
    /// status is an error; the relay's JSON error body is never shown as a reply.
    pub async fn open(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if !self.public_key.trim().is_empty() {
            builder = builder.bearer_auth(self.public_key.trim());
        }

        let response = timeout(self.idle_timeout, builder.send())
            .await
            .map_err(|_| NayaError::Http("timed out waiting for the relay".to_string()))??;

        let status = response.status();
        if !status.is_success() {
            let body = timeout(self.idle_timeout, response.text())
                .await
                .ok()
                .and_then(|body| body.ok())
                .unwrap_or_default();
            return Err(NayaError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { reply: String },
    Failed { reason: String },
    Cancelled,
}

/// A spawned turn. Dropping the handle detaches the turn; [`TurnHandle::abort`]
/// stops it and closes the connection.
pub struct TurnHandle {
    handle: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn finished(self) -> std::result::Result<TurnOutcome, ChatError> {
        match self.handle.await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_cancelled() => Ok(TurnOutcome::Cancelled),
            Err(err) => Err(ChatError::Join(err.to_string())),
        }
    }
}

/// One browser-session worth of conversation. Transcript snapshots and phase
/// changes are published on watch channels so renderers never hold up decoding.
#[derive(Clone)]
pub struct ChatSession {
    client: ChatClient,
    transcript: Arc<watch::Sender<Transcript>>,
    phase: Arc<watch::Sender<ChatPhase>>,
}

impl ChatSession {
    pub fn new(client: ChatClient) -> Self {
        let transcript = Transcript::seeded(client.persona());
        let (transcript, _) = watch::channel(transcript);
        let (phase, _) = watch::channel(ChatPhase::Idle);
        Self {
            client,
            transcript: Arc::new(transcript),
            phase: Arc::new(phase),
        }
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.transcript.subscribe()
    }

    pub fn phase(&self) -> ChatPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ChatPhase> {
        self.phase.subscribe()
    }

    pub fn can_send(&self, input: &str) -> bool {
        !input.trim().is_empty() && self.phase() == ChatPhase::Idle
    }

    pub fn handoff_url(&self) -> Option<Url> {
        self.transcript.borrow().handoff_url(self.client.persona())
    }

    /// Appends the user message and starts streaming the reply on a new task.
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, input: &str) -> std::result::Result<TurnHandle, ChatError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let accepted = self
            .phase
            .send_if_modified(|phase| match transition(*phase, ChatAction::Submit) {
                Some(next) => {
                    *phase = next;
                    true
                }
                None => false,
            });
        if !accepted {
            return Err(ChatError::Busy);
        }

        self.transcript.send_modify(|transcript| transcript.push_user(text));
        let request = self.transcript.borrow().request();
        // Armed before the spawn: an abort may land before the first poll.
        let guard = CancelGuard {
            transcript: self.transcript.clone(),
            phase: self.phase.clone(),
            armed: true,
        };
        let session = self.clone();
        let handle = tokio::spawn(async move { session.run_turn(request, guard).await });
        Ok(TurnHandle { handle })
    }

    #[tracing::instrument(name = "chat_turn", skip_all, fields(messages = request.messages.len()))]
    async fn run_turn(self, request: ChatRequest, guard: CancelGuard) -> TurnOutcome {
        let outcome = match self.stream_turn(&request).await {
            Ok(reply) => {
                self.transcript.send_modify(Transcript::finish_turn);
                self.advance(ChatAction::Finish);
                TurnOutcome::Completed { reply }
            }
            Err(err) => {
                tracing::warn!(error = %err, "chat turn failed; showing fallback");
                let fallback = self.client.persona().fallback_message.clone();
                self.transcript
                    .send_modify(|transcript| transcript.push_fallback(&fallback));
                self.advance(ChatAction::Fail);
                self.advance(ChatAction::Recover);
                TurnOutcome::Failed {
                    reason: err.detail(),
                }
            }
        };

        guard.disarm();
        outcome
    }

    async fn stream_turn(&self, request: &ChatRequest) -> Result<String> {
        let response = self.client.open(request).await?;
        self.advance(ChatAction::Accepted);

        let idle = self.client.idle_timeout();
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut content = String::new();
        loop {
            let next = timeout(idle, stream.next()).await.map_err(|_| {
                NayaError::Http("stream timed out waiting for response".to_string())
            })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            self.apply_frames(decoder.feed(&chunk), &mut content);
        }
        self.apply_frames(decoder.finish(), &mut content);
        Ok(content)
    }

    fn apply_frames(&self, frames: Vec<Frame>, content: &mut String) {
        let mut grew = false;
        for frame in frames {
            if let Frame::Delta(delta) = frame {
                content.push_str(&delta);
                grew = true;
            }
        }
        if grew {
            let snapshot = content.as_str();
            self.transcript
                .send_modify(|transcript| transcript.apply_assistant_text(snapshot));
        }
    }

    fn advance(&self, action: ChatAction) {
        self.phase.send_if_modified(|phase| match transition(*phase, action) {
            Some(next) => {
                *phase = next;
                true
            }
            None => {
                tracing::debug!(?phase, ?action, "ignored chat phase transition");
                false
            }
        });
    }
}

/// Returns the session to Idle when a turn task is dropped mid-flight.
struct CancelGuard {
    transcript: Arc<watch::Sender<Transcript>>,
    phase: Arc<watch::Sender<ChatPhase>>,
    armed: bool,
}

impl CancelGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.transcript.send_modify(Transcript::finish_turn);
        self.phase.send_modify(|phase| {
            if let Some(next) = transition(*phase, ChatAction::Cancel) {
                *phase = next;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        ChatSession::new(ChatClient::new(
            "http://127.0.0.1:9/naya-chat",
            "public",
            Persona::default(),
        ))
    }

    #[test]
    fn new_session_is_idle_with_greeting() {
        let session = session();
        assert_eq!(session.phase(), ChatPhase::Idle);
        assert_eq!(session.transcript().len(), 1);
        assert!(session.handoff_url().is_none());
        assert!(!session.can_send("   "));
        assert!(session.can_send("Bonjour"));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_touching_transcript() {
        let session = session();
        assert_eq!(session.submit("  \n").err(), Some(ChatError::EmptyInput));
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.phase(), ChatPhase::Idle);
    }

    #[test]
    fn cancel_guard_resets_phase() {
        let session = session();
        session.phase.send_replace(ChatPhase::Streaming);
        session
            .transcript
            .send_modify(|transcript| transcript.apply_assistant_text("partial"));
        drop(CancelGuard {
            transcript: session.transcript.clone(),
            phase: session.phase.clone(),
            armed: true,
        });
        assert_eq!(session.phase(), ChatPhase::Idle);

        session
            .transcript
            .send_modify(|transcript| transcript.apply_assistant_text("next"));
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn turns_are_traced_as_chat_turn_spans() {
        let (_guard, captured) = crate::logging::capture::span_closes();
        let session = session();
        let outcome = session.submit("Bonjour").unwrap().finished().await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));

        let output = captured.contents();
        assert!(output.contains("chat_turn"), "{output}");
        assert!(output.contains("messages=2"), "{output}");
        assert!(output.contains("time.busy"), "{output}");
    }
}
