//! Chat turn state machine.
//!
//! A turn appends the user's message and a placeholder in one step, then
//! replaces the placeholder with exactly one resolved or failed system message.
//! The [`PendingTurn`] ticket returned by [`ChatTurnController::begin`] is the
//! only way to finish a turn, so the placeholder slot cannot be resolved twice.
//! Dropping the ticket abandons the turn: the composer is released at once and
//! the placeholder is failed no later than the next `begin`.

use proto::{AiEnvelope, AiReply, ChatMessage};
use std::future::Future;
use std::rc::{Rc, Weak};

/// Text shown in the reserved slot while the request is in flight.
pub const PLACEHOLDER: &str = "...";
/// Shown when `/api/ai` answers with a non-success status.
pub const HTTP_ERROR_MESSAGE: &str = "Erro ao chamar a API";
/// Prefix of the message shown when the request itself failed.
pub const UNEXPECTED_ERROR_PREFIX: &str = "Erro inesperado: ";
/// Reason recorded for a turn whose request was abandoned.
pub const CANCELLED_REASON: &str = "requisição cancelada";

/// Lifecycle of the most recent turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Pending,
    Resolved,
    Failed,
}

/// Why a turn could not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a turn is already pending")]
    Busy,
}

/// Raw HTTP answer of `POST /api/ai`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Ticket for the placeholder slot of an in-flight turn.
#[derive(Debug)]
#[must_use = "a pending turn must be finished to clear the loading flag"]
pub struct PendingTurn {
    slot: usize,
    text: String,
    ticket: Rc<()>,
}

impl PendingTurn {
    /// The (trimmed) text the user submitted.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The controller's side of an outstanding ticket.
#[derive(Debug, Clone)]
struct PendingSlot {
    slot: usize,
    ticket: Weak<()>,
}

impl PendingSlot {
    fn is_live(&self) -> bool {
        self.ticket.strong_count() > 0
    }

    fn issued(&self, turn: &PendingTurn) -> bool {
        Weak::ptr_eq(&self.ticket, &Rc::downgrade(&turn.ticket))
    }
}

/// Conversation log plus the state of its latest turn.
#[derive(Debug, Clone)]
pub struct ChatTurnController {
    messages: Vec<ChatMessage>,
    phase: TurnPhase,
    pending: Option<PendingSlot>,
}

impl Default for ChatTurnController {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTurnController {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            phase: TurnPhase::Idle,
            pending: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Phase of the latest turn. An abandoned turn counts as failed.
    pub fn phase(&self) -> TurnPhase {
        if self.phase == TurnPhase::Pending && !self.is_loading() {
            TurnPhase::Failed
        } else {
            self.phase
        }
    }

    /// `true` while a turn is pending; the composer stays disabled meanwhile.
    pub fn is_loading(&self) -> bool {
        self.pending.as_ref().is_some_and(PendingSlot::is_live)
    }

    /// Appends the user message and the placeholder.
    pub fn begin(&mut self, input: &str) -> Result<PendingTurn, TurnError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyMessage);
        }
        if self.is_loading() {
            return Err(TurnError::Busy);
        }
        self.abandon();

        self.messages.push(ChatMessage::user(text));
        self.messages.push(ChatMessage::system(PLACEHOLDER));
        self.phase = TurnPhase::Pending;

        let ticket = Rc::new(());
        let slot = self.messages.len() - 1;
        self.pending = Some(PendingSlot {
            slot,
            ticket: Rc::downgrade(&ticket),
        });

        Ok(PendingTurn {
            slot,
            text: text.to_string(),
            ticket,
        })
    }

    /// Replaces the turn's placeholder with the outcome of the request.
    ///
    /// A ticket this controller did not issue cannot address its log; the
    /// message is appended instead.
    pub fn finish(
        &mut self,
        turn: PendingTurn,
        outcome: Result<HttpReply, String>,
    ) -> &ChatMessage {
        let (message, phase) = match outcome {
            Ok(reply) if reply.is_success() => match parse_reply(&reply.body) {
                Ok(reply) => (reply.into_message(), TurnPhase::Resolved),
                Err(reason) => (unexpected(&reason), TurnPhase::Failed),
            },
            Ok(_) => (ChatMessage::system(HTTP_ERROR_MESSAGE), TurnPhase::Failed),
            Err(err) => (unexpected(&err), TurnPhase::Failed),
        };

        let issued = self.pending.as_ref().is_some_and(|p| p.issued(&turn));
        if issued {
            self.pending = None;
            self.phase = phase;
        }

        let index = match self.messages.get_mut(turn.slot).filter(|_| issued) {
            Some(slot) => {
                *slot = message;
                turn.slot
            }
            None => {
                self.messages.push(message);
                self.messages.len() - 1
            }
        };
        &self.messages[index]
    }

    /// Runs one full turn: begin, await `send`, finish.
    ///
    /// `send` receives the trimmed text and returns the raw HTTP reply, or the
    /// transport error as text. If the returned future is dropped before
    /// `send` completes, the placeholder is failed immediately.
    pub async fn submit<F, Fut>(&mut self, input: &str, send: F) -> Result<&ChatMessage, TurnError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<HttpReply, String>>,
    {
        let turn = self.begin(input)?;
        let mut in_flight = InFlight {
            controller: &mut *self,
            armed: true,
        };
        let outcome = send(turn.text.clone()).await;
        in_flight.armed = false;
        drop(in_flight);
        Ok(self.finish(turn, outcome))
    }

    /// Fails the placeholder of an outstanding turn, if any.
    fn abandon(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if let Some(slot) = self.messages.get_mut(pending.slot)
            && slot.message == PLACEHOLDER
        {
            *slot = unexpected(CANCELLED_REASON);
        }
        self.phase = TurnPhase::Failed;
    }
}

/// Fails the turn when `submit` is dropped while awaiting the request.
struct InFlight<'a> {
    controller: &'a mut ChatTurnController,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon();
        }
    }
}

fn parse_reply(body: &str) -> Result<AiReply, String> {
    let envelope: AiEnvelope = serde_json::from_str(body).map_err(|e| e.to_string())?;
    AiReply::from_payload(&envelope.message).ok_or_else(|| "resposta sem mensagem".to_string())
}

fn unexpected(reason: &str) -> ChatMessage {
    ChatMessage::system(format!("{UNEXPECTED_ERROR_PREFIX}{reason}"))
}
