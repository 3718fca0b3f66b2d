//! Transcript store - conversation history and the single-flight queue
//!
//! Handles:
//! - Ordered message history (system instruction first)
//! - The open assistant placeholder that grows while a reply streams
//! - Single-flight: one exchange at a time, later sends wait in a FIFO queue

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::errors::ControllerError;
use super::types::{Message, MessageId, PendingSend, Role};

/// What to do with an assistant reply that completed without any content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyReplyPolicy {
    /// Keep the empty assistant message in history
    #[default]
    Keep,
    /// Drop it from history as if the exchange failed
    Suppress,
}

/// A freshly opened exchange, ready to be sent to the chat service
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user: MessageId,
    pub assistant: MessageId,
    /// Ordered transcript up to and including the new user message
    pub payload: Vec<Message>,
}

/// Result of `Session::send`
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Blank input, nothing happened
    Ignored,
    /// Another exchange is in flight; the text waits at this 1-based position
    Queued { position: usize },
    /// A new exchange was opened and must be dispatched
    Dispatched(Exchange),
}

/// What happened to the assistant placeholder when its exchange settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The placeholder stays in history with its accumulated content
    Kept,
    /// The placeholder was removed from history
    Discarded,
}

/// Result of closing the in-flight exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub reply: ReplyOutcome,
    /// Next queued send, already removed from the queue
    pub next: Option<PendingSend>,
}

/// Conversation session: transcript, in-flight flag and pending queue
#[derive(Debug)]
pub struct Session {
    transcript: Vec<Message>,
    /// Id of the open assistant placeholder while an exchange is in flight
    in_flight: Option<MessageId>,
    queue: VecDeque<PendingSend>,
    next_id: u64,
    empty_reply: EmptyReplyPolicy,
}

impl Session {
    /// Create a session seeded with the system instruction
    ///
    /// A blank system prompt leaves the transcript empty.
    pub fn new(system_prompt: &str, empty_reply: EmptyReplyPolicy) -> Self {
        let mut session = Self {
            transcript: Vec::new(),
            in_flight: None,
            queue: VecDeque::new(),
            next_id: 0,
            empty_reply,
        };
        if !system_prompt.trim().is_empty() {
            let id = session.allocate_id();
            session
                .transcript
                .push(Message::new(id, Role::System, system_prompt));
        }
        session
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Submit user input
    ///
    /// While an exchange is in flight the text is queued; otherwise the user
    /// message and an empty assistant placeholder are appended and the
    /// exchange is returned for dispatch.
    pub fn send(&mut self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        if self.in_flight.is_some() {
            self.queue.push_back(PendingSend {
                text: text.to_string(),
            });
            return SendOutcome::Queued {
                position: self.queue.len(),
            };
        }

        let user = self.allocate_id();
        self.transcript.push(Message::new(user, Role::User, text));
        let payload = self.transcript.clone();

        let assistant = self.allocate_id();
        self.transcript
            .push(Message::new(assistant, Role::Assistant, String::new()));
        self.in_flight = Some(assistant);

        SendOutcome::Dispatched(Exchange {
            user,
            assistant,
            payload,
        })
    }

    /// Append streamed text to the open placeholder, returning the accumulator
    pub fn append_delta(&mut self, id: MessageId, text: &str) -> Result<&str, ControllerError> {
        self.check_in_flight(id)?;
        let message = self
            .transcript
            .iter_mut()
            .rev()
            .find(|m| m.id == id)
            .ok_or(ControllerError::UnknownMessage(id))?;
        message.content.push_str(text);
        Ok(&message.content)
    }

    /// Close the exchange after the stream ended normally
    pub fn complete(&mut self, id: MessageId) -> Result<Settlement, ControllerError> {
        self.check_in_flight(id)?;
        let empty = self.content_of(id).is_some_and(str::is_empty);
        let reply = if empty && self.empty_reply == EmptyReplyPolicy::Suppress {
            self.remove(id);
            ReplyOutcome::Discarded
        } else {
            ReplyOutcome::Kept
        };
        Ok(self.settle(reply))
    }

    /// Close the exchange after a transport failure
    ///
    /// Partial content is kept as the final reply; an empty placeholder is
    /// discarded from history.
    pub fn fail(&mut self, id: MessageId) -> Result<Settlement, ControllerError> {
        self.check_in_flight(id)?;
        let reply = if self.content_of(id).is_some_and(|c| !c.is_empty()) {
            ReplyOutcome::Kept
        } else {
            self.remove(id);
            ReplyOutcome::Discarded
        };
        Ok(self.settle(reply))
    }

    fn settle(&mut self, reply: ReplyOutcome) -> Settlement {
        self.in_flight = None;
        Settlement {
            reply,
            next: self.queue.pop_front(),
        }
    }

    fn check_in_flight(&self, id: MessageId) -> Result<(), ControllerError> {
        match self.in_flight {
            Some(open) if open == id => Ok(()),
            _ => Err(ControllerError::UnknownMessage(id)),
        }
    }

    fn remove(&mut self, id: MessageId) {
        self.transcript.retain(|m| m.id != id);
    }

    fn content_of(&self, id: MessageId) -> Option<&str> {
        self.message(id).map(|m| m.content.as_str())
    }

    /// Ordered history, including the open placeholder if any
    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.transcript.iter().find(|m| m.id == id)
    }

    pub fn history_len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Placeholder id of the exchange in flight
    pub fn in_flight_id(&self) -> Option<MessageId> {
        self.in_flight
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
