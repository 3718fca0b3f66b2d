//! Session Controller - the single owner of session state
//!
//! Orchestrates Session, RenderPipeline, ExecutionDispatcher and
//! ClipboardService. Network work runs in spawned tasks that report back over
//! an internal channel, so every state change happens on the controller's own
//! task and no locks are needed.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::clipboard::{ClipboardService, ClipboardSink, CopyTicket, SystemClipboard};
use crate::config::Config;
use crate::core::errors::ControllerError;
use crate::core::transcript::{Exchange, ReplyOutcome, SendOutcome, Session, Settlement};
use crate::core::types::{BlockRef, MessageId};
use crate::llm::streaming::{decode_fragments, StreamItem, StreamSummary};
use crate::llm::{ChatBackend, ChatRequest, HttpChatBackend, TransportError};
use crate::render::RenderPipeline;
use crate::sandbox::{ExecutionBackend, ExecutionDispatcher, ExecutionOutcome, HttpExecutionBackend};

use super::commands::{BlockTarget, Intent};
use super::events::SessionEvent;

/// Notice shown when a chat request fails
pub const CHAT_ERROR_NOTICE: &str =
    "Sorry, there was an error processing your request. Please try again.";

/// Completions reported by spawned tasks
#[derive(Debug)]
enum Internal {
    Stream { id: MessageId, item: StreamItem },
    ExecutionDone {
        block: BlockRef,
        outcome: ExecutionOutcome,
    },
    CopyExpired(CopyTicket),
}

/// Session Controller
///
/// Consumes [`Intent`]s and emits [`SessionEvent`]s. Owns the transcript and
/// every code block.
pub struct SessionController {
    session: Session,
    pipeline: RenderPipeline,
    chat: Arc<dyn ChatBackend>,
    dispatcher: ExecutionDispatcher,
    clipboard: ClipboardService,
    instance: Option<String>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    /// Executions dispatched but not yet reported back
    running: usize,
    quit_when_idle: bool,
}

impl SessionController {
    /// Create a controller with explicit backends
    pub fn new(
        config: &Config,
        chat: Arc<dyn ChatBackend>,
        executor: Arc<dyn ExecutionBackend>,
        clipboard: Box<dyn ClipboardSink>,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            session: Session::new(&config.chat.system_prompt, config.chat.empty_reply),
            pipeline: RenderPipeline::new(config.render.theme),
            chat,
            dispatcher: ExecutionDispatcher::new(executor),
            clipboard: ClipboardService::new(clipboard, config.clipboard.feedback()),
            instance: config.chat.instance.clone(),
            event_tx,
            internal_tx,
            internal_rx,
            running: 0,
            quit_when_idle: false,
        }
    }

    /// Create a controller talking to the configured HTTP services and the
    /// system clipboard
    pub fn from_config(config: &Config, event_tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        let chat = Arc::new(HttpChatBackend::new(config.chat.endpoint.clone()));
        let executor = Arc::new(HttpExecutionBackend::new(config.sandbox.endpoint.clone()));
        Self::new(config, chat, executor, Box::new(SystemClipboard), event_tx)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Process intents until `Intent::Quit`, the intent channel closes, or
    /// the session goes idle after `Intent::QuitWhenIdle`
    ///
    /// Returns the controller so callers can inspect the final state.
    pub async fn run(mut self, mut intents: mpsc::UnboundedReceiver<Intent>) -> Self {
        tracing::debug!("Session controller started");
        loop {
            if self.quit_when_idle && self.is_idle() {
                break;
            }
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Quit) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
                Some(message) = self.internal_rx.recv() => self.handle_internal(message),
            }
        }
        tracing::debug!("Session controller stopped");
        self
    }

    /// No exchange in flight, nothing queued and no execution outstanding
    pub fn is_idle(&self) -> bool {
        !self.session.is_in_flight() && self.session.queue_len() == 0 && self.running == 0
    }

    /// Handle one intent
    pub fn handle_intent(&mut self, intent: Intent) {
        let result = match intent {
            Intent::Send(text) => {
                self.send(&text);
                Ok(())
            }
            Intent::Copy(target) => self.copy(target),
            Intent::Execute(target) => self.execute(target),
            Intent::History => {
                self.emit(SessionEvent::History(self.session.messages().to_vec()));
                Ok(())
            }
            Intent::QuitWhenIdle => {
                tracing::debug!("Stopping once idle");
                self.quit_when_idle = true;
                Ok(())
            }
            Intent::Quit => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!("{}", e);
            self.emit(SessionEvent::Error(e.to_string()));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // a front-end that has gone away just stops receiving
        let _ = self.event_tx.send(event);
    }

    fn notice(&self, text: &str) {
        self.emit(SessionEvent::Notice {
            text: text.to_string(),
            tree: self.pipeline.render_detached(text),
        });
    }

    fn send(&mut self, text: &str) {
        match self.session.send(text) {
            SendOutcome::Ignored => tracing::debug!("Ignoring blank input"),
            SendOutcome::Queued { position } => {
                tracing::info!("Exchange in flight, queued input at position {}", position);
                self.emit(SessionEvent::Queued {
                    text: text.trim().to_string(),
                    position,
                });
            }
            SendOutcome::Dispatched(exchange) => self.dispatch(exchange),
        }
    }

    fn dispatch(&mut self, exchange: Exchange) {
        let id = exchange.assistant;
        let user_text = exchange
            .payload
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.emit(SessionEvent::UserMessage {
            id: exchange.user,
            text: user_text,
        });

        self.pipeline.update(id, "");
        self.emit(SessionEvent::ExchangeStarted { id });

        let request = ChatRequest::new(&exchange.payload, self.instance.clone());
        let chat = Arc::clone(&self.chat);
        let tx = self.internal_tx.clone();
        tracing::info!(
            "Sending {} messages to {} backend",
            request.messages.len(),
            chat.name()
        );

        tokio::spawn(async move {
            let fragments = match chat.open_stream(request).await {
                Ok(fragments) => fragments,
                Err(error) => {
                    let _ = tx.send(Internal::Stream {
                        id,
                        item: StreamItem::Failed(error),
                    });
                    return;
                }
            };

            let items = decode_fragments(fragments);
            tokio::pin!(items);
            while let Some(item) = items.next().await {
                if tx.send(Internal::Stream { id, item }).is_err() {
                    break;
                }
            }
        });
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Stream { id, item } => match item {
                StreamItem::Delta(delta) => self.on_delta(id, &delta.text),
                StreamItem::End(summary) => self.on_stream_end(id, summary),
                StreamItem::Failed(error) => self.on_stream_failed(id, error),
            },
            Internal::ExecutionDone { block, outcome } => self.on_execution_done(block, outcome),
            Internal::CopyExpired(ticket) => self.on_copy_expired(ticket),
        }
    }

    fn on_delta(&mut self, id: MessageId, text: &str) {
        let accumulated = match self.session.append_delta(id, text) {
            Ok(accumulated) => accumulated.to_string(),
            Err(e) => {
                tracing::warn!("Dropping delta: {}", e);
                return;
            }
        };

        self.emit(SessionEvent::Delta {
            id,
            text: text.to_string(),
        });
        let tree = self.pipeline.update(id, &accumulated).clone();
        self.emit(SessionEvent::Rendered { id, tree });
    }

    fn on_stream_end(&mut self, id: MessageId, summary: StreamSummary) {
        if !summary.diagnostics.is_empty() {
            tracing::info!(
                "Stream for {} had {} malformed records",
                id,
                summary.diagnostics.len()
            );
        }

        match self.session.complete(id) {
            Ok(settlement) => {
                if let Some(message) = self.session.message(id) {
                    if message.content != summary.accumulated {
                        tracing::warn!("Transcript and decoder disagree on reply {}", id);
                    }
                }
                for error in &summary.upstream_errors {
                    tracing::warn!("Chat service reported an error: {}", error);
                }
                let next = self.settle(id, settlement);
                if !summary.upstream_errors.is_empty() {
                    self.notice(CHAT_ERROR_NOTICE);
                }
                if let Some(text) = next {
                    self.send(&text);
                }
            }
            Err(e) => tracing::warn!("Stream end for closed exchange: {}", e),
        }
    }

    fn on_stream_failed(&mut self, id: MessageId, error: TransportError) {
        tracing::error!("Chat request failed: {}", error);
        match self.session.fail(id) {
            Ok(settlement) => {
                let next = self.settle(id, settlement);
                self.notice(CHAT_ERROR_NOTICE);
                if let Some(text) = next {
                    self.send(&text);
                }
            }
            Err(e) => tracing::warn!("Failure for closed exchange: {}", e),
        }
    }

    /// Render the settled reply, returning the next queued input
    fn settle(&mut self, id: MessageId, settlement: Settlement) -> Option<String> {
        match settlement.reply {
            ReplyOutcome::Kept => {
                let content = self
                    .session
                    .message(id)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                self.pipeline.update(id, &content);
                match self.pipeline.finalize(id) {
                    Ok(blocks) => {
                        let blocks = blocks.to_vec();
                        let tree = self.pipeline.tree(id).cloned().unwrap_or_default();
                        self.emit(SessionEvent::Finalized { id, tree, blocks });
                    }
                    Err(e) => tracing::warn!("{}", e),
                }
            }
            ReplyOutcome::Discarded => self.pipeline.remove(id),
        }

        self.emit(SessionEvent::ExchangeSettled {
            id,
            reply: settlement.reply,
        });
        settlement.next.map(|pending| pending.text)
    }

    fn resolve(&self, target: BlockTarget) -> Result<BlockRef, ControllerError> {
        match target {
            BlockTarget::Exact(block) => Ok(block),
            BlockTarget::Latest(index) => self
                .pipeline
                .latest_finalized()
                .map(|message| BlockRef::new(message, index))
                .ok_or(ControllerError::NothingFinalized),
        }
    }

    fn copy(&mut self, target: BlockTarget) -> Result<(), ControllerError> {
        let block_ref = self.resolve(target)?;
        let block = self.pipeline.block_mut(block_ref)?;
        let ticket = self.clipboard.copy(block_ref, block);
        let state = block.state;
        self.emit(SessionEvent::BlockState {
            block: block_ref,
            state,
        });

        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ticket.revert_after).await;
            let _ = tx.send(Internal::CopyExpired(ticket));
        });
        Ok(())
    }

    fn on_copy_expired(&mut self, ticket: CopyTicket) {
        let Ok(block) = self.pipeline.block_mut(ticket.block) else {
            return;
        };
        if self.clipboard.revert(ticket, block) {
            let state = block.state;
            self.emit(SessionEvent::BlockState {
                block: ticket.block,
                state,
            });
        }
    }

    fn execute(&mut self, target: BlockTarget) -> Result<(), ControllerError> {
        let block_ref = self.resolve(target)?;
        let block = self.pipeline.block_mut(block_ref)?;
        let pending = self.dispatcher.execute(block);
        let state = block.state;
        self.emit(SessionEvent::BlockState {
            block: block_ref,
            state,
        });

        self.running += 1;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = pending.await;
            let _ = tx.send(Internal::ExecutionDone {
                block: block_ref,
                outcome,
            });
        });
        Ok(())
    }

    fn on_execution_done(&mut self, block_ref: BlockRef, outcome: ExecutionOutcome) {
        self.running = self.running.saturating_sub(1);
        if let Ok(block) = self.pipeline.block_mut(block_ref) {
            ExecutionDispatcher::settle(block, &outcome);
            let state = block.state;
            self.emit(SessionEvent::BlockState {
                block: block_ref,
                state,
            });
        }

        let tree = self.pipeline.render_detached(&outcome.to_markdown());
        self.emit(SessionEvent::ExecutionResult {
            block: block_ref,
            success: outcome.is_success(),
            tree,
        });
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("chat", &self.chat.name())
            .field("dispatcher", &self.dispatcher)
            .field("history_len", &self.session.history_len())
            .field("in_flight", &self.session.in_flight_id())
            .field("running", &self.running)
            .finish()
    }
}
