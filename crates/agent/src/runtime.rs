//! Per-call runtime around [`OrderSession`].
//!
//! Every mutating tool call takes the session lock, so concurrent calls from
//! the dialogue layer are applied one at a time. Effects returned by the core
//! are carried out here:
//!
//! - cart syncs and the completion notice are queued on a per-session
//!   outbound worker that sends them in order and only logs failures;
//! - the order submission is awaited while the lock is held and its failure
//!   is returned to the caller;
//! - shutdown requests start the deferred teardown.

use std::sync::Arc;

use chrono::Utc;
use qbeat_core::config::AppConfig;
use qbeat_core::errors::{ApplicationError, InterfaceError};
use qbeat_core::flows::ConversationState;
use qbeat_core::menu::{Catalog, Resolver};
use qbeat_core::ordering::{CartSnapshot, CompletionNotice, SessionEffect};
use qbeat_core::session::{FinalizeDecision, OrderSession, SessionId, SessionSettings};
use qbeat_core::transcript::TranscriptEntry;
use qbeat_core::Cart;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::conversation::{ConversationEvent, InboundMessage};
use crate::sync::{gateway_from_config, OrderSyncGateway};
use crate::teardown::{schedule_teardown, SessionHost, TeardownHandle, TeardownOutcome};
use crate::tools::{ToolCommand, ToolError, ToolReply};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl DispatchError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        match self {
            Self::Tool(error) => InterfaceError::BadRequest {
                message: error.to_string(),
                correlation_id: correlation_id.into(),
            },
            Self::Application(error) => error.into_interface(correlation_id),
        }
    }
}

/// Shared, read-only pieces every session is started from.
#[derive(Clone)]
pub struct VoiceOrderRuntime {
    resolver: Resolver,
    settings: SessionSettings,
    gateway: Arc<dyn OrderSyncGateway>,
    host: Arc<dyn SessionHost>,
}

impl VoiceOrderRuntime {
    pub fn new(
        resolver: Resolver,
        settings: SessionSettings,
        gateway: Arc<dyn OrderSyncGateway>,
        host: Arc<dyn SessionHost>,
    ) -> Self {
        Self { resolver, settings, gateway, host }
    }

    /// Wires the gateway selected by `config.sync` around `catalog`.
    pub fn from_config(
        config: &AppConfig,
        catalog: Catalog,
        host: Arc<dyn SessionHost>,
    ) -> Result<Self, ApplicationError> {
        let gateway = gateway_from_config(&config.sync)?;
        Ok(Self::new(Resolver::new(Arc::new(catalog)), config.session_settings(), gateway, host))
    }

    /// Must be called from within a Tokio runtime; the session's outbound
    /// worker is spawned here.
    pub fn start_session(&self) -> SessionHandle {
        let session = OrderSession::new(self.resolver.clone(), self.settings.clone());
        let id = session.id().clone();
        let (outbound, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_outbound(self.gateway.clone(), id.clone(), receiver));
        SessionHandle {
            id,
            session: Mutex::new(session),
            gateway: self.gateway.clone(),
            host: self.host.clone(),
            outbound,
            teardown: Mutex::new(None),
        }
    }
}

/// Fire-and-forget storefront traffic for one session, sent in queue order.
#[derive(Debug)]
enum Outbound {
    Cart(CartSnapshot),
    Completion(CompletionNotice),
    Flush(oneshot::Sender<()>),
}

/// Drains the session's outbound queue until every sender is dropped.
async fn run_outbound(
    gateway: Arc<dyn OrderSyncGateway>,
    session_id: SessionId,
    mut receiver: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            Outbound::Cart(snapshot) => {
                if let Err(sync_error) = gateway.sync_cart(&snapshot).await {
                    warn!(
                        event_name = "sync.cart.failed",
                        session_id = %session_id,
                        lines = snapshot.cart.len(),
                        error = %sync_error,
                        "cart sync failed"
                    );
                }
            }
            Outbound::Completion(notice) => {
                if let Err(notify_error) = gateway.notify_completion(&notice).await {
                    warn!(
                        event_name = "sync.completion.failed",
                        session_id = %session_id,
                        error = %notify_error,
                        "completion notice failed"
                    );
                }
            }
            Outbound::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(
        event_name = "sync.outbound.closed",
        session_id = %session_id,
        "outbound worker stopped"
    );
}

pub struct SessionHandle {
    id: SessionId,
    session: Mutex<OrderSession>,
    gateway: Arc<dyn OrderSyncGateway>,
    host: Arc<dyn SessionHost>,
    outbound: mpsc::UnboundedSender<Outbound>,
    teardown: Mutex<Option<TeardownHandle>>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub async fn invoke(&self, tool: &str, arguments: Value) -> Result<ToolReply, DispatchError> {
        let command = ToolCommand::parse(tool, arguments).map_err(|error| {
            warn!(
                event_name = "agent.tool.rejected",
                session_id = %self.id,
                tool,
                error = %error,
                "tool invocation rejected"
            );
            error
        })?;
        self.dispatch(command).await
    }

    pub async fn dispatch(&self, command: ToolCommand) -> Result<ToolReply, DispatchError> {
        debug!(
            event_name = "agent.tool.invoked",
            session_id = %self.id,
            tool = command.name(),
            "tool invoked"
        );

        match command {
            ToolCommand::AddToCart(request) => {
                let mut session = self.session.lock().await;
                let reply =
                    session.add_to_cart(&request.item_name, request.quantity(), request.add_ons());
                // Queue while still locked so snapshots leave in cart order.
                self.apply_effects(reply.effects).await;
                drop(session);
                Ok(ToolReply::new(reply.message))
            }
            ToolCommand::GetMenuInfo(request) => {
                let session = self.session.lock().await;
                let message =
                    session.menu_info(request.section.as_deref(), request.item_name.as_deref());
                Ok(ToolReply::new(message))
            }
            ToolCommand::FinalizeOrder => self.finalize().await,
        }
    }

    pub async fn handle_event(&self, event: ConversationEvent) {
        let mut session = self.session.lock().await;
        match event {
            ConversationEvent::UserInputTranscribed { transcript } => {
                session.record_customer_utterance(&transcript);
            }
            ConversationEvent::AgentStateChanged { old_state, new_state } => {
                session.record_agent_state(&old_state, &new_state);
            }
            ConversationEvent::SpeechCreated => {
                debug!(
                    event_name = "agent.speech.created",
                    session_id = %self.id,
                    "speech created"
                );
            }
        }
    }

    /// Tool calls produce a reply; conversation events do not.
    pub async fn handle_message(
        &self,
        message: InboundMessage,
    ) -> Result<Option<ToolReply>, DispatchError> {
        match message {
            InboundMessage::Tool(invocation) => {
                self.invoke(&invocation.tool, invocation.arguments).await.map(Some)
            }
            InboundMessage::Event(event) => {
                self.handle_event(event).await;
                Ok(None)
            }
        }
    }

    pub async fn state(&self) -> ConversationState {
        self.session.lock().await.state()
    }

    pub async fn cart(&self) -> Cart {
        self.session.lock().await.cart().clone()
    }

    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.session.lock().await.transcript().entries().to_vec()
    }

    pub async fn summary(&self) -> String {
        self.session.lock().await.summary_at(Utc::now()).render()
    }

    /// Waits until everything queued on the outbound worker so far was sent.
    pub async fn flush_outbound(&self) {
        let (done, flushed) = oneshot::channel();
        if self.enqueue(Outbound::Flush(done)) {
            let _ = flushed.await;
        }
    }

    pub async fn teardown_scheduled(&self) -> bool {
        self.teardown.lock().await.is_some()
    }

    pub async fn cancel_teardown(&self) -> bool {
        match self.teardown.lock().await.take() {
            Some(handle) => {
                handle.cancel();
                info!(
                    event_name = "session.teardown.cancelled",
                    session_id = %self.id,
                    "session teardown cancelled"
                );
                true
            }
            None => false,
        }
    }

    pub async fn wait_for_teardown(&self) -> Option<TeardownOutcome> {
        let handle = self.teardown.lock().await.take()?;
        handle.wait().await
    }

    async fn finalize(&self) -> Result<ToolReply, DispatchError> {
        let mut session = self.session.lock().await;
        let pending = match session.prepare_finalize() {
            FinalizeDecision::EmptyCart(reply) | FinalizeDecision::AlreadyCompleted(reply) => {
                return Ok(ToolReply::new(reply.message));
            }
            FinalizeDecision::Ready(pending) => pending,
        };

        if let Err(gateway_error) = self.gateway.submit_order(&pending.submission).await {
            error!(
                event_name = "sync.order.failed",
                session_id = %self.id,
                correlation_id = %self.id,
                total = %pending.totals.total,
                error = %gateway_error,
                "order submission failed; order not placed"
            );
            return Err(ApplicationError::Submission(gateway_error.to_string()).into());
        }

        let reply = session.complete(pending).map_err(ApplicationError::from)?;
        self.apply_effects(reply.effects).await;
        drop(session);
        Ok(ToolReply::new(reply.message))
    }

    fn enqueue(&self, message: Outbound) -> bool {
        match self.outbound.send(message) {
            Ok(()) => true,
            Err(mpsc::error::SendError(dropped)) => {
                warn!(
                    event_name = "sync.outbound.unavailable",
                    session_id = %self.id,
                    dropped = ?dropped,
                    "outbound worker is gone; message dropped"
                );
                false
            }
        }
    }

    async fn apply_effects(&self, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::SyncCart(snapshot) => {
                    self.enqueue(Outbound::Cart(snapshot));
                }
                SessionEffect::NotifyCompletion(notice) => {
                    self.enqueue(Outbound::Completion(notice));
                }
                SessionEffect::Shutdown(request) => {
                    let handle = schedule_teardown(self.host.clone(), self.id.clone(), request);
                    if let Some(previous) = self.teardown.lock().await.replace(handle) {
                        previous.cancel();
                    }
                }
            }
        }
    }
}
