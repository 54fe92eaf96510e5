//! One live voice conversation: resolver and cart driven through the
//! conversation flow.
//!
//! Every operation returns the text to speak plus the [`SessionEffect`]s the
//! adapter must carry out. Finalizing is split in two so the adapter can await
//! the order submission between the halves:
//!
//! 1. [`OrderSession::prepare_finalize`] prices the cart and yields a
//!    [`PendingOrder`] without touching state;
//! 2. after the submission succeeds, [`OrderSession::complete`] moves the
//!    session to `OrderCompleted` and yields the completion effects.
//!
//! A submission failure simply drops the pending order; the session is left
//! exactly as it was.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::item::{CatalogItem, MenuSection};
use crate::errors::DomainError;
use crate::flows::{
    ConversationState, FlowAction, FlowContext, FlowEngine, FlowEvent, FlowTransitionError,
    TransitionOutcome, VoiceOrderFlow,
};
use crate::menu::Resolver;
use crate::ordering::effects::{
    CartSnapshot, CompletionNotice, OrderSubmission, SessionEffect, ShutdownRequest,
};
use crate::ordering::pricing::{compute_totals, format_money, format_price, OrderTotals, TaxPolicy};
use crate::transcript::{SessionSummary, Speaker, Transcript};

const SECTION_PREVIEW_LEN: usize = 3;

pub const EMPTY_CART_MESSAGE: &str = "Your cart is empty. What would you like to order?";
pub const MENU_OVERVIEW_MESSAGE: &str =
    "We have breakfast, lunch, and kids menus. Which would you like to hear about?";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub tax: TaxPolicy,
    pub store_name: String,
    pub ready_estimate: String,
    pub teardown_delay: Duration,
    pub completion_disconnect: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tax: TaxPolicy::default(),
            store_name: "QBeatAI".to_owned(),
            ready_estimate: "10-15 minutes".to_owned(),
            teardown_delay: Duration::from_millis(5_000),
            completion_disconnect: Duration::from_millis(3_000),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReply {
    pub message: String,
    pub effects: Vec<SessionEffect>,
}

impl SessionReply {
    fn say(message: impl Into<String>) -> Self {
        Self { message: message.into(), effects: Vec::new() }
    }
}

/// A priced order waiting on its submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingOrder {
    pub totals: OrderTotals,
    pub submission: OrderSubmission,
    outcome: TransitionOutcome,
    line_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizeDecision {
    EmptyCart(SessionReply),
    AlreadyCompleted(SessionReply),
    Ready(PendingOrder),
}

pub struct OrderSession {
    id: SessionId,
    resolver: Resolver,
    settings: SessionSettings,
    engine: FlowEngine<VoiceOrderFlow>,
    state: ConversationState,
    cart: Cart,
    transcript: Transcript,
}

impl OrderSession {
    pub fn new(resolver: Resolver, settings: SessionSettings) -> Self {
        Self::with_id(SessionId::generate(), resolver, settings)
    }

    pub fn with_id(id: SessionId, resolver: Resolver, settings: SessionSettings) -> Self {
        let engine = FlowEngine::new(VoiceOrderFlow);
        let state = engine.initial_state();
        let transcript = Transcript::start(id.0.clone(), Utc::now());
        info!(event_name = "session.started", session_id = %id, "voice ordering session started");
        Self { id, resolver, settings, engine, state, cart: Cart::new(), transcript }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Resolves `phrase` and appends a line. A quantity of zero counts as one.
    pub fn add_to_cart<S>(&mut self, phrase: &str, quantity: u32, add_ons: &[S]) -> SessionReply
    where
        S: AsRef<str>,
    {
        let context = FlowContext { cart_lines: self.cart.len() + 1 };
        let outcome = match self.engine.apply(&self.state, &FlowEvent::ItemAdded, &context) {
            Ok(outcome) => outcome,
            Err(error) => return self.refuse(error),
        };

        let Some(item) = self.resolver.resolve(phrase) else {
            warn!(
                event_name = "session.cart.item_not_found",
                session_id = %self.id,
                phrase,
                "item not found in menu"
            );
            return SessionReply::say(format!(
                "I couldn't find {phrase}. Could you try another item?"
            ));
        };

        let requested_add_ons = add_ons.len();
        let line = self.cart.add_line(item, quantity.max(1), add_ons);
        if requested_add_ons > 0 && line.selected_add_ons.is_empty() {
            warn!(
                event_name = "session.cart.add_ons_unmatched",
                session_id = %self.id,
                item_id = %line.item_id,
                requested_add_ons,
                "no requested add-on matched the item"
            );
        }

        let add_on_clause = match line.add_on_names().as_slice() {
            [] => String::new(),
            names => format!(" with {}", names.join(", ")),
        };
        let message = format!(
            "Added {} {}{} for {}. What else?",
            line.quantity,
            line.name,
            add_on_clause,
            format_money(line.line_total)
        );
        info!(
            event_name = "session.cart.line_added",
            session_id = %self.id,
            item_id = %line.item_id,
            quantity = line.quantity,
            line_total = %line.line_total,
            "cart line added"
        );

        self.transcript.record(Speaker::Agent, message.clone());
        let effects = self.enter(outcome, None);
        SessionReply { message, effects }
    }

    /// Read-only menu lookup. An item name wins over a section; neither gives
    /// the overview prompt.
    pub fn menu_info(&self, section: Option<&str>, item_name: Option<&str>) -> String {
        let item_name = item_name.map(str::trim).filter(|name| !name.is_empty());
        if let Some(item_name) = item_name {
            return match self.resolver.resolve(item_name) {
                Some(item) => describe_item(item),
                None => format!(
                    "I don't see {item_name} on our menu. \
                     Would you like to hear about our popular items instead?"
                ),
            };
        }

        match section.and_then(|section| section.parse::<MenuSection>().ok()) {
            Some(section) => {
                let previews: Vec<String> = self
                    .resolver
                    .catalog()
                    .section(section)
                    .take(SECTION_PREVIEW_LEN)
                    .map(|item| format!("{} for {}", item.name, format_price(item.base_price)))
                    .collect();
                format!("Popular {section} items: {}. Which interests you?", previews.join(", "))
            }
            None => MENU_OVERVIEW_MESSAGE.to_owned(),
        }
    }

    /// Prices the cart for submission. Never mutates the session.
    pub fn prepare_finalize(&self) -> FinalizeDecision {
        let context = FlowContext { cart_lines: self.cart.len() };
        let outcome = match self.engine.apply(&self.state, &FlowEvent::OrderFinalized, &context) {
            Ok(outcome) => outcome,
            Err(FlowTransitionError::EmptyCart { .. }) => {
                warn!(
                    event_name = "session.finalize.empty_cart",
                    session_id = %self.id,
                    "attempted to finalize empty cart"
                );
                return FinalizeDecision::EmptyCart(SessionReply::say(EMPTY_CART_MESSAGE));
            }
            Err(FlowTransitionError::AlreadyCompleted { .. }) => {
                return FinalizeDecision::AlreadyCompleted(SessionReply::say(
                    self.already_placed_message(),
                ));
            }
        };

        let totals = compute_totals(&self.cart, &self.settings.tax);
        info!(
            event_name = "session.finalize.priced",
            session_id = %self.id,
            subtotal = %totals.subtotal,
            tax = %totals.tax,
            total = %totals.total,
            line_count = self.cart.len(),
            "order totals computed"
        );
        let submission = OrderSubmission::completed(&self.cart, totals.total, Utc::now());
        FinalizeDecision::Ready(PendingOrder {
            totals,
            submission,
            outcome,
            line_count: self.cart.len(),
        })
    }

    /// Applies a pending order whose submission succeeded.
    pub fn complete(&mut self, pending: PendingOrder) -> Result<SessionReply, DomainError> {
        if pending.outcome.from != self.state || pending.line_count != self.cart.len() {
            return Err(DomainError::InvariantViolation(format!(
                "session {} changed after finalize was prepared",
                self.id
            )));
        }

        let total = pending.totals.total;
        let message = format!(
            "Perfect! Your order total is {}. We'll have it ready in {}. \
             Your order has been confirmed and this call will now end. \
             Thank you for choosing {}!",
            format_money(total),
            self.settings.ready_estimate,
            self.settings.store_name
        );

        self.transcript.record(Speaker::Agent, message.clone());
        let effects = self.enter(pending.outcome, Some(&pending.totals));
        info!(
            event_name = "session.finalize.completed",
            session_id = %self.id,
            total = %total,
            "order finalized"
        );
        info!(
            event_name = "session.summary",
            session_id = %self.id,
            "\n{}",
            self.summary_at(Utc::now()).render()
        );

        Ok(SessionReply { message, effects })
    }

    pub fn record_customer_utterance(&mut self, transcript: &str) {
        let transcript = transcript.trim();
        if !transcript.is_empty() {
            self.transcript.record(Speaker::Customer, transcript);
        }
    }

    pub fn record_agent_state(&mut self, old_state: &str, new_state: &str) {
        self.transcript.record(Speaker::System, format!("Agent state: {old_state} -> {new_state}"));
    }

    pub fn summary_at(&self, ended_at: DateTime<Utc>) -> SessionSummary<'_> {
        let subtotal = self.cart.total();
        SessionSummary::new(&self.transcript, self.cart.len(), subtotal, self.state, ended_at)
    }

    fn refuse(&self, error: FlowTransitionError) -> SessionReply {
        warn!(
            event_name = "session.flow.rejected",
            session_id = %self.id,
            error = %error,
            "conversation event rejected"
        );
        SessionReply::say(self.already_placed_message())
    }

    fn already_placed_message(&self) -> String {
        format!(
            "Your order has already been placed. Thank you for choosing {}!",
            self.settings.store_name
        )
    }

    fn enter(
        &mut self,
        outcome: TransitionOutcome,
        totals: Option<&OrderTotals>,
    ) -> Vec<SessionEffect> {
        if outcome.changed_state() {
            self.transcript.record_state_change(outcome.from, outcome.to);
            info!(
                event_name = "session.flow.transitioned",
                session_id = %self.id,
                from = %outcome.from,
                to = %outcome.to,
                "conversation state changed"
            );
        }
        self.state = outcome.to;

        outcome
            .actions
            .iter()
            .filter_map(|action| match action {
                FlowAction::SyncCart => Some(SessionEffect::SyncCart(CartSnapshot::of(&self.cart))),
                FlowAction::NotifyCompletion => totals.map(|totals| {
                    SessionEffect::NotifyCompletion(CompletionNotice::order_completed(
                        totals.total,
                        self.settings.completion_disconnect,
                    ))
                }),
                FlowAction::ScheduleShutdown => Some(SessionEffect::Shutdown(ShutdownRequest {
                    after: self.settings.teardown_delay,
                })),
            })
            .collect()
    }
}

fn describe_item(item: &CatalogItem) -> String {
    let add_on_clause = if item.add_ons.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = item.add_ons.iter().map(|add_on| add_on.name.as_str()).collect();
        format!(" Add-ons available: {}", names.join(", "))
    };
    let price = format_price(item.base_price);
    format!("{} - {} {price}.{add_on_clause}", item.name, item.description)
}
