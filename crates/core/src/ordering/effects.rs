//! Outbound work the session hands to its adapter. The core never performs
//! I/O itself; it returns these values and the adapter decides how to send
//! them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::{Cart, CartLine};

pub const ORDER_COMPLETED_TYPE: &str = "order_completed";
pub const ORDER_STATUS_COMPLETED: &str = "completed";

/// Body of a cart sync: `{cart, total}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub cart: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl CartSnapshot {
    pub fn of(cart: &Cart) -> Self {
        Self { cart: cart.lines().to_vec(), total: cart.total() }
    }
}

/// Body of an order submission. `timestamp` is Unix epoch milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmission {
    pub cart: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub timestamp: i64,
    pub status: String,
}

impl OrderSubmission {
    pub fn completed(cart: &Cart, total: Decimal, submitted_at: DateTime<Utc>) -> Self {
        Self {
            cart: cart.lines().to_vec(),
            total,
            timestamp: submitted_at.timestamp_millis(),
            status: ORDER_STATUS_COMPLETED.to_owned(),
        }
    }
}

/// Completion notice pushed to the storefront on the cart sync endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub message: String,
    pub disconnect_in: u64,
}

impl CompletionNotice {
    pub fn order_completed(total: Decimal, disconnect_in: Duration) -> Self {
        let millis = u64::try_from(disconnect_in.as_millis()).unwrap_or(u64::MAX);
        // never announce fewer seconds than the caller actually gets
        let seconds = millis.div_ceil(1000);
        let unit = if seconds == 1 { "second" } else { "seconds" };
        Self {
            kind: ORDER_COMPLETED_TYPE.to_owned(),
            total,
            message: format!("Order confirmed! Call ending in {seconds} {unit}..."),
            disconnect_in: millis,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownRequest {
    pub after: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEffect {
    /// Fire-and-forget; failures are logged only.
    SyncCart(CartSnapshot),
    /// Fire-and-forget; failures are logged only.
    NotifyCompletion(CompletionNotice),
    /// Tear the session down once the delay has elapsed.
    Shutdown(ShutdownRequest),
}
