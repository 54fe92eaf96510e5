//! Voice ordering core: menu resolution, cart, pricing and the per-call
//! order session. Pure apart from reading the clock; all outbound work is
//! returned as [`SessionEffect`]s.

pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod menu;
pub mod ordering;
pub mod session;
pub mod transcript;

pub use domain::cart::{Cart, CartLine};
pub use domain::item::{AddOn, CatalogItem, ItemId, MenuSection};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{ConversationState, FlowTransitionError};
pub use menu::{AliasTable, Catalog, CatalogError, MatchRule, Resolution, Resolver};
pub use ordering::{
    CartSnapshot, CompletionNotice, OrderSubmission, OrderTotals, SessionEffect, ShutdownRequest,
    TaxPolicy, TaxRounding,
};
pub use session::{
    FinalizeDecision, OrderSession, PendingOrder, SessionId, SessionReply, SessionSettings,
};
pub use transcript::{SessionSummary, Speaker, Transcript, TranscriptEntry};
