//! Voice ordering adapter around `qbeat-core`.
//!
//! The core decides what to say and which effects follow; this crate runs
//! them. Tool calls arrive as `(name, arguments)` pairs and are parsed into
//! [`ToolCommand`]s, each session serializes its own calls, and outbound
//! traffic goes through an [`OrderSyncGateway`].

pub mod conversation;
pub mod runtime;
pub mod sync;
pub mod teardown;
pub mod tools;

pub use conversation::{ConversationEvent, InboundMessage, ToolInvocation};
pub use runtime::{DispatchError, SessionHandle, VoiceOrderRuntime};
pub use sync::{
    gateway_from_config, GatewayError, HttpOrderSyncGateway, NoopOrderSyncGateway,
    OrderSyncGateway,
};
pub use teardown::{
    schedule_teardown, HostError, ProcessHost, SessionHost, TeardownHandle, TeardownOutcome,
};
pub use tools::{AddToCartRequest, MenuInfoRequest, ToolCommand, ToolError, ToolReply};
