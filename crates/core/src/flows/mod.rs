pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, VoiceOrderFlow};
pub use states::{ConversationState, FlowAction, FlowContext, FlowEvent, TransitionOutcome};
