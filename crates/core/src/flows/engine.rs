use thiserror::Error;

use crate::flows::states::{
    ConversationState, FlowAction, FlowContext, FlowEvent, TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_state(&self) -> ConversationState;
    fn transition(
        &self,
        current: &ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct VoiceOrderFlow;

impl FlowDefinition for VoiceOrderFlow {
    fn initial_state(&self) -> ConversationState {
        ConversationState::Greeting
    }

    fn transition(
        &self,
        current: &ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_voice_order(current, event, context)
    }
}

#[derive(Clone, Debug)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> ConversationState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<VoiceOrderFlow> {
    fn default() -> Self {
        Self::new(VoiceOrderFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("cannot finalize from {state} with an empty cart")]
    EmptyCart { state: ConversationState },
    #[error("order already completed; {event:?} is not accepted")]
    AlreadyCompleted { event: FlowEvent },
}

fn transition_voice_order(
    current: &ConversationState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use ConversationState::{AddingItems, Greeting, OrderCompleted};
    use FlowAction::{NotifyCompletion, ScheduleShutdown, SyncCart};
    use FlowEvent::{ItemAdded, OrderFinalized};

    let (to, actions) = match (current, event) {
        (OrderCompleted, _) => {
            return Err(FlowTransitionError::AlreadyCompleted { event: *event });
        }
        (Greeting, ItemAdded) | (AddingItems, ItemAdded) => (AddingItems, vec![SyncCart]),
        (Greeting, OrderFinalized) | (AddingItems, OrderFinalized) => {
            if context.cart_lines == 0 {
                return Err(FlowTransitionError::EmptyCart { state: *current });
            }
            (OrderCompleted, vec![NotifyCompletion, ScheduleShutdown])
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}
