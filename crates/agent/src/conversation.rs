use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events the voice framework reports about the call. They are recorded in
/// the transcript and never move the order state machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConversationEvent {
    UserInputTranscribed { transcript: String },
    AgentStateChanged { old_state: String, new_state: String },
    SpeechCreated,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One line of inbound traffic: either a tool call or a conversation event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Tool(ToolInvocation),
    Event(ConversationEvent),
}
