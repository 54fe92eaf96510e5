//! Replays a JSON-lines script through one full voice ordering session.
//!
//! Each non-blank line is either a tool call (`{"tool": ..., "arguments": ...}`)
//! or a conversation event (`{"event": ..., ...}`). Lines starting with `#`
//! are skipped.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use qbeat_agent::{InboundMessage, ProcessHost, SessionHandle, TeardownOutcome, VoiceOrderRuntime};
use qbeat_core::config::{AppConfig, LoadOptions};
use qbeat_core::errors::{ApplicationError, InterfaceError};
use qbeat_core::{CartLine, ConversationState};
use serde::Serialize;
use tracing::info;

use crate::commands::{load_catalog, load_config, CommandResult, EXIT_RUNTIME};

#[derive(Debug, Serialize)]
struct SimulationReport {
    command: &'static str,
    status: &'static str,
    session_id: String,
    final_state: ConversationState,
    steps: Vec<SimulationStep>,
    cart: Vec<CartLine>,
    transcript: Vec<String>,
    teardown: &'static str,
}

#[derive(Debug, Serialize)]
struct SimulationStep {
    line: usize,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<StepError>,
}

#[derive(Debug, Serialize)]
struct StepError {
    class: &'static str,
    message: String,
    user_message: &'static str,
}

pub fn run(options: LoadOptions, script: &Path, wait_teardown: bool) -> CommandResult {
    let config = match load_config("simulate", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let catalog = match load_catalog("simulate", &config) {
        Ok(catalog) => catalog,
        Err(failure) => return failure,
    };
    let messages = match read_script(script) {
        Ok(messages) => messages,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "script_invalid",
                format!("{error:#}"),
                EXIT_RUNTIME,
            );
        }
    };
    let (host, _shutdown) = ProcessHost::new();
    let voice_runtime = match VoiceOrderRuntime::from_config(&config, catalog, Arc::new(host)) {
        Ok(voice_runtime) => voice_runtime,
        Err(error) => {
            let error_class = match &error {
                ApplicationError::Integration(_) => "sync_client",
                _ => "runtime_setup",
            };
            return CommandResult::failure("simulate", error_class, error.to_string(), EXIT_RUNTIME);
        }
    };
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "runtime_unavailable",
                error.to_string(),
                EXIT_RUNTIME,
            );
        }
    };

    let report = runtime.block_on(async {
        let session = voice_runtime.start_session();
        replay(&config, &session, messages, wait_teardown).await
    });
    CommandResult::report(&report)
}

fn read_script(path: &Path) -> Result<Vec<(usize, InboundMessage)>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read script `{}`", path.display()))?;

    let mut messages = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let message = serde_json::from_str::<InboundMessage>(line).with_context(|| {
            format!("script line {} is neither a tool call nor a conversation event", index + 1)
        })?;
        messages.push((index + 1, message));
    }
    Ok(messages)
}

async fn replay(
    config: &AppConfig,
    session: &SessionHandle,
    messages: Vec<(usize, InboundMessage)>,
    wait_teardown: bool,
) -> SimulationReport {
    info!(
        event_name = "cli.simulate.started",
        session_id = %session.id(),
        sync_enabled = config.sync.enabled,
        step_count = messages.len(),
        "replaying conversation script"
    );

    let mut steps = Vec::with_capacity(messages.len());
    for (line, message) in messages {
        let (kind, tool) = match &message {
            InboundMessage::Tool(invocation) => ("tool", Some(invocation.tool.clone())),
            InboundMessage::Event(_) => ("event", None),
        };

        let (reply, error) = match session.handle_message(message).await {
            Ok(reply) => (reply.map(|reply| reply.message), None),
            Err(dispatch_error) => {
                let interface = dispatch_error.into_interface(session.id().to_string());
                (None, Some(step_error(&interface)))
            }
        };
        steps.push(SimulationStep { line, kind, tool, reply, error });
    }

    session.flush_outbound().await;
    let teardown = if wait_teardown {
        match session.wait_for_teardown().await {
            Some(TeardownOutcome::Graceful) => "graceful",
            Some(TeardownOutcome::Forced) => "forced",
            None => "not_scheduled",
        }
    } else if session.cancel_teardown().await {
        "cancelled"
    } else {
        "not_scheduled"
    };

    SimulationReport {
        command: "simulate",
        status: "ok",
        session_id: session.id().to_string(),
        final_state: session.state().await,
        steps,
        cart: session.cart().await.lines().to_vec(),
        transcript: session.transcript().await.iter().map(ToString::to_string).collect(),
        teardown,
    }
}

fn step_error(error: &InterfaceError) -> StepError {
    let class = match error {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::OrderNotPlaced { .. } => "order_not_placed",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    };
    StepError { class, message: error.to_string(), user_message: error.user_message() }
}
