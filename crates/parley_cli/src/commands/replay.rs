//! `parley replay`: fold a recorded event stream into one message.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parley_core::{ChatMessage, ChatResponse, Conversation, StreamEvent, UuidIdGenerator, WireStreamEvent};
use parley_runtime::{
    AssemblerError, GenerationDriver, ReplaySource, RuntimeConfig, RuntimeError, StreamingAssembler,
    ToolCallCompletion, SYNTHETIC_RESULT_KEY,
};
use parley_toolbus::ToolRegistry;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::CompletionArg;
use crate::commands::load_registry;
use crate::output;

impl From<CompletionArg> for ToolCallCompletion {
    fn from(arg: CompletionArg) -> Self {
        match arg {
            CompletionArg::ExplicitClose => ToolCallCompletion::ExplicitClose,
            CompletionArg::ParseAttempt => ToolCallCompletion::ParseAttempt,
        }
    }
}

pub async fn handle(
    events: &Path,
    tools: Option<&Path>,
    conversation_id: String,
    completion: Option<CompletionArg>,
) -> Result<()> {
    let input = std::fs::read_to_string(events)
        .with_context(|| format!("Failed to read {}", events.display()))?;
    let events = parse_events(&input)?;

    let registry = registry_for(&events, tools)?;
    let mut config = RuntimeConfig::from_env();
    if let Some(completion) = completion {
        config = config.with_completion(completion.into());
    }
    info!(
        events = events.len(),
        tools = registry.len(),
        completion = %config.completion,
        "Replaying event stream"
    );

    let mut assembler = StreamingAssembler::new(
        Conversation::new(conversation_id),
        Arc::new(registry),
        Arc::new(UuidIdGenerator),
        config,
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let driver = GenerationDriver::new().with_cancel(cancel);
    match driver.generate(&ReplaySource::new(events), &mut assembler).await {
        Ok(response) => {
            print_response(&response);
            Ok(())
        }
        Err(RuntimeError::Assembler(AssemblerError::PrematureTermination {
            call_id,
            phase,
            response,
        })) => {
            output::warning(&format!(
                "Stream finished while tool call {call_id} was {phase}"
            ));
            print_response(&response);
            Ok(())
        }
        Err(e) => {
            if !assembler.message().is_empty() {
                output::dim("Partial message:");
                print_message(assembler.message());
            }
            Err(e.into())
        }
    }
}

/// Without a manifest every recorded tool call would resolve to an unknown
/// tool, so such recordings are refused up front.
fn registry_for(events: &[StreamEvent], tools: Option<&Path>) -> Result<ToolRegistry> {
    match tools {
        Some(path) => load_registry(path),
        None => {
            let calls = events
                .iter()
                .filter(|event| matches!(event, StreamEvent::ToolCallDelta { .. }))
                .count();
            if calls > 0 {
                bail!(
                    "Recording contains tool calls ({calls} events) but no tool manifest was given; \
                     pass --tools <manifest> or set PARLEY_TOOLS"
                );
            }
            Ok(ToolRegistry::new())
        }
    }
}

/// One event per non-empty line, either tagged (`{"type": ...}`) or in the
/// flag-based wire shape.
pub(crate) fn parse_events(input: &str) -> Result<Vec<StreamEvent>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_event(line).with_context(|| format!("Invalid event on line {}", i + 1)))
        .collect()
}

fn parse_event(line: &str) -> Result<StreamEvent> {
    let value: JsonValue = serde_json::from_str(line)?;
    if value.get("type").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    let wire: WireStreamEvent = serde_json::from_value(value)?;
    Ok(StreamEvent::try_from(wire)?)
}

fn print_response(response: &ChatResponse) {
    if let Some(message) = response.message() {
        print_message(message);
    }
}

fn print_message(message: &ChatMessage) {
    output::header(&format!("Message {}", message.id()));
    output::kv("role", message.role().as_str());
    output::kv("finished", &message.is_finished().to_string());

    let mut table = output::table(&["#", "Kind", "Content"]);
    let items = message
        .content()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut kind = format!("{:?}", item.kind());
            if let Some(reason) = item.extra().get(SYNTHETIC_RESULT_KEY).and_then(JsonValue::as_str) {
                kind = format!("{kind} ({reason})");
            }
            output::table_row(&mut table, &[(i + 1).to_string(), kind, item.as_text()]);
            serde_json::to_value(item).unwrap_or(JsonValue::Null)
        })
        .collect();
    output::table_print(&table, items);
}
