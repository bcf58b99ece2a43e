//! Folds one generation's event stream into a finished [`ChatMessage`].
//!
//! ```text
//! Open ──fragment──▶ InToolCall ──complete, registered──▶ AwaitingToolResult
//!  ▲                    │ complete, unknown tool                │ result or cancel
//!  └────────────────────┴───────────────────────────────────────┘
//! Open ──finished──▶ Finished
//! ```
//!
//! Protocol violations move the assembler to `Halted`; nothing more is
//! accepted for that message.

use std::sync::Arc;

use parley_core::{
    ChatMessage, ChatResponse, ContentItem, Conversation, Extra, IdGenerator, Role, StreamEvent,
    ToolCallFragment, ToolCallResultEvent,
};
use parley_toolbus::{ExecutionResult, ToolInvocation, ToolRegistry};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::config::{RuntimeConfig, ToolCallCompletion};
use crate::error::AssemblerError;

type Result<T> = std::result::Result<T, AssemblerError>;

/// Extension key set on results the assembler writes itself.
pub const SYNTHETIC_RESULT_KEY: &str = "synthetic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Open,
    InToolCall,
    AwaitingToolResult,
    Finished,
    Halted,
}

impl AssemblerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblerState::Open => "open",
            AssemblerState::InToolCall => "in_tool_call",
            AssemblerState::AwaitingToolResult => "awaiting_tool_result",
            AssemblerState::Finished => "finished",
            AssemblerState::Halted => "halted",
        }
    }
}

impl std::fmt::Display for AssemblerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the caller should do after feeding an event.
#[derive(Debug)]
pub enum Step {
    Continue,
    /// A registered tool was requested. Execute it and report through
    /// [`StreamingAssembler::complete_tool_call`], or let the stream deliver
    /// the result itself.
    ToolCallReady(ToolInvocation),
    Finished(ChatResponse),
}

#[derive(Debug)]
struct ToolCallAccumulator {
    call_id: String,
    tool_name: String,
    payload: String,
    arguments: Option<Map<String, JsonValue>>,
    extra: Extra,
}

#[derive(Debug)]
struct PendingCall {
    call_id: String,
    tool_name: String,
}

pub struct StreamingAssembler {
    conversation: Conversation,
    registry: Arc<ToolRegistry>,
    ids: Arc<dyn IdGenerator>,
    config: RuntimeConfig,
    message: ChatMessage,
    text: String,
    accumulator: Option<ToolCallAccumulator>,
    pending: Option<PendingCall>,
    state: AssemblerState,
    response: Option<ChatResponse>,
}

impl StreamingAssembler {
    /// Start assembling a new assistant message for `conversation`.
    pub fn new(
        conversation: Conversation,
        registry: Arc<ToolRegistry>,
        ids: Arc<dyn IdGenerator>,
        config: RuntimeConfig,
    ) -> Self {
        let message = ChatMessage::new(ids.next_id(), Role::Assistant);
        debug!(
            conversation.id = %conversation.id(),
            message.id = %message.id(),
            completion = %config.completion,
            "Assembler created"
        );
        Self {
            conversation,
            registry,
            ids,
            config,
            message,
            text: String::new(),
            accumulator: None,
            pending: None,
            state: AssemblerState::Open,
            response: None,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The message under construction. Buffered text is included once the
    /// assembler reaches `Finished` or `Halted`.
    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    /// Set once the message joined the conversation.
    pub fn response(&self) -> Option<&ChatResponse> {
        self.response.as_ref()
    }

    pub fn pending_call_id(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.call_id.as_str())
    }

    /// Apply the next stream event.
    pub fn feed(&mut self, event: StreamEvent) -> Result<Step> {
        self.ensure_live()?;
        let outcome = self.apply(event);
        self.halt_on_violation(outcome)
    }

    /// Integrate the outcome of executing the pending tool call.
    pub fn complete_tool_call(&mut self, outcome: ExecutionResult) -> Result<Step> {
        self.ensure_live()?;
        let result = self.resolve_pending(outcome);
        self.halt_on_violation(result)
    }

    /// Give up on the pending tool call and return to `Open`.
    pub fn cancel_tool_call(&mut self, reason: &str) -> Result<Step> {
        self.ensure_live()?;
        let result = self.cancel_pending(reason);
        self.halt_on_violation(result)
    }

    /// The event source stopped without a terminal event.
    pub fn abort(&mut self, reason: &str) -> AssemblerError {
        if let Err(err) = self.ensure_live() {
            return err;
        }
        warn!(
            message.id = %self.message.id(),
            state = %self.state,
            reason,
            "Stream aborted before a terminal event"
        );
        self.keep_buffered_text();
        self.state = AssemblerState::Halted;
        AssemblerError::MalformedStream(format!(
            "stream ended without a terminal event: {}",
            reason
        ))
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            AssemblerState::Finished => Err(AssemblerError::InvalidState(format!(
                "message {} is already finished",
                self.message.id()
            ))),
            AssemblerState::Halted => Err(AssemblerError::InvalidState(format!(
                "assembler for message {} halted after a protocol error",
                self.message.id()
            ))),
            _ => Ok(()),
        }
    }

    fn halt_on_violation(&mut self, outcome: Result<Step>) -> Result<Step> {
        if let Err(err) = &outcome {
            if err.is_protocol_violation() {
                warn!(
                    message.id = %self.message.id(),
                    state = %self.state,
                    error = %err,
                    "Assembler halted"
                );
                self.keep_buffered_text();
                self.state = AssemblerState::Halted;
            }
        }
        outcome
    }

    fn apply(&mut self, event: StreamEvent) -> Result<Step> {
        use AssemblerState::*;

        match (self.state, event) {
            (Open, StreamEvent::TextDelta { chunk }) => {
                self.text.push_str(&chunk);
                Ok(Step::Continue)
            }
            (Open, StreamEvent::ToolCallDelta { fragment }) => self.open_tool_call(fragment),
            (InToolCall, StreamEvent::ToolCallDelta { fragment }) => self.merge_fragment(fragment),
            (AwaitingToolResult, StreamEvent::ToolCallResult { result }) => {
                self.integrate_result_event(result)
            }
            (Open, StreamEvent::Finished { message }) => {
                let response = self.seal(message.map(|m| *m))?;
                Ok(Step::Finished(response))
            }
            (InToolCall | AwaitingToolResult, StreamEvent::Finished { .. }) => {
                self.terminate_prematurely()
            }
            (state, event) => Err(AssemblerError::MalformedStream(format!(
                "{} event is not allowed while {}",
                event_name(&event),
                state
            ))),
        }
    }

    fn open_tool_call(&mut self, fragment: ToolCallFragment) -> Result<Step> {
        if fragment.call_id.trim().is_empty() {
            return Err(AssemblerError::MalformedStream(
                "tool call fragment without a call id".to_string(),
            ));
        }
        let tool_name = match fragment.tool_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(AssemblerError::MalformedStream(format!(
                    "first fragment of tool call {} does not name a tool",
                    fragment.call_id
                )))
            }
        };
        if self.is_call_id_taken(&fragment.call_id) {
            return Err(AssemblerError::MalformedStream(format!(
                "call id {} is already used in this conversation",
                fragment.call_id
            )));
        }

        self.flush_text()?;
        debug!(
            message.id = %self.message.id(),
            tool.call_id = %fragment.call_id,
            tool.name = %tool_name,
            "Tool call started"
        );
        self.accumulator = Some(ToolCallAccumulator {
            call_id: fragment.call_id.clone(),
            tool_name,
            payload: String::new(),
            arguments: None,
            extra: Extra::new(),
        });
        self.state = AssemblerState::InToolCall;
        self.absorb(fragment)
    }

    fn merge_fragment(&mut self, fragment: ToolCallFragment) -> Result<Step> {
        let acc = self.accumulator.as_ref().ok_or_else(|| {
            AssemblerError::InvalidState("no tool call is being streamed".to_string())
        })?;
        if fragment.call_id != acc.call_id {
            return Err(AssemblerError::MalformedStream(format!(
                "fragment for call {} arrived while call {} is open",
                fragment.call_id, acc.call_id
            )));
        }
        if let Some(name) = fragment.tool_name.as_deref() {
            if name.trim() != acc.tool_name {
                return Err(AssemblerError::MalformedStream(format!(
                    "tool call {} changed its tool from {} to {}",
                    acc.call_id, acc.tool_name, name
                )));
            }
        }
        self.absorb(fragment)
    }

    fn absorb(&mut self, fragment: ToolCallFragment) -> Result<Step> {
        let completion = self.config.completion;
        let acc = self.accumulator.as_mut().ok_or_else(|| {
            AssemblerError::InvalidState("no tool call is being streamed".to_string())
        })?;

        acc.payload.push_str(&fragment.arguments_delta);
        acc.extra.extend(fragment.extra);

        let mut complete = fragment.closed;
        if let Some(arguments) = fragment.arguments {
            acc.arguments = Some(arguments);
            complete = true;
        }
        if !complete && completion == ToolCallCompletion::ParseAttempt {
            if let Ok(JsonValue::Object(map)) = serde_json::from_str::<JsonValue>(&acc.payload) {
                acc.arguments = Some(map);
                complete = true;
            }
        }

        if complete {
            self.complete_accumulated()
        } else {
            Ok(Step::Continue)
        }
    }

    fn complete_accumulated(&mut self) -> Result<Step> {
        let acc = self.accumulator.take().ok_or_else(|| {
            AssemblerError::InvalidState("no tool call is being streamed".to_string())
        })?;
        // Structured arguments take precedence over the textual payload.
        let arguments = match acc.arguments {
            Some(arguments) => Some(arguments),
            None => parse_arguments(&acc.call_id, &acc.payload)?,
        };

        let item = acc.extra.into_iter().fold(
            ContentItem::tool_call(&acc.call_id, &acc.tool_name, arguments.clone())?,
            |item, (key, value)| item.with_extra(key, value),
        );
        self.message.append(item)?;
        info!(
            message.id = %self.message.id(),
            tool.call_id = %acc.call_id,
            tool.name = %acc.tool_name,
            "Tool call complete"
        );

        let registry = Arc::clone(&self.registry);
        match registry.resolve(&acc.tool_name) {
            Ok(tool) => {
                let invocation =
                    ToolInvocation::new(acc.call_id.clone(), tool.clone(), arguments.unwrap_or_default());
                self.pending = Some(PendingCall {
                    call_id: acc.call_id,
                    tool_name: acc.tool_name,
                });
                self.state = AssemblerState::AwaitingToolResult;
                Ok(Step::ToolCallReady(invocation))
            }
            Err(err) => {
                warn!(
                    message.id = %self.message.id(),
                    tool.call_id = %acc.call_id,
                    tool.name = %acc.tool_name,
                    "Tool call names an unregistered tool"
                );
                self.append_synthetic_result(
                    &acc.call_id,
                    &acc.tool_name,
                    err.to_string(),
                    "unknown_tool",
                )?;
                self.state = AssemblerState::Open;
                Ok(Step::Continue)
            }
        }
    }

    fn integrate_result_event(&mut self, result: ToolCallResultEvent) -> Result<Step> {
        {
            let pending = self.pending.as_ref().ok_or_else(|| {
                AssemblerError::InvalidState("no tool call is awaiting a result".to_string())
            })?;
            if result.call_id != pending.call_id {
                return Err(AssemblerError::MalformedStream(format!(
                    "result for call {} arrived while call {} is pending",
                    result.call_id, pending.call_id
                )));
            }
            if let Some(name) = result.tool_name.as_deref() {
                if name != pending.tool_name {
                    return Err(AssemblerError::MalformedStream(format!(
                        "result for call {} names tool {} instead of {}",
                        result.call_id, name, pending.tool_name
                    )));
                }
            }
        }

        let pending = self.take_pending("integrate a tool result")?;
        let result_id = result
            .result_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.ids.next_id());
        let item = result.extra.into_iter().fold(
            ContentItem::tool_call_result(
                result_id,
                &pending.call_id,
                &pending.tool_name,
                result.result,
            ),
            |item, (key, value)| item.with_extra(key, value),
        );
        self.message.append(item)?;
        debug!(
            message.id = %self.message.id(),
            tool.call_id = %pending.call_id,
            "Tool result received from stream"
        );
        self.state = AssemblerState::Open;
        Ok(Step::Continue)
    }

    fn resolve_pending(&mut self, outcome: ExecutionResult) -> Result<Step> {
        let pending = self.take_pending("complete a tool call")?;
        match outcome {
            Ok(output) => {
                let result_id = self.ids.next_id();
                self.message.append(ContentItem::tool_call_result(
                    result_id,
                    &pending.call_id,
                    &pending.tool_name,
                    output,
                ))?;
                debug!(
                    message.id = %self.message.id(),
                    tool.call_id = %pending.call_id,
                    "Tool result recorded"
                );
            }
            Err(err) => {
                warn!(
                    message.id = %self.message.id(),
                    tool.call_id = %pending.call_id,
                    error = %err,
                    "Tool execution failed"
                );
                self.append_synthetic_result(
                    &pending.call_id,
                    &pending.tool_name,
                    err.to_string(),
                    "execution_error",
                )?;
            }
        }
        self.state = AssemblerState::Open;
        Ok(Step::Continue)
    }

    fn cancel_pending(&mut self, reason: &str) -> Result<Step> {
        let pending = self.take_pending("cancel a tool call")?;
        info!(
            message.id = %self.message.id(),
            tool.call_id = %pending.call_id,
            reason,
            "Tool call cancelled"
        );
        self.append_synthetic_result(
            &pending.call_id,
            &pending.tool_name,
            format!("Tool call cancelled: {}", reason),
            "cancelled",
        )?;
        self.state = AssemblerState::Open;
        Ok(Step::Continue)
    }

    fn take_pending(&mut self, action: &str) -> Result<PendingCall> {
        if self.state != AssemblerState::AwaitingToolResult {
            return Err(AssemblerError::InvalidState(format!(
                "cannot {} while {}",
                action, self.state
            )));
        }
        self.pending.take().ok_or_else(|| {
            AssemblerError::InvalidState("no tool call is awaiting a result".to_string())
        })
    }

    fn terminate_prematurely(&mut self) -> Result<Step> {
        let (call_id, phase) = if let Some(acc) = self.accumulator.take() {
            (acc.call_id, "still streaming")
        } else if let Some(pending) = self.pending.take() {
            (pending.call_id, "awaiting its result")
        } else {
            return Err(AssemblerError::InvalidState(format!(
                "no tool call in progress while {}",
                self.state
            )));
        };
        warn!(
            message.id = %self.message.id(),
            tool.call_id = %call_id,
            phase,
            "Stream finished with an unresolved tool call"
        );
        let response = self.seal(None)?;
        Err(AssemblerError::PrematureTermination {
            call_id,
            phase,
            response: Box::new(response),
        })
    }

    /// Finish the message, append it to the conversation and build the response.
    fn seal(&mut self, carried: Option<ChatMessage>) -> Result<ChatResponse> {
        self.flush_text()?;
        if let Some(carried) = carried {
            self.absorb_finished_message(carried)?;
        }
        if !self.message.is_finished() {
            self.message.finish()?;
        }
        self.conversation.append(self.message.clone())?;

        let response = ChatResponse::new(
            self.conversation.messages().to_vec(),
            self.message.as_text(),
        );
        self.state = AssemblerState::Finished;
        self.response = Some(response.clone());
        info!(
            conversation.id = %self.conversation.id(),
            message.id = %self.message.id(),
            content.items = self.message.content().len(),
            "Message finished"
        );
        Ok(response)
    }

    fn absorb_finished_message(&mut self, carried: ChatMessage) -> Result<()> {
        if self.message.is_empty() {
            if carried.id().trim().is_empty() {
                return Err(AssemblerError::MalformedStream(
                    "terminal event carries a message without an id".to_string(),
                ));
            }
            debug!(message.id = %carried.id(), "Adopting message from terminal event");
            self.message = carried;
            return Ok(());
        }

        for (key, value) in carried.meta() {
            if !self.message.meta().contains_key(key) {
                self.message.insert_meta(key.clone(), value.clone())?;
            }
        }
        for (key, value) in carried.extra() {
            if !self.message.extra().contains_key(key) {
                self.message.insert_extra(key.clone(), value.clone())?;
            }
        }
        Ok(())
    }

    fn append_synthetic_result(
        &mut self,
        call_id: &str,
        tool_name: &str,
        text: String,
        reason: &str,
    ) -> Result<()> {
        let item = ContentItem::tool_call_result(self.ids.next_id(), call_id, tool_name, text)
            .with_extra(SYNTHETIC_RESULT_KEY, JsonValue::String(reason.to_string()));
        self.message.append(item)?;
        Ok(())
    }

    fn flush_text(&mut self) -> Result<()> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        self.message.append_text(text)?;
        Ok(())
    }

    /// Halting keeps streamed text visible on the partial message.
    fn keep_buffered_text(&mut self) {
        if let Err(err) = self.flush_text() {
            debug!(message.id = %self.message.id(), error = %err, "Buffered text dropped");
        }
    }

    fn is_call_id_taken(&self, call_id: &str) -> bool {
        self.conversation.has_call_id(call_id)
            || self
                .message
                .tool_calls()
                .iter()
                .any(|call| call.call_id == call_id)
    }
}

fn parse_arguments(call_id: &str, payload: &str) -> Result<Option<Map<String, JsonValue>>> {
    if payload.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<JsonValue>(payload) {
        Ok(JsonValue::Object(map)) => Ok(Some(map)),
        Ok(other) => Err(AssemblerError::MalformedStream(format!(
            "arguments for tool call {} are not a JSON object: {}",
            call_id, other
        ))),
        Err(e) => Err(AssemblerError::MalformedStream(format!(
            "arguments for tool call {} are not valid JSON: {}",
            call_id, e
        ))),
    }
}

fn event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::TextDelta { .. } => "text_delta",
        StreamEvent::ToolCallDelta { .. } => "tool_call_delta",
        StreamEvent::ToolCallResult { .. } => "tool_call_result",
        StreamEvent::Finished { .. } => "finished",
    }
}
