//! Async driver: pulls events from a model source into a [`StreamingAssembler`],
//! executing requested tools along the way.

use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream};
use futures::StreamExt;
use parley_core::{ChatMessage, ChatResponse, StreamEvent};
use parley_observability::{generation_span, record_duration, record_error, tool_span};
use parley_toolbus::{ExecutionError, ToolExecutor, ToolInvocation};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::assembler::{AssemblerState, Step, StreamingAssembler};
use crate::error::{AssemblerError, Result, RuntimeError};
use crate::store::ConversationStore;

pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// Produces the event stream of one generation.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn stream(&self, history: &[ChatMessage]) -> Result<EventStream>;
}

/// Replays a fixed list of events, ignoring the history.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    events: Vec<StreamEvent>,
}

impl ReplaySource {
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ModelSource for ReplaySource {
    async fn stream(&self, _history: &[ChatMessage]) -> Result<EventStream> {
        Ok(stream::iter(self.events.clone().into_iter().map(Ok)).boxed())
    }
}

/// Runs one generation to completion.
///
/// Without an executor, tool results are expected from the event stream.
#[derive(Default)]
pub struct GenerationDriver<'a> {
    executor: Option<&'a dyn ToolExecutor>,
    store: Option<&'a dyn ConversationStore>,
    cancel: CancellationToken,
}

impl<'a> GenerationDriver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executor(mut self, executor: &'a dyn ToolExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_store(mut self, store: &'a dyn ConversationStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ask `source` for a stream over the conversation so far and run it.
    pub async fn generate(
        &self,
        source: &dyn ModelSource,
        assembler: &mut StreamingAssembler,
    ) -> Result<ChatResponse> {
        let events = source.stream(assembler.conversation().messages()).await?;
        self.run(assembler, events).await
    }

    pub async fn run<S>(&self, assembler: &mut StreamingAssembler, events: S) -> Result<ChatResponse>
    where
        S: Stream<Item = Result<StreamEvent>> + Send + Unpin,
    {
        let span = generation_span!(assembler.conversation().id(), assembler.message().id());
        self.drive(assembler, events).instrument(span).await
    }

    async fn drive<S>(&self, assembler: &mut StreamingAssembler, mut events: S) -> Result<ChatResponse>
    where
        S: Stream<Item = Result<StreamEvent>> + Send + Unpin,
    {
        let start = Instant::now();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancel_generation(assembler)),
                next = events.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    let halted = assembler.abort(&err.to_string());
                    warn!(error = %halted, "Assembler halted on a source error");
                    record_error(&err);
                    return Err(err);
                }
                None => {
                    let err = RuntimeError::from(assembler.abort("event source closed"));
                    record_error(&err);
                    return Err(err);
                }
            };

            match assembler.feed(event) {
                Ok(Step::Continue) => {}
                Ok(Step::ToolCallReady(invocation)) => match self.executor {
                    Some(executor) => self.execute(assembler, executor, invocation).await?,
                    None => debug!(
                        tool.call_id = %invocation.call_id,
                        "No executor configured, awaiting result from stream"
                    ),
                },
                Ok(Step::Finished(response)) => {
                    record_duration("generation.duration_ms", start.elapsed());
                    self.persist(assembler.conversation().id(), &response).await?;
                    return Ok(response);
                }
                Err(AssemblerError::PrematureTermination {
                    call_id,
                    phase,
                    response,
                }) => {
                    // The message is finished either way; keep it.
                    self.persist(assembler.conversation().id(), &response).await?;
                    let err = RuntimeError::from(AssemblerError::PrematureTermination {
                        call_id,
                        phase,
                        response,
                    });
                    record_error(&err);
                    return Err(err);
                }
                Err(err) => {
                    let err = RuntimeError::from(err);
                    record_error(&err);
                    return Err(err);
                }
            }
        }
    }

    async fn execute(
        &self,
        assembler: &mut StreamingAssembler,
        executor: &dyn ToolExecutor,
        invocation: ToolInvocation,
    ) -> Result<()> {
        let timeout = assembler.config().tool_timeout;
        let span = tool_span!(invocation.tool.name, invocation.call_id);

        let outcome = async {
            let start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = tokio::time::timeout(timeout, executor.execute(&invocation)) => {
                    Some(result.unwrap_or_else(|_| Err(ExecutionError::timeout(timeout))))
                }
            };
            record_duration("tool.duration_ms", start.elapsed());
            outcome
        }
        .instrument(span)
        .await;

        match outcome {
            Some(outcome) => {
                assembler.complete_tool_call(outcome)?;
                Ok(())
            }
            None => Err(cancel_generation(assembler)),
        }
    }

    async fn persist(&self, conversation_id: &str, response: &ChatResponse) -> Result<()> {
        if let (Some(store), Some(message)) = (self.store, response.message()) {
            store.append(conversation_id, message.clone()).await?;
        }
        Ok(())
    }
}

/// A pending tool call is resolved with a cancellation result first, so the
/// assembler is back in `Open` when the caller regains control.
fn cancel_generation(assembler: &mut StreamingAssembler) -> RuntimeError {
    if assembler.state() == AssemblerState::AwaitingToolResult {
        if let Err(err) = assembler.cancel_tool_call("generation cancelled") {
            return err.into();
        }
    }
    RuntimeError::Cancelled
}
