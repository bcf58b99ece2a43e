//! Span helpers for generations and tool executions

/// Span covering one generation folded into one message.
///
/// # Example
///
/// ```rust
/// use parley_observability::generation_span;
///
/// let span = generation_span!("conv-1", "msg-1");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! generation_span {
    ($conversation_id:expr, $message_id:expr) => {
        tracing::info_span!(
            "parley.generation",
            conversation.id = %$conversation_id,
            message.id = %$message_id,
            generation.duration_ms = tracing::field::Empty,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}

/// Span covering one tool execution.
#[macro_export]
macro_rules! tool_span {
    ($tool_name:expr, $call_id:expr) => {
        tracing::info_span!(
            "parley.tool",
            tool.name = %$tool_name,
            tool.call_id = %$call_id,
            tool.duration_ms = tracing::field::Empty,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}

/// Record an error on the current span and log it.
pub fn record_error<E: std::error::Error>(error: &E) {
    let span = tracing::Span::current();
    span.record("error", true);
    span.record("error.message", error.to_string());
    tracing::error!(error = %error, "Operation failed");
}

/// Record a duration in milliseconds on the current span. `key` must be
/// declared on the span, e.g. `generation.duration_ms`.
pub fn record_duration(key: &str, duration: std::time::Duration) {
    tracing::Span::current().record(key, duration.as_millis() as u64);
}
