//! Tracing layer that hands each event, formatted as one line, to a [`LogSink`].

use std::fmt::Write;

use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::LogSink;

#[derive(Default)]
struct EventLine {
    message: String,
    fields: Vec<String>,
}

impl Visit for EventLine {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            write!(self.message, "{:?}", value).ok();
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl EventLine {
    /// `LEVEL target: message k=v ...`
    fn render(self, level: &tracing::Level, target: &str) -> String {
        let mut line = format!("{} {}:", level, target);
        if !self.message.is_empty() {
            line.push(' ');
            line.push_str(&self.message);
        }
        for field in self.fields {
            line.push(' ');
            line.push_str(&field);
        }
        line
    }
}

#[derive(Clone)]
pub struct SinkLayer {
    sink: LogSink,
}

impl SinkLayer {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut line = EventLine::default();
        event.record(&mut line);
        let metadata = event.metadata();
        (self.sink)(line.render(metadata.level(), metadata.target()));
    }
}
