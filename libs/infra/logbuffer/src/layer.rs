//! A `tracing_subscriber::Layer` that mirrors every event into a
//! [`RingLogBuffer`], so remote log retrieval (`LogRequest`) sees the same
//! stream the local `fmt` layer prints.

use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::{LogEntry, RingLogBuffer};

pub struct RingLogLayer {
    buffer: Arc<RingLogBuffer>,
}

impl RingLogLayer {
    pub fn new(buffer: Arc<RingLogBuffer>) -> Self {
        Self { buffer }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for RingLogLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let entry = LogEntry::new(
            metadata.level().as_str(),
            visitor.message.unwrap_or_default(),
        )
        .with_location(
            metadata.file().unwrap_or("unknown"),
            metadata.line().unwrap_or(0),
            metadata.target(),
        );
        self.buffer.add(entry);
    }
}
