use shared::error::{ErrorEvent, ErrorKind};
use tokio::sync::broadcast;
use tracing::{error, warn};

/// Receives every error event a controller emits.
pub trait ErrorEventSink: Send + Sync {
    fn emit(&self, event: &ErrorEvent);
}

/// Fan-out of error events to any number of subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ErrorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ErrorEvent> {
        self.sender.subscribe()
    }
}

impl ErrorEventSink for EventBus {
    fn emit(&self, event: &ErrorEvent) {
        // No subscribers is not an error for the request path.
        let _ = self.sender.send(event.clone());
    }
}

/// Logs events until the bus closes.
pub async fn log_events(mut events: broadcast::Receiver<ErrorEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "error event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &ErrorEvent) {
    let actor = event.actor.map(|id| id.0);
    let topic = event.topic.as_deref().unwrap_or_default();
    match event.kind {
        ErrorKind::ServerError => error!(
            kind = %event.kind,
            code = event.code(),
            ?actor,
            topic,
            message = %event.message,
            "error event"
        ),
        _ => warn!(
            kind = %event.kind,
            code = event.code(),
            ?actor,
            topic,
            message = %event.message,
            "error event"
        ),
    }
}
