use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Container-scoped event bus backing `addEventListener`/`dispatchEvent`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn dispatch(&self, name: impl Into<String>, payload: serde_json::Value) {
        // send failing just means nobody is subscribed.
        let _ = self.sender.send(Event { name: name.into(), payload });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
