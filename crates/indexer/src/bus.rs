use tokio::sync::broadcast;

/// Lifecycle notifications published by the crawler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingEvent {
    DefaultIndexingDidBegin,
    DefaultIndexingDidFinish,
    DocumentIndexingDidBegin,
    DocumentIndexingDidFinish,
}

impl IndexingEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::DefaultIndexingDidBegin => "defaultIndexingDidBegin",
            Self::DefaultIndexingDidFinish => "defaultIndexingDidFinish",
            Self::DocumentIndexingDidBegin => "documentIndexingDidBegin",
            Self::DocumentIndexingDidFinish => "documentIndexingDidFinish",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bus {
    sender: broadcast::Sender<IndexingEvent>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexingEvent> {
        self.sender.subscribe()
    }

    /// Publishes `event`; a bus with no subscribers drops it.
    pub fn publish(&self, event: IndexingEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                log::debug!("no subscribers for {}", event.name());
                0
            }
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(16)
    }
}
