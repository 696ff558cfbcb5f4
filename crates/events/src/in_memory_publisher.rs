//! In-memory publisher for tests/dev.

use std::sync::Mutex;

use crate::publisher::{MessagePublisher, PublishError};

/// A message accepted by [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
}

/// Records every published message in order.
///
/// - No IO
/// - Always succeeds unless its internal lock is poisoned
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }
}

#[async_trait::async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| PublishError::Unavailable("publisher lock poisoned".to_string()))?;

        messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
