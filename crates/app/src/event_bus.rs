//! In-process broadcast bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

/// Fan-out of messages to every live subscriber.
///
/// Publishing succeeds even when there are no active subscribers
/// (the message is simply dropped).
pub struct EventBus<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to messages on this bus.
    ///
    /// Returns a receiver that will get all messages published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Publish a message, returning how many subscribers will see it.
    pub fn publish(&self, message: T) -> usize {
        // send fails only when there are zero receivers, which is fine.
        self.sender.send(message).unwrap_or(0)
    }
}

impl<T: Clone> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
