//! Wake-up signal for a background loop.

use std::sync::Arc;

use tokio::sync::Notify;

/// Cloneable handle that asks a background loop to run a cycle now.
///
/// Firing while the loop is busy leaves a single permit behind, so
/// repeated fires collapse into one extra cycle.
#[derive(Debug, Clone, Default)]
pub struct Trigger(Arc<Notify>);

impl Trigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.notify_one();
    }

    /// Wait until [`fire`](Self::fire) is called.
    pub async fn fired(&self) {
        self.0.notified().await;
    }
}
