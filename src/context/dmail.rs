// ABOUTME: D-Mail — a one-slot deferred revert-and-inject mailbox, consumed between loop steps.

use tokio::sync::Mutex;

/// A deferred revert, plus the message to inject once the revert lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DMail {
    pub checkpoint_id: u64,
    pub message: String,
}

/// Single-slot mailbox. A later `send` overwrites an unconsumed earlier one.
pub struct DMailBox {
    slot: Mutex<Option<DMail>>,
}

impl DMailBox {
    pub fn new() -> Self {
        DMailBox { slot: Mutex::new(None) }
    }

    /// §4.6 `send`. Rejects (returns `false`) when `checkpoint_id` does not
    /// name an existing checkpoint; the driver supplies `checkpoint_count`
    /// since the mailbox has no view of the Context itself.
    pub async fn send(&self, checkpoint_id: u64, message: String, checkpoint_count: u64) -> bool {
        if checkpoint_id >= checkpoint_count {
            return false;
        }
        *self.slot.lock().await = Some(DMail { checkpoint_id, message });
        true
    }

    /// §4.6 `fetch`. Takes and clears the slot.
    pub async fn fetch(&self) -> Option<DMail> {
        self.slot.lock().await.take()
    }

    /// §4.6 `clear`.
    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }
}

impl Default for DMailBox {
    fn default() -> Self {
        Self::new()
    }
}
