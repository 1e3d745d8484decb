// ABOUTME: Approval Gate — YOLO bypass, session allow-list, suspend-until-host-resolves.
// ABOUTME: Generic over (tool_name, action_key); tool bodies call this directly, not the registry.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::bus::{Bus, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResponse {
    ApproveOnce,
    ApproveForSession,
    Reject,
}

/// §4.2. One gate per session. `yolo` bypasses every check; otherwise a
/// hit in the session allow-list grants silently, and anything else
/// publishes a status update and suspends until `resolve` is called.
pub struct ApprovalGate {
    yolo: bool,
    bus: Arc<Bus>,
    allowlist: Mutex<HashSet<(String, String)>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<ApprovalResponse>>>,
    next_request_id: AtomicU64,
    approval_count: AtomicU64,
}

impl ApprovalGate {
    pub fn new(yolo: bool, bus: Arc<Bus>) -> Self {
        ApprovalGate {
            yolo,
            bus,
            allowlist: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(0),
            approval_count: AtomicU64::new(0),
        }
    }

    /// Ask for permission to perform `action_key` under `tool_name`.
    /// `description` is shown to whoever resolves the request.
    pub async fn request(&self, tool_name: &str, action_key: &str, description: &str) -> ApprovalResponse {
        if self.yolo {
            return ApprovalResponse::ApproveOnce;
        }

        let key = (tool_name.to_string(), action_key.to_string());
        if self.allowlist.lock().await.contains(&key) {
            return ApprovalResponse::ApproveForSession;
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);

        let mut status = HashMap::new();
        status.insert("kind".to_string(), "approval_required".to_string());
        status.insert("request_id".to_string(), request_id.to_string());
        status.insert("tool_name".to_string(), tool_name.to_string());
        status.insert("action_key".to_string(), action_key.to_string());
        status.insert("description".to_string(), description.to_string());
        self.bus.publish(Event::StatusUpdate(status));

        let response = rx.await.unwrap_or(ApprovalResponse::Reject);
        if response == ApprovalResponse::ApproveForSession {
            self.allowlist.lock().await.insert(key);
            self.approval_count.fetch_add(1, Ordering::Relaxed);
        }
        response
    }

    /// Called by whoever is driving the session (CLI, UI) to answer a
    /// pending request. Only the first resolve for a given id has effect —
    /// the oneshot sender is the single-writer completion handle.
    pub async fn resolve(&self, request_id: u64, response: ApprovalResponse) -> bool {
        match self.pending.lock().await.remove(&request_id) {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    pub fn session_approval_count(&self) -> u64 {
        self.approval_count.load(Ordering::Relaxed)
    }
}
