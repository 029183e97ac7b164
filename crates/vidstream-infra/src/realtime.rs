//! Room-scoped realtime progress fan-out.
//!
//! Processing emits progress milestones into two rooms per video: the
//! uploader's room (`user:{uploader_id}`) and the tenant room
//! (`tenant:{tenant_id}`). Delivery is best-effort over tokio broadcast
//! channels; lagged receivers drop events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle status carried on every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Processing,
    Completed,
}

/// Progress update sent to realtime subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub video_id: Uuid,
    pub progress: i32,
    pub message: String,
    pub status: ProgressStatus,
}

impl ProgressEvent {
    /// Status is derived from the progress value: 100 means the run is done,
    /// anything else (including the failure reset to 0) is still processing.
    pub fn new(video_id: Uuid, progress: i32, message: impl Into<String>) -> Self {
        let status = if progress == 100 {
            ProgressStatus::Completed
        } else {
            ProgressStatus::Processing
        };
        ProgressEvent {
            video_id,
            progress,
            message: message.into(),
            status,
        }
    }
}

/// Room name for a single uploader's updates.
pub fn user_room(uploader_id: Uuid) -> String {
    format!("user:{}", uploader_id)
}

/// Room name for tenant-wide updates (dashboards, admin views).
pub fn tenant_room(tenant_id: Uuid) -> String {
    format!("tenant:{}", tenant_id)
}

/// Publish primitive over per-room broadcast channels.
///
/// Rooms are created lazily on first subscribe or publish and live for the
/// lifetime of the hub.
#[derive(Debug, Clone)]
pub struct ProgressHub {
    capacity: usize,
    rooms: Arc<RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>>,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        ProgressHub {
            capacity,
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn sender_for(&self, room: &str) -> broadcast::Sender<ProgressEvent> {
        if let Some(tx) = self.rooms.read().expect("rooms lock poisoned").get(room) {
            return tx.clone();
        }
        let mut rooms = self.rooms.write().expect("rooms lock poisoned");
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish an event to a room.
    pub fn publish(&self, room: &str, event: ProgressEvent) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender_for(room).send(event);
    }

    /// Subscribe to a room's events.
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<ProgressEvent> {
        self.sender_for(room).subscribe()
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Per-run notifier bound to one video's rooms.
///
/// A notifier without a hub is a silent no-op, which keeps processing code
/// free of conditionals when realtime delivery is not configured. The
/// uploader is unknown until the asset row has been loaded, so early events
/// only reach the tenant room.
#[derive(Debug, Clone)]
pub struct ProgressNotifier {
    hub: Option<ProgressHub>,
    video_id: Uuid,
    tenant_id: Uuid,
    uploader_id: Option<Uuid>,
}

impl ProgressNotifier {
    pub fn new(hub: Option<ProgressHub>, video_id: Uuid, tenant_id: Uuid) -> Self {
        ProgressNotifier {
            hub,
            video_id,
            tenant_id,
            uploader_id: None,
        }
    }

    /// Record the uploader once the asset row is known; subsequent events
    /// also reach the uploader's room.
    pub fn set_uploader(&mut self, uploader_id: Uuid) {
        self.uploader_id = Some(uploader_id);
    }

    /// Send a progress milestone to the bound rooms.
    pub fn notify(&self, progress: i32, message: &str) {
        let Some(ref hub) = self.hub else {
            return;
        };

        let event = ProgressEvent::new(self.video_id, progress, message);

        if let Some(uploader_id) = self.uploader_id {
            hub.publish(&user_room(uploader_id), event.clone());
        }
        hub.publish(&tenant_room(self.tenant_id), event);
    }
}
