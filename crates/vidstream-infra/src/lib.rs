//! Vidstream Infrastructure Library
//!
//! Shared infrastructure components used across services:
//! - Telemetry initialization (tracing subscriber setup)
//! - Realtime progress fan-out (room-scoped broadcast channels)

pub mod realtime;
pub mod telemetry;

// Re-export commonly used types
pub use realtime::{
    tenant_room, user_room, ProgressEvent, ProgressHub, ProgressNotifier, ProgressStatus,
};
pub use telemetry::init_telemetry;
