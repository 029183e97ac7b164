//! Vidstream Processing Library
//!
//! Asynchronous moderation pipeline for uploaded videos: probe metadata,
//! sample frames, classify them through a moderation backend, commit the
//! verdict, and stream progress milestones to realtime subscribers.

pub mod frames;
pub mod moderation;
pub mod outcome;
pub mod pipeline;
pub mod probe;
pub mod registry;

// Re-export commonly used types
pub use frames::{FrameExtractor, FrameSampler, FrameSet};
pub use moderation::{
    build_moderation_client, GeminiModerationClient, MockModerationClient, ModerationClient,
};
pub use outcome::OutcomeCommitter;
pub use pipeline::ProcessingPipeline;
pub use probe::{MediaProbe, MetadataProbe, ProbeOutput};
pub use registry::RunRegistry;
