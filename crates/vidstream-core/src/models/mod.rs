pub mod moderation;
pub mod video;

pub use moderation::ModerationVerdict;
pub use video::{
    NewVideoAsset, ProcessingOutcome, ProcessingStatus, SensitivityAnalysis, SensitivityStatus,
    VideoAsset,
};
