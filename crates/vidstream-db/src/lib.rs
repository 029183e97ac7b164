//! Database repositories for the vidstream data access layer.
//!
//! The pipeline touches exactly one table: `videos`. All mutation of an
//! asset during a run goes through [`VideoRepository`], including the single
//! atomic outcome write that commits a finished run.

pub mod pipeline_traits;
pub mod video_repository;

pub use pipeline_traits::PipelineVideoRepository;
pub use video_repository::VideoRepository;
