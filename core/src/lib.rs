//! The on-device face-liveness-and-verification pipeline.
//!
//! Given a still RGBA image, [`LivenessPipeline::detect_liveness`] runs face detection
//! and alignment (MTCNN, §4.4–§4.5), then a quality/albedo/occlusion/liveness gate chain
//! (§4.10), and on a full pass extracts a 512-D embedding (§4.9).

pub mod aligner;
pub mod albedo;
pub mod cancellation;
pub mod collaborators;
pub mod config;
pub mod detector;
pub mod embedding;
pub mod error;
pub mod geometry;
pub mod image_buffer;
pub mod liveness;
pub mod model_store;
pub mod occlusion;
pub mod pipeline;
pub mod quality;

pub use cancellation::CancellationToken;
pub use config::DetectorConfig;
pub use error::{CoreError, CoreResult};
pub use model_store::{ModelName, ModelSession, ModelStore};
pub use pipeline::LivenessPipeline;

pub use common::{LivenessScores, LivenessVerdict, OcclusionScores, Prediction};
