pub mod config;
pub mod error;
pub mod params;
pub mod record;
pub mod summary;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{AnalysisConfig, ContactConfig, InterpolationConfig, OrderConfig, OutputConfig, ScaleConfig, SeriesConfig};
pub use error::{AnalysisError, AnalysisResult};
pub use params::ContactParams;
pub use record::{frame_record_lines, parse_frame_records, FrameRecord, RunMetadata};
pub use summary::{CoordinationHistogram, FrameSummary, ParticleFields};
pub use vecmath::{angle_to_vec, vec_to_angle, wrap_angle, Vec2};
