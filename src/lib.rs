//! Structural analysis of packed sphere-assembly configurations.

pub mod analysis;
pub mod contact;
pub mod frame;
pub mod graph;
pub mod interpolation;
pub mod loader;
pub mod order;
pub mod scale;
pub mod series;

pub use analysis::{analyze_frame, analyze_run, write_report, RunReport};
pub use contact::{ContactMatrix, OrientedRect};
pub use frame::Frame;
pub use graph::NeighborGraph;
pub use interpolation::GridField;
pub use loader::{load_run, Run};
pub use order::{AngleClusters, QTensor};
pub use scale::ScaleHelper;
pub use series::{pearson, up_to, RunCurves};
