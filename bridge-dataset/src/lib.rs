//! Synthetic bridge point-cloud dataset generation.
//!
//! Sample a bridge configuration, synthesise its component solids, plan eight
//! terrestrial scanner legs around it, acquire simulated scans and label every
//! return with the component it belongs to.

pub mod acquisition;
pub mod bounds;
pub mod config;
pub mod error;
pub mod geometry;
pub mod manifest;
pub mod npy_writer;
pub mod pipeline;
pub mod planner;
pub mod point_io;
pub mod resample;
pub mod sampler;
pub mod seed;
pub mod segmentation;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::BridgePipeline;
