//! Shared constants for bridge synthesis, scan planning and dataset export.
pub mod class;
pub mod dataset;
pub mod scanner;
pub mod structure;
