//! Utilities shared by the workspace crates.

pub mod file_format;
pub mod grid;
pub mod log_setup;
pub mod test_utils;

pub use grid::Grid;
