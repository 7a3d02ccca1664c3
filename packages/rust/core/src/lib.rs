//! Book loading and the build pipeline for Bindery.
//!
//! This crate ties plugin resolution, installation, page and asset
//! preparation, hooks and generators into one build (`Pipeline::generate_book`).

pub mod book;
pub mod generator;
pub mod hook;
pub mod output;
pub mod pipeline;
pub mod prepare;

pub use book::Book;
pub use generator::Generator;
pub use hook::call_hook;
pub use output::{BuildOptions, Output};
pub use pipeline::{BuildResult, Pipeline, ProgressReporter, SilentProgress};
