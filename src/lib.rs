//! Boxer - cached container image builds
//!
//! Executes build steps in ephemeral containers, commits every step as an
//! image layer and reuses prior layers through cache keys stored in image
//! comments.

pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestration;
pub mod steps;
pub mod ui;

pub use error::{BoxerError, BoxerResult};
