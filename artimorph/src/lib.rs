//! ArtiMorph - turn a 2D image into a downloaded 3D model.
//!
//! The library drives a remote image-to-model service through upload, task
//! creation, status polling and download, reporting progress as a stream.
//!
//! - [`api`]: HTTP transport seam and typed response envelopes
//! - [`conversion`]: the staged pipeline and its single-use attempt
//! - [`store`]: local model files
//! - [`config`]: `~/.artimorph/config.ini`
//! - [`logging`]: tracing subscriber setup

pub mod api;
pub mod config;
pub mod conversion;
pub mod logging;
pub mod store;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
