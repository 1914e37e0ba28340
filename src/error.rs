//! Errors surfaced by the rendering pipeline.
//!
//! Only failures that should reach the HTTP caller live here. Missing assets
//! and unavailable collaborators are handled where they occur and never
//! become a [`RenderError`].

use thiserror::Error;

/// Errors that can fail a clock render.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The requested or configured timezone is not a known IANA name
    #[error("unknown timezone '{0}'")]
    Timezone(String),

    /// The canvas could not be allocated (zero or overflowing dimensions)
    #[error("invalid canvas size {0}x{1}")]
    Canvas(u32, u32),

    /// PNG encoding failed
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The blocking render task panicked or was cancelled
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
