//! External media tooling: aspect-ratio probing and fast-start remuxing.
//!
//! The pipeline only talks to [`MediaTools`]; [`FfmpegTools`] is the production
//! implementation and tests substitute deterministic fakes.

pub mod aspect;
pub mod ffmpeg;
pub mod remux;

pub use aspect::{AspectClass, AspectClassifier};
pub use ffmpeg::FfmpegTools;
pub use remux::{FastStartRemuxer, ProcessedArtifact};

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not finish within {timeout:?}")]
    Timeout {
        tool: &'static str,
        timeout: Duration,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("unexpected media tool output: {0}")]
    InvalidOutput(String),

    #[error("media scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability boundary for the external media binaries.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Raw display aspect ratio of the first video stream, e.g. `"16:9"`.
    async fn probe_aspect_ratio(&self, path: &Path) -> Result<String, ProcessingError>;

    /// Rewrites `input` into `output` with the index moved to the front.
    /// `input` must not be modified.
    async fn fast_start_remux(&self, input: &Path, output: &Path) -> Result<(), ProcessingError>;
}
