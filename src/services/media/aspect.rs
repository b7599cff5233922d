use super::{MediaTools, ProcessingError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Coarse orientation bucket, also used as the object key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectClass {
    Landscape,
    Portrait,
    Other,
}

impl AspectClass {
    /// Maps a raw `w:h` ratio string. Anything unrecognised is `Other` so an
    /// unusual but valid video is never rejected for its shape.
    pub fn from_ratio(ratio: &str) -> Self {
        match ratio.trim() {
            "16:9" | "4:3" => AspectClass::Landscape,
            "9:16" | "3:4" => AspectClass::Portrait,
            _ => AspectClass::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectClass::Landscape => "landscape",
            AspectClass::Portrait => "portrait",
            AspectClass::Other => "other",
        }
    }
}

impl fmt::Display for AspectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct AspectClassifier {
    tools: Arc<dyn MediaTools>,
}

impl AspectClassifier {
    pub fn new(tools: Arc<dyn MediaTools>) -> Self {
        Self { tools }
    }

    /// Probes once; probe failures are not retried.
    pub async fn classify(&self, path: &Path) -> Result<AspectClass, ProcessingError> {
        let ratio = self.tools.probe_aspect_ratio(path).await?;
        let class = AspectClass::from_ratio(&ratio);
        tracing::debug!("Probed ratio '{}' for {} -> {}", ratio, path.display(), class);
        Ok(class)
    }
}
