use dashmap::DashMap;
use uuid::Uuid;

/// Derived per-video state that must be dropped when the authoritative
/// record could not be updated.
pub trait VideoCache: Send + Sync {
    fn invalidate(&self, video_id: Uuid);
}

/// In-process thumbnail URL cache keyed by video id.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: DashMap<Uuid, String>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, video_id: Uuid) -> Option<String> {
        self.entries.get(&video_id).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, video_id: Uuid, url: impl Into<String>) {
        self.entries.insert(video_id, url.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VideoCache for ThumbnailCache {
    fn invalidate(&self, video_id: Uuid) {
        if self.entries.remove(&video_id).is_some() {
            tracing::debug!("Dropped cached thumbnail for video {}", video_id);
        }
    }
}
