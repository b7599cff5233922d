use crate::config::UploadConfig;
use crate::models::Video;
use crate::services::cache::VideoCache;
use crate::services::media::{AspectClassifier, FastStartRemuxer, MediaTools};
use crate::services::object_key::ObjectKey;
use crate::services::staging::{StagingError, TempFileStager};
use crate::services::storage::ObjectStore;
use crate::services::video_store::VideoStore;
use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::validation::{extension_of, parse_media_type};
use anyhow::anyhow;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pipeline step, carried on internal errors for the server log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Authorizing,
    Staging,
    Classifying,
    Remuxing,
    Naming,
    Uploading,
    Persisting,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Authorizing => "authorizing",
            UploadStage::Staging => "staging",
            UploadStage::Classifying => "classifying",
            UploadStage::Remuxing => "remuxing",
            UploadStage::Naming => "naming",
            UploadStage::Uploading => "uploading",
            UploadStage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    /// `message` is safe to show to the client; `source` is not.
    #[error("{message} (while {stage}): {source:#}")]
    Internal {
        stage: UploadStage,
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl UploadError {
    fn internal(stage: UploadStage, message: &'static str, source: impl Into<anyhow::Error>) -> Self {
        UploadError::Internal {
            stage,
            message,
            source: source.into(),
        }
    }
}

/// The video part of a multipart request, not yet read.
pub struct IncomingUpload<R> {
    pub reader: R,
    pub content_type: Option<String>,
    /// Declared length of this part, when the client sent one.
    pub size_hint: Option<u64>,
}

/// Drives an upload from ownership check to persisted URL.
///
/// Scratch files are owned by the step that created them and are unlinked on
/// every exit path. On a failed metadata write the derived cache entry for the
/// video is invalidated; the uploaded object is only deleted when
/// `delete_orphans_on_persist_failure` is set.
pub struct VideoUploadService {
    config: UploadConfig,
    videos: Arc<dyn VideoStore>,
    objects: Arc<dyn ObjectStore>,
    cache: Arc<dyn VideoCache>,
    stager: TempFileStager,
    classifier: AspectClassifier,
    remuxer: FastStartRemuxer,
    persist_locks: KeyedMutex<Uuid>,
}

impl VideoUploadService {
    pub fn new(
        config: UploadConfig,
        videos: Arc<dyn VideoStore>,
        objects: Arc<dyn ObjectStore>,
        tools: Arc<dyn MediaTools>,
        cache: Arc<dyn VideoCache>,
    ) -> Self {
        let stager = TempFileStager::new(config.max_upload_size, config.temp_dir.clone());
        let classifier = AspectClassifier::new(tools.clone());
        let remuxer = FastStartRemuxer::new(tools, config.temp_dir.clone());

        Self {
            config,
            videos,
            objects,
            cache,
            stager,
            classifier,
            remuxer,
            persist_locks: KeyedMutex::new(),
        }
    }

    pub fn max_upload_size(&self) -> u64 {
        self.stager.max_size()
    }

    /// Loads the video and checks that `user_id` owns it.
    pub async fn authorize(&self, video_id: Uuid, user_id: Uuid) -> Result<Video, UploadError> {
        let video = self
            .videos
            .get_video(video_id)
            .await
            .map_err(|e| UploadError::internal(UploadStage::Authorizing, "Couldn't find video", e))?
            .ok_or_else(|| {
                UploadError::internal(
                    UploadStage::Authorizing,
                    "Couldn't find video",
                    anyhow!("video {} does not exist", video_id),
                )
            })?;

        if !video.is_owned_by(user_id) {
            warn!(%video_id, %user_id, "Upload rejected: caller does not own video");
            return Err(UploadError::Unauthorized(
                "Not authorized to update this video".to_string(),
            ));
        }

        Ok(video)
    }

    /// Resolves the declared content type to `(media_type, extension)`.
    pub fn check_media_type(
        &self,
        content_type: Option<&str>,
    ) -> Result<(String, &'static str), UploadError> {
        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .ok_or_else(|| UploadError::BadRequest("Missing Content-Type for video".to_string()))?;

        let media_type = parse_media_type(content_type)
            .map_err(|e| UploadError::BadRequest(format!("Invalid Content-Type for video: {}", e)))?;

        if !self.config.is_media_type_allowed(&media_type) {
            return Err(UploadError::BadRequest(format!(
                "unsupported media type: {}",
                media_type
            )));
        }

        let extension =
            extension_of(&media_type).map_err(|e| UploadError::BadRequest(e.to_string()))?;

        Ok((media_type, extension))
    }

    /// Stages, classifies, remuxes and publishes `upload` for an authorized
    /// `video`, returning the updated record.
    pub async fn process<R>(
        &self,
        video: Video,
        upload: IncomingUpload<R>,
    ) -> Result<Video, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let video_id = video.id;
        let (media_type, extension) = self.check_media_type(upload.content_type.as_deref())?;

        let staged = self
            .stager
            .stage(upload.reader, upload.size_hint)
            .await
            .map_err(|e| match e {
                StagingError::TooLarge { limit } => UploadError::BadRequest(format!(
                    "Video exceeds the maximum upload size of {} bytes",
                    limit
                )),
                other => UploadError::internal(UploadStage::Staging, "Error saving file", other),
            })?;
        info!(%video_id, bytes = staged.size(), "Upload staged");

        let aspect = self
            .classifier
            .classify(staged.path())
            .await
            .map_err(|e| UploadError::internal(UploadStage::Classifying, "Couldn't get aspect ratio", e))?;
        debug!(%video_id, %aspect, "Upload classified");

        let processed = self
            .remuxer
            .remux(staged.path())
            .await
            .map_err(|e| UploadError::internal(UploadStage::Remuxing, "Couldn't process video", e))?;

        let key = ObjectKey::generate(aspect, extension)
            .map_err(|e| UploadError::internal(UploadStage::Naming, "Couldn't generate file name", e))?;

        self.objects
            .put_file(key.as_str(), processed.path(), &media_type)
            .await
            .map_err(|e| UploadError::internal(UploadStage::Uploading, "Error uploading file", e))?;
        info!(%video_id, key = %key, bytes = processed.size(), "Video uploaded to object store");

        processed.release();
        staged.release();

        self.persist(video_id, &key).await
    }

    async fn persist(&self, video_id: Uuid, key: &ObjectKey) -> Result<Video, UploadError> {
        let url = self.config.public_url(key.as_str());

        match self.write_video_url(video_id, url).await {
            Ok(video) => {
                info!(%video_id, "Video URL persisted");
                Ok(video)
            }
            Err(e) => {
                self.cache.invalidate(video_id);

                if self.config.delete_orphans_on_persist_failure {
                    if let Err(delete_err) = self.objects.delete_object(key.as_str()).await {
                        warn!(%video_id, key = %key, "Failed to delete orphaned object: {:#}", delete_err);
                    }
                } else {
                    warn!(%video_id, key = %key, "Object left orphaned after failed metadata update");
                }

                Err(UploadError::internal(UploadStage::Persisting, "Couldn't update video", e))
            }
        }
    }

    /// Read-modify-write of the record under the video's lock, so concurrent
    /// uploads for one video apply one at a time.
    async fn write_video_url(&self, video_id: Uuid, url: String) -> anyhow::Result<Video> {
        let _guard = self.persist_locks.lock(&video_id).await;

        let mut video = self
            .videos
            .get_video(video_id)
            .await?
            .ok_or_else(|| anyhow!("video {} disappeared before persisting", video_id))?;

        video.video_url = Some(url);
        video.updated_at = Utc::now();
        self.videos.update_video(&video).await?;

        Ok(video)
    }

    /// Drops per-video lock entries that nobody is holding.
    pub fn cleanup_locks(&self) {
        self.persist_locks.cleanup();
    }
}
