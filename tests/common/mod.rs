#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tubely_backend::config::UploadConfig;
use tubely_backend::infrastructure::database;
use tubely_backend::models::Video;
use tubely_backend::services::cache::ThumbnailCache;
use tubely_backend::services::media::{MediaTools, ProcessingError};
use tubely_backend::services::storage::ObjectStore;
use tubely_backend::services::upload_service::VideoUploadService;
use tubely_backend::services::video_store::{SqliteVideoStore, VideoStore};
use tubely_backend::utils::auth::create_jwt;
use tubely_backend::{AppState, create_app};
use uuid::Uuid;

pub const BOUNDARY: &str = "tubely-test-boundary";

// ---- Object store ----

pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MockObjectStore {
    pub objects: Mutex<HashMap<String, StoredObject>>,
    pub fail_puts: bool,
    pub deletes: AtomicUsize,
}

impl MockObjectStore {
    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> anyhow::Result<()> {
        if self.fail_puts {
            return Err(anyhow::anyhow!("simulated PutObject failure"));
        }
        let data = tokio::fs::read(path).await?;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ---- Media tools ----

/// Reports a fixed ratio and "remuxes" by copying the input.
pub struct FakeMediaTools {
    pub ratio: String,
    pub fail_probe: bool,
    pub fail_remux: bool,
    pub probes: AtomicUsize,
    pub remuxes: AtomicUsize,
}

impl FakeMediaTools {
    pub fn with_ratio(ratio: &str) -> Self {
        Self {
            ratio: ratio.to_string(),
            fail_probe: false,
            fail_remux: false,
            probes: AtomicUsize::new(0),
            remuxes: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.probes.load(Ordering::SeqCst) + self.remuxes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTools for FakeMediaTools {
    async fn probe_aspect_ratio(&self, path: &Path) -> Result<String, ProcessingError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists(), "probe called on a missing file");
        if self.fail_probe {
            return Err(ProcessingError::Failed {
                tool: "ffprobe",
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        Ok(self.ratio.clone())
    }

    async fn fast_start_remux(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
        self.remuxes.fetch_add(1, Ordering::SeqCst);
        if self.fail_remux {
            return Err(ProcessingError::Failed {
                tool: "ffmpeg",
                status: "exit status: 1".to_string(),
                stderr: "moov atom not found".to_string(),
            });
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

// ---- Metadata store ----

/// Reads from the real store, refuses every update.
pub struct FailingUpdateStore {
    pub inner: SqliteVideoStore,
}

#[async_trait]
impl VideoStore for FailingUpdateStore {
    async fn get_video(&self, id: Uuid) -> anyhow::Result<Option<Video>> {
        self.inner.get_video(id).await
    }

    async fn create_video(&self, video: &Video) -> anyhow::Result<()> {
        self.inner.create_video(video).await
    }

    async fn update_video(&self, _video: &Video) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("database is locked"))
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

// ---- App harness ----

pub struct TestApp {
    pub app: Router,
    pub store: SqliteVideoStore,
    pub objects: Arc<MockObjectStore>,
    pub tools: Arc<FakeMediaTools>,
    pub cache: Arc<ThumbnailCache>,
    pub config: UploadConfig,
    pub scratch: TempDir,
}

pub struct TestAppBuilder {
    config: UploadConfig,
    tools: FakeMediaTools,
    objects: MockObjectStore,
    fail_updates: bool,
}

impl TestAppBuilder {
    pub fn config(mut self, configure: impl FnOnce(&mut UploadConfig)) -> Self {
        configure(&mut self.config);
        self
    }

    pub fn tools(mut self, tools: FakeMediaTools) -> Self {
        self.tools = tools;
        self
    }

    pub fn objects(mut self, objects: MockObjectStore) -> Self {
        self.objects = objects;
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub async fn build(self) -> TestApp {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = self.config;
        config.temp_dir = Some(scratch.path().to_path_buf());

        let pool = database::connect("sqlite::memory:").await.unwrap();
        let store = SqliteVideoStore::new(pool);
        let videos: Arc<dyn VideoStore> = if self.fail_updates {
            Arc::new(FailingUpdateStore {
                inner: store.clone(),
            })
        } else {
            Arc::new(store.clone())
        };

        let objects = Arc::new(self.objects);
        let tools = Arc::new(self.tools);
        let cache = Arc::new(ThumbnailCache::new());

        let upload_service = Arc::new(VideoUploadService::new(
            config.clone(),
            videos.clone(),
            objects.clone(),
            tools.clone(),
            cache.clone(),
        ));

        let app = create_app(AppState {
            videos,
            upload_service,
            config: config.clone(),
        });

        TestApp {
            app,
            store,
            objects,
            tools,
            cache,
            config,
            scratch,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            config: UploadConfig::development(),
            tools: FakeMediaTools::with_ratio("16:9"),
            objects: MockObjectStore::default(),
            fail_updates: false,
        }
    }

    pub async fn new() -> TestApp {
        Self::builder().build().await
    }

    pub async fn seed_video(&self, owner: Uuid) -> Video {
        let video = Video::new(owner, "Boot camp", "Learning to walk in boots");
        self.store.create_video(&video).await.unwrap();
        video
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        create_jwt(
            user_id,
            &self.config.jwt_secret,
            &self.config.jwt_issuer,
            chrono::Duration::hours(1),
        )
        .unwrap()
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

// ---- Requests ----

pub struct Part<'a> {
    pub name: &'a str,
    pub content_type: Option<&'a str>,
    /// Sent as the part's own `Content-Length` header when set.
    pub length: Option<u64>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn video(content_type: &'a str, data: &'a [u8]) -> Self {
        Self {
            name: "video",
            content_type: Some(content_type),
            length: None,
            data,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\n",
                part.name
            )
            .as_bytes(),
        );
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        if let Some(length) = part.length {
            body.extend_from_slice(format!("Content-Length: {}\r\n", length).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(video_id: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/videos/{}/upload", video_id))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Fake MP4 payload; only the bytes matter to the fakes.
pub fn sample_video(len: usize) -> Vec<u8> {
    let mut data = b"\0\0\0\x18ftypmp42".to_vec();
    data.extend((0..len.saturating_sub(data.len())).map(|i| (i % 251) as u8));
    data
}
