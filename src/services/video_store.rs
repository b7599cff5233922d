use crate::models::Video;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Metadata store for video records.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>>;
    async fn create_video(&self, video: &Video) -> Result<()>;
    /// Writes every mutable field of `video`, including `updated_at`.
    async fn update_video(&self, video: &Video) -> Result<()>;
    async fn health_check(&self) -> bool;
}

#[derive(Clone)]
pub struct SqliteVideoStore {
    pool: SqlitePool,
}

impl SqliteVideoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for SqliteVideoStore {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(
            "SELECT id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at \
             FROM videos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    async fn create_video(&self, video: &Video) -> Result<()> {
        sqlx::query(
            "INSERT INTO videos (id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(video.id)
        .bind(video.user_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_video(&self, video: &Video) -> Result<()> {
        let result = sqlx::query(
            "UPDATE videos SET title = ?, description = ?, thumbnail_url = ?, video_url = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.updated_at)
        .bind(video.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Video {} not found", video.id));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
