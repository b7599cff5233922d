use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub async fn setup_database(database_url: &str) -> anyhow::Result<SqlitePool> {
    info!("📂 Database: {}", database_url);

    let pool = connect(database_url).await?;

    info!("✅ Database connected successfully");
    Ok(pool)
}

/// Opens a pool and makes sure the schema exists.
///
/// In-memory databases live only as long as their connection, so those get a
/// single connection that is never recycled.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(16)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
    };

    let pool = pool_options.connect_with(options).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    info!("🔄 Ensuring video schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS videos (
            id BLOB PRIMARY KEY NOT NULL,
            user_id BLOB NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            thumbnail_url TEXT,
            video_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_videos_user_id ON videos (user_id)")
        .execute(pool)
        .await?;

    Ok(())
}
