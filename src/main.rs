use axum::middleware::from_fn;
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubely_backend::api::middleware::request_id::request_id_middleware;
use tubely_backend::config::UploadConfig;
use tubely_backend::infrastructure::{database, storage};
use tubely_backend::services::cache::ThumbnailCache;
use tubely_backend::services::media::FfmpegTools;
use tubely_backend::services::upload_service::VideoUploadService;
use tubely_backend::services::video_store::SqliteVideoStore;
use tubely_backend::{AppState, create_app};

const LOCK_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 8091)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubely_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Tubely video backend...");

    let config = UploadConfig::from_env();
    info!(
        "🎬 Upload Config: Max Size={}MB, Allowed={:?}, Tool Timeout={}s",
        config.max_upload_size / 1024 / 1024,
        config.allowed_media_types,
        config.media_tool_timeout_secs
    );

    // 2. Setup Infrastructure
    let pool = database::setup_database(&config.database_url).await?;
    let videos = Arc::new(SqliteVideoStore::new(pool));
    let objects = storage::setup_storage(&config).await;
    let tools = Arc::new(FfmpegTools::new(
        config.ffprobe_path.clone(),
        config.ffmpeg_path.clone(),
        config.media_tool_timeout(),
    ));
    let cache = Arc::new(ThumbnailCache::new());

    let upload_service = Arc::new(VideoUploadService::new(
        config.clone(),
        videos.clone(),
        objects,
        tools,
        cache,
    ));

    // 3. Periodic housekeeping for per-video locks
    let housekeeping = upload_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LOCK_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            housekeeping.cleanup_locks();
        }
    });

    let state = AppState {
        videos,
        upload_service,
        config: config.clone(),
    };

    // Configure tracing layer for HTTP requests
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state)
        .layer(trace_layer)
        .layer(from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
