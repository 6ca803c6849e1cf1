use clap::Parser;
use davwatch::cli::Args;
use davwatch::config::Config;
use davwatch::detect::{Detector, SnapshotStore};
use davwatch::webdav::{DavClient, DavFs};
use davwatch::{create_router, ApiState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "davwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&args.config).expect("failed to load config");
    tracing::info!(
        config = %args.config.display(),
        state_file = %config.state_file,
        "configuration loaded"
    );
    if config.webdav_url.is_empty() {
        tracing::warn!("no webdav_url configured - remote requests will fail");
    }

    let client: Arc<dyn DavFs> = Arc::new(
        DavClient::new(&config.webdav_url, &config.username, &config.password)
            .expect("failed to build WebDAV client"),
    );
    let store = SnapshotStore::new(&config.state_file);
    let detector = Arc::new(Detector::new(client.clone(), store));

    // Port priority: command-line flag > environment variable > default
    let port = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(8080);

    let state = ApiState {
        config: Arc::new(RwLock::new(config)),
        config_path: args.config,
        client,
        detector,
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, port)
        .parse()
        .expect("invalid address");

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
