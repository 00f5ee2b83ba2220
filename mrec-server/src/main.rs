//! mrec-server - meeting recorder HTTP service
//!
//! Serves record actions for auto-save clients, object storage with signed
//! URLs, the chat assistant and the record event stream.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use mrec_common::config::{
    database_path, load_config, resolve_root_folder, storage_path, ROOT_ENV_VAR,
};
use mrec_common::db::init_database;
use mrec_server::ai::AiClient;
use mrec_server::storage::ObjectStorage;
use mrec_server::{build_router, AppState};

/// Command-line arguments for mrec-server
#[derive(Parser, Debug)]
#[command(name = "mrec-server")]
#[command(about = "Meeting recorder HTTP service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and stored objects
    #[arg(short, long, env = ROOT_ENV_VAR)]
    root_folder: Option<String>,

    /// Config file (defaults to ~/.config/mrec/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MREC_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a user and print its API token
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting mrec-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_ENV_VAR,
        config.root_folder.as_deref(),
    );
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = database_path(&root_folder);
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    if let Some(Command::CreateUser { name, email }) = args.command {
        let (user_id, token) = mrec_common::auth::create_user(&pool, &name, &email).await?;
        println!("user_id: {}", user_id);
        println!("token:   {}", token);
        return Ok(());
    }

    let signing_secret = mrec_common::auth::load_signing_secret(&pool).await?;
    let storage = ObjectStorage::new(
        storage_path(&root_folder),
        signing_secret,
        config.server.public_base_url(),
    );

    let ai = match AiClient::from_config(&config.server.ai) {
        Ok(client) => client,
        Err(e) => {
            warn!("AI client unavailable: {}", e);
            None
        }
    };

    info!(
        debounce_ms = config.autosave.debounce_ms,
        saved_display_ms = config.autosave.saved_display_ms,
        signed_url_ttl_secs = config.server.signed_url_ttl_secs,
        max_tool_rounds = config.server.ai.max_tool_rounds,
        assistant = ai.is_some(),
        "Configuration loaded"
    );

    let state = AppState::configured(pool, storage, ai, &config);
    let app = build_router(state);

    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("mrec-server listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
