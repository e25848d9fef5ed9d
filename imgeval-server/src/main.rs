//! imgeval-server - clinician image evaluation service
//!
//! `serve` (the default) runs the HTTP API. `create-admin` and `invite`
//! bootstrap accounts without going through the API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imgeval_common::config::{ConfigOverrides, ServiceConfig, TomlConfig};
use imgeval_common::db::init_database;
use imgeval_server::services::registration;
use imgeval_server::{build_router, db, AppState};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments for imgeval-server
#[derive(Parser, Debug)]
#[command(name = "imgeval-server")]
#[command(about = "Clinician image evaluation service")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config_dir>/imgeval/config.toml)
    #[arg(short, long, env = "IMGEVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the database and media
    #[arg(short, long, env = "IMGEVAL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "IMGEVAL_DATABASE")]
    database: Option<PathBuf>,

    /// Directory holding image files
    #[arg(long, env = "IMGEVAL_MEDIA_ROOT")]
    media_root: Option<PathBuf>,

    /// URL prefix the media root is served under
    #[arg(long, env = "IMGEVAL_MEDIA_URL")]
    media_url: Option<String>,

    /// Address to bind
    #[arg(long, env = "IMGEVAL_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "IMGEVAL_PORT")]
    port: Option<u16>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "IMGEVAL_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Issue invitation tokens and print them
    Invite {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root_folder: self.root_folder.clone(),
            database_path: self.database.clone(),
            media_root: self.media_root.clone(),
            media_url: self.media_url.clone(),
            bind_address: self.bind.clone(),
            port: self.port,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let config = ServiceConfig::resolve(args.overrides(), file);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting imgeval-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());

    std::fs::create_dir_all(&config.root_folder).with_context(|| {
        format!(
            "Failed to create root folder {}",
            config.root_folder.display()
        )
    })?;

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::CreateAdmin {
            username,
            password,
            email,
        } => {
            let admin = registration::create_admin(&pool, &username, &password, &email)
                .await
                .context("Failed to create administrator")?;
            println!("Created administrator '{}' (id {})", admin.username, admin.id);
            Ok(())
        }
        Command::Invite { count } => {
            let mut conn = pool.acquire().await?;
            for _ in 0..count {
                let invitation = db::invitations::create_invitation(&mut conn)
                    .await
                    .context("Failed to create invitation")?;
                println!("{}", invitation.token);
            }
            Ok(())
        }
    }
}

async fn serve(pool: SqlitePool, config: ServiceConfig) -> Result<()> {
    std::fs::create_dir_all(&config.media_root).with_context(|| {
        format!(
            "Failed to create media root {}",
            config.media_root.display()
        )
    })?;
    info!(
        "Serving {} at {}",
        config.media_root.display(),
        config.media_url
    );

    let state = AppState::new(pool, config.media_url.clone(), Some(config.media_root.clone()));
    let app = build_router(state);

    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("imgeval-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
