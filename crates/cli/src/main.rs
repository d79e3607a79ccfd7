use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blockrun_api::BackendClient;
use blockrun_engine::RunOrchestrator;
use blockrun_server::{HttpServer, ServerConfig, SessionResolver, default_config_path};
use blockrun_store::{AppStore, SeedFixture, SqliteStore};

mod cli;

use cli::{Cli, Command, DatabaseArgs, SeedArgs, ServeArgs};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::InitDb(args) => init_db(&config, &args),
        Command::Seed(args) => seed(&config, args).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    ServerConfig::load_from_path(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

fn database_path(config: &ServerConfig, args: &DatabaseArgs) -> PathBuf {
    args.database.clone().unwrap_or_else(|| config.database_path.clone())
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

async fn serve(mut config: ServerConfig, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(backend_url) = args.backend_url {
        config.backend_url = backend_url;
    }
    config.database_path = database_path(&config, &args.database);
    config.validate().context("invalid configuration")?;

    let store: Arc<dyn AppStore> = Arc::new(open_store(&config.database_path)?);
    let backend = BackendClient::new(config.backend_client_config()).context("failed to build backend client")?;
    let orchestrator = Arc::new(RunOrchestrator::new(Arc::new(backend), Arc::clone(&store)));

    let server = HttpServer::new(config.bind_socket_addr()?, orchestrator, Arc::new(SessionResolver::new(store)))
        .start()
        .await
        .context("failed to start HTTP server")?;
    info!(
        address = %server.bound_address(),
        backend = %config.backend_url,
        database = %config.database_path.display(),
        "blockrun is serving"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("shutdown requested");
    server.stop().await
}

fn init_db(config: &ServerConfig, args: &DatabaseArgs) -> Result<()> {
    let path = database_path(config, args);
    open_store(&path)?;
    info!(path = %path.display(), "database schema is ready");
    Ok(())
}

async fn seed(config: &ServerConfig, args: SeedArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read fixture {}", args.file.display()))?;
    let fixture = SeedFixture::from_json(&text).with_context(|| format!("invalid fixture {}", args.file.display()))?;

    let path = database_path(config, &args.database);
    let report = open_store(&path)?.seed(fixture).await.context("failed to seed database")?;
    info!(
        path = %path.display(),
        users = report.users,
        sessions = report.sessions,
        apps = report.apps,
        providers = report.providers,
        "database seeded"
    );
    Ok(())
}
