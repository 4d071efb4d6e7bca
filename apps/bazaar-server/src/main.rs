mod config;
mod logging;
mod seed;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tower_http::trace::TraceLayer;
use url::Url;

use config::{AppConfig, CliArgs, DatabaseConfig, LoggingConfig};
use marketplace::domain::repo::{
    ListingsRepository, MessagesRepository, OffersRepository, UsersRepository,
};
use marketplace::infra::storage::{InMemoryStore, Migrator, SeaOrmStore};
use marketplace::{Repositories, Services};

/// Bazaar - marketplace backend server
#[derive(Parser)]
#[command(name = "bazaar-server")]
#[command(about = "Bazaar - marketplace backend server")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory store (with demo data) instead of the database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
    /// Load demo data into the configured database
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        port: cli.port,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_else(LoggingConfig::default);
    logging::init_logging(&logging_config);
    tracing::info!("Bazaar server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(config),
        Commands::Seed => run_seed(config).await,
    }
}

/// Reject DSNs for backends we don't ship drivers for.
fn detect_from_dsn(cfg: &DatabaseConfig) -> Result<&'static str> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }

    let url = Url::parse(raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;

    match url.scheme() {
        "sqlite" | "sqlite3" => Ok("sqlite"),
        "postgres" | "postgresql" => Ok("postgres"),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

async fn connect_database(cfg: &DatabaseConfig) -> Result<DatabaseConnection> {
    let backend = detect_from_dsn(cfg)?;

    let mut options = ConnectOptions::new(cfg.url.clone());
    if let Some(max_conns) = cfg.max_conns {
        options.max_connections(max_conns);
    }
    options.acquire_timeout(Duration::from_secs(5));

    tracing::info!("Connecting to {} database", backend);
    let db = Database::connect(options).await?;

    tracing::info!("Running migrations");
    Migrator::up(&db, None).await?;

    Ok(db)
}

fn repositories<S>(store: Arc<S>) -> Repositories
where
    S: UsersRepository + ListingsRepository + OffersRepository + MessagesRepository + 'static,
{
    Repositories {
        users: store.clone(),
        listings: store.clone(),
        offers: store.clone(),
        messages: store,
    }
}

async fn build_repositories(config: &AppConfig, mock: bool) -> Result<Repositories> {
    if mock {
        tracing::warn!("Running against an in-memory store; data is not persisted");
        let store = Arc::new(InMemoryStore::new());
        let repos = repositories(store);
        let seeded = seed::seed_demo_data(&repos).await?;
        for (label, id) in seeded {
            tracing::info!("Demo {}: {}", label, id);
        }
        Ok(repos)
    } else {
        let db = connect_database(&config.database).await?;
        Ok(repositories(Arc::new(SeaOrmStore::new(db))))
    }
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    let repos = build_repositories(&config, args.mock).await?;
    let services = Services::new(repos, config.marketplace.clone());

    let app = services.router().layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow!("Invalid listen address: {}", e))?;

    tracing::info!("Starting on http://{addr}...");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("Received termination signal, shutting down gracefully...");
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    detect_from_dsn(&config.database)?;

    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn run_seed(config: AppConfig) -> Result<()> {
    let db = connect_database(&config.database).await?;
    let repos = repositories(Arc::new(SeaOrmStore::new(db)));

    let seeded = seed::seed_demo_data(&repos).await?;
    for (label, id) in seeded {
        println!("seeded {label}: {id}");
    }

    tracing::info!("Demo data loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_detection_accepts_shipped_backends() {
        let cfg = |url: &str| DatabaseConfig {
            url: url.to_string(),
            max_conns: None,
        };
        assert_eq!(detect_from_dsn(&cfg("sqlite::memory:")).unwrap(), "sqlite");
        assert_eq!(
            detect_from_dsn(&cfg("postgres://u:p@localhost/bazaar")).unwrap(),
            "postgres"
        );
        assert!(detect_from_dsn(&cfg("mysql://localhost/bazaar")).is_err());
        assert!(detect_from_dsn(&cfg("")).is_err());
    }
}
