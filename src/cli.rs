//! # Command Line Interface
//!
//! `aglb serve` runs the HTTP API, `aglb validate` checks a create payload
//! offline and `aglb migrate` manages the database schema.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::api::{start_api_server, ApiState};
use crate::config::AppConfig;
use crate::domain::ResourceGraph;
use crate::errors::{AglbError, Result};
use crate::observability::{init_logging, log_config_info};
use crate::services::Services;
use crate::storage::{
    create_pool, list_applied_migrations, run_db_migrations, validate_migrations, InMemoryStore,
    MigrationInfo, SqliteStore,
};
use crate::validation::{CreateLoadbalancerPayload, ValidationReport};

#[derive(Parser)]
#[command(name = "aglb")]
#[command(about = "Application gateway load balancer configuration service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL override
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate a loadbalancer create payload (JSON or YAML) without a database
    Validate {
        file: PathBuf,

        /// Hostname suffix for the derived loadbalancer hostname
        #[arg(long)]
        base_domain: Option<String>,
    },

    /// Apply pending migrations
    Migrate {
        /// Show applied migrations instead of applying
        #[arg(long)]
        list: bool,
    },
}

/// Result of `aglb validate`
#[derive(Debug)]
pub enum ValidateOutcome {
    Valid(ResourceGraph),
    Invalid(ValidationReport),
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = crate::config::load()?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    init_logging(&config.observability)?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { file, base_domain } => {
            let base_domain = base_domain.unwrap_or(config.aglb.base_domain);
            match validate_file(&file, &base_domain).await? {
                ValidateOutcome::Valid(graph) => {
                    println!("{}", serde_json::to_string_pretty(&graph)?);
                    Ok(ExitCode::SUCCESS)
                }
                ValidateOutcome::Invalid(report) => {
                    eprintln!("{} validation issue(s) in {}", report.len(), file.display());
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(ExitCode::from(1))
                }
            }
        }
        Commands::Migrate { list } => {
            migrate(&config, list).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    config.validate()?;
    log_config_info(&config);

    let pool = create_pool(&config.database).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let services = Services::open(store, &config.aglb.base_domain).await?;

    let state = ApiState { services, pool: Some(pool) };
    start_api_server(&config.server, state).await
}

async fn migrate(config: &AppConfig, list: bool) -> Result<()> {
    let mut database = config.database.clone();
    database.auto_migrate = false;
    let pool = create_pool(&database).await?;

    if list {
        let migrations = list_applied_migrations(&pool).await?;
        if migrations.is_empty() {
            println!("No migrations have been applied");
        } else {
            print_migrations_table(&migrations);
        }
        return Ok(());
    }

    run_db_migrations(&pool).await?;
    if validate_migrations(&pool).await? {
        println!("Database schema is up to date");
        Ok(())
    } else {
        Err(AglbError::internal("migrations applied but schema is still incomplete"))
    }
}

/// Parse a create payload; `.yaml`/`.yml` files are read as YAML, anything
/// else as JSON
pub fn read_payload(path: &Path) -> Result<CreateLoadbalancerPayload> {
    let raw = std::fs::read_to_string(path).map_err(|e| AglbError::Io {
        source: e,
        context: format!("Failed to read {}", path.display()),
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("yaml" | "yml")
    );
    if is_yaml {
        Ok(serde_yaml::from_str(&raw)?)
    } else {
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Validate a payload file against an empty in-memory store.
///
/// Payloads that reference stored ids report them as not found, since
/// nothing is stored.
pub async fn validate_file(path: &Path, base_domain: &str) -> Result<ValidateOutcome> {
    let payload = read_payload(path)?;
    let services = Services::open(Arc::new(InMemoryStore::new()), base_domain).await?;

    match services.loadbalancers.validate_create(payload).await {
        Ok(graph) => {
            info!(path = %path.display(), entities = graph.entity_count(), "Payload is valid");
            Ok(ValidateOutcome::Valid(graph))
        }
        Err(AglbError::Validation(report)) => Ok(ValidateOutcome::Invalid(report)),
        Err(e) => Err(e),
    }
}

fn print_migrations_table(migrations: &[MigrationInfo]) {
    println!("{:<15} {:<50} {:<25} {:<10}", "Version", "Description", "Applied On", "Time (ms)");
    println!("{}", "-".repeat(100));

    for migration in migrations {
        println!(
            "{:<15} {:<50} {:<25} {:<10}",
            migration.version,
            truncate_string(&migration.description, 48),
            migration.installed_on.format("%Y-%m-%d %H:%M:%S"),
            migration.execution_time
        );
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
