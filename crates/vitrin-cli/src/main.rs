use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vitrin_core::source::Source;

mod import;
mod sync;

#[derive(Debug, Parser)]
#[command(name = "vitrin")]
#[command(about = "Catalog ingestion pipeline for the vitrin dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full pipeline: every leaf category of every brand
    Sync {
        /// Merge fresh colors/images/sizes into products that already exist
        #[arg(long)]
        force_update: bool,

        /// Failure ledger path (overrides VITRIN_LEDGER_PATH)
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Process a single category of one brand
    Category {
        /// Brand to scrape: zara or pullbear
        #[arg(long)]
        brand: Source,

        /// Upstream category id
        #[arg(long)]
        category_id: i64,

        /// Merge fresh colors/images/sizes into products that already exist
        #[arg(long)]
        force_update: bool,
    },
    /// Reprocess the products recorded in the failure ledger
    Retry {
        /// Failure ledger path (overrides VITRIN_LEDGER_PATH)
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Import a brand/category JSON export into the category tables
    ImportCategories {
        /// Path to the export file
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = vitrin_core::load_app_config_from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VITRIN_LOG")
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let pool = vitrin_db::connect_pool(
        &config.database_url,
        vitrin_db::PoolConfig {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        },
    )
    .await?;

    let applied = vitrin_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "applied pending migrations");
    }

    match cli.command {
        Commands::Sync {
            force_update,
            ledger,
        } => {
            let ledger = ledger.unwrap_or_else(|| config.ledger_path.clone());
            sync::run_full_sync(&pool, &config, force_update, &ledger).await
        }
        Commands::Category {
            brand,
            category_id,
            force_update,
        } => sync::run_category_sync(&pool, &config, brand, category_id, force_update).await,
        Commands::Retry { ledger } => {
            let ledger = ledger.unwrap_or_else(|| config.ledger_path.clone());
            sync::run_retry(&pool, &config, &ledger).await
        }
        Commands::ImportCategories { file } => import::run_import_categories(&pool, &file).await,
    }
}
