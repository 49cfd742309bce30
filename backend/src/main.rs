//! catalog-import CLI - load a catalog export into the content store
//!
//! # Commands
//!
//! ```bash
//! catalog-import import catalog.csv --limit 10     # Import products with their images
//! catalog-import delete-all                        # Delete every product
//! catalog-import update-stocks                     # Assign stock levels to every product
//! catalog-import media                             # List uploaded media
//! ```
//!
//! Store credentials are read from the environment (or a `.env` file):
//! `CATALOG_API_URL`, `CATALOG_ADMIN_EMAIL`, `CATALOG_ADMIN_PASSWORD`,
//! `CATALOG_AUTH_SCHEME`.

use catalog_import::{
    delete_all_products, list_media, update_all_stocks, AssetConfig, DedupeKey, ImportOptions,
    Importer,
    StoreClient, StoreConfig,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "catalog-import")]
#[command(
    about = "Import a product catalog and its images into the content store",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DedupeArg {
    /// Same cleaned URL, same upload
    Url,
    /// Same image bytes, same upload
    Content,
}

impl From<DedupeArg> for DedupeKey {
    fn from(arg: DedupeArg) -> Self {
        match arg {
            DedupeArg::Url => DedupeKey::SourceUrl,
            DedupeArg::Content => DedupeKey::ContentHash,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import products from a delimited catalog file
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Only import the first N records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Records processed in parallel
        #[arg(short, long, default_value = "3")]
        concurrency: usize,

        /// Seed for ratings, flags and slug suffixes
        #[arg(long)]
        seed: Option<u64>,

        /// How uploaded images are recognised
        #[arg(long, value_enum, default_value = "url")]
        dedupe: DedupeArg,

        /// Write the run summary as JSON
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },

    /// Delete every product in the store
    DeleteAll,

    /// Give every product a stock level
    UpdateStocks {
        /// Seed for the generated stock levels
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List uploaded media
    Media,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import { input, limit, concurrency, seed, dedupe, summary } => {
            let options = ImportOptions { limit, concurrency, seed };
            cmd_import(&input, options, dedupe.into(), summary.as_deref()).await
        }
        Commands::DeleteAll => cmd_delete_all().await,
        Commands::UpdateStocks { seed } => cmd_update_stocks(seed).await,
        Commands::Media => cmd_media().await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn connect() -> Result<Arc<StoreClient>, Box<dyn std::error::Error>> {
    let config = StoreConfig::from_env()?;
    eprintln!("🌐 Store: {}", config.api_url);
    Ok(Arc::new(StoreClient::new(config)?))
}

async fn cmd_import(
    input: &Path,
    options: ImportOptions,
    dedupe: DedupeKey,
    summary_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect()?;
    let assets = AssetConfig { dedupe, ..AssetConfig::default() };

    let summary = Importer::new(client, options)
        .with_asset_config(assets)
        .run(input)
        .await?;

    eprintln!(
        "\n📊 {} records: {} succeeded, {} failed ({:.1}%)",
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.success_rate()
    );

    if let Some(path) = summary_path {
        fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        eprintln!("💾 Summary written to: {}", path.display());
    }
    Ok(())
}

async fn cmd_delete_all() -> Result<(), Box<dyn std::error::Error>> {
    let client = connect()?;
    let summary = delete_all_products(&client).await?;
    if summary.failed > 0 {
        return Err(format!("{} of {} deletes failed", summary.failed, summary.total).into());
    }
    Ok(())
}

async fn cmd_update_stocks(seed: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect()?;
    let summary = update_all_stocks(&client, seed).await?;
    if summary.total > 0 {
        eprintln!("📊 Rate: {:.1}%", summary.succeeded as f64 / summary.total as f64 * 100.0);
    }
    Ok(())
}

async fn cmd_media() -> Result<(), Box<dyn std::error::Error>> {
    let client = connect()?;
    let media = list_media(&client).await?;
    println!("{}", serde_json::to_string_pretty(&media)?);
    Ok(())
}
