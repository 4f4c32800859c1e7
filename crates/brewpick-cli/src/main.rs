use anyhow::Context;
use brewpick_catalog::{archive_filename, CatalogSource};
use brewpick_core::ProductId;
use brewpick_sync::{SyncOutcome, SyncService};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "brewpick-cli")]
#[command(about = "Brewpick catalog command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one catalog sync against Youzan and exit.
    Sync {
        /// Fetch retries; defaults to `BREWPICK_SYNC_MAX_RETRIES`.
        #[arg(long)]
        retries: Option<u32>,
    },
    /// Print a summary of the catalog the server would currently serve.
    Catalog,
    /// Preview the archive filename for a product.
    Filename {
        #[arg(long)]
        title: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "")]
        image_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Sync { retries }) => run_sync(retries).await,
        Some(Commands::Catalog) => show_catalog().await,
        Some(Commands::Filename {
            title,
            id,
            image_url,
        }) => {
            let id = id.as_deref().map(parse_product_id);
            println!("{}", archive_filename(&title, id.as_ref(), &image_url));
            Ok(())
        }
        None => {
            println!("brewpick-cli: use --help to list commands");
            Ok(())
        }
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

async fn run_sync(retries: Option<u32>) -> anyhow::Result<()> {
    let config = brewpick_core::load_app_config().context("failed to load configuration")?;
    init_tracing(&config.log_level)?;

    if !config.sync_enabled() {
        anyhow::bail!("YOUZAN_PRODUCTS_ENDPOINT is not set; nothing to sync");
    }

    let sync = SyncService::from_config(&config)?;
    let retries = retries.unwrap_or(config.sync.max_retries);
    tracing::info!(retries, "cli: starting catalog sync");

    match sync.run(retries).await? {
        SyncOutcome::Written { count } => {
            println!(
                "wrote {count} products to {}",
                sync.store().path().display()
            );
        }
        SyncOutcome::Skipped { reason } => println!("sync skipped: {reason}"),
        SyncOutcome::AlreadyRunning => println!("sync already in progress"),
    }
    Ok(())
}

async fn show_catalog() -> anyhow::Result<()> {
    let config = brewpick_core::load_app_config().context("failed to load configuration")?;
    init_tracing(&config.log_level)?;

    let store = brewpick_catalog::CatalogStore::new(config.catalog_path.clone());
    let (document, source) = store.load_served_catalog().await;
    println!("source: {}", source_label(source));
    println!("path: {}", store.path().display());
    println!("products: {}", document.products.len());

    let archived = document
        .products
        .iter()
        .filter(|entry| entry.filename.is_some())
        .count();
    let linked = document
        .products
        .iter()
        .filter(|entry| !entry.mini_program_url.is_empty())
        .count();
    println!("archived images: {archived}");
    println!("resolved links: {linked}");

    for entry in &document.products {
        let id = entry
            .id
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!("  {id}\t{}", entry.title);
    }
    Ok(())
}

fn source_label(source: CatalogSource) -> &'static str {
    match source {
        CatalogSource::Persisted => "persisted",
        CatalogSource::BundledSample => "bundled sample",
        CatalogSource::Empty => "empty",
    }
}

/// Numeric ids are kept numeric so filenames match what a sync would write.
fn parse_product_id(raw: &str) -> ProductId {
    raw.parse::<i64>()
        .map_or_else(|_| ProductId::Text(raw.to_string()), ProductId::Int)
}
