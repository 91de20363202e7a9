use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vecstore::application::render_results;
use vecstore::{
    load_store_config, LoadDirectoryUseCase, Metadata, MetadataValue, QueryFilter, StoreConfig,
    StoreFactory, StoreManager, VectorStore, DEFAULT_CONFIG_PATH,
};

mod cli;

use cli::Commands;

#[derive(Parser)]
#[command(name = "vecstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file keyed by backend name
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(short, long, global = true, default_value = "chromadb")]
    backend: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = resolve_config(&cli.config, &cli.backend)?;
    let store = Arc::new(StoreFactory::create(&cli.backend, &config).await?);
    let shared: Arc<dyn VectorStore> = store.clone();
    let manager = StoreManager::new(shared.clone());

    match cli.command {
        Commands::Info => {
            println!("{}", manager.info().await?);
        }

        Commands::Search {
            query,
            num,
            filters,
        } => {
            if filters.is_empty() {
                println!("{}", manager.search(&query, num).await?);
            } else {
                let filter = parse_filters(&filters)?;
                let results = shared.query(&query, num, Some(&filter)).await?;
                println!("{}", render_results(&query, &results));
            }
        }

        Commands::Add { text, id } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), MetadataValue::from("cli"));
            shared
                .add(&[text], &[id.clone()], Some(&[metadata]))
                .await?;
            info!("Added document {}", id);
        }

        Commands::Load { dir, pattern } => {
            let count = LoadDirectoryUseCase::new(shared.clone())
                .execute(Path::new(&dir), &pattern)
                .await?;
            println!("Loaded {} documents from {}", count, dir);
        }

        Commands::Delete { ids } => {
            shared.delete(&ids).await?;
            info!("Deleted {} documents", ids.len());
        }

        #[cfg(feature = "pinecone")]
        Commands::CreateIndex {
            cloud,
            region,
            model,
        } => {
            let mut spec = config
                .settings::<vecstore::PineconeSettings>()?
                .index_spec();
            if let Some(cloud) = cloud {
                spec.cloud = cloud;
            }
            if let Some(region) = region {
                spec.region = region;
            }
            if let Some(model) = model {
                spec.model = model;
            }
            store.create_index(Some(&spec)).await?;
            println!("{}", manager.info().await?);
        }

        #[cfg(not(feature = "pinecone"))]
        Commands::CreateIndex { .. } => {
            info!("Collections are created on connect, nothing to do");
        }
    }

    Ok(())
}

/// Load the backend's section of the config file. A missing file at the
/// default location falls back to the backend's defaults.
fn resolve_config(path: &Path, backend: &str) -> Result<StoreConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        info!(
            "No configuration file at {}, using {} defaults",
            path.display(),
            backend
        );
        return Ok(StoreConfig::new(backend, Default::default()));
    }
    Ok(load_store_config(path, backend)?)
}

/// Turn `key=value` pairs into a conjunction of equality filters. Values
/// that parse as JSON scalars keep their type; anything else is a string.
fn parse_filters(pairs: &[String]) -> Result<QueryFilter> {
    let mut filters = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            anyhow::bail!("Invalid filter '{}': expected KEY=VALUE", pair);
        };
        let value = serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .and_then(|v| MetadataValue::from_json(&v))
            .unwrap_or_else(|| MetadataValue::from(raw));
        filters.push(QueryFilter::eq(key.trim(), value));
    }
    Ok(QueryFilter::and(filters))
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn parses_search_with_filters() {
        let cli = Cli::try_parse_from([
            "vecstore", "--backend", "pinecone", "search", "hello", "--num", "5", "--where",
            "type=text_file",
        ])
        .unwrap();

        assert_eq!(cli.backend, "pinecone");
        match cli.command {
            Commands::Search {
                query,
                num,
                filters,
            } => {
                assert_eq!(query, "hello");
                assert_eq!(num, 5);
                assert_eq!(filters, vec!["type=text_file".to_string()]);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn search_defaults_to_three_results() {
        let cli = Cli::try_parse_from(["vecstore", "search", "hello"]).unwrap();
        assert_eq!(cli.backend, "chromadb");
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(cli.command, Commands::Search { num: 3, .. }));
    }

    #[test]
    fn filter_values_keep_scalar_types() {
        let filter = parse_filters(&["year=2024".to_string(), "lang=en".to_string()]).unwrap();

        assert_eq!(
            filter,
            QueryFilter::and(vec![
                QueryFilter::eq("year", 2024i64),
                QueryFilter::eq("lang", "en"),
            ])
        );
        assert!(parse_filters(&["novalue".to_string()]).is_err());
    }
}
