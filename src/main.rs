use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs, path::PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use track_recs::{
    api::{create_router, AppState},
    config::Config,
    services::{Crawler, Pipeline},
    storage::CheckpointStore,
};

#[derive(Parser, Debug)]
#[command(version, about = "Playlist crawler and track recommendation pipeline")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add playlist ids to the checkpoint as pending
    Register {
        /// Playlist ids
        ids: Vec<String>,

        /// File with one playlist id per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Crawl every playlist not yet marked done
    Crawl,
    /// Build the clean track table and feature matrix
    Features,
    /// Score tracks and write the recommendation table
    Score {
        /// Feature matrix produced by the features stage
        #[arg(long)]
        features: Option<PathBuf>,
    },
    /// Run crawl, features and score in order
    Run,
    /// Serve the recommendation table over HTTP
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env()?;
    let paths = config.artifact_paths();

    match args.command {
        Command::Register { ids, file } => {
            let mut ids = ids;
            if let Some(file) = file {
                let contents = fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                ids.extend(
                    contents
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
            }
            let added = CheckpointStore::new(paths.checkpoint()).register(&ids)?;
            tracing::info!(added, total = ids.len(), "Registered playlists");
        }
        Command::Crawl => {
            let crawler = Crawler::from_config(&config)?;
            let pipeline = Pipeline::new(paths, config.top_k).with_crawler(crawler);
            pipeline.crawl_pending().await?;
        }
        Command::Features => {
            let features = Pipeline::new(paths, config.top_k).build_features()?;
            tracing::info!(features = %features.display(), "Features written");
        }
        Command::Score { features } => {
            Pipeline::new(paths, config.top_k).score(features.as_deref())?;
        }
        Command::Run => {
            let crawler = Crawler::from_config(&config)?;
            let pipeline = Pipeline::new(paths, config.top_k).with_crawler(crawler);
            let report = pipeline.run().await?;
            tracing::info!(
                crawled = report.crawl.succeeded,
                failed = report.crawl.failed,
                edges = report.edges,
                "Pipeline run completed"
            );
        }
        Command::Serve => {
            let state = AppState::load(&paths.recommendations())?;
            let app = create_router(state);

            let addr = format!("{}:{}", config.host, config.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            tracing::info!(addr = %addr, "Recommendation API listening");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
