//! rsinsight 命令行入口
//! 结果以 JSON 输出到 stdout，日志输出到 stderr

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use rsinsight::{
    AnalysisCoordinator, ConfigManager, CustomConfigBuilder, GlobalConfig, HttpContentFetcher, InMemoryRepository,
    OpenRouterClient, RuleLoader, SnapshotManager, TechDetector, WebsiteStatus,
};

#[derive(Debug, Parser)]
#[command(name = "rsinsight", version, about = "Website analysis pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// MessagePack snapshot used to keep website records between runs
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Freshness window for cached analyses, in seconds
    #[arg(long, global = true)]
    cache_ttl: Option<u64>,

    /// Content fetch timeout, in seconds
    #[arg(long, global = true)]
    fetch_timeout: Option<u64>,

    /// Model used by the content analysis service
    #[arg(long, global = true)]
    ai_model: Option<String>,

    /// Extra signature table (JSON) merged over the built-in one
    #[arg(long, global = true)]
    signatures: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a website, returning the cached result when still fresh
    Analyze { url: String },
    /// Show lifecycle status and analysis history of a website
    Status { website_id: Uuid },
    /// Show the latest detected technology stack of a website, grouped by category
    TechStack { website_id: Uuid },
    /// List known websites, newest first
    List {
        /// Only list websites in this status (pending, in_progress, completed, failed)
        #[arg(long)]
        status: Option<WebsiteStatus>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("Arguments: {:?}", cli);

    let config = build_config(&cli);
    let repository = Arc::new(load_repository(&config).await?);
    let coordinator = Arc::new(build_coordinator(&cli, &config, repository.clone()).await?);

    let output = match &cli.command {
        Command::Analyze { url } => {
            let outcome = coordinator.analyze(url).await;
            // 失败状态同样需要落盘
            save_snapshot(&config, &repository).await?;
            let response = outcome.with_context(|| format!("analysis of {} failed", url))?;
            serde_json::to_string_pretty(&response)?
        }
        Command::Status { website_id } => {
            let report = coordinator.get_status(*website_id).await?;
            serde_json::to_string_pretty(&report)?
        }
        Command::TechStack { website_id } => {
            let report = coordinator.get_tech_stack(*website_id).await?;
            serde_json::to_string_pretty(&report)?
        }
        Command::List { status } => {
            let websites = coordinator.list_websites(*status).await?;
            serde_json::to_string_pretty(&websites)?
        }
    };

    println!("{}", output);
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rsinsight={},reqwest=warn,hyper=warn", default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

/// 环境变量为基础，命令行参数覆盖
fn build_config(cli: &Cli) -> GlobalConfig {
    let mut builder = CustomConfigBuilder::from_config(ConfigManager::from_env());
    if let Some(path) = &cli.snapshot {
        builder = builder.snapshot_path(path.clone());
    }
    if let Some(secs) = cli.cache_ttl {
        builder = builder.cache_ttl(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.fetch_timeout {
        builder = builder.fetch_timeout(Duration::from_secs(secs));
    }
    if let Some(model) = &cli.ai_model {
        builder = builder.ai_model(model.clone());
    }
    builder.build()
}

async fn load_repository(config: &GlobalConfig) -> anyhow::Result<InMemoryRepository> {
    Ok(match &config.snapshot_path {
        Some(path) => InMemoryRepository::from_snapshot(
            SnapshotManager::load(path)
                .await
                .with_context(|| format!("failed to load snapshot {}", path.display()))?,
        ),
        None => InMemoryRepository::new(),
    })
}

async fn build_coordinator(
    cli: &Cli,
    config: &GlobalConfig,
    repository: Arc<InMemoryRepository>,
) -> anyhow::Result<AnalysisCoordinator> {
    let fetcher = Arc::new(HttpContentFetcher::new(config)?);
    let analysis_service = Arc::new(OpenRouterClient::new(config)?);
    let mut coordinator = AnalysisCoordinator::new(config, fetcher, analysis_service, repository);

    if let Some(path) = &cli.signatures {
        let library = RuleLoader::builtin_with_file(path)
            .await
            .with_context(|| format!("failed to load signatures {}", path.display()))?;
        info!("Loaded {} signatures", library.signatures.len());
        coordinator = coordinator.with_detector(TechDetector::with_rules(&library)?);
    }
    Ok(coordinator)
}

async fn save_snapshot(config: &GlobalConfig, repository: &InMemoryRepository) -> anyhow::Result<()> {
    let Some(path) = &config.snapshot_path else {
        return Ok(());
    };
    let snapshot = repository.snapshot().await;
    SnapshotManager::save(path, &snapshot)
        .await
        .with_context(|| format!("failed to save snapshot {}", path.display()))?;
    debug!("Snapshot saved to {}", path.display());
    Ok(())
}
