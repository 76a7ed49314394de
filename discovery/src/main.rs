use anyhow::Context;
use clap::{Parser, Subcommand};
use common::settings::Settings;
use common::ArtifactKey;
use discovery::{DiscoveryOptions, DiscoveryResult, DiscoveryService};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "agentlib")]
#[command(about = "Find importable agent artifacts in a directory tree", long_about = None)]
struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(long, global = true, env = "AGENTLIB_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan a tree and list artifact candidates
    Discover {
        root: PathBuf,
        #[arg(long)]
        max_depth: Option<usize>,
        /// Project root; enables project existence checks and skip lookups
        #[arg(long)]
        project: Option<String>,
        /// Also list SKIPPED_* and FAILED entries
        #[arg(long)]
        include_skipped: bool,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        min_confidence: Option<u8>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the per-project skip list
    Skip {
        #[command(subcommand)]
        action: SkipAction,
    },
}

#[derive(Debug, Subcommand)]
enum SkipAction {
    /// Skip an artifact (`type:name`) in future scans
    Add {
        scope: String,
        key: ArtifactKey,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Un-skip an artifact
    Remove { scope: String, key: ArtifactKey },
    /// Drop every skip entry of a scope
    Clear { scope: String },
    List { scope: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings =
        Settings::new(cli.config.as_deref()).context("Failed to load configuration")?;

    let default_filter = if settings.debug {
        "discovery=debug,common=debug"
    } else {
        "discovery=info,common=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let service = DiscoveryService::from_settings(&settings)?;

    match cli.command {
        Commands::Discover {
            root,
            max_depth,
            project,
            include_skipped,
            min_confidence,
            timeout_ms,
            json,
        } => {
            let mut options = DiscoveryOptions::from(&settings.discovery);
            if let Some(max_depth) = max_depth {
                options.max_depth = max_depth;
            }
            if min_confidence.is_some() {
                options.min_confidence = min_confidence;
            }
            if let Some(ms) = timeout_ms {
                options.timeout = Some(Duration::from_millis(ms));
            }
            options.project_scope_id = project;
            options.include_skipped = include_skipped;

            let result = service.discover(root, options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_table(&result);
            }
        }
        Commands::Skip { action } => match action {
            SkipAction::Add { scope, key, reason } => {
                let entry = service.skip(&scope, &key, &reason).await?;
                println!("skipped {} in {}", entry.artifact_key, entry.project_scope_id);
            }
            SkipAction::Remove { scope, key } => {
                if service.unskip(&scope, &key).await? {
                    println!("removed {} from {}", key, scope);
                } else {
                    println!("{} was not skipped in {}", key, scope);
                }
            }
            SkipAction::Clear { scope } => {
                let removed = service.clear_skips(&scope).await?;
                println!("cleared {} entries from {}", removed, scope);
            }
            SkipAction::List { scope } => {
                for entry in service.list_skips(&scope).await? {
                    println!(
                        "{:<40} {}  {}",
                        entry.artifact_key.to_string(),
                        entry.added_at.format("%Y-%m-%d %H:%M"),
                        entry.reason
                    );
                }
            }
        },
    }

    Ok(())
}

fn print_table(result: &DiscoveryResult) {
    println!(
        "{:<8} {:<32} {:>5} {:<6} {:<16} PATH",
        "TYPE", "NAME", "SCORE", "TIER", "STATUS"
    );
    for item in &result.items {
        println!(
            "{:<8} {:<32} {:>5} {:<6} {:<16} {}",
            item.artifact_type.as_str(),
            item.name,
            item.score.normalized_score,
            item.tier.as_str(),
            item.status.label(),
            item.path
        );
    }
    println!(
        "\n{} discovered, {} importable, {} ms{}",
        result.discovered_count,
        result.importable_count,
        result.scan_duration_ms,
        if result.truncated { " (truncated)" } else { "" }
    );
    for d in &result.diagnostics {
        eprintln!("warning: {} ({})", d.message, d.path);
    }
}
