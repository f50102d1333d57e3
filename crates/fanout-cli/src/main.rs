use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use fanout_core::config::LogFormat;
use fanout_core::domain::{DispatchOutcome, Meme, MemeId, Platform};
use fanout_core::impls::{InMemoryMemeStore, LoopbackPublisher};
use fanout_core::ports::{PostStore, Publisher};
use fanout_core::{AdapterError, AppBuilder, FanoutConfig, FanoutError, PublishOptions};

#[derive(Parser)]
#[command(name = "fanout", about = "Publish a meme to several platforms")]
struct Cli {
    /// Path to a TOML config file (default: ./fanout.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one publish request against loopback publishers and print the outcomes as JSON
    Publish {
        #[arg(long)]
        meme_caption: String,

        #[arg(long)]
        image_url: String,

        /// Target platform (repeatable). Unknown names are reported per entry.
        #[arg(long = "platform", required = true)]
        platforms: Vec<String>,

        /// Caption override for this request
        #[arg(long)]
        caption: Option<String>,

        #[arg(long = "hashtag")]
        hashtags: Vec<String>,

        /// Defer the publish by this many seconds
        #[arg(long)]
        in_secs: Option<u64>,

        /// Make this platform's publisher fail
        #[arg(long, value_parser = parse_platform)]
        fail: Option<Platform>,
    },
}

fn parse_platform(s: &str) -> Result<Platform, FanoutError> {
    s.parse()
}

fn init_tracing(config: &FanoutConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only the JSON result
    match config.logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FanoutConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config);

    match cli.command {
        Command::Publish {
            meme_caption,
            image_url,
            platforms,
            caption,
            hashtags,
            in_secs,
            fail,
        } => {
            let memes = InMemoryMemeStore::new();
            let meme = Meme::new(MemeId::generate(), image_url, meme_caption);
            memes.insert(meme.clone()).await;

            let mut builder = AppBuilder::new(config).memes(Arc::new(memes));
            for platform in Platform::ALL {
                let mut publisher = LoopbackPublisher::new(platform).with_delay(Duration::from_millis(50));
                if fail == Some(platform) {
                    publisher = publisher.failing(AdapterError::Platform {
                        status: 503,
                        message: "simulated outage".into(),
                    });
                }
                builder = builder.publisher(Arc::new(publisher) as Arc<dyn Publisher>);
            }
            let app = builder.build().context("failed to wire application")?;
            let workers = app.start_workers();

            let scheduled = in_secs
                .map(|secs| schedule_after(chrono::Utc::now(), secs))
                .transpose()?;
            let options = PublishOptions {
                scheduled,
                caption,
                hashtags,
            };
            let outcomes = app
                .orchestrator()
                .request_publish(meme.id, platforms.as_slice(), options)
                .await
                .context("publish request rejected")?;

            let outcomes = tokio::select! {
                settled = settle(&app, outcomes) => settled?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("interrupted, shutting down");
                    workers.shutdown().await;
                    return Ok(());
                }
            };

            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            workers.shutdown().await;
        }
    }
    Ok(())
}

fn schedule_after(now: chrono::DateTime<chrono::Utc>, secs: u64) -> Result<chrono::DateTime<chrono::Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|delay| now.checked_add_signed(delay))
        .with_context(|| format!("--in-secs {secs} is too far in the future"))
}

/// Wait until every returned Post is terminal, then return the refreshed outcomes.
async fn settle(app: &fanout_core::App, outcomes: Vec<DispatchOutcome>) -> Result<Vec<DispatchOutcome>> {
    let posts = app.orchestrator().posts();
    let mut settled = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let mut current = match outcome {
            DispatchOutcome::Post(post) => post,
            rejected => {
                settled.push(rejected);
                continue;
            }
        };
        while !current.is_terminal() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            current = posts.get(current.id).await?;
        }
        settled.push(DispatchOutcome::Post(current));
    }
    Ok(settled)
}
