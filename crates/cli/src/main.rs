//! `imagegen` -- submit image-generation jobs and follow them.
//!
//! Every prompt on the command line becomes one job. Jobs are submitted
//! concurrently, status changes are printed as they happen, and a summary
//! of all tasks is printed once every poller has stopped.
//!
//! # Environment variables
//!
//! | Variable                          | Required | Default              | Description                        |
//! |-----------------------------------|----------|----------------------|------------------------------------|
//! | `IMAGEGEN_API_URL`                | no       | `https://api.302.ai` | Remote service base URL            |
//! | `IMAGEGEN_API_KEY`                | no       | --                   | Bearer key sent with every request |
//! | `IMAGEGEN_REQUEST_TIMEOUT_SECS`   | no       | `30`                 | HTTP request timeout               |
//! | `IMAGEGEN_POLL_INTERVAL_SECS`     | no       | `3`                  | Delay between status fetches       |
//! | `IMAGEGEN_FETCH_TIMEOUT_SECS`     | no       | `30`                 | Upper bound for one status fetch   |
//! | `IMAGEGEN_MAX_FETCH_FAILURES`     | no       | `1`                  | Fetch failures before a task fails |
//! | `IMAGEGEN_TARGET_LANGUAGE`        | no       | `en`                 | Prompt translation target          |
//! | `IMAGEGEN_TRANSLATE_PROMPTS`      | no       | `true`               | Translate prompts before submit    |
//! | `IMAGEGEN_TRANSLATE_TIMEOUT_SECS` | no       | `30`                 | Upper bound for one translation    |
//! | `IMAGEGEN_SUBMIT_TIMEOUT_SECS`    | no       | `30`                 | Upper bound for one job submission |
//! | `LOG_FORMAT`                      | no       | text                 | `json` for JSON log lines          |

mod args;
mod output;

use std::pin::pin;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use imagegen_client::api::ImageGenApi;
use imagegen_client::config::ClientConfig;
use imagegen_core::catalog::ModelCatalog;
use imagegen_core::status::TaskStatus;
use imagegen_tasks::config::EngineConfig;
use imagegen_tasks::orchestrator::SubmissionOrchestrator;
use imagegen_tasks::preprocessor::Preprocessor;
use imagegen_tasks::registry::TaskRegistry;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let client_config = ClientConfig::from_env().context("Invalid client configuration")?;
    let mut engine_config = EngineConfig::from_env().context("Invalid engine configuration")?;
    if cli.no_translate {
        engine_config.translate_prompts = false;
    }

    let api = Arc::new(ImageGenApi::from_config(&client_config)?);
    let preprocessor = if engine_config.translate_prompts {
        Preprocessor::new(api.clone())
            .with_target_language(engine_config.target_language.clone())
            .with_timeout(engine_config.translate_timeout)
    } else {
        Preprocessor::disabled()
    };

    let mut catalog = ModelCatalog::new();
    if let Some(label) = &cli.label {
        catalog = catalog.with_model(cli.model.clone(), label.clone());
    }

    let registry = Arc::new(TaskRegistry::new());
    let mut events = registry.subscribe();
    let orchestrator = SubmissionOrchestrator::new(
        Arc::clone(&registry),
        api,
        preprocessor,
        engine_config.poller,
    )
    .with_display_names(Arc::new(catalog))
    .with_submit_timeout(engine_config.submit_timeout);

    tracing::info!(
        api_url = %client_config.api_url,
        model = %cli.model,
        jobs = cli.prompts.len().max(1),
        "Starting imagegen",
    );

    let requests = cli.requests();
    let results = futures::future::join_all(
        requests
            .into_iter()
            .map(|params| orchestrator.submit_job(params)),
    )
    .await;

    let mut rejected = 0usize;
    for result in results {
        if let Err(e) = result {
            rejected += 1;
            tracing::error!(error = %e, "Submission rejected");
        }
    }

    let mut finished = pin!(orchestrator.join_all());
    loop {
        tokio::select! {
            _ = &mut finished => break,
            event = events.recv() => match event {
                Ok(event) => output::print_event(&event, cli.json)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event feed lagged");
                }
                Err(RecvError::Closed) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping pollers");
                orchestrator.shutdown().await;
            }
        }
    }
    while let Ok(event) = events.try_recv() {
        output::print_event(&event, cli.json)?;
    }

    let tasks = registry.list().await;
    output::print_summary(&tasks, cli.json)?;

    let failed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .count();
    if rejected + failed > 0 {
        anyhow::bail!("{rejected} submission(s) rejected, {failed} task(s) failed");
    }
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "imagegen=info,imagegen_tasks=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
