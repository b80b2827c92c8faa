use std::fs;
use std::path::Path;

use anyhow::Context;
use config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::categorize::{classifier::ClassifierClient, rules::RuleSet};
use crate::extraction::client::ExtractionClient;
use crate::model::{Category, ResumeState};
use crate::pipeline::{ImportPipeline, PipelineOutcome, PipelineSettings};

pub mod categorize;
pub mod config;
pub mod error;
pub mod extraction;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod statement;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::new().expect("config");

    if let Err(err) = run(&config).await {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> Result<(), anyhow::Error> {
    let categories = load_categories(&config.categories_path)?;
    let rules = match &config.rules_path {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::default(),
    };

    let extraction =
        ExtractionClient::new(&config.extraction_url, config.extraction_api_key.clone());
    let classifier =
        ClassifierClient::new(&config.classifier_url, config.classifier_api_key.clone());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("pause requested, waiting for the in-flight group to join");
            cancel.cancel();
        });
    }

    let pipeline = ImportPipeline::new(
        extraction,
        classifier,
        PipelineSettings::from_config(config),
        cancel,
    );

    let mut progress = pipeline.progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            if snapshot.total > 0 {
                tracing::info!(
                    completed = snapshot.completed,
                    total = snapshot.total,
                    failed = snapshot.failed_batches,
                    transactions = snapshot.processed_transactions,
                    "progress"
                );
            }
        }
    });

    let file_name = Path::new(&config.input_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.input_path.clone());

    let outcome = if Path::new(&config.resume_path).exists() {
        let raw =
            fs::read_to_string(&config.resume_path).context("error reading resume snapshot")?;
        let state: ResumeState =
            serde_json::from_str(&raw).context("error parsing resume snapshot")?;
        // the snapshot is consumed exactly once
        fs::remove_file(&config.resume_path).context("error discarding resume snapshot")?;
        tracing::info!(next_index = state.next_index, "resuming paused import");
        pipeline
            .resume(state, &file_name, &categories, &rules)
            .await?
    } else {
        let content =
            fs::read_to_string(&config.input_path).context("error reading statement")?;
        pipeline
            .run(&content, &file_name, &categories, &rules)
            .await?
    };

    match outcome {
        PipelineOutcome::Paused(state) => {
            let raw =
                serde_json::to_string(&state).context("error serializing resume snapshot")?;
            fs::write(&config.resume_path, raw).context("error writing resume snapshot")?;
            tracing::info!(
                path = %config.resume_path,
                collected = state.collected_transactions.len(),
                "import paused, snapshot written"
            );
        }
        PipelineOutcome::Completed(output) => {
            tracing::info!(
                extracted = output.report.extracted,
                by_rules = output.report.matched_by_rules,
                by_classifier = output.report.matched_by_classifier,
                unmatched = output.report.unmatched_indices.len(),
                failed_rows = output.report.failed_rows,
                "import finished"
            );
            let out = serde_json::to_string_pretty(&serde_json::json!({
                "transactions": output.transactions,
                "matches": output.matches,
                "report": output.report,
            }))
            .context("error serializing output")?;
            println!("{out}");
        }
    }

    Ok(())
}

fn load_categories(path: &str) -> Result<Vec<Category>, anyhow::Error> {
    let raw = fs::read_to_string(path).context("error reading categories file")?;
    let categories = serde_json::from_str(&raw).context("error parsing categories file")?;
    Ok(categories)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("error installing ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("error installing signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
