//! credit-risk entrypoint: fit the feature pipeline, train models, serve scores, report stats.
//!
//! Usage: `credit-risk <fit|train|serve|stats>`; configuration path from
//! `CREDIT_RISK_CONFIG` (default `config.json`).

use anyhow::{bail, Context};
use credit_risk::{
    config::PipelineConfig,
    data::{self, default_rate},
    features::{export_csv, FeaturePipeline},
    logging::{LogEvent, StructuredLogger},
    serving::{ScoringService, ServingBundle},
    state::EncodingStateStore,
    storage::{RunRecord, RunStore},
    training::Trainer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tracing::info;

fn fit(config: &PipelineConfig) -> anyhow::Result<()> {
    let dataset = data::load(&config.data.raw_path).context("loading raw transactions")?;
    let pipeline = FeaturePipeline::new(&config.features).context("building feature pipeline")?;
    let (vectors, state) = pipeline.fit_transform(&dataset).context("fitting feature pipeline")?;

    EncodingStateStore::save(&state, &config.state_path()).context("saving encoding state")?;
    let labels = dataset.labels().ok();
    let labels = labels
        .as_deref()
        .map(|ys| (config.features.target_column.as_str(), ys));
    export_csv(&vectors, labels, &config.processed_path()).context("exporting processed features")?;
    for (column, iv) in state.information_values() {
        info!(column, information_value = iv, "woe information value");
    }
    info!(rows = vectors.len(), path = %config.processed_path().display(), "processed features written");
    Ok(())
}

fn train(config: &PipelineConfig) -> anyhow::Result<()> {
    let dataset = data::load(&config.data.raw_path).context("loading raw transactions")?;
    let labels = dataset.labels().context("reading labels")?;
    let pipeline = FeaturePipeline::new(&config.features).context("building feature pipeline")?;
    let (vectors, state) = pipeline.fit_transform(&dataset).context("fitting feature pipeline")?;
    EncodingStateStore::save(&state, &config.state_path()).context("saving encoding state")?;

    let store = RunStore::open(&config.run_store_path()).context("opening run store")?;
    let trainer = Trainer::new(
        config.training.clone(),
        state.schema_tag.clone(),
        config.risk.label_threshold,
    );
    let mut stdout = std::io::stdout();
    for &kind in &config.training.models {
        let grid = config.training.grid(kind);
        let outcome = trainer
            .train(&vectors, &labels, kind, &grid)
            .with_context(|| format!("training {kind}"))?;
        outcome
            .artifact
            .save(&config.model_path(kind))
            .with_context(|| format!("saving {kind} artifact"))?;

        let run = RunRecord::from_outcome(&outcome);
        store.insert_run(&run).context("recording training run")?;
        let run_id = run.run_id.to_string();
        let message = format!("{}: {}", kind, outcome.metrics);
        StructuredLogger::emit_json(
            &LogEvent {
                ts: run.trained_at.to_rfc3339(),
                level: "info",
                message: &message,
                run_id: Some(&run_id),
                model: Some(kind.as_str()),
                transaction_id: None,
                error: None,
            },
            &mut stdout,
        )?;
    }
    Ok(())
}

fn stats(config: &PipelineConfig) -> anyhow::Result<()> {
    let dataset = data::load(&config.data.raw_path).context("loading raw transactions")?;
    let rate = default_rate(&dataset).context("computing default rate")?;
    info!(
        rows = dataset.len(),
        accounts = dataset.accounts().len(),
        customers = dataset.customers().len(),
        default_rate = rate,
        "dataset statistics"
    );

    let store_path = config.run_store_path();
    if store_path.exists() {
        let store = RunStore::open(&store_path).context("opening run store")?;
        for &kind in &config.training.models {
            if let Some(best) = store.best_run(kind)? {
                info!(
                    model = %kind,
                    run_id = %best.run_id,
                    trained_at = %best.trained_at,
                    roc_auc = best.metrics.roc_auc,
                    "best recorded run"
                );
            }
        }
    }
    Ok(())
}

async fn serve(config: PipelineConfig) -> anyhow::Result<()> {
    let pipeline = FeaturePipeline::new(&config.features).context("building feature pipeline")?;
    let bundle = ServingBundle::load(&config, &pipeline).context("loading serving bundle")?;
    let service = Arc::new(ScoringService::new(pipeline, config.risk.clone(), bundle));
    let limit = Arc::new(Semaphore::new(config.serving.max_concurrent.max(1)));

    let (tx, mut rx) = mpsc::channel::<String>(256);
    let writer = tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if out.write_all(line.as_bytes()).await.is_err() || out.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = out.flush().await;
        }
    });

    info!(max_concurrent = config.serving.max_concurrent, "serving on stdin (Ctrl+C to stop)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            next = lines.next_line() => match next.context("reading request")? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }
        let permit = Arc::clone(&limit).acquire_owned().await?;
        let service = Arc::clone(&service);
        let tx = tx.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || service.handle_line(&line)).await {
                Ok(line) => {
                    let _ = tx.send(line).await;
                }
                Err(e) => tracing::warn!(error = %e, "scoring task failed"),
            }
            drop(permit);
        });
    }

    // Wait for in-flight requests, then let the writer drain.
    let _ = limit.acquire_many(config.serving.max_concurrent.max(1) as u32).await?;
    drop(tx);
    writer.await?;
    info!("serving stopped");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("CREDIT_RISK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let loaded = PipelineConfig::try_load(&config_path);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    StructuredLogger::init(config.log.json, &config.log.level);
    if let Err(e) = &loaded {
        tracing::warn!(path = %config_path.display(), error = %e, "invalid config; using defaults");
    }

    let command = std::env::args().nth(1).unwrap_or_else(|| "train".to_string());
    info!(command = %command, config = %config_path.display(), "credit-risk starting");

    match command.as_str() {
        "fit" => fit(&config),
        "train" => train(&config),
        "stats" => stats(&config),
        "serve" => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("starting tokio runtime")?;
            runtime.block_on(serve(config))
        }
        other => bail!("unknown command {other:?}; expected fit, train, serve or stats"),
    }
}
