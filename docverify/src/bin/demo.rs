//! Runs the standard verification pipeline over a described document.
//!
//! ```text
//! docverify-demo --name passport.pdf --size 1048576 --type id --delay-ms 200
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use docverify::config::EngineConfig;
use docverify::core::{DocumentHandle, DocumentType};
use docverify::errors::VerificationError;
use docverify::events::{FanoutPresentationSink, LoggingPresentationSink};
use docverify::history::{HistorySink, HistoryStore, InMemoryHistoryStore};
use docverify::observability::init_logging;
use docverify::pipeline::VerificationEngine;
use docverify::report::VerificationReport;
use docverify::stages::{catalog, SimulatedExecutor, StageExecutor, StageOutcome};

#[derive(Debug, Parser)]
#[command(name = "docverify-demo", about = "Run a simulated document verification")]
struct Args {
    /// Document file name.
    #[arg(long)]
    name: String,

    /// Document size in bytes.
    #[arg(long)]
    size: u64,

    /// Document type key or label (e.g. "id", "Contract").
    #[arg(long = "type", default_value = "other")]
    document_type: String,

    /// Per-stage delay in milliseconds; overrides the config file.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Make the named stage fail.
    #[arg(long)]
    fail_stage: Option<String>,

    /// Cancel the run after this many milliseconds.
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// JSON engine configuration file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

/// Cancels the active run. Returns false if the run had already finished.
fn cancel_if_running(engine: &VerificationEngine) -> Result<bool, VerificationError> {
    match engine.cancel() {
        Ok(_) => Ok(true),
        Err(VerificationError::NotRunning(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json_str(&raw).context("parsing engine config")?
        }
        None => EngineConfig::default(),
    };
    if let Some(ms) = args.delay_ms {
        config = config.with_simulated_stage_delay_ms(ms);
    }
    init_logging(&config.logging)?;

    let document_type: DocumentType = args.document_type.parse()?;
    let document = DocumentHandle::new(&args.name, args.size);

    let delay = config.simulated_stage_delay();
    let fail_stage = args.fail_stage.clone();
    let stages = catalog::standard_stages_with(|id| -> Arc<dyn StageExecutor> {
        let executor = SimulatedExecutor::new(delay);
        if fail_stage.as_deref() == Some(id) {
            Arc::new(executor.with_outcome(StageOutcome::failure("simulated failure")))
        } else {
            Arc::new(executor)
        }
    });

    let history = Arc::new(InMemoryHistoryStore::new());
    let sink = FanoutPresentationSink::new()
        .with(Arc::new(LoggingPresentationSink::default()))
        .with(Arc::new(HistorySink::new(history.clone())));

    let engine = VerificationEngine::with_stages(config, Arc::new(sink), stages)?;
    let run = engine.start(document, document_type)?.spawn();

    if let Some(ms) = args.cancel_after_ms {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        cancel_if_running(&engine)?;
    }
    run.await.context("verification task panicked")?;

    let snapshot = engine.snapshot();
    let report = VerificationReport::from_snapshot(&snapshot)
        .context("run did not reach a terminal state")?;
    if args.json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print!("{report}");
    }

    let stats = history.stats();
    println!(
        "History: {} total, {} verified, {} rejected, {} cancelled",
        stats.total, stats.verified, stats.rejected, stats.cancelled
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docverify::core::RunState;

    #[tokio::test]
    async fn test_cancel_if_running_after_run_finished() {
        let engine = VerificationEngine::with_stages(
            EngineConfig::default(),
            Arc::new(docverify::events::NoOpPresentationSink),
            catalog::simulated_stages(Duration::from_millis(1)),
        )
        .unwrap();
        let document = DocumentHandle::new("contract.pdf", 4096);

        engine.verify(document.clone(), DocumentType::Contract).await.unwrap();
        assert!(!cancel_if_running(&engine).unwrap());
        assert_eq!(engine.snapshot().run_state, RunState::Completed);

        let driver = engine.start(document, DocumentType::Contract).unwrap();
        assert!(cancel_if_running(&engine).unwrap());
        assert_eq!(driver.run().await, RunState::Cancelled);
    }
}
