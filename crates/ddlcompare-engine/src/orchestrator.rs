//! Batch orchestrator
//!
//! Runs every worklist item through a [`Pipeline`] on a bounded pool of
//! workers. Each worker owns its catalog sessions. Whatever happens to an
//! item (error, timeout, panic, cancellation) it still produces exactly one
//! report row.

use crate::aggregator::Aggregator;
use crate::comparator::Comparator;
use crate::context::RunContext;
use crate::pipeline::{FetchPolicy, Outcome, Pipeline, Sessions};
use crate::worklist::{WorkItem, Worklist};
use ddlcompare_catalog::{CatalogConnector, FetchError, ObjectLister};
use ddlcompare_core::{Config, Report, RunMode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinError;
use tracing::{debug, error, info};

/// Run-level failures; per-object problems never surface here
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Discovery of schema '{schema}' failed: {error}")]
    Discovery { schema: String, error: FetchError },
}

const CANCELLED: &str = "cancelled before dispatch";

type Jobs = Arc<Mutex<mpsc::Receiver<(usize, WorkItem)>>>;

pub struct Orchestrator {
    config: Config,
    mode: RunMode,
    source: Arc<dyn CatalogConnector>,
    targets: Vec<Arc<dyn CatalogConnector>>,
    lister: Option<Arc<dyn ObjectLister>>,
}

impl Orchestrator {
    /// Compare source objects against one or more targets
    pub fn compare(
        config: Config,
        source: Arc<dyn CatalogConnector>,
        targets: Vec<Arc<dyn CatalogConnector>>,
    ) -> Self {
        Self {
            config,
            mode: RunMode::Compare,
            source,
            targets,
            lister: None,
        }
    }

    /// Extract source definitions with their dependencies
    pub fn extract(config: Config, source: Arc<dyn CatalogConnector>) -> Self {
        Self {
            config,
            mode: RunMode::Extract,
            source,
            targets: Vec::new(),
            lister: None,
        }
    }

    /// Lister used for schema discovery
    pub fn with_lister(mut self, lister: Arc<dyn ObjectLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    /// Run the worklist and build the report
    ///
    /// Sending `true` on `cancel` stops dispatching; items already running
    /// finish and the rest are reported as failed.
    pub async fn run(&self, worklist: &Worklist, cancel: Option<watch::Receiver<bool>>) -> Result<Report, RunError> {
        let comparator = self.validate(worklist)?;

        let cancel = cancel.unwrap_or_else(|| {
            let (_, rx) = watch::channel(false);
            rx
        });
        let context = RunContext::new(cancel);
        info!(run_id = %context.run_id, mode = ?self.mode, source = self.source.label(), "Starting run");

        let timeout = Duration::from_millis(self.config.run.timeout_ms);
        let items = worklist
            .resolve(self.lister.as_deref(), &self.config.allowlist, timeout)
            .await?;
        let workers = self.config.run.workers.min(items.len()).max(1);
        info!("Processing {} objects with {} workers", items.len(), workers);

        let pipeline = Arc::new(Pipeline::new(
            self.mode,
            self.source.clone(),
            self.targets.clone(),
            comparator,
            FetchPolicy {
                timeout,
                retry_connection: self.config.run.retry_connection,
                backoff: Duration::from_millis(self.config.run.retry_backoff_ms),
            },
            self.config.run.dependency_depth,
        ));

        let (job_tx, job_rx) = mpsc::channel::<(usize, WorkItem)>(workers);
        let jobs: Jobs = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, Outcome)>();

        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(work(id, pipeline.clone(), jobs.clone(), result_tx.clone())))
            .collect();
        drop(result_tx);

        let mut cancel = context.cancellation();
        let mut undispatched = vec![false; items.len()];
        for (index, item) in items.iter().enumerate() {
            if context.is_cancelled() {
                undispatched[index] = true;
                continue;
            }
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    info!("Cancellation requested, stopping dispatch");
                    undispatched[index] = true;
                }
                permit = job_tx.reserve() => match permit {
                    Ok(permit) => {
                        permit.send((index, item.clone()));
                        context.record_dispatch();
                    }
                    Err(_) => undispatched[index] = true,
                },
            }
        }
        drop(job_tx);

        let mut outcomes: Vec<Option<Outcome>> = vec![None; items.len()];
        while let Some((index, outcome)) = result_rx.recv().await {
            outcomes[index] = Some(outcome);
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker panicked: {}", e);
            }
        }

        let mut aggregator = Aggregator::new(self.config.run.comment_limit);
        for ((item, outcome), skipped) in items.iter().zip(outcomes).zip(undispatched) {
            let outcome = outcome.unwrap_or_else(|| {
                let message = if skipped { CANCELLED } else { "no result from worker" };
                Outcome::failed(item.object.clone(), message)
            });
            aggregator.record(outcome);
        }

        let finished_at = chrono::Utc::now();
        let mut report = Report::new(
            context.run_id.clone(),
            self.mode,
            self.source.label(),
            self.targets.iter().map(|t| t.label().to_string()).collect(),
        );
        report.metadata = Some(json!({
            "started_at": context.started_at.to_rfc3339(),
            "finished_at": finished_at.to_rfc3339(),
            "elapsed_ms": context.elapsed().num_milliseconds(),
            "workers": workers,
            "objects": items.len(),
            "dispatched": context.dispatched(),
            "cancelled": context.is_cancelled(),
        }));
        let report = aggregator.finish(report);

        info!(
            run_id = %report.run_id,
            total = report.summary.total,
            matched = report.summary.matched,
            problems = report.summary.problems(),
            "Run complete"
        );
        Ok(report)
    }

    /// Reject runs that cannot do any per-object work
    fn validate(&self, worklist: &Worklist) -> Result<Comparator, RunError> {
        if self.config.run.workers == 0 {
            return Err(RunError::Configuration("workers must be at least 1".to_string()));
        }
        if self.config.run.timeout_ms == 0 {
            return Err(RunError::Configuration("timeout_ms must be positive".to_string()));
        }
        if self.mode == RunMode::Compare && self.targets.is_empty() {
            return Err(RunError::Configuration("comparison needs at least one target".to_string()));
        }
        if worklist.is_empty() {
            return Err(RunError::Configuration(
                "no objects given and no schema to discover".to_string(),
            ));
        }
        if !worklist.discover.is_empty() && self.lister.is_none() {
            return Err(RunError::Configuration(
                "schema discovery requested but no object lister is configured".to_string(),
            ));
        }

        Comparator::new(&self.config).map_err(|e| RunError::Configuration(format!("invalid pattern: {}", e)))
    }
}

/// Worker loop: take items until the job channel closes
///
/// Each item runs in its own task so a panic is contained. The task owns
/// the sessions while it runs and hands them back; after a panic they are
/// dropped and reopened lazily.
async fn work(id: usize, pipeline: Arc<Pipeline>, jobs: Jobs, results: mpsc::UnboundedSender<(usize, Outcome)>) {
    let mut sessions = Sessions::new();

    loop {
        let next = jobs.lock().await.recv().await;
        let Some((index, item)) = next else {
            break;
        };

        let task_pipeline = pipeline.clone();
        let task_item = item.clone();
        let handle = tokio::spawn(async move {
            let outcome = task_pipeline.run(&task_item, &mut sessions).await;
            (outcome, sessions)
        });

        let outcome = match handle.await {
            Ok((outcome, returned)) => {
                sessions = returned;
                outcome
            }
            Err(e) => {
                sessions = Sessions::new();
                let message = panic_message(e);
                error!(worker = id, object = %item.object, "{}", message);
                Outcome::failed(item.object, message)
            }
        };

        if results.send((index, outcome)).is_err() {
            break;
        }
    }

    debug!(worker = id, "Worker finished");
}

fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned());
            match detail {
                Some(detail) => format!("task panicked: {}", detail),
                None => "task panicked".to_string(),
            }
        }
        Err(error) => format!("task failed: {}", error),
    }
}

/// Resolves once cancellation is requested; never if the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
