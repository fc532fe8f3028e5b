//! Background worker for periodic cross-layer sweeps

use crate::{CrossLayerEngine, EngineError, EngineMetrics};
use chronicle_domain::GraphStore;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::{interval, Duration};

/// Runs [`CrossLayerEngine::validate_all_cross_layer_links`] on a schedule
///
/// Every tick sweeps each organisation in `EngineConfig::org_ids`. A failed
/// sweep of one organisation is logged and does not stop the others.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use chronicle_crosslayer::{CrossLayerEngine, EngineConfig, ValidationWorker};
/// use chronicle_ledger::{LedgerConfig, ProvenanceLedger};
/// use chronicle_store::SqliteGraphStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(SqliteGraphStore::new("chronicle.db")?);
///     let ledger = ProvenanceLedger::from_config(store, LedgerConfig::from_file("ledger.toml")?);
///     let config = EngineConfig::from_file("engine.toml")?;
///     let mut worker = ValidationWorker::new(CrossLayerEngine::with_builtin_rules(ledger, config));
///
///     // Run until Ctrl+C
///     worker.run().await?;
///     Ok(())
/// }
/// ```
pub struct ValidationWorker<S> {
    engine: CrossLayerEngine<S>,
    interval: Duration,
}

impl<S: GraphStore> ValidationWorker<S> {
    /// Create a worker sweeping at the engine's configured interval
    pub fn new(engine: CrossLayerEngine<S>) -> Self {
        let interval = engine.config().sweep_interval();
        Self { engine, interval }
    }

    /// The engine being driven
    pub fn engine(&self) -> &CrossLayerEngine<S> {
        &self.engine
    }

    /// Metrics accumulated by the engine
    pub fn metrics(&self) -> &EngineMetrics {
        self.engine.metrics()
    }

    fn sweep(&mut self) -> Result<(), EngineError> {
        let org_ids = self.engine.config().org_ids.clone();
        let mut last_error = None;

        for org_id in &org_ids {
            match self.engine.validate_all_cross_layer_links(org_id) {
                Ok(results) => {
                    let found: usize = results.iter().map(|r| r.violations_found()).sum();
                    let repaired: usize = results.iter().map(|r| r.violations_repaired()).sum();
                    tracing::info!(
                        "Sweep of {} completed: {} violations, {} repaired",
                        org_id,
                        found,
                        repaired
                    );
                }
                Err(e) => {
                    tracing::error!("Sweep of {} failed: {}", org_id, e);
                    last_error = Some(e);
                }
            }
        }

        last_error.map_or(Ok(()), Err)
    }

    /// Sweep without stalling other tasks on the executor
    ///
    /// Store calls block, so on a multi-threaded runtime the sweep runs under
    /// `block_in_place`. A current-thread runtime cannot hand its worker off
    /// and sweeps inline.
    fn sweep_blocking(&mut self) -> Result<(), EngineError> {
        let multi_thread = Handle::try_current()
            .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
        if multi_thread {
            tokio::task::block_in_place(|| self.sweep())
        } else {
            self.sweep()
        }
    }

    /// Run until a shutdown signal (Ctrl+C) is received
    pub async fn run(&mut self) -> Result<(), EngineError> {
        self.engine.config().validate()?;
        let mut ticker = interval(self.interval);

        tracing::info!(
            "Validation worker started for {} organisations (interval: {:?})",
            self.engine.config().org_ids.len(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting validation sweep");
                    // Failed organisations are logged by the sweep; keep going
                    if let Err(e) = self.sweep_blocking() {
                        tracing::warn!("Validation sweep incomplete, retrying next tick: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping validation worker");
                    break;
                }
            }
        }

        tracing::info!("Validation worker stopped. Final metrics:\n{}", self.metrics().summary());
        Ok(())
    }

    /// Run a fixed number of sweeps (useful for testing)
    ///
    /// Unlike [`run`](Self::run), the first failed sweep ends the run.
    pub async fn run_cycles(&mut self, cycles: usize) -> Result<(), EngineError> {
        self.engine.config().validate()?;
        let mut ticker = interval(self.interval);

        tracing::info!(
            "Validation worker started for {} cycles (interval: {:?})",
            cycles,
            self.interval
        );

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting validation sweep {}/{}", cycle + 1, cycles);

            if let Err(e) = self.sweep_blocking() {
                tracing::error!("Sweep {}/{} failed: {}", cycle + 1, cycles, e);
                return Err(e);
            }
        }

        tracing::info!(
            "Validation worker finished {} cycles. Final metrics:\n{}",
            cycles,
            self.metrics().summary()
        );
        Ok(())
    }
}
