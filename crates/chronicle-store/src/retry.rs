//! Transport-level retry for transient store failures

use crate::RetryConfig;
use chronicle_domain::{AccessMode, GraphStore, Params, RecordSet, Statement, TransientError, TxOutcome};

/// Wraps a [`GraphStore`] and retries transient failures with exponential backoff
///
/// Logical failures (bad parameters, constraint violations) are returned on
/// the first attempt. Transactions are rolled back on failure, so retrying
/// them replays the whole unit.
pub struct RetryingStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: GraphStore> RetryingStore<S> {
    /// Wrap a store with the given retry policy
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn with_retry<T>(
        &self,
        operation: &str,
        mut attempt_fn: impl FnMut() -> Result<T, S::Error>,
    ) -> Result<T, S::Error> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt_fn() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempts < self.config.max_attempts => {
                    let delay = self.config.delay_for(attempts);
                    tracing::warn!(
                        "Transient store error during {} (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        attempts,
                        self.config.max_attempts,
                        delay,
                        e
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: GraphStore> GraphStore for RetryingStore<S> {
    type Error = S::Error;

    fn run(
        &self,
        query: &str,
        params: Params,
        mode: AccessMode,
        org_id: Option<&str>,
    ) -> Result<RecordSet, Self::Error> {
        self.with_retry("run", || self.inner.run(query, params.clone(), mode, org_id))
    }

    fn run_in_transaction(
        &self,
        statements: Vec<Statement>,
        org_id: Option<&str>,
    ) -> Result<TxOutcome, Self::Error> {
        self.with_retry("transaction", || {
            self.inner.run_in_transaction(statements.clone(), org_id)
        })
    }
}
