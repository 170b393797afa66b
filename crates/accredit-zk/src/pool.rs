//! Bounded pool for blocking backend calls.
//!
//! Each call holds a semaphore permit for as long as the blocking task runs,
//! including past a caller-side timeout, so `max_concurrent` bounds the real
//! number of toolchain processes. Only infrastructure failures are retried.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::backend::{EligibilityBackend, ProofBundle};
use crate::error::{ZkError, ZkResult};
use crate::inputs::CircuitInputs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_concurrent() -> usize {
    2
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Clone)]
pub struct ProofWorkerPool {
    backend: Arc<dyn EligibilityBackend>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
}

impl ProofWorkerPool {
    pub fn new(backend: Arc<dyn EligibilityBackend>, config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            backend,
            permits,
            config,
        }
    }

    pub fn backend(&self) -> &Arc<dyn EligibilityBackend> {
        &self.backend
    }

    pub async fn prepare(&self) -> ZkResult<()> {
        self.run("prepare", |backend| backend.prepare()).await
    }

    pub async fn prove(&self, inputs: CircuitInputs) -> ZkResult<ProofBundle> {
        let inputs = Arc::new(inputs);
        self.run("prove", move |backend| backend.prove(&inputs)).await
    }

    pub async fn verify(&self, bundle: ProofBundle) -> ZkResult<bool> {
        let bundle = Arc::new(bundle);
        self.run("verify", move |backend| backend.verify(&bundle))
            .await
    }

    async fn run<T, F>(&self, op: &'static str, call: F) -> ZkResult<T>
    where
        T: Send + 'static,
        F: Fn(&dyn EligibilityBackend) -> ZkResult<T> + Clone + Send + 'static,
    {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.run_once(op, call.clone(), timeout).await;
            match result {
                Err(e) if e.is_infrastructure() && attempt <= self.config.max_retries => {
                    tracing::warn!(op, attempt, error = %e, "eligibility backend call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                }
                Err(e) => {
                    tracing::error!(op, attempt, error = %e, "eligibility backend call failed");
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }

    async fn run_once<T, F>(&self, op: &'static str, call: F, timeout: Duration) -> ZkResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EligibilityBackend) -> ZkResult<T> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ZkError::WorkerFailed("worker pool closed".into()))?;
        let backend = self.backend.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            call(backend.as_ref())
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ZkError::WorkerFailed(join.to_string())),
            Err(_) => Err(ZkError::Timeout {
                op,
                millis: timeout.as_millis() as u64,
            }),
        }
    }
}
