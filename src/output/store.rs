//! Shared output store handle
//!
//! All appends for one data directory funnel through a single blocking
//! worker that owns the [`ShardWriter`], so crawl tasks never wait on disk I/O
//! inside the scheduling loop and never race on shard selection.

use crate::config::OutputConfig;
use crate::extract::Record;
use crate::output::ShardWriter;
use crate::{HarvestError, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands processed by the store worker, strictly in arrival order
enum StoreCommand {
    Append {
        line: String,
        reply: oneshot::Sender<Result<PathBuf>>,
    },
    Finalize {
        reply: oneshot::Sender<Result<Option<PathBuf>>>,
    },
}

/// Cloneable handle to one data directory's rotating shards
#[derive(Clone)]
pub struct OutputStore {
    tx: mpsc::Sender<StoreCommand>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl OutputStore {
    /// Opens the store described by the output configuration
    pub fn open(config: &OutputConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        Ok(Self::with_writer(ShardWriter::new(
            &config.data_dir,
            config.max_shard_bytes,
            config.max_daily_shards,
        )))
    }

    /// Starts a worker around an existing writer
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_writer(writer: ShardWriter) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::task::spawn_blocking(move || run_worker(writer, rx));

        Self {
            tx,
            worker: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Serializes a record and appends it to the current shard
    ///
    /// Resolves once the worker has written the record. A full day of shards
    /// surfaces here as [`HarvestError::ShardCapacity`].
    pub async fn append(&self, record: &Record) -> Result<PathBuf> {
        let line = serde_json::to_string(record)?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Append { line, reply })
            .await
            .map_err(|_| HarvestError::WorkerClosed)?;
        rx.await.map_err(|_| HarvestError::WorkerClosed)?
    }

    /// Terminates the current shard; the next append opens a fresh one
    pub async fn finalize(&self) -> Result<Option<PathBuf>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Finalize { reply })
            .await
            .map_err(|_| HarvestError::WorkerClosed)?;
        rx.await.map_err(|_| HarvestError::WorkerClosed)?
    }

    /// Finalizes the open shard and waits for the worker to drain
    ///
    /// When other clones are still alive the worker keeps serving them, so
    /// this returns right after finalizing; the worker exits with the last
    /// handle.
    pub async fn shutdown(self) -> Result<Option<PathBuf>> {
        let finalized = self.finalize().await?;

        if Arc::strong_count(&self.worker) > 1 {
            tracing::debug!("Output store still shared, leaving the worker running");
            return Ok(finalized);
        }

        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(self.tx);

        if let Some(handle) = handle {
            match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Output worker panicked: {}", e),
                Err(_) => tracing::warn!("Output worker still has live handles after shutdown"),
            }
        }

        Ok(finalized)
    }
}

fn run_worker(mut writer: ShardWriter, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            StoreCommand::Append { line, reply } => {
                let result = writer.append(&line);
                if let Err(e) = &result {
                    tracing::error!("Failed to append record: {}", e);
                }
                let _ = reply.send(result);
            }
            StoreCommand::Finalize { reply } => {
                let _ = reply.send(writer.finalize());
            }
        }
    }

    if let Err(e) = writer.finalize() {
        tracing::error!("Failed to finalize shard at shutdown: {}", e);
    }
}
