//! Ordered background write queue
//!
//! Every save is a job handed to a single writer task. Jobs complete in the
//! order they were queued, so a later save of the same file always wins.
//! Each job hands back a [`SaveTicket`]; dropping the ticket is the
//! fire-and-forget path, awaiting it reports the outcome.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Errors reported for a failed write
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to serialize {path}: {message}")]
    Serialize { path: PathBuf, message: String },

    #[error("write queue is closed")]
    Closed,
}

enum Job {
    Write {
        path: PathBuf,
        contents: Vec<u8>,
        done: oneshot::Sender<Result<(), PersistError>>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the writer task; cheap to clone
#[derive(Clone)]
pub struct PersistQueue {
    jobs: mpsc::UnboundedSender<Job>,
}

impl PersistQueue {
    /// Spawn the writer task on the current runtime
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (jobs, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(rx));
        (Self { jobs }, handle)
    }

    /// Queue `contents` to replace the file at `path`
    pub fn write(&self, path: &Path, contents: Vec<u8>) -> SaveTicket {
        let (done, rx) = oneshot::channel();
        let job = Job::Write {
            path: path.to_owned(),
            contents,
            done,
        };
        if self.jobs.send(job).is_err() {
            warn!(path = %path.display(), "write queue closed, save dropped");
        }
        SaveTicket { rx }
    }

    /// Serialize `value` as indented JSON and queue it for `path`
    pub fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> SaveTicket {
        match serde_json::to_vec_pretty(value) {
            Ok(contents) => self.write(path, contents),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to serialize document");
                SaveTicket::failed(PersistError::Serialize {
                    path: path.to_owned(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Wait until every job queued before this call has finished
    pub async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        if self.jobs.send(Job::Flush { done }).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Completion of one queued write
#[must_use = "drop the ticket explicitly to ignore the outcome"]
pub struct SaveTicket {
    rx: oneshot::Receiver<Result<(), PersistError>>,
}

impl SaveTicket {
    fn failed(error: PersistError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { rx }
    }

    /// Wait for the write to finish
    pub async fn wait(self) -> Result<(), PersistError> {
        self.rx.await.unwrap_or(Err(PersistError::Closed))
    }

    /// Fire and forget; failures are still logged by the writer
    pub fn detach(self) {}
}

async fn run_writer(mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Write { path, contents, done } => {
                let result = replace_file(&path, &contents).await;
                match &result {
                    Ok(()) => debug!(path = %path.display(), bytes = contents.len(), "document saved"),
                    Err(e) => warn!(error = %e, "save failed"),
                }
                let _ = done.send(result);
            }
            Job::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
    debug!("write queue drained");
}

/// Write to a sibling temp file, then rename over the target
async fn replace_file(path: &Path, contents: &[u8]) -> Result<(), PersistError> {
    let io_err = |e: std::io::Error| PersistError::Io {
        path: path.to_owned(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
