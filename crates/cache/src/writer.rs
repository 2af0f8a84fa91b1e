//! Dedicated thread that persists snapshots off the async executor.
//!
//! Jobs are queued in mutation order. When several snapshots are waiting,
//! only the newest is written; every queued job is acknowledged with the
//! outcome of that write.

use crate::errors::{CacheError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

struct WriteJob {
    snapshot: Vec<u8>,
    ack: oneshot::Sender<Result<()>>,
}

/// Handle to the writer thread for one snapshot file
pub(crate) struct SnapshotWriter {
    path: PathBuf,
    jobs: Option<Sender<WriteJob>>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    pub(crate) fn spawn(path: PathBuf) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<WriteJob>();
        let thread_path = path.clone();

        let handle = std::thread::Builder::new()
            .name("taskmill-cache-writer".to_string())
            .spawn(move || run(&thread_path, rx))
            .map_err(|e| CacheError::io(&path, "spawn snapshot writer", e))?;

        Ok(Self {
            path,
            jobs: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a snapshot; the receiver resolves once it is on disk
    pub(crate) fn submit(&self, snapshot: Vec<u8>) -> oneshot::Receiver<Result<()>> {
        let (ack, done) = oneshot::channel();
        let job = WriteJob { snapshot, ack };

        let sent = match &self.jobs {
            Some(jobs) => jobs.send(job),
            None => Err(channel::SendError(job)),
        };
        if let Err(channel::SendError(job)) = sent {
            let _ = job.ack.send(Err(CacheError::WriterUnavailable {
                path: self.path.clone(),
            }));
        }
        done
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        // closing the queue lets the thread finish pending writes and exit
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(path = %self.path.display(), "cache writer thread panicked");
            }
        }
    }
}

fn run(path: &Path, jobs: Receiver<WriteJob>) {
    while let Ok(first) = jobs.recv() {
        let mut batch = vec![first];
        batch.extend(jobs.try_iter());

        let Some(latest) = batch.last() else {
            continue;
        };
        let outcome = taskmill_utils::write_atomic(path, &latest.snapshot);
        if let Err(e) = &outcome {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist cache snapshot");
        } else {
            tracing::trace!(
                path = %path.display(),
                bytes = latest.snapshot.len(),
                coalesced = batch.len(),
                "persisted cache snapshot"
            );
        }

        for job in batch {
            let result = match &outcome {
                Ok(()) => Ok(()),
                Err(e) => Err(CacheError::Write {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }),
            };
            // the caller may have stopped waiting
            let _ = job.ack.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        let writer = SnapshotWriter::spawn(path.clone()).unwrap();

        writer.submit(b"{}".to_vec()).await.unwrap().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        let writer = SnapshotWriter::spawn(path.clone()).unwrap();

        let pending: Vec<_> = (0..20)
            .map(|i| writer.submit(format!("{{\"n\": {i}}}").into_bytes()))
            .collect();
        for done in pending {
            done.await.unwrap().unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"n\": 19}");
    }

    #[tokio::test]
    async fn test_reports_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        // parent is a file, so the write cannot succeed
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let writer = SnapshotWriter::spawn(blocker.join("cache.json")).unwrap();

        let result = writer.submit(b"{}".to_vec()).await.unwrap();
        assert!(matches!(result, Err(CacheError::Write { .. })));
    }

    #[test]
    fn test_drop_flushes_pending() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        let writer = SnapshotWriter::spawn(path.clone()).unwrap();

        let _pending = writer.submit(b"[1]".to_vec());
        drop(writer);

        assert_eq!(std::fs::read(&path).unwrap(), b"[1]");
    }
}
