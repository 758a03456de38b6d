//! Append-only log of accepted write commands.
//!
//! Each record is the RESP encoding of the command array exactly as the
//! client sent it; the file is nothing but those records back to back.
//! Every append is synced before it returns, and a background task syncs
//! once more every second.

use crate::error::{RedlogError, RedlogResult};
use crate::resp::{RespReader, RespValue};
use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// How often the background task forces the log to disk.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

pub struct Aof {
    path: PathBuf,
    file: Mutex<File>,
}

impl Aof {
    /// Open or create the log. The parent directory must already exist.
    pub async fn open(path: impl AsRef<Path>) -> RedlogResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(RedlogError::Aof)?;
        Ok(Aof {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one command record and sync it to stable storage.
    pub async fn append(&self, record: &RespValue) -> RedlogResult<()> {
        let bytes = record.serialize();
        let mut file = self.file.lock().await;
        file.write_all(&bytes).await.map_err(RedlogError::Aof)?;
        // A failed write only surfaces once the file is flushed.
        file.flush().await.map_err(RedlogError::Aof)?;
        file.sync_data().await.map_err(RedlogError::Aof)
    }

    /// Force everything written so far to stable storage.
    pub async fn flush(&self) -> RedlogResult<()> {
        let file = self.file.lock().await;
        file.sync_data().await.map_err(RedlogError::Aof)
    }

    /// Feed every record, oldest first, to `apply`. Returns how many were
    /// replayed.
    ///
    /// Stops at a clean end of file. A truncated or undecodable record, or one
    /// that isn't a non-empty array, aborts the replay with an error.
    pub async fn replay<F, Fut>(&self, mut apply: F) -> RedlogResult<usize>
    where
        F: FnMut(Vec<RespValue>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(0)).await.map_err(RedlogError::Aof)?;

        let mut reader = RespReader::new(&mut *file);
        let mut count = 0usize;

        while let Some(value) = reader.read_value().await? {
            let items = match value {
                RespValue::Array(Some(items)) if !items.is_empty() => items,
                other => {
                    return Err(RedlogError::CorruptLog(format!(
                        "record {} is not a command array: {other:?}",
                        count + 1
                    )));
                }
            };
            apply(items).await;
            count += 1;
        }

        debug!("Replayed {count} records from {}", self.path.display());
        Ok(count)
    }
}

pub type SharedAof = Arc<Aof>;

/// Background task that syncs the log once per `FLUSH_INTERVAL`.
pub async fn aof_flush_loop(aof: SharedAof) {
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = aof.flush().await {
            error!("Periodic flush of {} failed: {e}", aof.path().display());
        }
    }
}
