use async_trait::async_trait;
use parking_lot::RwLock;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::RecordStore;
use crate::error::StoreError;
use crate::models::{GenerationRecord, RecordBody};

/// Process-local store; records vanish on restart.
#[derive(Default, Clone)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Uuid, GenerationRecord>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn len(&self) -> usize {
        self.records.read().len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn persist(&self, body: &RecordBody) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.records.write().insert(id, GenerationRecord { doc_id: id, body: body.clone() });
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationRecord>, StoreError> {
        Ok(self.records.read().get(&id).cloned())
    }
}

/// Append-only JSON lines file, one record per line.
///
/// Appends run on their own task, so a caller that gives up waiting cannot
/// leave half a line behind. Lines that still fail to parse are skipped.
pub struct FileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "generated_content.jsonl";

    pub async fn open(dir: PathBuf) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(Self::FILE_NAME);
        info!("📁 Persisting generated content to {}", path.display());
        Ok(Self { path, write_lock: Arc::default() })
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn persist(&self, body: &RecordBody) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let mut line = serde_json::to_vec(&GenerationRecord { doc_id: id, body: body.clone() })?;
        line.push(b'\n');

        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let path = self.path.clone();
        let write = tokio::spawn(async move {
            let _guard = guard;
            append_line(&path, &line).await
        });
        write.await.map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationRecord>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        for (number, line) in raw.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            match serde_json::from_str::<GenerationRecord>(line) {
                Ok(record) if record.doc_id == id => return Ok(Some(record)),
                Ok(_) => {}
                Err(e) => warn!("⚠️ Skipping unreadable line {} in {}: {}", number + 1, self.path.display(), e),
            }
        }
        Ok(None)
    }
}

/// Append `line`, first terminating whatever the file currently ends with.
async fn append_line(path: &std::path::Path, line: &[u8]) -> Result<(), StoreError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await?;

    if file.metadata().await?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(std::io::SeekFrom::End(-1)).await?;
        file.read_exact(&mut last).await?;
        if last[0] != b'\n' {
            file.write_all(b"\n").await?;
        }
    }
    file.write_all(line).await?;
    file.flush().await?;
    Ok(())
}
