//! JSON file persistence for user and group records.
//!
//! [`JsonFileStore`] keeps its working set in a [`MemoryStore`] and writes
//! the whole snapshot back to disk on [`save`](JsonFileStore::save). Writes
//! go to a sibling `.tmp` file first and are renamed into place, so a crash
//! mid-save never leaves a truncated database behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use akane_core::{
    GroupRecord, MemoryStore, Store, StoreResult, StoreSnapshot, UserRecord, UserUpdate,
};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A [`Store`] backed by a single JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
    dirty: AtomicBool,
}

impl JsonFileStore {
    /// Opens the database at `path`.
    ///
    /// A missing file yields an empty store; the file is created on the
    /// first save. A file that exists but does not parse is an error.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => StoreSnapshot::default(),
            Ok(bytes) => serde_json::from_slice::<StoreSnapshot>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No database file yet, starting empty");
                StoreSnapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            users = snapshot.users.len(),
            groups = snapshot.groups.len(),
            "Database loaded"
        );

        Ok(Self {
            path,
            memory: MemoryStore::from_snapshot(snapshot),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory working set.
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Whether there are changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Writes the current snapshot to disk.
    pub async fn save(&self) -> StoreResult<()> {
        // Cleared before serializing so changes made during the write are
        // picked up by the next save.
        self.dirty.store(false, Ordering::Release);
        let snapshot = self.memory.snapshot();

        let result = self.write_snapshot(&snapshot).await;
        if result.is_err() {
            self.mark_dirty();
        }
        result
    }

    async fn write_snapshot(&self, snapshot: &StoreSnapshot) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            users = snapshot.users.len(),
            bytes = bytes.len(),
            "Database saved"
        );
        Ok(())
    }

    /// Saves every `every` while dirty, until `token` is cancelled.
    pub fn spawn_autosave(
        self: &Arc<Self>,
        every: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if store.is_dirty()
                            && let Err(e) = store.save().await
                        {
                            error!(error = %e, "Autosave failed");
                        }
                    }
                }
            }
            debug!("Autosave stopped");
        })
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load_user(&self, id: &str, seed: UserRecord) -> StoreResult<UserRecord> {
        if let Some(user) = self.memory.user(id) {
            return Ok(user);
        }
        let user = self.memory.load_user(id, seed).await?;
        self.mark_dirty();
        Ok(user)
    }

    async fn load_group(&self, id: &str, seed: GroupRecord) -> StoreResult<GroupRecord> {
        if let Some(group) = self.memory.group(id) {
            return Ok(group);
        }
        let group = self.memory.load_group(id, seed).await?;
        self.mark_dirty();
        Ok(group)
    }

    async fn modify_user(&self, id: &str, update: UserUpdate) -> StoreResult<()> {
        self.memory.modify_user(id, update).await?;
        self.mark_dirty();
        Ok(())
    }
}
