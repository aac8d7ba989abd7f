//! Durable record of the job this client is watching.
//!
//! Storage access goes through [`PersistentJobHandle`], which owns the
//! fallback policy: if the backend fails, the failure is logged and the
//! handle behaves as if no job were tracked. Callers never see an error.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Storage key of the tracked job id.
pub const HANDLE_KEY: &str = "rag_current_job_id";

/// Key/value storage the handle is persisted in.
pub trait HandleBackend: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove a key. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Result of a handle mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Stored,
    Cleared,
    /// The backend failed; the handle state is unknown.
    Unavailable(String),
}

impl HandleOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

/// The persisted job id, exclusively owned by the monitor.
#[derive(Clone)]
pub struct PersistentJobHandle {
    backend: Arc<dyn HandleBackend>,
}

impl PersistentJobHandle {
    pub fn new(backend: Arc<dyn HandleBackend>) -> Self {
        Self { backend }
    }

    /// Handle stored in files under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileBackend::new(dir)))
    }

    /// Handle that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()))
    }

    /// The tracked job id, if any.
    pub fn get(&self) -> Option<String> {
        match self.backend.read(HANDLE_KEY) {
            Ok(value) => value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "Job handle unreadable, treating as no tracked job");
                None
            }
        }
    }

    pub fn set(&self, job_id: &str) -> HandleOutcome {
        match self.backend.write(HANDLE_KEY, job_id) {
            Ok(()) => {
                debug!(job_id, "Job handle stored");
                HandleOutcome::Stored
            }
            Err(e) => {
                warn!(job_id, error = %e, "Failed to persist job handle");
                HandleOutcome::Unavailable(e.to_string())
            }
        }
    }

    pub fn clear(&self) -> HandleOutcome {
        match self.backend.remove(HANDLE_KEY) {
            Ok(()) => {
                debug!("Job handle cleared");
                HandleOutcome::Cleared
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear job handle");
                HandleOutcome::Unavailable(e.to_string())
            }
        }
    }
}

/// One file per key inside a directory, holding the raw value.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl HandleBackend for FileBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        // Write beside the target and rename so readers never see a partial id
        let tmp = self.dir.join(format!(".{key}.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, self.path(key))
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    fn values(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| io::Error::other("memory handle store poisoned"))
    }
}

impl HandleBackend for MemoryBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct BrokenBackend;

    impl HandleBackend for BrokenBackend {
        fn read(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn write(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn remove(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn test_file_handle_lifecycle() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("state");
        let handle = PersistentJobHandle::in_dir(&dir);

        assert!(handle.get().is_none());
        assert_eq!(handle.set("j1"), HandleOutcome::Stored);
        assert_eq!(handle.get().as_deref(), Some("j1"));

        // Stored as the raw id under the fixed key
        let raw = std::fs::read_to_string(dir.join(HANDLE_KEY)).unwrap();
        assert_eq!(raw, "j1");

        assert_eq!(handle.clear(), HandleOutcome::Cleared);
        assert!(handle.get().is_none());
        assert!(!dir.join(HANDLE_KEY).exists());
    }

    #[test]
    fn test_handle_survives_new_instance() {
        let temp = tempdir().unwrap();
        PersistentJobHandle::in_dir(temp.path()).set("job-42");

        let reopened = PersistentJobHandle::in_dir(temp.path());
        assert_eq!(reopened.get().as_deref(), Some("job-42"));
    }

    #[test]
    fn test_clear_without_value_succeeds() {
        let temp = tempdir().unwrap();
        let handle = PersistentJobHandle::in_dir(temp.path());
        assert_eq!(handle.clear(), HandleOutcome::Cleared);
    }

    #[test]
    fn test_blank_value_means_no_job() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join(HANDLE_KEY), "  \n").unwrap();

        let handle = PersistentJobHandle::in_dir(temp.path());
        assert!(handle.get().is_none());
    }

    #[test]
    fn test_broken_backend_falls_back() {
        let handle = PersistentJobHandle::new(Arc::new(BrokenBackend));

        assert!(handle.get().is_none());
        assert!(!handle.set("j1").is_ok());
        assert!(matches!(handle.clear(), HandleOutcome::Unavailable(_)));
    }

    #[test]
    fn test_memory_handle() {
        let handle = PersistentJobHandle::in_memory();
        handle.set("j2");
        assert_eq!(handle.get().as_deref(), Some("j2"));
        handle.clear();
        assert!(handle.get().is_none());
    }
}
