//! Persisted chrome cache: a single global slot holding [`TemplateData`].
//!
//! Both implementations refuse to store the skeleton sentinel and report a
//! stored sentinel as absent, so a reader never mistakes "not loaded" for
//! real chrome.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::model::TemplateData;

/// File name of the persisted slot.
pub const CACHE_FILE: &str = "template_data.json";

/// Storage for the last successfully fetched chrome. Last write wins.
pub trait TemplateCache: Send + Sync {
    /// Read the slot. A skeleton entry reads as `None`.
    fn load(&self) -> Result<Option<TemplateData>, String>;

    /// Overwrite the slot. Saving the skeleton is rejected.
    fn save(&self, data: &TemplateData) -> Result<(), String>;

    /// Remove the slot. Clearing an empty slot is not an error.
    fn clear(&self) -> Result<(), String>;
}

fn reject_skeleton(data: &TemplateData) -> Result<(), String> {
    if data.is_skeleton() {
        Err("refusing to persist the skeleton template".to_string())
    } else {
        Ok(())
    }
}

// ── File ──────────────────────────────────────────────────────────

/// JSON file under a directory, written atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct FileTemplateCache {
    dir: PathBuf,
}

impl FileTemplateCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateCache for FileTemplateCache {
    fn load(&self) -> Result<Option<TemplateData>, String> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read template cache: {e}"))?;
        let data: TemplateData = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse template cache: {e}"))?;
        if data.is_skeleton() {
            warn!("Ignoring skeleton template in {}", path.display());
            return Ok(None);
        }
        Ok(Some(data))
    }

    fn save(&self, data: &TemplateData) -> Result<(), String> {
        reject_skeleton(data)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Failed to create cache dir: {e}"))?;

        let final_path = self.path();
        let tmp_path = self.dir.join(format!(".{CACHE_FILE}.tmp"));

        let json = serde_json::to_string_pretty(data)
            .map_err(|e| format!("Failed to serialize template: {e}"))?;
        std::fs::write(&tmp_path, json)
            .map_err(|e| format!("Failed to write temp template cache: {e}"))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| format!("Failed to rename template cache: {e}"))?;

        debug!("Saved template cache to {}", final_path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("Failed to remove template cache: {e}")),
        }
    }
}

// ── Memory ────────────────────────────────────────────────────────

/// In-process slot for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryTemplateCache {
    slot: Mutex<Option<TemplateData>>,
}

impl MemoryTemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an entry already present (as if persisted by an earlier run).
    pub fn with_entry(data: TemplateData) -> Self {
        Self {
            slot: Mutex::new(Some(data)),
        }
    }
}

impl TemplateCache for MemoryTemplateCache {
    fn load(&self) -> Result<Option<TemplateData>, String> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slot.as_ref().filter(|d| !d.is_skeleton()).cloned())
    }

    fn save(&self, data: &TemplateData) -> Result<(), String> {
        reject_skeleton(data)?;
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TenantInfo;

    fn tenant_template() -> TemplateData {
        TemplateData {
            tenant: TenantInfo {
                name: "Agrovid".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn file_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTemplateCache::new(dir.path().join("nested"));
        assert_eq!(cache.load().unwrap(), None);

        cache.save(&tenant_template()).unwrap();
        assert_eq!(cache.load().unwrap(), Some(tenant_template()));

        cache.clear().unwrap();
        assert_eq!(cache.load().unwrap(), None);
        // Clearing twice is fine.
        cache.clear().unwrap();
    }

    #[test]
    fn file_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTemplateCache::new(dir.path());
        cache.save(&tenant_template()).unwrap();
        assert!(cache.path().exists());
        assert!(!dir.path().join(".template_data.json.tmp").exists());
    }

    #[test]
    fn file_refuses_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTemplateCache::new(dir.path());
        assert!(cache.save(&TemplateData::skeleton()).is_err());
        assert!(!cache.path().exists());
    }

    #[test]
    fn file_treats_stored_skeleton_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTemplateCache::new(dir.path());
        let json = serde_json::to_string(&TemplateData::skeleton()).unwrap();
        std::fs::write(cache.path(), json).unwrap();
        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn file_corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTemplateCache::new(dir.path());
        std::fs::write(cache.path(), "{not json").unwrap();
        assert!(cache.load().is_err());
    }

    #[test]
    fn memory_slot() {
        let cache = MemoryTemplateCache::new();
        assert!(cache.save(&TemplateData::skeleton()).is_err());
        assert_eq!(cache.load().unwrap(), None);
        cache.save(&tenant_template()).unwrap();
        assert_eq!(cache.load().unwrap(), Some(tenant_template()));
        cache.clear().unwrap();
        assert_eq!(cache.load().unwrap(), None);

        let seeded = MemoryTemplateCache::with_entry(TemplateData::skeleton());
        assert_eq!(seeded.load().unwrap(), None);
    }
}
