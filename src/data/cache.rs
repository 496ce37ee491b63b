//! Calibrated model cache
//!
//! One serialized model per mode, stored as `<cache_dir>/<mode>.json`. A
//! file that no longer deserializes surfaces as [`MeloError::CorruptCache`]
//! so the caller can recalibrate and overwrite it.

use std::path::{Path, PathBuf};

use crate::{MeloError, MeloNfl, Result};

/// Keyed store for calibrated models
pub trait ModelCache {
    /// Cached model for `key`, or `None` if nothing was stored
    fn get(&self, key: &str) -> Result<Option<MeloNfl>>;

    fn put(&self, key: &str, model: &MeloNfl) -> Result<()>;
}

/// JSON files in a directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        FileCache {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ModelCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<MeloNfl>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        log::debug!("Loading cached model from {}", path.display());
        let json = std::fs::read_to_string(&path)?;
        let model = serde_json::from_str(&json).map_err(|e| MeloError::CorruptCache {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(model))
    }

    fn put(&self, key: &str, model: &MeloNfl) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let json = serde_json::to_string(model)
            .map_err(|e| MeloError::Parse(format!("Failed to serialize model: {}", e)))?;
        std::fs::write(&path, json)?;
        log::debug!("Saved model to {}", path.display());
        Ok(())
    }
}
