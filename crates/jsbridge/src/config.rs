//! Configuration for platform setup and engine instances.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::IcuData;
use crate::error::{Error, Result};

/// Environment variable naming the character-set data file
pub const ICU_DATA_ENV: &str = "JSBRIDGE_ICU_DATA_PATH";

/// Options for the one-time platform initialization
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Character-set data file. `None` falls back to [`ICU_DATA_ENV`], then
    /// to the backend's default discovery.
    pub icu_data_path: Option<PathBuf>,
}

impl InitOptions {
    /// Options with an explicit data file
    pub fn with_icu_data(path: impl Into<PathBuf>) -> Self {
        Self {
            icu_data_path: Some(path.into()),
        }
    }

    /// Path actually used: explicit, then runtime env, then build-time env.
    pub fn resolved_icu_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.icu_data_path {
            if !path.as_os_str().is_empty() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var(ICU_DATA_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        if let Some(path) = option_env!("JSBRIDGE_ICU_DATA_PATH") {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        None
    }

    /// Load the character-set data the backend should use.
    ///
    /// The loaded bytes live for the rest of the process: the engine keeps
    /// referring to them after initialization.
    pub fn load_icu_data(&self) -> Result<IcuData> {
        match self.resolved_icu_path() {
            Some(path) => load_file(&path).map(IcuData::Bytes),
            None => Ok(IcuData::Default),
        }
    }
}

fn load_file(path: &Path) -> Result<&'static [u8]> {
    let bytes = fs::read(path).map_err(|e| {
        Error::Init(format!(
            "failed to load character-set data from {}: {}",
            path.display(),
            e
        ))
    })?;
    if bytes.is_empty() {
        return Err(Error::Init(format!(
            "failed to load character-set data from {}: file is empty",
            path.display()
        )));
    }
    Ok(Box::leak(bytes.into_boxed_slice()))
}

/// Per-instance heap configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceOptions {
    /// Initial heap size in bytes
    pub initial_heap_bytes: Option<usize>,
    /// Hard heap limit in bytes
    pub max_heap_bytes: Option<usize>,
}
