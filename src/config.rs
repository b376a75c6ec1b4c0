use crate::error::RunError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest population a single run will accept.
pub const MAX_POPULATION: usize = 9999;

/// Prefix of every file written when saving is enabled.
pub const SAVE_PREFIX: &str = "file";

pub const DEFAULT_USER_AGENT: &str = concat!("req/", env!("CARGO_PKG_VERSION"));

/// Everything a run needs. Built once before any worker starts and only read
/// afterwards, so workers borrow it without synchronization.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: String,
    pub population: usize,
    pub save_dir: Option<PathBuf>, // Some(dir) only when saving is enabled
    pub reference: Option<PathBuf>,
    pub stack_size: Option<usize>, // bytes, per worker thread
    pub max_open_files: Option<u64>,
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl RunConfig {
    pub fn new(url: impl Into<String>, population: usize) -> Self {
        Self {
            url: url.into(),
            population,
            save_dir: None,
            reference: None,
            stack_size: None,
            max_open_files: None,
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    pub fn with_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.population < 1 || self.population > MAX_POPULATION {
            return Err(RunError::InvalidPopulation {
                requested: self.population,
                max: MAX_POPULATION,
            });
        }
        Ok(())
    }

    /// Destination file for unit `index`, if saving is enabled.
    pub fn save_path(&self, index: usize) -> Option<PathBuf> {
        self.save_dir
            .as_deref()
            .map(|dir| save_path_in(dir, std::process::id(), index))
    }
}

/// `<dir>/file-<pid>-<index>`: unique per unit, and per process so concurrent
/// runs sharing a directory do not clobber each other.
pub fn save_path_in(dir: &Path, pid: u32, index: usize) -> PathBuf {
    dir.join(format!("{}-{}-{:04}", SAVE_PREFIX, pid, index))
}
