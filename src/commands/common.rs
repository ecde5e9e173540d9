//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`, plus the input-location
//! resolution both commands rely on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Args;

use varsum_lib::store::{FsStore, HttpStore, ObjectStore};
use varsum_lib::validation::{validate_compression_level, validate_file_exists};

/// Location of the object store holding summary objects and search state.
#[derive(Debug, Clone, Args)]
pub struct StoreOptions {
    /// Directory the summary store is rooted at (created if absent)
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
}

impl StoreOptions {
    /// Opens the store, creating its root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(&self) -> anyhow::Result<Arc<dyn ObjectStore>> {
        let store = FsStore::new(&self.store)
            .with_context(|| format!("opening store at {}", self.store.display()))?;
        Ok(Arc::new(store))
    }
}

/// Common threading options for parallel work-unit processing.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Worker threads processing work units in parallel
    #[arg(short = 't', long = "threads", default_value_t = 4)]
    pub threads: usize,
}

impl ThreadingOptions {
    /// Creates threading options with N threads.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }

    /// Returns the worker thread count, never less than one.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.threads.max(1)
    }

    /// Builds a dedicated rayon pool sized to these options.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be constructed.
    pub fn build_pool(&self) -> anyhow::Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .thread_name(|i| format!("worker-{i}"))
            .build()
            .context("building worker thread pool")
    }

    /// Returns a log message describing the threading configuration.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self.num_threads() {
            1 => "Single worker thread".to_string(),
            n => format!("Using {n} worker threads"),
        }
    }
}

/// Options for summary object compression.
#[derive(Debug, Clone, Args)]
pub struct CompressionOptions {
    /// BGZF compression level for summary objects (1-12)
    #[arg(long = "compression-level", default_value_t = 6)]
    pub compression_level: u32,
}

impl CompressionOptions {
    /// Validates the compression level.
    ///
    /// # Errors
    ///
    /// Returns an error if the level is outside 1-12.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_compression_level(self.compression_level, "compression-level")?;
        Ok(())
    }
}

/// Resolve an input location into a store and an object key.
///
/// `http(s)://` locations split at the last path segment, so the base URL
/// becomes the store and the file name the key. Anything else is treated
/// as a filesystem path, whose parent directory becomes the store root.
///
/// # Errors
///
/// Returns an error if the location has no file component or, for local
/// paths, the file does not exist.
pub fn open_location(location: &str) -> anyhow::Result<(Arc<dyn ObjectStore>, String)> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let Some((base, key)) = location.rsplit_once('/') else {
            bail!("input URL '{location}' has no path component");
        };
        if key.is_empty() || !base.contains("://") {
            bail!("input URL '{location}' has no file component");
        }
        return Ok((Arc::new(HttpStore::new(base)?), key.to_string()));
    }

    let path = Path::new(location);
    validate_file_exists(path, "Input VCF")?;
    let Some(name) = path.file_name() else {
        bail!("input path '{location}' has no file name");
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok((Arc::new(FsStore::new(parent)?), name.to_string_lossy().into_owned()))
}
