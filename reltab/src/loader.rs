// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Base-table loading.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt as _;
use futures::future::{self, BoxFuture, Shared};
use parking_lot::Mutex;
use reltab_core::TableData;

use crate::error::LoadError;

/// Result of loading one table.
pub type TableFuture = BoxFuture<'static, Result<Arc<TableData>, LoadError>>;

/// Source of base tables.
///
/// The evaluator calls [`TableLoader::load_table`] once per distinct table per query. Loaders
/// that back more than one query should cache by name; wrap them in a [`CachedLoader`].
pub trait TableLoader: Send + Sync {
    /// Starts loading the named table.
    fn load_table(&self, name: &str) -> TableFuture;
}

impl<L: TableLoader + ?Sized> TableLoader for Arc<L> {
    fn load_table(&self, name: &str) -> TableFuture {
        (**self).load_table(name)
    }
}

/// Where [`DirLoader`] looks for table files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directory holding one file per table.
    pub data_dir: PathBuf,
    /// File extension, without the dot.
    pub extension: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("json"),
            extension: "json".to_owned(),
        }
    }
}

impl LoaderConfig {
    /// Environment variable overriding [`LoaderConfig::data_dir`].
    pub const DATA_DIR_ENV: &'static str = "RELTAB_DATA_DIR";

    /// Default configuration, with the data directory taken from `RELTAB_DATA_DIR` if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(Self::DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }

    /// Uses `data_dir` for table files.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// File holding the named table, or `None` if the name could escape the data directory.
    pub fn table_path(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        valid.then(|| self.data_dir.join(format!("{name}.{}", self.extension)))
    }
}

/// Loads tables from JSON files in a directory, one file per table.
///
/// Each file holds the `[schema, {"rowData": [...]}]` layout. Every call reads the file again.
#[derive(Debug, Clone)]
pub struct DirLoader {
    config: LoaderConfig,
}

impl DirLoader {
    /// A loader reading files as described by `config`.
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// The loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl TableLoader for DirLoader {
    fn load_table(&self, name: &str) -> TableFuture {
        let name = name.to_owned();
        let path = self.config.table_path(&name);
        async move {
            let Some(path) = path else {
                return Err(LoadError::InvalidName(name));
            };
            tracing::info!(table = %name, path = %path.display(), "loading table");
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(LoadError::NotFound(name));
                }
                Err(e) => {
                    return Err(LoadError::Io {
                        name,
                        source: Arc::new(e),
                    });
                }
            };
            let table: TableData = serde_json::from_slice(&bytes).map_err(|e| LoadError::Parse {
                name: name.clone(),
                source: Arc::new(e),
            })?;
            tracing::debug!(table = %name, rows = table.row_count(), "table loaded");
            Ok(Arc::new(table))
        }
        .boxed()
    }
}

/// Serves tables registered in memory. Counts fetches.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    tables: Mutex<HashMap<String, Arc<TableData>>>,
    fetches: AtomicUsize,
}

impl MemoryLoader {
    /// An empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a table.
    pub fn insert(&self, name: impl Into<String>, table: impl Into<Arc<TableData>>) {
        self.tables.lock().insert(name.into(), table.into());
    }

    /// Number of [`TableLoader::load_table`] calls so far, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl TableLoader for MemoryLoader {
    fn load_table(&self, name: &str) -> TableFuture {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let result = self
            .tables
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_owned()));
        future::ready(result).boxed()
    }
}

/// Caches another loader's results by table name.
///
/// Concurrent requests for a table that is still loading share the one in-flight load. Failed
/// loads stay cached, so a failing table is not fetched again until [`CachedLoader::evict`].
pub struct CachedLoader<L> {
    inner: L,
    cache: Mutex<HashMap<String, Shared<TableFuture>>>,
}

impl<L> CachedLoader<L> {
    /// Wraps `inner`.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped loader.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Forgets the cached result for `name`. Returns `true` if there was one.
    pub fn evict(&self, name: &str) -> bool {
        self.cache.lock().remove(name).is_some()
    }

    /// Forgets every cached result.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl<L: std::fmt::Debug> std::fmt::Debug for CachedLoader<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.cache.lock().keys().cloned().collect();
        names.sort();
        f.debug_struct("CachedLoader")
            .field("inner", &self.inner)
            .field("cache", &names)
            .finish()
    }
}

impl<L: TableLoader> TableLoader for CachedLoader<L> {
    fn load_table(&self, name: &str) -> TableFuture {
        let mut cache = self.cache.lock();
        if let Some(pending) = cache.get(name) {
            tracing::debug!(table = name, "table cache hit");
            return pending.clone().boxed();
        }
        let pending = self.inner.load_table(name).shared();
        cache.insert(name.to_owned(), pending.clone());
        pending.boxed()
    }
}
