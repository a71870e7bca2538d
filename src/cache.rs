//! Parse-once template cache keyed by file path.
//!
//! The cache sits above [`parse`] and [`expand`](crate::render::expand); the
//! pure functions never consult it. A process-wide instance is available via
//! [`TemplateCache::global`]: it starts empty, fills on demand, and is emptied
//! only by an explicit [`TemplateCache::clear`].

use crate::render::{Error, Result, Template, parse};
use log::{debug, trace};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<PathBuf, Arc<Template>>>,
}

static GLOBAL: OnceLock<TemplateCache> = OnceLock::new();

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache, created empty on first access.
    pub fn global() -> &'static TemplateCache {
        GLOBAL.get_or_init(TemplateCache::new)
    }

    /// Return the cached template for `path`, reading and parsing it on a miss.
    ///
    /// Only successfully parsed templates are cached.
    pub fn load(&self, path: &Path) -> Result<Arc<Template>> {
        if let Some(hit) = self.get(path) {
            trace!("template cache hit: {}", path.display());
            return Ok(hit);
        }

        let src = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = Arc::new(parse(&src)?);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race; keep whichever landed first.
        let entry = entries
            .entry(path.to_path_buf())
            .or_insert_with(|| parsed.clone());
        debug!("cached template {}", path.display());
        Ok(Arc::clone(entry))
    }

    /// Parse `src` and cache it under `key`, replacing any previous entry.
    pub fn insert(&self, key: impl Into<PathBuf>, src: &str) -> Result<Arc<Template>> {
        let parsed = Arc::new(parse(src)?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Template>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Drop one entry so the next [`load`](Self::load) re-reads the file.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
