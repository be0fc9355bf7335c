use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;
use once_cell::sync::{Lazy, OnceCell};

use crate::error::XMLError;

use super::Catalog;

/// Directory that relative catalog paths are resolved against.
/// The current working directory is used if it is not set.
pub const DTDCAT_HOME: &str = "DTDCAT_HOME";

static GLOBAL: Lazy<CatalogBuilder> = Lazy::new(CatalogBuilder::new);

type CatalogCell = Arc<OnceCell<Arc<Catalog>>>;

/// A cache of parsed catalogs, keyed by canonical file path.
///
/// Each catalog is read once, however many threads ask for it at the same time.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalogs: Mutex<HashMap<PathBuf, CatalogCell>>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide builder.
    pub fn global() -> &'static CatalogBuilder {
        &GLOBAL
    }

    /// Return the catalog at `path`, reading it on first use.
    ///
    /// Relative paths are resolved against [`DTDCAT_HOME`].
    pub fn catalog(&self, path: impl AsRef<Path>) -> Result<Arc<Catalog>, XMLError> {
        self.catalog_in_chain(path.as_ref(), &[])
    }

    /// `chain` lists the catalogs currently being read through `nextCatalog`.
    pub(crate) fn catalog_in_chain(
        &self,
        path: &Path,
        chain: &[PathBuf],
    ) -> Result<Arc<Catalog>, XMLError> {
        let path = fs::canonicalize(absolute_catalog_path(path)?)?;
        if chain.contains(&path) {
            return Err(XMLError::CircularReference { path });
        }

        let cell = self.lock().entry(path.clone()).or_default().clone();
        if let Some(catalog) = cell.get() {
            debug!("catalog cache hit: '{}'", path.display());
            return Ok(catalog.clone());
        }
        cell.get_or_try_init(|| {
            debug!("reading catalog '{}'", path.display());
            let mut chain = chain.to_vec();
            chain.push(path.clone());
            Catalog::load(&path, self, &chain).map(Arc::new)
        })
        .cloned()
    }

    /// Forget every cached catalog.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of catalog files this builder knows about.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, CatalogCell>> {
        self.catalogs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn absolute_catalog_path(path: &Path) -> Result<PathBuf, XMLError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let home = match env::var_os(DTDCAT_HOME) {
        Some(home) => PathBuf::from(home),
        None => env::current_dir()?,
    };
    Ok(home.join(path))
}
