//! Entity resolution callbacks for XML parsers.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use log::warn;
use url::Url;

use crate::{
    catalog::{
        Catalog,
        http::{DEFAULT_HTTP_TIMEOUT, fetch},
        resolve_reference, to_url,
    },
    error::XMLError,
};

/// A resolved external resource.
pub struct InputSource {
    system_id: Option<Box<str>>,
    public_id: Option<Box<str>>,
    source: Box<dyn Read + Send>,
}

impl InputSource {
    pub fn from_reader(reader: impl Read + Send + 'static, system_id: Option<&str>) -> Self {
        Self {
            system_id: system_id.map(Into::into),
            public_id: None,
            source: Box::new(reader),
        }
    }

    /// Open a local file. Its path becomes the system identifier.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, XMLError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self::from_reader(file, Some(&path.to_string_lossy())))
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    pub fn set_public_id(&mut self, public_id: Option<&str>) {
        self.public_id = public_id.map(Into::into);
    }
}

impl Read for InputSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.source.read(buf)
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSource")
            .field("system_id", &self.system_id)
            .field("public_id", &self.public_id)
            .finish_non_exhaustive()
    }
}

/// Resolution callbacks used while reading a document and its DTD.
///
/// `Ok(None)` means the resource could not be located. `Err` is reserved for
/// resources that were located but could not be opened.
///
/// # Reference
/// [`EntityResolver2` interface in Java SAX API](https://docs.oracle.com/javase/jp/21/docs/api/java.xml/org/xml/sax/ext/EntityResolver2.html)
pub trait EntityResolver {
    /// Supply an external subset for a document that declares none.
    fn get_external_subset(
        &mut self,
        name: &str,
        base_uri: Option<&str>,
    ) -> Result<Option<InputSource>, XMLError> {
        let _ = (name, base_uri);
        Ok(None)
    }

    /// `name` is the entity name, or `[dtd]` for the external subset.
    fn resolve_entity(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        base_uri: Option<&str>,
        system_id: &str,
    ) -> Result<Option<InputSource>, XMLError>;

    fn resolve_public_system(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<Option<InputSource>, XMLError> {
        match system_id {
            Some(system_id) => self.resolve_entity("", public_id, None, system_id),
            None => Ok(None),
        }
    }
}

/// Resolves system identifiers to local files only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResolver;

impl EntityResolver for FileResolver {
    fn resolve_entity(
        &mut self,
        _name: &str,
        public_id: Option<&str>,
        base_uri: Option<&str>,
        system_id: &str,
    ) -> Result<Option<InputSource>, XMLError> {
        let base = base_uri.and_then(to_url);
        let Some(path) = resolve_reference(base.as_ref(), system_id)
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok())
            .filter(|path| path.is_file())
        else {
            return Ok(None);
        };
        let mut source = InputSource::from_file(path)?;
        source.set_public_id(public_id);
        Ok(Some(source))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolverOption {
    /// Retrieve HTTP(S) resources that no catalog entry covers.
    NetworkAccess = 0,
    /// Look for system identifiers next to the document being read.
    DocumentParentLookup = 1,
    /// Fall back to system table targets whose path ends with the system identifier.
    SuffixMatch = 2,
}

impl std::ops::BitOr<Self> for ResolverOption {
    type Output = ResolverConfig;

    fn bitor(self, rhs: Self) -> Self::Output {
        ResolverConfig::empty() | self | rhs
    }
}

impl std::ops::BitOr<ResolverConfig> for ResolverOption {
    type Output = ResolverConfig;

    fn bitor(self, rhs: ResolverConfig) -> Self::Output {
        rhs | self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    flags: u64,
    http_timeout: Duration,
}

impl ResolverConfig {
    /// Every option disabled.
    pub fn empty() -> Self {
        Self {
            flags: 0,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn is_enable(&self, option: ResolverOption) -> bool {
        self.flags & (1 << option as i32) != 0
    }

    pub fn set_option(&mut self, option: ResolverOption, flag: bool) {
        if flag {
            self.flags |= 1 << option as i32;
        } else {
            self.flags &= !(1 << option as i32);
        }
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverOption::NetworkAccess
            | ResolverOption::DocumentParentLookup
            | ResolverOption::SuffixMatch
    }
}

impl std::ops::BitOr<Self> for ResolverConfig {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            flags: self.flags | rhs.flags,
            http_timeout: self.http_timeout,
        }
    }
}

impl std::ops::BitOr<ResolverOption> for ResolverConfig {
    type Output = Self;

    fn bitor(mut self, rhs: ResolverOption) -> Self::Output {
        self |= rhs;
        self
    }
}

impl std::ops::BitOrAssign<ResolverOption> for ResolverConfig {
    fn bitor_assign(&mut self, rhs: ResolverOption) {
        self.flags |= 1 << rhs as i32;
    }
}

/// Resolves entities through a [`Catalog`].
///
/// [`resolve_entity`](EntityResolver::resolve_entity) tries, in order:
/// 1. the public table (a DTD found this way gets its entities indexed)
/// 2. the system table and the document-relative lookups of [`Catalog::match_system_in`]
/// 3. the system identifier itself, resolved against the base URI; HTTP(S) resources
///    are retrieved if [`ResolverOption::NetworkAccess`] is enabled
/// 4. the entities indexed from previously resolved DTDs, by public then system identifier
/// 5. a suffix match over the system table, if [`ResolverOption::SuffixMatch`] is enabled
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    catalog: Arc<Catalog>,
    config: ResolverConfig,
    document_parent: Option<PathBuf>,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_config(catalog, ResolverConfig::default())
    }

    pub fn with_config(catalog: Arc<Catalog>, config: ResolverConfig) -> Self {
        Self {
            catalog,
            config,
            document_parent: None,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Record the directory of the document being read.
    pub fn set_document_parent(&mut self, dir: impl Into<PathBuf>) {
        self.document_parent = Some(dir.into());
    }

    pub fn document_parent(&self) -> Option<&Path> {
        self.document_parent.as_deref()
    }

    fn lookup_parent(&self) -> Option<&Path> {
        self.document_parent
            .as_deref()
            .filter(|_| self.config.is_enable(ResolverOption::DocumentParentLookup))
    }

    fn match_public(&self, public_id: Option<&str>) -> Option<PathBuf> {
        let public_id = public_id?;
        let path = self.catalog.match_public(public_id)?;
        if path.extension().is_some_and(|ext| ext == "dtd") {
            self.catalog.parse_dtd(public_id);
        }
        Some(path.to_path_buf())
    }

    /// Treat `system_id` as a URI of its own.
    fn resolve_directly(
        &self,
        base_uri: Option<&str>,
        system_id: &str,
    ) -> Option<InputSource> {
        let base = base_uri.and_then(to_url).or_else(|| {
            self.lookup_parent()
                .and_then(|parent| Url::from_directory_path(parent).ok())
        });
        let url = resolve_reference(base.as_ref(), system_id)?;
        match url.scheme() {
            "file" => url
                .to_file_path()
                .ok()
                .and_then(|path| InputSource::from_file(path).ok()),
            "http" | "https" if self.config.is_enable(ResolverOption::NetworkAccess) => {
                fetch(&url, self.config.http_timeout())
                    .inspect_err(|err| warn!("{err}"))
                    .ok()
            }
            _ => None,
        }
    }
}

impl EntityResolver for CatalogResolver {
    fn resolve_entity(
        &mut self,
        _name: &str,
        public_id: Option<&str>,
        base_uri: Option<&str>,
        system_id: &str,
    ) -> Result<Option<InputSource>, XMLError> {
        let located = self
            .match_public(public_id)
            .or_else(|| {
                self.catalog
                    .match_system_in(base_uri, system_id, self.lookup_parent())
            });
        if let Some(path) = located {
            return open(path, public_id).map(Some);
        }

        if let Some(mut source) = self.resolve_directly(base_uri, system_id) {
            source.set_public_id(public_id);
            return Ok(Some(source));
        }

        let indexed = public_id
            .and_then(|public_id| self.catalog.dtd_public_entity(public_id))
            .or_else(|| self.catalog.dtd_system_entity(system_id))
            .or_else(|| {
                self.config
                    .is_enable(ResolverOption::SuffixMatch)
                    .then(|| self.catalog.match_suffix(system_id))
                    .flatten()
                    .map(Path::to_path_buf)
            });
        indexed.map(|path| open(path, public_id)).transpose()
    }

    fn resolve_public_system(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<Option<InputSource>, XMLError> {
        self.match_public(public_id)
            .or_else(|| {
                system_id.and_then(|system_id| {
                    self.catalog
                        .match_system_in(None, system_id, self.lookup_parent())
                })
            })
            .map(|path| open(path, public_id))
            .transpose()
    }
}

fn open(path: PathBuf, public_id: Option<&str>) -> Result<InputSource, XMLError> {
    let mut source = InputSource::from_file(path)?;
    source.set_public_id(public_id);
    Ok(source)
}
