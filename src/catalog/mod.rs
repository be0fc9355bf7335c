//! Resolution of public identifiers, system identifiers and URIs to local files, based on
//! [OASIS XML Catalogs](https://www.oasis-open.org/committees/download.php/14809/xml-catalogs.html).
//!
//! Supported entries are `system`, `public`, `uri`, `rewriteSystem`, `rewriteURI` and
//! `nextCatalog`. Any element may carry `xml:base`.

mod builder;
pub(crate) mod http;
pub mod urn;

use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    fs,
    path::{Component, Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::{debug, warn};
use roxmltree::{Document, Node, ParsingOptions};
use url::Url;

pub use builder::{CatalogBuilder, DTDCAT_HOME};
pub use urn::unwrap_urn;

use crate::{error::XMLError, parse::DTDParser};

pub const XML_CATALOG_NAMESPACE: &str = "urn:oasis:names:tc:entity:xmlns:xml:catalog";
pub const XML_CATALOG_PUBLICID: &str = "-//OASIS//DTD XML Catalogs V1.1//EN";
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A `rewriteSystem` or `rewriteURI` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RewriteRule {
    prefix: Box<str>,
    replacement: Box<str>,
}

impl RewriteRule {
    pub fn new(prefix: impl Into<Box<str>>, replacement: impl Into<Box<str>>) -> Self {
        Self {
            prefix: prefix.into(),
            replacement: replacement.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Replace the prefix of `id`, or return `None` if `id` does not start with it.
    pub fn apply(&self, id: &str) -> Option<String> {
        id.strip_prefix(&*self.prefix)
            .map(|rest| format!("{}{rest}", self.replacement))
    }
}

/// Entities harvested from DTDs that were resolved through this catalog.
#[derive(Debug, Default)]
struct DtdEntityIndex {
    public: HashMap<Box<str>, PathBuf>,
    system: HashMap<Box<str>, PathBuf>,
    parsed: HashSet<PathBuf>,
}

/// One catalog file, merged with every catalog reachable through `nextCatalog`.
///
/// A mapping is only kept if its target exists when the catalog is read. On conflicts
/// the first mapping wins, and entries of this file win over those of its next catalogs.
#[derive(Debug, Default)]
pub struct Catalog {
    path: PathBuf,
    system: HashMap<Box<str>, PathBuf>,
    public: HashMap<Box<str>, PathBuf>,
    uri: HashMap<Box<str>, PathBuf>,
    dtd: HashMap<Box<str>, PathBuf>,
    system_rewrites: Vec<RewriteRule>,
    uri_rewrites: Vec<RewriteRule>,
    dtd_entities: Mutex<DtdEntityIndex>,
}

impl Catalog {
    /// Read the catalog at `path` without going through a shared [`CatalogBuilder`].
    ///
    /// Catalogs reached through `nextCatalog` are cached only for the duration of this call.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, XMLError> {
        let builder = CatalogBuilder::new();
        let path = builder::absolute_catalog_path(path.as_ref())?;
        let path = fs::canonicalize(&path)?;
        Self::load(&path, &builder, &[path.clone()])
    }

    /// `path` must be canonical. `chain` lists the catalogs being loaded, `path` included.
    pub(crate) fn load(
        path: &Path,
        builder: &CatalogBuilder,
        chain: &[PathBuf],
    ) -> Result<Self, XMLError> {
        let text = fs::read_to_string(path)?;
        let mut options = ParsingOptions::default();
        options.allow_dtd = true;
        let document =
            Document::parse_with_options(&text, options).map_err(|err| XMLError::CatalogParse {
                path: path.to_path_buf(),
                message: err.to_string().into(),
            })?;

        let mut reader = CatalogReader {
            catalog: Catalog {
                path: path.to_path_buf(),
                ..Default::default()
            },
            next_catalogs: vec![],
        };
        let dir = path.parent().unwrap_or(Path::new("/"));
        reader.visit(document.root_element(), dir)?;

        let CatalogReader {
            mut catalog,
            next_catalogs,
        } = reader;
        // merged after the whole file is read, so that local entries always win
        for next in next_catalogs {
            if !next.is_file() {
                warn!("next catalog '{}' does not exist", next.display());
                continue;
            }
            let next = builder.catalog_in_chain(&next, chain)?;
            catalog.merge(&next);
        }
        Ok(catalog)
    }

    fn merge(&mut self, next: &Catalog) {
        fn merge_table(table: &mut HashMap<Box<str>, PathBuf>, next: &HashMap<Box<str>, PathBuf>) {
            for (key, target) in next {
                table.entry(key.clone()).or_insert_with(|| target.clone());
            }
        }
        fn merge_rules(rules: &mut Vec<RewriteRule>, next: &[RewriteRule]) {
            for rule in next {
                if !rules.contains(rule) {
                    rules.push(rule.clone());
                }
            }
        }

        merge_table(&mut self.system, &next.system);
        merge_table(&mut self.public, &next.public);
        merge_table(&mut self.uri, &next.uri);
        merge_table(&mut self.dtd, &next.dtd);
        merge_rules(&mut self.system_rewrites, &next.system_rewrites);
        merge_rules(&mut self.uri_rewrites, &next.uri_rewrites);
    }

    /// The file this catalog was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn system_rewrites(&self) -> &[RewriteRule] {
        &self.system_rewrites
    }

    pub fn uri_rewrites(&self) -> &[RewriteRule] {
        &self.uri_rewrites
    }

    /// Look up a public identifier, given either as a formal public identifier or as a
    /// `urn:publicid:` URN.
    pub fn match_public(&self, public_id: &str) -> Option<&Path> {
        self.public.get(&*unwrap_urn(public_id)).map(PathBuf::as_path)
    }

    /// Apply every matching `rewriteSystem` rule, in declaration order.
    ///
    /// Each rule sees the result of the previous ones.
    pub fn rewrite_system<'a>(&self, system_id: &'a str) -> Cow<'a, str> {
        apply_rewrites(&self.system_rewrites, system_id)
    }

    /// Apply every matching `rewriteURI` rule, in declaration order.
    pub fn rewrite_uri<'a>(&self, uri: &'a str) -> Cow<'a, str> {
        apply_rewrites(&self.uri_rewrites, uri)
    }

    /// Resolve a system identifier without a document context.
    ///
    /// See [`Catalog::match_system_in`].
    pub fn match_system(&self, base_uri: Option<&str>, system_id: &str) -> Option<PathBuf> {
        self.match_system_in(base_uri, system_id, None)
    }

    /// Resolve a system identifier to an existing local file.
    ///
    /// 1. the system table, after applying the `rewriteSystem` rules
    /// 2. the rewritten identifier relative to `document_parent`
    /// 3. the rewritten identifier resolved against `base_uri`, or against
    ///    `document_parent` if there is no base URI
    pub fn match_system_in(
        &self,
        base_uri: Option<&str>,
        system_id: &str,
        document_parent: Option<&Path>,
    ) -> Option<PathBuf> {
        let system_id = self.rewrite_system(system_id);
        if let Some(target) = self.system.get(&*system_id) {
            return Some(target.clone());
        }

        if let Some(parent) = document_parent {
            let candidate = match Url::parse(&system_id) {
                Ok(url) => url
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|name| !name.is_empty())
                    .map(|name| parent.join(name)),
                Err(_) if Path::new(&*system_id).is_absolute() => Path::new(&*system_id)
                    .file_name()
                    .map(|name| parent.join(name)),
                Err(_) => Some(parent.join(&*system_id)),
            };
            if let Some(candidate) = candidate.filter(|candidate| candidate.is_file()) {
                return Some(candidate);
            }
        }

        let base = base_uri
            .and_then(to_url)
            .or_else(|| document_parent.and_then(|parent| Url::from_directory_path(parent).ok()));
        resolve_reference(base.as_ref(), &system_id)
            .and_then(|url| local_file(&url))
            .filter(|path| path.is_file())
    }

    /// Resolve a URI reference to a local file.
    ///
    /// The `rewriteURI` rules are applied first, then the uri table is consulted. A
    /// `file:` URI or an absolute path that is not in the table is accepted as is.
    pub fn match_uri(&self, uri: &str) -> Option<PathBuf> {
        let uri = self.rewrite_uri(uri);
        if let Some(target) = self.uri.get(&*uri) {
            return Some(target.clone());
        }
        resolve_reference(None, &uri).and_then(|url| local_file(&url))
    }

    /// Look up a DTD by its file name, e.g. `docbookx.dtd`.
    pub fn dtd(&self, name: &str) -> Option<&Path> {
        self.dtd.get(name).map(PathBuf::as_path)
    }

    /// Find a system table target whose path ends with `system_id`.
    ///
    /// If several targets match, the lexicographically smallest is returned.
    pub fn match_suffix(&self, system_id: &str) -> Option<&Path> {
        if system_id.is_empty() {
            return None;
        }
        self.system
            .values()
            .filter(|target| target.to_string_lossy().ends_with(system_id))
            .min()
            .map(PathBuf::as_path)
    }

    /// Index the external entities declared by the DTD registered for `public_id`.
    ///
    /// Each DTD is read at most once. Failures are logged and leave the index unchanged.
    pub fn parse_dtd(&self, public_id: &str) {
        let Some(dtd) = self.match_public(public_id) else {
            return;
        };
        let mut index = self.lock_dtd_entities();
        if !index.parsed.insert(dtd.to_path_buf()) {
            return;
        }
        let grammar = match DTDParser::new().parse(dtd) {
            Ok(grammar) => grammar,
            Err(err) => {
                warn!("cannot index the entities of '{public_id}': {err}");
                return;
            }
        };

        let dir = dtd.parent().unwrap_or(Path::new("/"));
        for entity in grammar.public_entities() {
            if let Some(public_id) = entity.public_id() {
                index
                    .public
                    .entry(public_id.into())
                    .or_insert_with(|| normalize_path(&dir.join(entity.value())));
            }
        }
        for entity in grammar.system_entities() {
            if let Some(system_id) = entity.system_id() {
                index
                    .system
                    .entry(entity.value().into())
                    .or_insert_with(|| system_id.to_path_buf());
            }
        }
    }

    /// Look up a public identifier among the entities harvested by [`Catalog::parse_dtd`].
    pub fn dtd_public_entity(&self, public_id: &str) -> Option<PathBuf> {
        self.lock_dtd_entities().public.get(public_id).cloned()
    }

    /// Look up a system literal among the entities harvested by [`Catalog::parse_dtd`].
    pub fn dtd_system_entity(&self, system_id: &str) -> Option<PathBuf> {
        self.lock_dtd_entities().system.get(system_id).cloned()
    }

    fn lock_dtd_entities(&self) -> MutexGuard<'_, DtdEntityIndex> {
        self.dtd_entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

struct CatalogReader {
    catalog: Catalog,
    next_catalogs: Vec<PathBuf>,
}

impl CatalogReader {
    /// Handle `element` and its descendants. `base` is the directory relative
    /// references are resolved against.
    fn visit(&mut self, element: Node, base: &Path) -> Result<(), XMLError> {
        if element
            .tag_name()
            .namespace()
            .is_some_and(|ns| ns != XML_CATALOG_NAMESPACE)
        {
            return Ok(());
        }

        let base = match element.attribute((XML_NAMESPACE, "base")) {
            Some(xml_base) => {
                let base = make_absolute(base, xml_base);
                if !base.exists() {
                    return Err(XMLError::InvalidXmlBase { base });
                }
                Cow::Owned(base)
            }
            None => Cow::Borrowed(base),
        };

        let attribute = |name: &str| {
            let value = element.attribute(name);
            if value.is_none() {
                debug!(
                    "'{}' entry without '{name}' in '{}'",
                    element.tag_name().name(),
                    self.catalog.path.display()
                );
            }
            value
        };
        match element.tag_name().name() {
            "system" => {
                if let (Some(system_id), Some(uri)) = (attribute("systemId"), attribute("uri")) {
                    let target = make_absolute(&base, uri);
                    self.insert(Table::System, system_id, target);
                }
            }
            "public" => {
                if let (Some(public_id), Some(uri)) = (attribute("publicId"), attribute("uri")) {
                    let target = make_absolute(&base, uri);
                    self.insert(Table::Public, &unwrap_urn(public_id), target);
                }
            }
            "uri" => {
                if let (Some(name), Some(uri)) = (attribute("name"), attribute("uri")) {
                    let target = make_absolute(&base, uri);
                    self.insert(Table::Uri, name, target);
                }
            }
            "rewriteSystem" => {
                if let (Some(prefix), Some(replacement)) =
                    (attribute("systemIdStartString"), attribute("rewritePrefix"))
                {
                    let rule = RewriteRule::new(prefix, make_absolute_prefix(&base, replacement));
                    if !self.catalog.system_rewrites.contains(&rule) {
                        self.catalog.system_rewrites.push(rule);
                    }
                }
            }
            "rewriteURI" => {
                if let (Some(prefix), Some(replacement)) =
                    (attribute("uriStartString"), attribute("rewritePrefix"))
                {
                    let rule = RewriteRule::new(prefix, make_absolute_prefix(&base, replacement));
                    if !self.catalog.uri_rewrites.contains(&rule) {
                        self.catalog.uri_rewrites.push(rule);
                    }
                }
            }
            "nextCatalog" => {
                if let Some(next) = attribute("catalog") {
                    let next = make_absolute(&base, next);
                    if !self.next_catalogs.contains(&next) {
                        self.next_catalogs.push(next);
                    }
                }
            }
            _ => {}
        }

        for child in element.children().filter(Node::is_element) {
            self.visit(child, &base)?;
        }
        Ok(())
    }

    fn insert(&mut self, table: Table, key: &str, target: PathBuf) {
        let catalog = &mut self.catalog;
        let table = match table {
            Table::System => &mut catalog.system,
            Table::Public => &mut catalog.public,
            Table::Uri => &mut catalog.uri,
        };
        if table.contains_key(key) {
            return;
        }
        if !target.exists() {
            debug!("dropping catalog entry '{key}': '{}' does not exist", target.display());
            return;
        }
        if target.extension().is_some_and(|ext| ext == "dtd")
            && let Some(name) = target.file_name().and_then(|name| name.to_str())
        {
            catalog
                .dtd
                .entry(name.into())
                .or_insert_with(|| target.clone());
        }
        table.insert(key.into(), target);
    }
}

#[derive(Clone, Copy)]
enum Table {
    System,
    Public,
    Uri,
}

fn apply_rewrites<'a>(rules: &[RewriteRule], id: &'a str) -> Cow<'a, str> {
    let mut id = Cow::Borrowed(id);
    for rule in rules {
        if let Some(rewritten) = rule.apply(&id) {
            id = Cow::Owned(rewritten);
        }
    }
    id
}

/// Resolve a catalog reference (a path or a `file:` URI) against the directory `base`.
fn make_absolute(base: &Path, reference: &str) -> PathBuf {
    if let Ok(url) = Url::parse(reference)
        && let Some(path) = local_file(&url)
    {
        return normalize_path(&path);
    }
    normalize_path(&base.join(reference))
}

/// Like [`make_absolute`], but keeps a trailing separator so that the result can be
/// used as a string prefix.
fn make_absolute_prefix(base: &Path, reference: &str) -> String {
    if Url::parse(reference).is_ok_and(|url| url.scheme() != "file") {
        return reference.to_owned();
    }
    let mut prefix = make_absolute(base, reference).to_string_lossy().into_owned();
    if (reference.ends_with('/') || reference.ends_with(std::path::MAIN_SEPARATOR))
        && !prefix.ends_with(std::path::MAIN_SEPARATOR)
    {
        prefix.push(std::path::MAIN_SEPARATOR);
    }
    prefix
}

/// Remove `.` and `..` components without touching the file system.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push(component);
                }
            }
            component => normalized.push(component),
        }
    }
    normalized
}

/// Interpret `base` as a URL, or as a file-system path.
pub(crate) fn to_url(base: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(base) {
        return Some(url);
    }
    let path = Path::new(base);
    if !path.is_absolute() {
        return None;
    }
    if path.is_dir() {
        Url::from_directory_path(path).ok()
    } else {
        Url::from_file_path(path).ok()
    }
}

/// Resolve `reference` against `base`. Absolute references do not need a base.
pub(crate) fn resolve_reference(base: Option<&Url>, reference: &str) -> Option<Url> {
    match Url::parse(reference) {
        Ok(url) => Some(url),
        Err(_) if Path::new(reference).is_absolute() => Url::from_file_path(reference).ok(),
        Err(_) => base?.join(reference).ok(),
    }
}

fn local_file(url: &Url) -> Option<PathBuf> {
    (url.scheme() == "file")
        .then(|| url.to_file_path().ok())
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_rule_tests() {
        let rule = RewriteRule::new("http://example.com/", "/local/");
        assert_eq!(
            rule.apply("http://example.com/foo.dtd").as_deref(),
            Some("/local/foo.dtd")
        );
        assert_eq!(rule.apply("http://example.org/foo.dtd"), None);

        let rules = [
            RewriteRule::new("http://example.com/", "http://mirror.example.com/"),
            RewriteRule::new("http://mirror.example.com/", "/local/"),
        ];
        assert_eq!(
            apply_rewrites(&rules, "http://example.com/a/b.dtd"),
            "/local/a/b.dtd"
        );
        assert!(matches!(
            apply_rewrites(&rules, "other.dtd"),
            Cow::Borrowed("other.dtd")
        ));
    }

    #[test]
    fn normalize_path_tests() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d.dtd")),
            PathBuf::from("/a/c/d.dtd")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
    }

    #[cfg(unix)]
    #[test]
    fn make_absolute_tests() {
        let base = Path::new("/catalogs/docbook");
        assert_eq!(
            make_absolute(base, "dtd/docbookx.dtd"),
            PathBuf::from("/catalogs/docbook/dtd/docbookx.dtd")
        );
        assert_eq!(
            make_absolute(base, "../xhtml/xhtml1.dtd"),
            PathBuf::from("/catalogs/xhtml/xhtml1.dtd")
        );
        assert_eq!(
            make_absolute(base, "file:///opt/dtd/a.dtd"),
            PathBuf::from("/opt/dtd/a.dtd")
        );
        assert_eq!(make_absolute_prefix(base, "local/"), "/catalogs/docbook/local/");
        assert_eq!(make_absolute_prefix(base, "/local"), "/local");
        assert_eq!(
            make_absolute_prefix(base, "http://mirror.example.com/"),
            "http://mirror.example.com/"
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_reference_tests() {
        let base = Url::parse("file:///docs/book/").unwrap();
        assert_eq!(
            resolve_reference(Some(&base), "../dtd/book.dtd").unwrap().as_str(),
            "file:///docs/dtd/book.dtd"
        );
        assert_eq!(
            resolve_reference(None, "/abs/book.dtd").unwrap().as_str(),
            "file:///abs/book.dtd"
        );
        assert!(resolve_reference(None, "book.dtd").is_none());
        assert_eq!(
            local_file(&Url::parse("file:///abs/book.dtd").unwrap()),
            Some(PathBuf::from("/abs/book.dtd"))
        );
        assert_eq!(local_file(&Url::parse("http://example.com/book.dtd").unwrap()), None);
    }
}
