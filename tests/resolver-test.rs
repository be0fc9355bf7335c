use std::{
    fs,
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    path::{Path, PathBuf},
    thread,
};

use dtdcat::{CatalogBuilder, CatalogResolver, EntityResolver, ResolverConfig, ResolverOption};

const CATALOG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources/catalog/catalog.xml");

fn resource(path: &str) -> PathBuf {
    fs::canonicalize(Path::new(env!("CARGO_MANIFEST_DIR")).join(path)).unwrap()
}

fn resolver(config: ResolverConfig) -> CatalogResolver {
    let catalog = CatalogBuilder::new().catalog(CATALOG).unwrap();
    CatalogResolver::with_config(catalog, config)
}

fn offline() -> ResolverConfig {
    ResolverOption::DocumentParentLookup | ResolverOption::SuffixMatch
}

fn resolve(
    resolver: &mut CatalogResolver,
    public_id: Option<&str>,
    system_id: &str,
) -> Option<PathBuf> {
    resolver
        .resolve_entity("[dtd]", public_id, None, system_id)
        .unwrap()
        .and_then(|source| source.system_id().map(PathBuf::from))
}

#[test]
fn resolve_entity_tests() {
    let mut resolver = resolver(offline());
    let book = resource("resources/catalog/dtd/book.dtd");

    // the public identifier is consulted first
    assert_eq!(
        resolve(&mut resolver, Some("-//EXAMPLE//DTD Book//EN"), "http://example.com/other.dtd"),
        Some(book.clone())
    );
    assert_eq!(
        resolve(&mut resolver, None, "http://example.com/dtd/book.dtd"),
        Some(book.clone())
    );
    assert_eq!(
        resolve(
            &mut resolver,
            Some("-//EXAMPLE//DTD Unknown//EN"),
            "http://example.com/schemas/article.dtd"
        ),
        Some(resource("resources/catalog/dtd/article.dtd"))
    );

    let mut source = resolver
        .resolve_entity("[dtd]", Some("-//EXAMPLE//DTD Book//EN"), None, "book.dtd")
        .unwrap()
        .unwrap();
    assert_eq!(source.public_id(), Some("-//EXAMPLE//DTD Book//EN"));
    let mut content = String::new();
    source.read_to_string(&mut content).unwrap();
    assert_eq!(content, fs::read_to_string(&book).unwrap());
}

#[test]
fn resolve_relative_to_base_tests() {
    let mut resolver = resolver(offline());
    let base = url::Url::from_file_path(resource("resources/catalog/docs").join("index.xml")).unwrap();
    let source = resolver
        .resolve_entity("[dtd]", None, Some(base.as_str()), "local.dtd")
        .unwrap()
        .unwrap();
    assert_eq!(
        source.system_id().map(PathBuf::from),
        Some(resource("resources/catalog/docs/local.dtd"))
    );
}

#[test]
fn resolve_from_dtd_entities_tests() {
    let mut resolver = resolver(offline());
    assert_eq!(resolve(&mut resolver, None, "legal.ent"), None);

    // resolving the DTD through its public identifier indexes its external entities
    assert!(resolve(&mut resolver, Some("-//EXAMPLE//DTD Book//EN"), "book.dtd").is_some());
    assert_eq!(
        resolve(&mut resolver, Some("-//EXAMPLE//ENTITIES Chapters//EN"), "unknown.ent"),
        Some(resource("resources/catalog/dtd/chapters.ent"))
    );
    assert_eq!(
        resolve(&mut resolver, None, "legal.ent"),
        Some(resource("resources/catalog/dtd/legal.ent"))
    );
    assert_eq!(
        resolve(&mut resolver, None, "book.mod"),
        Some(resource("resources/catalog/dtd/book.mod"))
    );
}

#[test]
fn document_parent_tests() {
    let system_id = "http://elsewhere.example/dtds/local.dtd";

    let mut resolver = resolver(offline());
    assert_eq!(resolve(&mut resolver, None, system_id), None);
    resolver.set_document_parent(resource("resources/catalog/docs"));
    assert_eq!(
        resolve(&mut resolver, None, system_id),
        Some(resource("resources/catalog/docs/local.dtd"))
    );

    let mut resolver = self::resolver(ResolverConfig::empty());
    resolver.set_document_parent(resource("resources/catalog/docs"));
    assert_eq!(resolve(&mut resolver, None, system_id), None);
}

#[test]
fn suffix_match_tests() {
    let mut resolver = resolver(offline());
    assert_eq!(
        resolve(&mut resolver, None, "dtd/book.dtd"),
        Some(resource("resources/catalog/dtd/book.dtd"))
    );

    let mut resolver = self::resolver(ResolverConfig::empty());
    assert_eq!(resolve(&mut resolver, None, "dtd/book.dtd"), None);
}

#[test]
fn offline_resolution_tests() {
    // nothing covers this identifier, and the network must not be used
    let mut resolver = resolver(offline());
    assert_eq!(
        resolve(&mut resolver, None, "http://example.com/not-in-catalog.dtd"),
        None
    );
}

/// Serves `404 Not Found` to every request and returns the base URL of the server.
fn not_found_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                continue;
            };
            let mut reader = BufReader::new(&stream);
            let mut line = String::new();
            while reader.read_line(&mut line).is_ok_and(|read| read > 0) && line != "\r\n" {
                line.clear();
            }
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    });
    format!("http://{addr}")
}

#[test]
fn network_failure_fallback_tests() {
    let server = not_found_server();
    let mut resolver = resolver(ResolverConfig::default());
    assert!(resolve(&mut resolver, Some("-//EXAMPLE//DTD Book//EN"), "book.dtd").is_some());

    // the server answers 404, so the entities indexed from the DTD are used instead
    assert_eq!(
        resolve(
            &mut resolver,
            Some("-//EXAMPLE//ENTITIES Chapters//EN"),
            &format!("{server}/chapters.ent")
        ),
        Some(resource("resources/catalog/dtd/chapters.ent"))
    );
    // and nothing at all covers this one
    assert_eq!(resolve(&mut resolver, None, &format!("{server}/unknown.ent")), None);

    // a refused connection is not an error either
    let closed = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    assert_eq!(
        resolve(
            &mut resolver,
            Some("-//EXAMPLE//ENTITIES Chapters//EN"),
            &format!("http://{closed}/chapters.ent")
        ),
        Some(resource("resources/catalog/dtd/chapters.ent"))
    );
    assert_eq!(resolve(&mut resolver, None, &format!("http://{closed}/unknown.ent")), None);
}

#[test]
fn resolve_public_system_tests() {
    let mut resolver = resolver(ResolverConfig::default());
    let source = resolver
        .resolve_public_system(Some("urn:publicid:-:EXAMPLE:DTD+Article:EN"), None)
        .unwrap()
        .unwrap();
    assert_eq!(
        source.system_id().map(PathBuf::from),
        Some(resource("resources/catalog/dtd/article.dtd"))
    );

    let source = resolver
        .resolve_public_system(None, Some("http://example.com/dtd/book.dtd"))
        .unwrap()
        .unwrap();
    assert_eq!(
        source.system_id().map(PathBuf::from),
        Some(resource("resources/catalog/dtd/book.dtd"))
    );

    assert!(resolver.resolve_public_system(None, None).unwrap().is_none());
    assert!(
        resolver
            .get_external_subset("book", None)
            .unwrap()
            .is_none()
    );
}
