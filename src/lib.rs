//! DTD grammar parsing and XML Catalog based resolution of external identifiers.
//!
//! The crate has two halves:
//!
//! - [`DTDParser`] scans a DTD file (following parameter-entity modules, external
//!   entities and conditional sections) and produces a [`Grammar`], the aggregate of
//!   its element, attribute-list, entity and notation declarations.
//! - [`Catalog`] maps public identifiers, system identifiers and URIs to local files
//!   as described by an OASIS XML Catalog document, so that DTD modules and external
//!   entities can be resolved without touching the network.
//!
//! ```no_run
//! use dtdcat::{CatalogBuilder, CatalogResolver, DTDParser, EntityResolver};
//!
//! let grammar = DTDParser::new().parse("schemas/book.dtd")?;
//! println!("root element: {:?}", grammar.root_element());
//!
//! let catalog = CatalogBuilder::global().catalog("schemas/catalog.xml")?;
//! let mut resolver = CatalogResolver::new(catalog);
//! if let Some(source) = resolver.resolve_entity(
//!     "[dtd]",
//!     Some("-//EXAMPLE//DTD Book//EN"),
//!     None,
//!     "http://example.com/book.dtd",
//! )? {
//!     println!("resolved to {:?}", source.system_id());
//! }
//! # Ok::<(), dtdcat::XMLError>(())
//! ```

pub mod catalog;
pub mod error;
pub mod grammar;
mod parse;
pub mod resolver;
mod save;

pub use catalog::{Catalog, CatalogBuilder, RewriteRule};
pub use error::{ContentModelError, XMLError};
pub use grammar::Grammar;
pub use parse::DTDParser;
pub use resolver::{
    CatalogResolver, EntityResolver, FileResolver, InputSource, ResolverConfig, ResolverOption,
};

/// ```text
/// [3] S ::= (#x20 | #x9 | #xD | #xA)+
/// ```
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, '\x20' | '\x09' | '\x0D' | '\x0A')
}
