//! Declaration model of a DTD and the [`Grammar`] that aggregates it.

mod attlist_decl;
pub mod contentspec;
mod element_decl;
mod entity_decl;
mod notation_decl;

use std::collections::{BTreeSet, HashMap, hash_map::Entry};

pub use attlist_decl::{AttlistDecl, AttributeDecl, DefaultDecl};
pub use contentspec::{Cardinality, ContentModel, ContentParticle, ContentType, ParticleKind};
pub use element_decl::ElementDecl;
pub use entity_decl::{EntityDecl, EntityKind};
pub use notation_decl::{NotationDecl, NotationKind};

/// The declarations of one DTD, including every module pulled in while parsing it.
///
/// Element and attribute-list declarations are last-seen-wins. Entity and notation
/// declarations are first-seen-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grammar {
    elements: HashMap<Box<str>, ElementDecl>,
    attlists: HashMap<Box<str>, AttlistDecl>,
    entities: HashMap<Box<str>, EntityDecl>,
    notations: HashMap<Box<str>, NotationDecl>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any earlier declaration of the same element.
    pub fn insert_element_decl(&mut self, decl: ElementDecl) {
        self.elements.insert(decl.name().into(), decl);
    }

    /// Replaces any earlier attribute list of the same element.
    pub fn insert_attlist_decl(&mut self, decl: AttlistDecl) {
        self.attlists.insert(decl.name().into(), decl);
    }

    /// Returns `false` and discards `decl` if an entity of the same name already exists.
    pub fn insert_entity_decl(&mut self, decl: EntityDecl) -> bool {
        match self.entities.entry(decl.name().into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(decl);
                true
            }
        }
    }

    /// Returns `false` and discards `decl` if a notation of the same name already exists.
    pub fn insert_notation_decl(&mut self, decl: NotationDecl) -> bool {
        match self.notations.entry(decl.name().into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(decl);
                true
            }
        }
    }

    pub fn element_decl(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    pub fn attlist_decl(&self, name: &str) -> Option<&AttlistDecl> {
        self.attlists.get(name)
    }

    pub fn entity_decl(&self, name: &str) -> Option<&EntityDecl> {
        self.entities.get(name)
    }

    pub(crate) fn entity_decl_mut(&mut self, name: &str) -> Option<&mut EntityDecl> {
        self.entities.get_mut(name)
    }

    pub fn notation_decl(&self, name: &str) -> Option<&NotationDecl> {
        self.notations.get(name)
    }

    pub fn element_decls(&self) -> &HashMap<Box<str>, ElementDecl> {
        &self.elements
    }

    pub fn attlist_decls(&self) -> &HashMap<Box<str>, AttlistDecl> {
        &self.attlists
    }

    pub fn entity_decls(&self) -> &HashMap<Box<str>, EntityDecl> {
        &self.entities
    }

    pub fn notation_decls(&self) -> &HashMap<Box<str>, NotationDecl> {
        &self.notations
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementDecl> {
        self.elements.values()
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDecl> {
        self.entities.values()
    }

    pub fn system_entities(&self) -> impl Iterator<Item = &EntityDecl> {
        self.entities
            .values()
            .filter(|decl| decl.kind() == EntityKind::System)
    }

    pub fn public_entities(&self) -> impl Iterator<Item = &EntityDecl> {
        self.entities
            .values()
            .filter(|decl| decl.kind() == EntityKind::Public)
    }

    /// Guess the document element: the only declared element that no content model
    /// refers to.
    ///
    /// Returns `None` when there is no such element, when there are several, or when
    /// the candidate is declared `EMPTY`.
    pub fn root_element(&self) -> Option<&str> {
        let referenced = self
            .elements
            .values()
            .flat_map(|decl| decl.children())
            .collect::<BTreeSet<_>>();
        let mut candidates = self
            .elements
            .values()
            .filter(|decl| !referenced.contains(decl.name()));
        let root = candidates.next()?;
        if candidates.next().is_some()
            || root.content_model().content_type() == ContentType::EMPTY
        {
            return None;
        }
        Some(root.name())
    }
}

impl std::fmt::Display for Grammar {
    /// Every declaration in canonical form, grouped by kind and sorted by name.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn sorted<T>(map: &HashMap<Box<str>, T>) -> Vec<&T> {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_unstable_by(|l, r| l.0.cmp(r.0));
            entries.into_iter().map(|(_, decl)| decl).collect()
        }

        for decl in sorted(&self.notations) {
            writeln!(f, "{decl}")?;
        }
        for decl in sorted(&self.entities) {
            writeln!(f, "{decl}")?;
        }
        for decl in sorted(&self.elements) {
            writeln!(f, "{decl}")?;
            if let Some(attlist) = self.attlists.get(decl.name()) {
                writeln!(f, "{attlist}")?;
            }
        }
        // attribute lists of elements that are never declared
        for decl in sorted(&self.attlists) {
            if !self.elements.contains_key(decl.name()) {
                writeln!(f, "{decl}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, model: &str) -> ElementDecl {
        ElementDecl::new(name, ContentModel::parse(model).unwrap())
    }

    #[test]
    fn insertion_policy_tests() {
        let mut grammar = Grammar::new();
        assert!(grammar.insert_entity_decl(EntityDecl::internal("foo", "x")));
        assert!(!grammar.insert_entity_decl(EntityDecl::internal("foo", "y")));
        assert_eq!(grammar.entity_decl("foo").unwrap().value(), "x");

        grammar.insert_element_decl(element("a", "EMPTY"));
        grammar.insert_element_decl(element("a", "ANY"));
        assert_eq!(
            grammar.element_decl("a").unwrap().content_model().content_type(),
            ContentType::ANY
        );

        let gif = NotationDecl::new("gif", NotationKind::System, "image/gif", None);
        let other = NotationDecl::new("gif", NotationKind::System, "other", None);
        assert!(grammar.insert_notation_decl(gif));
        assert!(!grammar.insert_notation_decl(other));
        assert_eq!(grammar.notation_decl("gif").unwrap().value(), "image/gif");
    }

    #[test]
    fn root_element_tests() {
        let mut grammar = Grammar::new();
        grammar.insert_element_decl(element("book", "(title, chapter+)"));
        grammar.insert_element_decl(element("title", "(#PCDATA)"));
        grammar.insert_element_decl(element("chapter", "(title, (para | note)*)"));
        grammar.insert_element_decl(element("para", "(#PCDATA | em)*"));
        grammar.insert_element_decl(element("note", "ANY"));
        grammar.insert_element_decl(element("em", "(#PCDATA)"));
        assert_eq!(grammar.root_element(), Some("book"));

        // a reference to an undeclared element does not hide the root
        grammar.insert_element_decl(element("note", "(footnote)"));
        assert_eq!(grammar.root_element(), Some("book"));

        grammar.insert_element_decl(element("appendix", "(title)"));
        assert_eq!(grammar.root_element(), None);

        let mut grammar = Grammar::new();
        grammar.insert_element_decl(element("br", "EMPTY"));
        assert_eq!(grammar.root_element(), None);
        assert_eq!(Grammar::new().root_element(), None);
    }

    #[test]
    fn entity_filter_tests() {
        let mut grammar = Grammar::new();
        grammar.insert_entity_decl(EntityDecl::internal("a", "1"));
        grammar.insert_entity_decl(EntityDecl::external("b", None, "b.ent"));
        grammar.insert_entity_decl(EntityDecl::external("c", Some("-//C//EN".into()), "c.ent"));
        assert_eq!(grammar.entities().count(), 3);
        assert_eq!(grammar.system_entities().map(|e| e.name()).collect::<Vec<_>>(), ["b"]);
        assert_eq!(grammar.public_entities().map(|e| e.name()).collect::<Vec<_>>(), ["c"]);
    }
}
