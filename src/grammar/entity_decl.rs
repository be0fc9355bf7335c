use std::path::{Path, PathBuf};

use crate::save::write_quoted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// `<!ENTITY name "value">`
    Internal,
    /// `<!ENTITY name SYSTEM "uri">`
    System,
    /// `<!ENTITY name PUBLIC "pubid" "uri">`
    Public,
}

/// `<!ENTITY [%] name def>`
///
/// For external entities `value` holds the system literal as written in the DTD.
/// `system_id` is only set once the referenced module has been located and parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDecl {
    pub(crate) name: Box<str>,
    pub(crate) kind: EntityKind,
    pub(crate) value: Box<str>,
    pub(crate) public_id: Option<Box<str>>,
    pub(crate) system_id: Option<PathBuf>,
    pub(crate) ndata: Option<Box<str>>,
    pub(crate) is_parameter_entity: bool,
}

impl EntityDecl {
    pub fn internal(name: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Internal,
            value: value.into(),
            public_id: None,
            system_id: None,
            ndata: None,
            is_parameter_entity: false,
        }
    }

    pub fn external(
        name: impl Into<Box<str>>,
        public_id: Option<Box<str>>,
        system_literal: impl Into<Box<str>>,
    ) -> Self {
        let kind = if public_id.is_some() {
            EntityKind::Public
        } else {
            EntityKind::System
        };
        Self {
            name: name.into(),
            kind,
            value: system_literal.into(),
            public_id,
            system_id: None,
            ndata: None,
            is_parameter_entity: false,
        }
    }

    pub fn with_ndata(mut self, notation: impl Into<Box<str>>) -> Self {
        self.ndata = Some(notation.into());
        self
    }

    pub fn into_parameter_entity(mut self) -> Self {
        self.is_parameter_entity = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The replacement text of an internal entity, or the system literal of an external one.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    /// The absolute path of the module file this entity was resolved to.
    pub fn system_id(&self) -> Option<&Path> {
        self.system_id.as_deref()
    }

    pub fn set_system_id(&mut self, system_id: impl Into<PathBuf>) {
        self.system_id = Some(system_id.into());
    }

    /// The notation name of an unparsed entity.
    pub fn ndata(&self) -> Option<&str> {
        self.ndata.as_deref()
    }

    pub fn is_parameter_entity(&self) -> bool {
        self.is_parameter_entity
    }

    pub fn is_external(&self) -> bool {
        !matches!(self.kind, EntityKind::Internal)
    }
}

impl std::fmt::Display for EntityDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<!ENTITY ")?;
        if self.is_parameter_entity {
            f.write_str("% ")?;
        }
        write!(f, "{} ", self.name)?;
        match self.kind {
            EntityKind::Internal => write_quoted(f, &self.value)?,
            EntityKind::System => {
                f.write_str("SYSTEM ")?;
                write_quoted(f, &self.value)?;
            }
            EntityKind::Public => {
                f.write_str("PUBLIC ")?;
                write_quoted(f, self.public_id.as_deref().unwrap_or_default())?;
                f.write_str(" ")?;
                write_quoted(f, &self.value)?;
            }
        }
        if let Some(ndata) = self.ndata.as_deref() {
            write!(f, " NDATA {ndata}")?;
        }
        f.write_str(">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_decl_display_tests() {
        let decl = EntityDecl::internal("copy", "&#169;");
        assert_eq!(decl.to_string(), "<!ENTITY copy \"&#169;\">");

        let decl = EntityDecl::internal("quote", "say \"hi\"");
        assert_eq!(decl.to_string(), "<!ENTITY quote 'say \"hi\"'>");

        let decl = EntityDecl::external("chap1", None, "chap1.xml");
        assert_eq!(decl.kind(), EntityKind::System);
        assert_eq!(decl.to_string(), "<!ENTITY chap1 SYSTEM \"chap1.xml\">");

        let decl = EntityDecl::external("logo", Some("-//ACME//Logo//EN".into()), "logo.gif")
            .with_ndata("gif");
        assert_eq!(decl.kind(), EntityKind::Public);
        assert_eq!(
            decl.to_string(),
            "<!ENTITY logo PUBLIC \"-//ACME//Logo//EN\" \"logo.gif\" NDATA gif>"
        );

        let decl = EntityDecl::external("mod", None, "mod.ent").into_parameter_entity();
        assert_eq!(decl.to_string(), "<!ENTITY % mod SYSTEM \"mod.ent\">");
    }
}
