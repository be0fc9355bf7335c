use crate::save::write_quoted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotationKind {
    System,
    Public,
}

impl NotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Public => "PUBLIC",
        }
    }
}

/// `<!NOTATION name (ExternalID | PublicID)>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationDecl {
    name: Box<str>,
    kind: NotationKind,
    value: Box<str>,
    referenced: Option<Box<str>>,
}

impl NotationDecl {
    pub fn new(
        name: impl Into<Box<str>>,
        kind: NotationKind,
        value: impl Into<Box<str>>,
        referenced: Option<Box<str>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            referenced,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NotationKind {
        self.kind
    }

    /// The first literal: the public identifier for `PUBLIC`, the system literal for `SYSTEM`.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The system literal following a public identifier, if any.
    pub fn referenced(&self) -> Option<&str> {
        self.referenced.as_deref()
    }
}

impl std::fmt::Display for NotationDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<!NOTATION {} {} ", self.name, self.kind.as_str())?;
        write_quoted(f, &self.value)?;
        if let Some(referenced) = self.referenced.as_deref() {
            f.write_str(" ")?;
            write_quoted(f, referenced)?;
        }
        f.write_str(">")
    }
}
