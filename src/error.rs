use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Reasons a content-model grammar string is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ContentModelError {
    #[error("parentheses are not balanced")]
    UnbalancedParentheses,
    #[error("cardinality operator has no preceding particle")]
    MisplacedCardinality,
    #[error("particle already has a cardinality")]
    DuplicateCardinality,
    #[error("separator is not placed between two particles")]
    MisplacedSeparator,
    #[error("group contains no particles")]
    EmptyGroup,
    #[error("particles outside of a group")]
    UngroupedParticles,
    #[error("unexpected character '{0}'")]
    InvalidCharacter(char),
    #[error("group mixes ',' and '|' separators")]
    MixedSeparators,
    #[error("mixed content must be '(#PCDATA)' or end with ')*'")]
    InvalidMixedContent,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum XMLError {
    // DTD errors
    #[error("{}{message}", location(.path))]
    Syntax {
        path: Option<PathBuf>,
        message: Cow<'static, str>,
    },
    #[error("{}parameter entity '%{name};' is referenced before its declaration", location(.path))]
    UndeclaredParameterEntity {
        name: Box<str>,
        path: Option<PathBuf>,
    },
    #[error("{}parameter entity '%{name};' is recursive", location(.path))]
    RecursiveParameterEntity {
        name: Box<str>,
        path: Option<PathBuf>,
    },
    #[error("{}entity '{name}' does not name a module", location(.path))]
    EmptyModuleReference {
        name: Box<str>,
        path: Option<PathBuf>,
    },
    #[error("{}invalid content model '{model}': {source}", location(.path))]
    ContentModel {
        model: Box<str>,
        path: Option<PathBuf>,
        source: ContentModelError,
    },
    #[error("{}conditional section is neither INCLUDE nor IGNORE", location(.path))]
    InvalidConditionalSection { path: Option<PathBuf> },
    #[error("circular reference to '{}'", .path.display())]
    CircularReference { path: PathBuf },
    // Catalog errors
    #[error("invalid xml:base: '{}'", .base.display())]
    InvalidXmlBase { base: PathBuf },
    #[error("failed to parse catalog '{}': {message}", .path.display())]
    CatalogParse { path: PathBuf, message: Box<str> },
    #[error("cannot retrieve '{url}': {message}")]
    Network { url: Box<str>, message: Box<str> },
    // I/O errors
    #[error("I/O error: {0}")]
    IO(Arc<std::io::Error>),
}

impl XMLError {
    pub(crate) fn syntax(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Syntax {
            path: None,
            message: message.into(),
        }
    }

    /// Attach the DTD file to errors that were raised without one.
    pub(crate) fn within(mut self, file: &Path) -> Self {
        match &mut self {
            Self::Syntax { path, .. }
            | Self::UndeclaredParameterEntity { path, .. }
            | Self::RecursiveParameterEntity { path, .. }
            | Self::EmptyModuleReference { path, .. }
            | Self::ContentModel { path, .. }
            | Self::InvalidConditionalSection { path } => {
                path.get_or_insert_with(|| file.to_path_buf());
            }
            _ => {}
        }
        self
    }
}

impl From<std::io::Error> for XMLError {
    fn from(value: std::io::Error) -> Self {
        Self::IO(Arc::new(value))
    }
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!("{}: ", path.display()))
        .unwrap_or_default()
}
