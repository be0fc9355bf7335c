use std::fmt::Write as _;

use crate::save::write_quoted;

/// A typed view of an attribute's default declaration.
///
/// ```text
/// [60] DefaultDecl ::= '#REQUIRED' | '#IMPLIED' | (('#FIXED' S)? AttValue)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultDecl<'a> {
    Required,
    Implied,
    Fixed(&'a str),
    Value(&'a str),
    /// Parameter-entity placeholders carry no default declaration.
    None,
}

/// One attribute definition of an `<!ATTLIST>`.
///
/// A `%name;` reference in place of an attribute definition is kept as a
/// placeholder whose name is the reference text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    name: Box<str>,
    attr_type: Option<Box<str>>,
    default_value: Option<Box<str>>,
    is_fixed: bool,
    is_parameter_entity: bool,
}

impl AttributeDecl {
    /// `default_value` is the raw default: `#REQUIRED`, `#IMPLIED`, or the literal value.
    pub fn new(
        name: impl Into<Box<str>>,
        attr_type: impl Into<Box<str>>,
        default_value: Option<Box<str>>,
        is_fixed: bool,
    ) -> Self {
        Self {
            name: name.into(),
            attr_type: Some(attr_type.into()),
            default_value,
            is_fixed,
            is_parameter_entity: false,
        }
    }

    pub fn parameter_entity(reference: impl Into<Box<str>>) -> Self {
        Self {
            name: reference.into(),
            attr_type: None,
            default_value: None,
            is_fixed: false,
            is_parameter_entity: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `CDATA`, a tokenized type keyword, or an enumeration such as `(yes|no)`.
    pub fn attr_type(&self) -> Option<&str> {
        self.attr_type.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    pub fn is_parameter_entity(&self) -> bool {
        self.is_parameter_entity
    }

    pub fn default_decl(&self) -> DefaultDecl<'_> {
        match self.default_value.as_deref() {
            _ if self.is_parameter_entity => DefaultDecl::None,
            Some(value) if self.is_fixed => DefaultDecl::Fixed(value),
            Some("#REQUIRED") => DefaultDecl::Required,
            Some("#IMPLIED") => DefaultDecl::Implied,
            Some(value) => DefaultDecl::Value(value),
            None => DefaultDecl::None,
        }
    }
}

impl std::fmt::Display for AttributeDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_parameter_entity {
            return f.write_str(&self.name);
        }
        write!(f, "{} {}", self.name, self.attr_type.as_deref().unwrap_or("CDATA"))?;
        match self.default_decl() {
            DefaultDecl::Required => f.write_str(" #REQUIRED"),
            DefaultDecl::Implied => f.write_str(" #IMPLIED"),
            DefaultDecl::Fixed(value) => {
                f.write_str(" #FIXED ")?;
                write_quoted(f, value)
            }
            DefaultDecl::Value(value) => {
                f.write_char(' ')?;
                write_quoted(f, value)
            }
            DefaultDecl::None => Ok(()),
        }
    }
}

/// `<!ATTLIST name attdef*>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttlistDecl {
    name: Box<str>,
    attributes: Vec<AttributeDecl>,
}

impl AttlistDecl {
    pub fn new(name: impl Into<Box<str>>, attributes: Vec<AttributeDecl>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// The name of the element this list belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute definitions in declaration order, placeholders included.
    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    pub fn get(&self, attr_name: &str) -> Option<&AttributeDecl> {
        self.attributes
            .iter()
            .find(|attr| !attr.is_parameter_entity && &*attr.name == attr_name)
    }
}

impl std::fmt::Display for AttlistDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<!ATTLIST {}", self.name)?;
        for attr in &self.attributes {
            write!(f, "\n  {attr}")?;
        }
        f.write_str("\n>")
    }
}
