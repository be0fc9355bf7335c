use std::collections::BTreeSet;

use super::contentspec::ContentModel;

/// `<!ELEMENT name model>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    name: Box<str>,
    content_model: ContentModel,
}

impl ElementDecl {
    pub fn new(name: impl Into<Box<str>>, content_model: ContentModel) -> Self {
        Self {
            name: name.into(),
            content_model,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_model(&self) -> &ContentModel {
        &self.content_model
    }

    /// Element names this declaration's content model refers to.
    pub fn children(&self) -> BTreeSet<&str> {
        self.content_model.children()
    }
}

impl std::fmt::Display for ElementDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<!ELEMENT {} {}>", self.name, self.content_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_decl_display_tests() {
        let decl = ElementDecl::new("br", ContentModel::parse("EMPTY").unwrap());
        assert_eq!(decl.to_string(), "<!ELEMENT br EMPTY>");

        let decl = ElementDecl::new("p", ContentModel::parse("(#PCDATA | em)*").unwrap());
        assert_eq!(decl.to_string(), "<!ELEMENT p (#PCDATA | em)*>");
        assert_eq!(decl.children().into_iter().collect::<Vec<_>>(), ["em"]);
    }
}
