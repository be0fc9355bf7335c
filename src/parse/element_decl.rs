use crate::{
    error::XMLError,
    grammar::{ContentModel, ElementDecl},
};

use super::cursor::{declaration_body, read_token, skip_whitespaces};

impl ElementDecl {
    /// Parse one `<!ELEMENT name model>` declaration.
    ///
    /// Parameter-entity references must already have been replaced.
    ///
    /// ```text
    /// [45] elementdecl ::= '<!ELEMENT' S Name S contentspec S? '>'
    /// ```
    pub fn parse(declaration: &str) -> Result<Self, XMLError> {
        let body = declaration_body(declaration, "<!ELEMENT").ok_or_else(|| {
            XMLError::syntax(format!("malformed element declaration '{declaration}'"))
        })?;

        let pos = skip_whitespaces(body, 0);
        let (name, pos) = read_token(body, pos, &['(']);
        if name.is_empty() {
            return Err(XMLError::syntax(format!(
                "element declaration without a name: '{declaration}'"
            )));
        }

        let model = body[pos..].trim();
        if model.is_empty() {
            return Err(XMLError::syntax(format!(
                "element '{name}' has no content model"
            )));
        }
        let content_model = ContentModel::parse(model).map_err(|source| XMLError::ContentModel {
            model: model.into(),
            path: None,
            source,
        })?;
        Ok(Self::new(name, content_model))
    }
}
