use crate::{
    error::XMLError,
    grammar::{NotationDecl, NotationKind},
};

use super::cursor::{declaration_body, read_quoted, read_token, skip_whitespaces};

impl NotationDecl {
    /// Parse one `<!NOTATION name (ExternalID | PublicID)>` declaration.
    ///
    /// ```text
    /// [82] NotationDecl ::= '<!NOTATION' S Name S (ExternalID | PublicID) S? '>'
    /// [83] PublicID     ::= 'PUBLIC' S PubidLiteral
    /// ```
    pub fn parse(declaration: &str) -> Result<Self, XMLError> {
        let syntax = |message: &str| {
            XMLError::syntax(format!("{message} in notation declaration '{declaration}'"))
        };
        let body = declaration_body(declaration, "<!NOTATION")
            .ok_or_else(|| syntax("malformed declaration"))?;

        let pos = skip_whitespaces(body, 0);
        let (name, pos) = read_token(body, pos, &[]);
        if name.is_empty() {
            return Err(syntax("missing name"));
        }
        let pos = skip_whitespaces(body, pos);
        let (keyword, pos) = read_token(body, pos, &['"', '\'']);
        let kind = match keyword {
            "SYSTEM" => NotationKind::System,
            "PUBLIC" => NotationKind::Public,
            _ => return Err(syntax("expected 'SYSTEM' or 'PUBLIC'")),
        };
        let pos = skip_whitespaces(body, pos);
        let (value, pos) = read_quoted(body, pos).ok_or_else(|| syntax("missing literal"))?;

        let pos = skip_whitespaces(body, pos);
        let referenced = if pos < body.len() {
            let (referenced, pos) = read_quoted(body, pos)
                .filter(|_| kind == NotationKind::Public)
                .ok_or_else(|| syntax("unexpected trailing content"))?;
            if skip_whitespaces(body, pos) != body.len() {
                return Err(syntax("unexpected trailing content"));
            }
            Some(referenced.into())
        } else {
            None
        };
        Ok(Self::new(name, kind, value, referenced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_notation_decl_tests() {
        let decl = NotationDecl::parse(r#"<!NOTATION gif SYSTEM "image/gif">"#).unwrap();
        assert_eq!(decl.name(), "gif");
        assert_eq!(decl.kind(), NotationKind::System);
        assert_eq!(decl.value(), "image/gif");
        assert_eq!(decl.referenced(), None);

        let decl = NotationDecl::parse(
            r#"<!NOTATION png PUBLIC "-//W3C//NOTATION PNG//EN" 'viewer.exe' >"#,
        )
        .unwrap();
        assert_eq!(decl.kind(), NotationKind::Public);
        assert_eq!(decl.referenced(), Some("viewer.exe"));
        assert_eq!(
            decl.to_string(),
            r#"<!NOTATION png PUBLIC "-//W3C//NOTATION PNG//EN" "viewer.exe">"#
        );
    }

    #[test]
    fn parse_notation_decl_error_tests() {
        assert!(NotationDecl::parse(r#"<!NOTATION gif "image/gif">"#).is_err());
        assert!(NotationDecl::parse(r#"<!NOTATION gif SYSTEM "a" "b">"#).is_err());
        assert!(NotationDecl::parse("<!NOTATION gif SYSTEM>").is_err());
    }
}
