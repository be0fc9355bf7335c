use crate::{
    error::XMLError,
    grammar::{EntityDecl, EntityKind},
    is_whitespace,
};

use super::cursor::{declaration_body, read_quoted, read_token, skip_whitespaces};

impl EntityDecl {
    /// Parse one `<!ENTITY [%] name def>` declaration.
    ///
    /// ```text
    /// [70] EntityDecl ::= GEDecl | PEDecl
    /// [71] GEDecl     ::= '<!ENTITY' S Name S EntityDef S? '>'
    /// [72] PEDecl     ::= '<!ENTITY' S '%' S Name S PEDef S? '>'
    /// [73] EntityDef  ::= EntityValue | (ExternalID NDataDecl?)
    /// [74] PEDef      ::= EntityValue | ExternalID
    /// [75] ExternalID ::= 'SYSTEM' S SystemLiteral
    ///                   | 'PUBLIC' S PubidLiteral S SystemLiteral
    /// [76] NDataDecl  ::= S 'NDATA' S Name
    /// ```
    pub fn parse(declaration: &str) -> Result<Self, XMLError> {
        let syntax = |message: &str| {
            XMLError::syntax(format!("{message} in entity declaration '{declaration}'"))
        };
        let body = declaration_body(declaration, "<!ENTITY")
            .ok_or_else(|| syntax("malformed declaration"))?;

        let mut pos = skip_whitespaces(body, 0);
        let is_parameter_entity = body[pos..].starts_with('%')
            && body[pos + 1..].starts_with(is_whitespace);
        if is_parameter_entity {
            pos = skip_whitespaces(body, pos + 1);
        }
        let (name, pos) = read_token(body, pos, &['"', '\'']);
        if name.is_empty() {
            return Err(syntax("missing name"));
        }

        let pos = skip_whitespaces(body, pos);
        let (mut decl, pos) = if let Some((value, pos)) = read_quoted(body, pos) {
            (EntityDecl::internal(name, value), pos)
        } else {
            let (keyword, pos) = read_token(body, pos, &['"', '\'']);
            let (public_id, pos) = match keyword {
                "SYSTEM" => (None, pos),
                "PUBLIC" => {
                    let pos = skip_whitespaces(body, pos);
                    let (public_id, pos) = read_quoted(body, pos)
                        .ok_or_else(|| syntax("missing public identifier"))?;
                    (Some(public_id.into()), pos)
                }
                _ => return Err(syntax("expected a literal, 'SYSTEM' or 'PUBLIC'")),
            };
            let pos = skip_whitespaces(body, pos);
            let (system_literal, pos) =
                read_quoted(body, pos).ok_or_else(|| syntax("missing system literal"))?;
            (EntityDecl::external(name, public_id, system_literal), pos)
        };

        let pos = skip_whitespaces(body, pos);
        if pos < body.len() {
            let (keyword, pos) = read_token(body, pos, &[]);
            if keyword != "NDATA" || decl.kind() == EntityKind::Internal {
                return Err(syntax(&format!("unexpected '{keyword}'")));
            }
            if is_parameter_entity {
                return Err(syntax("NDATA on a parameter entity"));
            }
            let pos = skip_whitespaces(body, pos);
            let (notation, pos) = read_token(body, pos, &[]);
            if notation.is_empty() || skip_whitespaces(body, pos) != body.len() {
                return Err(syntax("malformed NDATA declaration"));
            }
            decl = decl.with_ndata(notation);
        }

        if is_parameter_entity {
            decl = decl.into_parameter_entity();
        }
        Ok(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_internal_entity_tests() {
        let decl = EntityDecl::parse(r#"<!ENTITY copy "&#169;">"#).unwrap();
        assert_eq!(decl.name(), "copy");
        assert_eq!(decl.kind(), EntityKind::Internal);
        assert_eq!(decl.value(), "&#169;");
        assert!(!decl.is_parameter_entity());

        let decl = EntityDecl::parse("<!ENTITY % inline '#PCDATA | em | strong'>").unwrap();
        assert!(decl.is_parameter_entity());
        assert_eq!(decl.value(), "#PCDATA | em | strong");
        assert_eq!(decl.to_string(), "<!ENTITY % inline \"#PCDATA | em | strong\">");

        // `%` glued to the name is part of the name, not a parameter-entity marker
        let decl = EntityDecl::parse(r#"<!ENTITY %pct "x">"#).unwrap();
        assert!(!decl.is_parameter_entity());
        assert_eq!(decl.name(), "%pct");
    }

    #[test]
    fn parse_external_entity_tests() {
        let decl = EntityDecl::parse(r#"<!ENTITY % tables SYSTEM "tables.mod">"#).unwrap();
        assert_eq!(decl.kind(), EntityKind::System);
        assert_eq!(decl.value(), "tables.mod");
        assert!(decl.is_parameter_entity());

        let decl = EntityDecl::parse(
            r#"<!ENTITY % xhtml-lat1
                PUBLIC "-//W3C//ENTITIES Latin 1 for XHTML//EN"
                       "xhtml-lat1.ent">"#,
        )
        .unwrap();
        assert_eq!(decl.kind(), EntityKind::Public);
        assert_eq!(
            decl.public_id(),
            Some("-//W3C//ENTITIES Latin 1 for XHTML//EN")
        );
        assert_eq!(decl.value(), "xhtml-lat1.ent");

        let decl =
            EntityDecl::parse(r#"<!ENTITY logo PUBLIC '-//ACME//Logo//EN' 'logo.gif' NDATA gif>"#)
                .unwrap();
        assert_eq!(decl.ndata(), Some("gif"));
        assert_eq!(decl.value(), "logo.gif");

        let decl = EntityDecl::parse(r#"<!ENTITY pic SYSTEM "pic.png" NDATA png >"#).unwrap();
        assert_eq!(decl.ndata(), Some("png"));
    }

    #[test]
    fn parse_entity_error_tests() {
        assert!(EntityDecl::parse(r#"<!ENTITY a "x" NDATA gif>"#).is_err());
        assert!(EntityDecl::parse(r#"<!ENTITY % a SYSTEM "a.ent" NDATA gif>"#).is_err());
        assert!(EntityDecl::parse(r#"<!ENTITY a PUBLIC "pub">"#).is_err());
        assert!(EntityDecl::parse(r#"<!ENTITY a SYSTM "a.ent">"#).is_err());
        assert!(EntityDecl::parse(r#"<!ENTITY a "unterminated>"#).is_err());
        assert!(EntityDecl::parse(r#"<!ENTITY "x">"#).is_err());
    }
}
