use crate::{
    error::XMLError,
    grammar::{AttlistDecl, AttributeDecl},
};

use super::cursor::{declaration_body, read_quoted, read_token, skip_whitespaces};

impl AttlistDecl {
    /// Parse one `<!ATTLIST name attdef*>` declaration.
    ///
    /// ```text
    /// [52] AttlistDecl ::= '<!ATTLIST' S Name AttDef* S? '>'
    /// [53] AttDef      ::= S Name S AttType S DefaultDecl
    /// ```
    pub fn parse(declaration: &str) -> Result<Self, XMLError> {
        let body = declaration_body(declaration, "<!ATTLIST").ok_or_else(|| {
            XMLError::syntax(format!("malformed attribute-list declaration '{declaration}'"))
        })?;

        let pos = skip_whitespaces(body, 0);
        let (name, mut pos) = read_token(body, pos, &[]);
        if name.is_empty() {
            return Err(XMLError::syntax(format!(
                "attribute-list declaration without an element name: '{declaration}'"
            )));
        }

        let mut attributes = vec![];
        loop {
            pos = skip_whitespaces(body, pos);
            if pos == body.len() {
                break;
            }
            let (attr, next) = parse_attdef(body, pos).map_err(|message| {
                XMLError::syntax(format!("ATTLIST '{name}': {message}"))
            })?;
            attributes.push(attr);
            pos = next;
        }
        Ok(Self::new(name, attributes))
    }
}

fn parse_attdef(body: &str, pos: usize) -> Result<(AttributeDecl, usize), String> {
    let (name, pos) = read_token(body, pos, &[]);
    if name.starts_with('%') && name.ends_with(';') {
        return Ok((AttributeDecl::parameter_entity(name), pos));
    }

    let pos = skip_whitespaces(body, pos);
    let (attr_type, pos) = parse_attr_type(body, pos)
        .ok_or_else(|| format!("attribute '{name}' has no valid type"))?;

    let pos = skip_whitespaces(body, pos);
    if body[pos..].starts_with('#') {
        let (keyword, pos) = read_token(body, pos, &['"', '\'']);
        return match keyword {
            "#REQUIRED" | "#IMPLIED" => Ok((
                AttributeDecl::new(name, attr_type, Some(keyword.into()), false),
                pos,
            )),
            "#FIXED" => {
                let pos = skip_whitespaces(body, pos);
                let (value, pos) = read_quoted(body, pos)
                    .ok_or_else(|| format!("attribute '{name}' needs a quoted value after #FIXED"))?;
                Ok((AttributeDecl::new(name, attr_type, Some(value.into()), true), pos))
            }
            keyword => Err(format!("unknown default declaration '{keyword}'")),
        };
    }
    let (value, pos) = read_quoted(body, pos)
        .ok_or_else(|| format!("attribute '{name}' has no valid default declaration"))?;
    Ok((AttributeDecl::new(name, attr_type, Some(value.into()), false), pos))
}

/// ```text
/// [54] AttType          ::= StringType | TokenizedType | EnumeratedType
/// [58] NotationType     ::= 'NOTATION' S '(' S? Name (S? '|' S? Name)* S? ')'
/// [59] Enumeration      ::= '(' S? Nmtoken (S? '|' S? Nmtoken)* S? ')'
/// ```
fn parse_attr_type(body: &str, pos: usize) -> Option<(String, usize)> {
    if body[pos..].starts_with('(') {
        let end = body[pos..].find(')')? + pos + 1;
        return Some((body[pos..end].to_owned(), end));
    }
    let (keyword, next) = read_token(body, pos, &['(']);
    if keyword.is_empty() {
        return None;
    }
    if keyword == "NOTATION" {
        let start = skip_whitespaces(body, next);
        let (enumeration, end) = parse_attr_type(body, start)?;
        return enumeration
            .starts_with('(')
            .then(|| (format!("NOTATION {enumeration}"), end));
    }
    Some((keyword.to_owned(), next))
}

#[cfg(test)]
mod tests {
    use crate::grammar::DefaultDecl;

    use super::*;

    #[test]
    fn parse_attlist_decl_tests() {
        let decl = AttlistDecl::parse(
            r#"<!ATTLIST img
                src    CDATA          #REQUIRED
                alt    CDATA          #IMPLIED
                align  (left|right)   "left"
                format NOTATION (gif|png) #IMPLIED
                %common.att;
                version CDATA #FIXED '1.0'
            >"#,
        )
        .unwrap();
        assert_eq!(decl.name(), "img");
        let attrs = decl.attributes();
        assert_eq!(attrs.len(), 6);
        assert_eq!(attrs[0].default_decl(), DefaultDecl::Required);
        assert_eq!(attrs[1].default_decl(), DefaultDecl::Implied);
        assert_eq!(attrs[2].attr_type(), Some("(left|right)"));
        assert_eq!(attrs[2].default_decl(), DefaultDecl::Value("left"));
        assert_eq!(attrs[3].attr_type(), Some("NOTATION (gif|png)"));
        assert!(attrs[4].is_parameter_entity());
        assert_eq!(attrs[4].name(), "%common.att;");
        assert_eq!(attrs[5].default_decl(), DefaultDecl::Fixed("1.0"));
        assert!(decl.get("alt").is_some());
    }

    #[test]
    fn parse_attlist_decl_quoting_tests() {
        let decl = AttlistDecl::parse(r#"<!ATTLIST a title CDATA "x > y">"#).unwrap();
        assert_eq!(decl.attributes()[0].default_value(), Some("x > y"));

        let decl = AttlistDecl::parse("<!ATTLIST a>").unwrap();
        assert!(decl.attributes().is_empty());
    }

    #[test]
    fn parse_attlist_decl_error_tests() {
        assert!(AttlistDecl::parse("<!ATTLIST a b CDATA #FIXED>").is_err());
        assert!(AttlistDecl::parse("<!ATTLIST a b CDATA #DEFAULT>").is_err());
        assert!(AttlistDecl::parse("<!ATTLIST a b CDATA>").is_err());
        assert!(AttlistDecl::parse("<!ATTLIST a b (x|y>").is_err());
        assert!(AttlistDecl::parse("<!ATTLIST a b CDATA \"open>").is_err());
    }
}
