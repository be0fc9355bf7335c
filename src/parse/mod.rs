//! DTD scanner.
//!
//! [`DTDParser`] walks a DTD file from start to end, dispatching on the markup at the
//! current position. Parameter-entity modules and external entities are parsed into
//! the same [`Grammar`], so a whole modular DTD ends up in one set of tables.

mod attlist_decl;
mod cursor;
mod element_decl;
mod entity_decl;
mod notation_decl;

use std::{
    borrow::Cow,
    fs,
    mem::take,
    path::{Path, PathBuf},
};

use log::{debug, error, warn};

use crate::{
    error::XMLError,
    grammar::{AttlistDecl, ElementDecl, EntityDecl, EntityKind, Grammar, NotationDecl},
    is_whitespace,
};

use cursor::{count, find_declaration_end, looking_at, read_token, skip_whitespaces, surrounding};

/// Number of characters reported on each side of unexpected content.
const CONTEXT_WIDTH: usize = 20;

#[derive(Debug, Default)]
pub struct DTDParser {
    grammar: Grammar,
    // canonical paths of the files currently being parsed, outermost first
    chain: Vec<PathBuf>,
}

impl DTDParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the DTD file at `path` together with every module it pulls in.
    ///
    /// # Errors
    /// - malformed or unterminated declarations
    /// - parameter entities referenced before they are declared
    /// - a module that (directly or indirectly) includes itself
    /// - I/O failures on the top-level file or on any module that exists
    pub fn parse(&mut self, path: impl AsRef<Path>) -> Result<Grammar, XMLError> {
        self.grammar = Grammar::new();
        self.chain.clear();
        self.parse_file(path.as_ref())?;
        Ok(take(&mut self.grammar))
    }

    /// Parse `source` as if it were the content of the file at `path`.
    ///
    /// `path` does not need to exist. It locates relative module references and
    /// is reported in errors.
    pub fn parse_str(&mut self, source: &str, path: impl AsRef<Path>) -> Result<Grammar, XMLError> {
        self.grammar = Grammar::new();
        self.chain.clear();
        let path = std::path::absolute(path.as_ref())?;
        self.chain.push(path.clone());
        let ret = self.parse_source(&normalize_line_breaks(source), &path);
        self.chain.clear();
        ret?;
        Ok(take(&mut self.grammar))
    }

    fn parse_file(&mut self, path: &Path) -> Result<(), XMLError> {
        let path = fs::canonicalize(path)?;
        if self.chain.contains(&path) {
            return Err(XMLError::CircularReference { path });
        }
        let source = fs::read_to_string(&path)?;
        self.chain.push(path.clone());
        let ret = self.parse_source(&normalize_line_breaks(&source), &path);
        self.chain.pop();
        ret
    }

    fn parse_source(&mut self, source: &str, file: &Path) -> Result<(), XMLError> {
        let source = source.strip_prefix('\u{FEFF}').unwrap_or(source);
        let dir = file.parent().unwrap_or(Path::new(""));
        let mut pos = 0;
        while pos < source.len() {
            let next = if looking_at(source, pos, "%") {
                self.parse_module_reference(source, pos, dir)
            } else if looking_at(source, pos, "<!ELEMENT") {
                self.parse_element_decl(source, pos)
            } else if looking_at(source, pos, "<!ATTLIST") {
                self.parse_attlist_decl(source, pos)
            } else if looking_at(source, pos, "<!ENTITY") {
                self.parse_entity_decl(source, pos, dir)
            } else if looking_at(source, pos, "<!NOTATION") {
                self.parse_notation_decl(source, pos)
            } else if looking_at(source, pos, "<?") {
                skip_past(source, pos, "?>", "unterminated processing instruction")
            } else if looking_at(source, pos, "<!--") {
                skip_past(source, pos, "-->", "unterminated comment")
            } else if looking_at(source, pos, "<![") {
                self.parse_conditional_section(source, pos)
            } else if looking_at(source, pos, "]]>") {
                // end of an INCLUDE section
                Ok(pos + 3)
            } else if source[pos..].starts_with(is_whitespace) {
                Ok(skip_whitespaces(source, pos))
            } else {
                let (before, after) = surrounding(source, pos, CONTEXT_WIDTH);
                error!("text before the error: '{before}'");
                error!("text after the error: '{after}'");
                Err(XMLError::syntax(format!(
                    "unexpected content after '{before}'"
                )))
            };
            pos = next.map_err(|err| err.within(file))?;
        }
        Ok(())
    }

    /// `%name;` outside of any declaration: the entity value names a module file.
    fn parse_module_reference(
        &mut self,
        source: &str,
        pos: usize,
        dir: &Path,
    ) -> Result<usize, XMLError> {
        let end = source[pos..]
            .find(';')
            .map(|i| pos + i)
            .ok_or_else(|| XMLError::syntax("unterminated parameter-entity reference"))?;
        let name = &source[pos + 1..end];
        let entity = self.grammar.entity_decl(name).ok_or_else(|| {
            XMLError::UndeclaredParameterEntity {
                name: name.into(),
                path: None,
            }
        })?;
        let external = entity.is_external();
        let module = module_path(dir, name, entity.value())?;
        if module.is_file() {
            let module = fs::canonicalize(&module)?;
            self.parse_file(&module)?;
            if external && let Some(entity) = self.grammar.entity_decl_mut(name) {
                entity.set_system_id(module);
            }
        } else {
            warn!("module '{}' not found", module.display());
        }
        Ok(end + 1)
    }

    fn parse_element_decl(&mut self, source: &str, pos: usize) -> Result<usize, XMLError> {
        let end = find_declaration_end(source, pos)
            .ok_or_else(|| XMLError::syntax("unterminated element declaration"))?;
        let text = self.expand_parameter_entities(&source[pos..=end], &mut vec![])?;
        self.grammar.insert_element_decl(ElementDecl::parse(&text)?);
        Ok(end + 1)
    }

    fn parse_attlist_decl(&mut self, source: &str, pos: usize) -> Result<usize, XMLError> {
        let end = find_declaration_end(source, pos)
            .ok_or_else(|| XMLError::syntax("unterminated attribute-list declaration"))?;
        self.grammar
            .insert_attlist_decl(AttlistDecl::parse(&source[pos..=end])?);
        Ok(end + 1)
    }

    fn parse_entity_decl(
        &mut self,
        source: &str,
        pos: usize,
        dir: &Path,
    ) -> Result<usize, XMLError> {
        let end = find_declaration_end(source, pos)
            .ok_or_else(|| XMLError::syntax("unterminated entity declaration"))?;
        let mut decl = EntityDecl::parse(&source[pos..=end])?;

        // unparsed entities point at binary data, not at DTD text
        if decl.kind() == EntityKind::System
            && !decl.is_parameter_entity()
            && decl.ndata().is_none()
        {
            let module = module_path(dir, decl.name(), decl.value())?;
            if module.is_file() {
                decl.set_system_id(fs::canonicalize(&module)?);
                self.parse_file(&module)?;
            } else {
                warn!("module '{}' not found", module.display());
            }
        }

        let name = decl.name().to_owned();
        if !self.grammar.insert_entity_decl(decl) {
            debug!("entity '{name}' is already declared, ignoring the later declaration");
        }
        Ok(end + 1)
    }

    fn parse_notation_decl(&mut self, source: &str, pos: usize) -> Result<usize, XMLError> {
        let end = find_declaration_end(source, pos)
            .ok_or_else(|| XMLError::syntax("unterminated notation declaration"))?;
        let decl = NotationDecl::parse(&source[pos..=end])?;
        let name = decl.name().to_owned();
        if !self.grammar.insert_notation_decl(decl) {
            debug!("notation '{name}' is already declared, ignoring the later declaration");
        }
        Ok(end + 1)
    }

    /// ```text
    /// [61] conditionalSect ::= includeSect | ignoreSect
    /// [62] includeSect     ::= '<![' S? 'INCLUDE' S? '[' extSubsetDecl ']]>'
    /// [63] ignoreSect      ::= '<![' S? 'IGNORE' S? '[' ignoreSectContents* ']]>'
    /// ```
    ///
    /// For INCLUDE only the opening marker is consumed, so the content is scanned as
    /// ordinary declarations and the closing `]]>` is skipped when it is reached.
    fn parse_conditional_section(&mut self, source: &str, pos: usize) -> Result<usize, XMLError> {
        let unterminated = || XMLError::syntax("unterminated conditional section");
        let mut end = source[pos..]
            .find("]]>")
            .map(|i| pos + i)
            .ok_or_else(unterminated)?;
        // widen the section until every nested `<![` has its `]]>`
        while count(&source[pos..end + 3], "<![") != count(&source[pos..end + 3], "]]>") {
            end = source[end + 1..]
                .find("]]>")
                .map(|i| end + 1 + i)
                .ok_or_else(unterminated)?;
        }

        match self.section_keyword(&source[pos..end + 3])?.as_str() {
            "INCLUDE" => source[pos + 3..]
                .find('[')
                .map(|i| pos + 3 + i + 1)
                .ok_or_else(|| XMLError::InvalidConditionalSection { path: None }),
            "IGNORE" => Ok(end + 3),
            _ => Err(XMLError::InvalidConditionalSection { path: None }),
        }
    }

    /// Read the keyword of a conditional section, following entity references.
    fn section_keyword(&self, section: &str) -> Result<String, XMLError> {
        let pos = skip_whitespaces(section, 3);
        let (mut keyword, _) = read_token(section, pos, &['[']);
        let mut seen = vec![];
        while (keyword.starts_with('%') || keyword.starts_with('&')) && keyword.ends_with(';') {
            let name = &keyword[1..keyword.len() - 1];
            if seen.contains(&name) {
                return Err(XMLError::RecursiveParameterEntity {
                    name: name.into(),
                    path: None,
                });
            }
            seen.push(name);
            keyword = self
                .grammar
                .entity_decl(name)
                .ok_or_else(|| XMLError::UndeclaredParameterEntity {
                    name: name.into(),
                    path: None,
                })?
                .value()
                .trim_matches(is_whitespace);
        }
        Ok(keyword.to_owned())
    }

    /// Replace every `%name;` in `text` with the entity value, recursively.
    ///
    /// `active` holds the references currently being expanded.
    fn expand_parameter_entities(
        &self,
        text: &str,
        active: &mut Vec<Box<str>>,
    ) -> Result<String, XMLError> {
        let mut expanded = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('%') {
            expanded.push_str(&rest[..start]);
            let len = rest[start..].find(';').ok_or_else(|| {
                XMLError::syntax(format!("unterminated parameter-entity reference in '{text}'"))
            })?;
            let name = &rest[start + 1..start + len];
            let entity = self.grammar.entity_decl(name).ok_or_else(|| {
                XMLError::UndeclaredParameterEntity {
                    name: name.into(),
                    path: None,
                }
            })?;
            if active.iter().any(|active| &**active == name) {
                return Err(XMLError::RecursiveParameterEntity {
                    name: name.into(),
                    path: None,
                });
            }
            active.push(name.into());
            expanded.push_str(&self.expand_parameter_entities(entity.value(), active)?);
            active.pop();
            rest = &rest[start + len + 1..];
        }
        expanded.push_str(rest);
        Ok(expanded)
    }
}

/// Resolve the module named by entity `name` against the directory of the current file.
fn module_path(dir: &Path, name: &str, value: &str) -> Result<PathBuf, XMLError> {
    let value = value.trim_matches(is_whitespace);
    if value.is_empty() {
        return Err(XMLError::EmptyModuleReference {
            name: name.into(),
            path: None,
        });
    }
    Ok(dir.join(value))
}

fn skip_past(
    source: &str,
    pos: usize,
    terminator: &str,
    message: &'static str,
) -> Result<usize, XMLError> {
    source[pos..]
        .find(terminator)
        .map(|i| pos + i + terminator.len())
        .ok_or_else(|| XMLError::syntax(message))
}

fn normalize_line_breaks(source: &str) -> Cow<'_, str> {
    if source.contains('\r') {
        Cow::Owned(source.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Grammar, XMLError> {
        DTDParser::new().parse_str(source, "memory.dtd")
    }

    #[test]
    fn dispatch_tests() {
        let grammar = parse(
            r##"<?xml version="1.0" encoding="UTF-8"?>
            <!-- a comment with <!ELEMENT fake EMPTY> inside -->
            <!ENTITY % inline "#PCDATA | em">
            <!ELEMENT p (%inline;)*>
            <!ELEMENT em (#PCDATA)>
            <!ATTLIST p class CDATA #IMPLIED>
            <!NOTATION gif SYSTEM "image/gif">
            <?processing instruction?>
            "##,
        )
        .unwrap();
        assert!(grammar.element_decl("fake").is_none());
        assert_eq!(
            grammar.element_decl("p").unwrap().to_string(),
            "<!ELEMENT p (#PCDATA | em)*>"
        );
        assert!(grammar.attlist_decl("p").is_some());
        assert!(grammar.notation_decl("gif").is_some());
        assert_eq!(grammar.root_element(), Some("p"));
    }

    #[test]
    fn duplicate_entity_tests() {
        let grammar = parse(r#"<!ENTITY foo "x"> <!ENTITY foo "y">"#).unwrap();
        assert_eq!(grammar.entities().count(), 1);
        assert_eq!(grammar.entity_decl("foo").unwrap().value(), "x");

        let grammar = parse("<!ELEMENT a EMPTY>\r\n<!ELEMENT a ANY>").unwrap();
        assert_eq!(grammar.element_decl("a").unwrap().to_string(), "<!ELEMENT a ANY>");
    }

    #[test]
    fn conditional_section_tests() {
        let grammar = parse(
            r#"<![IGNORE[ <!ENTITY x "1"> ]]>
               <![INCLUDE[ <!ENTITY y "2"> ]]>"#,
        )
        .unwrap();
        assert!(grammar.entity_decl("x").is_none());
        assert!(grammar.entity_decl("y").is_some());

        let grammar = parse(
            r#"<!ENTITY % draft "IGNORE">
               <!ENTITY % final "INCLUDE">
               <![ %draft; [
                 <![ INCLUDE [ <!ENTITY nested "1"> ]]>
                 <!ENTITY draft-only "1">
               ]]>
               <![%final;[ <!ENTITY final-only "1"> ]]>"#,
        )
        .unwrap();
        assert!(grammar.entity_decl("nested").is_none());
        assert!(grammar.entity_decl("draft-only").is_none());
        assert!(grammar.entity_decl("final-only").is_some());

        assert!(matches!(
            parse("<![MAYBE[ <!ENTITY x '1'> ]]>"),
            Err(XMLError::InvalidConditionalSection { path: Some(_) })
        ));
        assert!(matches!(
            parse("<![%undeclared;[ ]]>"),
            Err(XMLError::UndeclaredParameterEntity { .. })
        ));
    }

    #[test]
    fn parameter_entity_tests() {
        let grammar = parse(
            r#"<!ENTITY % name "title">
               <!ENTITY % heading "(%name;, subtitle?)">
               <!ELEMENT chapter %heading;>"#,
        )
        .unwrap();
        assert_eq!(
            grammar.element_decl("chapter").unwrap().to_string(),
            "<!ELEMENT chapter (title,subtitle?)>"
        );

        assert!(matches!(
            parse("<!ELEMENT a (%b;)>"),
            Err(XMLError::UndeclaredParameterEntity { name, path: Some(_) }) if &*name == "b"
        ));
        assert!(matches!(
            parse(r#"<!ENTITY % a "(%b;)"> <!ENTITY % b "%a;"> <!ELEMENT x %a;>"#),
            Err(XMLError::RecursiveParameterEntity { .. })
        ));
        assert!(matches!(
            parse("%undeclared;"),
            Err(XMLError::UndeclaredParameterEntity { .. })
        ));
        assert!(matches!(
            parse(r#"<!ENTITY % blank " "> %blank;"#),
            Err(XMLError::EmptyModuleReference { .. })
        ));
    }

    #[test]
    fn missing_module_is_skipped_tests() {
        let grammar = parse(
            r#"<!ENTITY % missing SYSTEM "does-not-exist.mod">
               %missing;
               <!ELEMENT a EMPTY>"#,
        )
        .unwrap();
        assert!(grammar.element_decl("a").is_some());
        assert!(grammar.entity_decl("missing").unwrap().system_id().is_none());
    }

    #[test]
    fn unexpected_content_tests() {
        let err = parse("<!ELEMENT a EMPTY>\nthis is not a declaration").unwrap_err();
        match err {
            XMLError::Syntax { path, message } => {
                assert!(path.unwrap().ends_with("memory.dtd"));
                assert!(message.contains("EMPTY>"));
            }
            err => panic!("unexpected error: {err}"),
        }
        assert!(parse("<!ELEMENT a EMPTY").is_err());
        assert!(parse("<!-- unterminated").is_err());
        assert!(parse("<![INCLUDE[ <!ENTITY y '2'>").is_err());
    }
}
