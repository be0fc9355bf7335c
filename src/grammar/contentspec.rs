use std::{collections::BTreeSet, fmt::Write as _, mem::take};

use crate::{error::ContentModelError, is_whitespace};

pub const PCDATA: &str = "#PCDATA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    #[default]
    None,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Optional => "?",
            Self::ZeroOrMore => "*",
            Self::OneOrMore => "+",
        }
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    PCDATA,
    Name(Box<str>),
    Sequence(Vec<ContentParticle>),
    Choice(Vec<ContentParticle>),
}

/// A node of a content-model tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentParticle {
    kind: ParticleKind,
    cardinality: Cardinality,
}

impl ContentParticle {
    pub fn new(kind: ParticleKind) -> Self {
        Self {
            kind,
            cardinality: Cardinality::None,
        }
    }

    pub fn name(name: impl Into<Box<str>>) -> Self {
        Self::new(ParticleKind::Name(name.into()))
    }

    pub fn kind(&self) -> &ParticleKind {
        &self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Child particles of a sequence or a choice. Empty for names and `#PCDATA`.
    pub fn particles(&self) -> &[ContentParticle] {
        match &self.kind {
            ParticleKind::Sequence(children) | ParticleKind::Choice(children) => children,
            ParticleKind::Name(_) | ParticleKind::PCDATA => &[],
        }
    }

    fn set_cardinality(&mut self, cardinality: Cardinality) -> Result<(), ContentModelError> {
        if self.cardinality != Cardinality::None {
            return Err(ContentModelError::DuplicateCardinality);
        }
        self.cardinality = cardinality;
        Ok(())
    }

    fn collect_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match &self.kind {
            ParticleKind::Name(name) => {
                names.insert(name);
            }
            ParticleKind::Sequence(children) | ParticleKind::Choice(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
            ParticleKind::PCDATA => {}
        }
    }
}

impl std::fmt::Display for ContentParticle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (children, separator) = match &self.kind {
            ParticleKind::PCDATA => return f.write_str(PCDATA),
            ParticleKind::Name(name) => return write!(f, "{name}{}", self.cardinality),
            ParticleKind::Sequence(children) => (children, ","),
            ParticleKind::Choice(children) => (children, " | "),
        };
        f.write_char('(')?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            write!(f, "{child}")?;
        }
        write!(f, "){}", self.cardinality)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    EMPTY,
    ANY,
    Mixed,
    Children,
}

/// The content model of an element declaration.
///
/// `EMPTY` and `ANY` carry no particles. `Mixed` carries `#PCDATA` followed by the
/// permitted element names, all under an implicit choice. `Children` normally carries
/// exactly one particle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentModel {
    content_type: ContentType,
    particles: Vec<ContentParticle>,
}

impl ContentModel {
    /// ```text
    /// [46] contentspec ::= 'EMPTY' | 'ANY' | Mixed | children
    /// [47] children    ::= (choice | seq) ('?' | '*' | '+')?
    /// [48] cp          ::= (Name | choice | seq) ('?' | '*' | '+')?
    /// [49] choice      ::= '(' S? cp ( S? '|' S? cp )+ S? ')'
    /// [50] seq         ::= '(' S? cp ( S? ',' S? cp )* S? ')'
    /// [51] Mixed       ::= '(' S? '#PCDATA' (S? '|' S? Name)* S? ')*'
    ///                    | '(' S? '#PCDATA' S? ')'
    /// ```
    pub fn parse(model: &str) -> Result<Self, ContentModelError> {
        let model = model.chars().filter(|&c| !is_whitespace(c)).collect::<String>();
        check_balance(&model)?;

        match model.as_str() {
            "EMPTY" => return Ok(Self::empty()),
            "ANY" => return Ok(Self::any()),
            "(#PCDATA)" => {
                return Ok(Self {
                    content_type: ContentType::Mixed,
                    particles: vec![ContentParticle::new(ParticleKind::PCDATA)],
                });
            }
            _ => {}
        }
        if model.starts_with("(#PCDATA") {
            return parse_mixed(&model);
        }

        let particles = reduce_top_level(parse_groups(&model)?)?;
        Ok(Self {
            content_type: ContentType::Children,
            particles,
        })
    }

    pub fn empty() -> Self {
        Self {
            content_type: ContentType::EMPTY,
            particles: vec![],
        }
    }

    pub fn any() -> Self {
        Self {
            content_type: ContentType::ANY,
            particles: vec![],
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn particles(&self) -> &[ContentParticle] {
        &self.particles
    }

    /// Every element name mentioned anywhere in this model.
    pub fn children(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        for particle in &self.particles {
            particle.collect_names(&mut names);
        }
        names
    }
}

impl std::fmt::Display for ContentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.content_type {
            ContentType::EMPTY => f.write_str("EMPTY"),
            ContentType::ANY => f.write_str("ANY"),
            ContentType::Mixed if self.particles.len() <= 1 => write!(f, "({PCDATA})"),
            ContentType::Mixed => {
                f.write_char('(')?;
                for (i, particle) in self.particles.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{particle}")?;
                }
                f.write_str(")*")
            }
            ContentType::Children => {
                for particle in &self.particles {
                    match particle.kind() {
                        // a bare name still needs its group parentheses
                        ParticleKind::Name(name) => write!(f, "({name}){}", particle.cardinality)?,
                        _ => write!(f, "{particle}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '\u{B7}')
}

fn check_balance(model: &str) -> Result<(), ContentModelError> {
    let mut depth = 0usize;
    for c in model.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(ContentModelError::UnbalancedParentheses)?
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ContentModelError::UnbalancedParentheses);
    }
    Ok(())
}

/// `model` starts with `(#PCDATA` but is not exactly `(#PCDATA)`.
fn parse_mixed(model: &str) -> Result<ContentModel, ContentModelError> {
    let inner = model
        .strip_suffix(")*")
        .and_then(|model| model.strip_prefix('('))
        .ok_or(ContentModelError::InvalidMixedContent)?;
    let mut members = inner.split('|');
    if members.next() != Some(PCDATA) {
        return Err(ContentModelError::InvalidMixedContent);
    }
    let mut particles = vec![ContentParticle::new(ParticleKind::PCDATA)];
    for name in members {
        if name.is_empty() {
            return Err(ContentModelError::MisplacedSeparator);
        }
        if let Some(c) = name.chars().find(|&c| !is_name_char(c)) {
            return Err(match c {
                '(' | ')' | ',' | '?' | '*' | '+' | '#' => ContentModelError::InvalidMixedContent,
                c => ContentModelError::InvalidCharacter(c),
            });
        }
        particles.push(ContentParticle::name(name));
    }
    Ok(ContentModel {
        content_type: ContentType::Mixed,
        particles,
    })
}

#[derive(Debug)]
enum Item {
    Particle(ContentParticle),
    Separator(char),
}

/// Split `model` on `()|,?*+` and fold the tokens with an explicit stack of open groups.
fn parse_groups(model: &str) -> Result<Vec<Item>, ContentModelError> {
    let mut stack = vec![];
    let mut current = vec![];
    let mut rest = model;
    while let Some(c) = rest.chars().next() {
        match c {
            '(' => stack.push(take(&mut current)),
            ')' => {
                let resumed = stack.pop().ok_or(ContentModelError::UnbalancedParentheses)?;
                let group = std::mem::replace(&mut current, resumed);
                current.push(Item::Particle(reduce_group(group)?));
            }
            '?' | '*' | '+' => {
                let Some(Item::Particle(particle)) = current.last_mut() else {
                    return Err(ContentModelError::MisplacedCardinality);
                };
                particle.set_cardinality(match c {
                    '?' => Cardinality::Optional,
                    '*' => Cardinality::ZeroOrMore,
                    _ => Cardinality::OneOrMore,
                })?;
            }
            '|' | ',' => current.push(Item::Separator(c)),
            _ => {
                let len = rest
                    .find(|c: char| "()|,?*+".contains(c))
                    .unwrap_or(rest.len());
                let token = &rest[..len];
                let particle = if token == PCDATA {
                    ContentParticle::new(ParticleKind::PCDATA)
                } else if let Some(c) = token.chars().find(|&c| !is_name_char(c)) {
                    return Err(ContentModelError::InvalidCharacter(c));
                } else {
                    ContentParticle::name(token)
                };
                current.push(Item::Particle(particle));
                rest = &rest[len..];
                continue;
            }
        }
        rest = &rest[c.len_utf8()..];
    }
    if !stack.is_empty() {
        return Err(ContentModelError::UnbalancedParentheses);
    }
    Ok(current)
}

/// Reduce the members of a just-closed group into one particle.
fn reduce_group(group: Vec<Item>) -> Result<ContentParticle, ContentModelError> {
    if group.is_empty() {
        return Err(ContentModelError::EmptyGroup);
    }
    // members must alternate: particle, separator, particle, ...
    if group.len() % 2 == 0
        || group.iter().enumerate().any(|(i, item)| match item {
            Item::Particle(_) => i % 2 != 0,
            Item::Separator(_) => i % 2 == 0,
        })
    {
        return Err(ContentModelError::MisplacedSeparator);
    }

    let mut separator = None;
    let mut members = Vec::with_capacity(group.len() / 2 + 1);
    for item in group {
        match item {
            Item::Particle(particle) => members.push(particle),
            Item::Separator(c) => match separator {
                Some(s) if s != c => return Err(ContentModelError::MixedSeparators),
                _ => separator = Some(c),
            },
        }
    }

    match separator {
        None => {
            let Some(member) = members.pop() else {
                return Err(ContentModelError::EmptyGroup);
            };
            // a member that already carries a cardinality keeps its own group,
            // so that the group can still take one
            if member.cardinality == Cardinality::None {
                Ok(member)
            } else {
                Ok(ContentParticle::new(ParticleKind::Sequence(vec![member])))
            }
        }
        Some('|') => Ok(ContentParticle::new(ParticleKind::Choice(members))),
        Some(_) => Ok(ContentParticle::new(ParticleKind::Sequence(members))),
    }
}

/// A children model is exactly one particle.
fn reduce_top_level(items: Vec<Item>) -> Result<Vec<ContentParticle>, ContentModelError> {
    let mut items = items.into_iter();
    let particle = match items.next() {
        Some(Item::Particle(particle)) => particle,
        Some(Item::Separator(_)) => return Err(ContentModelError::MisplacedSeparator),
        None => return Err(ContentModelError::EmptyGroup),
    };
    match items.next() {
        None => Ok(vec![particle]),
        Some(Item::Separator(_)) => Err(ContentModelError::MisplacedSeparator),
        Some(Item::Particle(_)) => Err(ContentModelError::UngroupedParticles),
    }
}
