//! Position-threaded scanning helpers.
//!
//! Each helper takes the whole input and a byte position and hands back the new
//! position, so that every sub-grammar can be exercised on its own.
//! Positions always fall on character boundaries because the helpers only stop
//! at ASCII delimiters.

use crate::is_whitespace;

pub(crate) fn looking_at(input: &str, pos: usize, prefix: &str) -> bool {
    input.get(pos..).is_some_and(|rest| rest.starts_with(prefix))
}

pub(crate) fn skip_whitespaces(input: &str, pos: usize) -> usize {
    let rest = &input[pos..];
    pos + (rest.len() - rest.trim_start_matches(is_whitespace).len())
}

/// Read a run of characters up to the next whitespace or one of `stops`.
pub(crate) fn read_token<'a>(input: &'a str, pos: usize, stops: &[char]) -> (&'a str, usize) {
    let rest = &input[pos..];
    let len = rest
        .find(|c: char| is_whitespace(c) || stops.contains(&c))
        .unwrap_or(rest.len());
    (&rest[..len], pos + len)
}

/// Read a literal delimited by `"` or `'`.
///
/// `pos` must point at the opening quote. Returns the literal without its quotes
/// and the position just after the closing quote, or `None` if there is no opening
/// quote or the literal is unterminated.
pub(crate) fn read_quoted(input: &str, pos: usize) -> Option<(&str, usize)> {
    let rest = &input[pos..];
    let quote = rest.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let end = rest[1..].find(quote)?;
    Some((&rest[1..1 + end], pos + end + 2))
}

/// Find the `>` that closes the markup declaration starting at `pos`.
///
/// `>` inside quoted literals does not count.
pub(crate) fn find_declaration_end(input: &str, pos: usize) -> Option<usize> {
    let mut quote = None;
    for (i, c) in input[pos..].char_indices() {
        match quote {
            Some(q) if q == c => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(pos + i),
            None => {}
        }
    }
    None
}

/// Up to `width` characters on each side of `pos`.
pub(crate) fn surrounding(input: &str, pos: usize, width: usize) -> (&str, &str) {
    let start = input[..pos]
        .char_indices()
        .rev()
        .nth(width.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    let end = input[pos..]
        .char_indices()
        .nth(width)
        .map_or(input.len(), |(i, _)| pos + i);
    (&input[start..pos], &input[pos..end])
}

/// Strip `<!KEYWORD` and the closing `>` from one markup declaration.
///
/// The keyword must be followed by whitespace.
pub(crate) fn declaration_body<'a>(declaration: &'a str, keyword: &str) -> Option<&'a str> {
    let body = declaration
        .trim_matches(is_whitespace)
        .strip_prefix(keyword)?
        .strip_suffix('>')?;
    body.starts_with(is_whitespace).then_some(body)
}

/// Count the non-overlapping occurrences of `target` in `section`.
pub(crate) fn count(section: &str, target: &str) -> usize {
    section.matches(target).count()
}
