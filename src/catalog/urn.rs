//! `urn:publicid:` handling ([RFC 3151](https://www.rfc-editor.org/rfc/rfc3151)).

use std::borrow::Cow;

pub const URN_PUBLICID_PREFIX: &str = "urn:publicid:";

/// Unwrap a `urn:publicid:` URN into a formal public identifier.
///
/// Identifiers without the prefix are returned unchanged.
pub fn unwrap_urn(public_id: &str) -> Cow<'_, str> {
    let Some(urn) = public_id.trim().strip_prefix(URN_PUBLICID_PREFIX) else {
        return Cow::Borrowed(public_id);
    };

    let mut unwrapped = urn
        .replace('+', " ")
        .replace(':', "//")
        .replace(';', "::");
    // `%25` last, so that an escaped `%` cannot form a new escape sequence
    for (escaped, c) in [
        ("%2B", "+"),
        ("%3A", ":"),
        ("%2F", "/"),
        ("%3B", ";"),
        ("%27", "'"),
        ("%3F", "?"),
        ("%23", "#"),
        ("%25", "%"),
    ] {
        unwrapped = unwrapped.replace(escaped, c);
    }
    Cow::Owned(unwrapped)
}
