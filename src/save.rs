use std::fmt::Write;

/// Write `literal` as a DTD literal.
///
/// `"` is used unless the literal itself contains `"`. If it contains both `"` and `'`,
/// every `"` is replaced with a character reference.
pub(crate) fn write_quoted(f: &mut impl Write, literal: &str) -> std::fmt::Result {
    if !literal.contains('"') {
        write!(f, "\"{literal}\"")
    } else if literal.contains('\'') {
        f.write_char('"')?;
        for (i, chunk) in literal.split('"').enumerate() {
            if i > 0 {
                f.write_str("&#34;")?;
            }
            f.write_str(chunk)?;
        }
        f.write_char('"')
    } else {
        write!(f, "'{literal}'")
    }
}
