//! The regular expressions shared by the lax parsers.
use once_cell::sync::Lazy;
use regex::Regex;

/// A quoted string or a run of characters that are not whitespace, commas
/// or pipes (quoted strings may be embedded).
pub const QUOTED_FRAGMENT: &str = r#""[^"]*"|'[^']*'|(?:[^\s,\|'"]|"[^"]*"|'[^']*')+"#;

/// A quoted string.
pub const QUOTED_STRING: &str = r#""[^"]*"|'[^']*'"#;

/// Characters allowed in loop and alias variable names.
pub const VARIABLE_SEGMENT: &str = r"[\w\-]";

/// `name: value` pairs in tag markup.
pub static TAG_ATTRIBUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(\w[\w-]*)\s*:\s*({})", QUOTED_FRAGMENT)).unwrap());

/// Markup made only of whitespace.
pub static WHITESPACE_OR_NOTHING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A\s*\z").unwrap());

/// Returns `true` for the characters trimmed by whitespace control.
pub fn is_trim_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r' | '\0')
}

/// Iterates over `(name, value)` attribute pairs in tag markup.
pub fn tag_attributes(markup: &str) -> impl Iterator<Item = (&str, &str)> {
    TAG_ATTRIBUTES.captures_iter(markup).filter_map(|caps| {
        let key = caps.get(1)?.as_str();
        let value = caps.get(2)?.as_str();
        Some((key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_attributes() {
        let attrs: Vec<_> = tag_attributes("'product' with x, a: 1, b-c:'d e'").collect();
        assert_eq!(attrs, vec![("a", "1"), ("b-c", "'d e'")]);
    }
}
