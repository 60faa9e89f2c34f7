use std::collections::BTreeMap;
use std::fmt;

/// Debug formats only the keys of a map.
pub struct BTreeMapKeysDebug<'a, K: fmt::Debug, V>(pub &'a BTreeMap<K, V>);

impl<'a, K: fmt::Debug, V> fmt::Debug for BTreeMapKeysDebug<'a, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|x| x.0)).finish()
    }
}

/// Runs a closure when dropped.
pub struct OnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> OnDrop<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Returns the HTML entity replacing `c`, if it needs escaping.
pub fn html_entity(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Helper to HTML escape a string.
pub struct HtmlEscape<'a>(pub &'a str);

impl<'a> fmt::Display for HtmlEscape<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // v_htmlescape also escapes slashes, which liquid keeps
        #[cfg(feature = "v_htmlescape")]
        {
            if !self.0.contains('/') {
                return fmt::Display::fmt(&v_htmlescape::escape(self.0), f);
            }
        }
        let mut flushed = 0;
        for (idx, c) in self.0.char_indices() {
            if let Some(entity) = html_entity(c) {
                ok!(f.write_str(&self.0[flushed..idx]));
                ok!(f.write_str(entity));
                flushed = idx + c.len_utf8();
            }
        }
        f.write_str(&self.0[flushed..])
    }
}

/// Converts `snake_case` into `camelCase`.
pub fn snake_to_camel(s: &str) -> String {
    let mut rv = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '_' && !rv.is_empty() {
            upper = true;
        } else if upper {
            rv.extend(c.to_uppercase());
            upper = false;
        } else {
            rv.push(c);
        }
    }
    rv
}

/// Formats a `%{name}` style template with the given variables.
pub fn interpolate(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rv = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("%{") {
        rv.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => rv.push_str(value),
                    None => rv.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            None => {
                rv.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    rv.push_str(rest);
    rv
}
