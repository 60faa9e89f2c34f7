//! Message translation for error messages.
use std::collections::HashMap;

use crate::utils::interpolate;

const EN: &[(&str, &str)] = &[
    ("errors.syntax.tag_unexpected_args", "Syntax Error in '%{tag}' - Valid syntax: %{tag}"),
    ("errors.syntax.block_tag_unexpected_args", "Syntax Error in '%{tag}' - Valid syntax: {% %{tag} %}{% end%{tag} %}"),
    ("errors.syntax.assign", "Syntax Error in 'assign' - Valid syntax: assign [var] = [source]"),
    ("errors.syntax.capture", "Syntax Error in 'capture' - Valid syntax: capture [var]"),
    ("errors.syntax.case", "Syntax Error in 'case' - Valid syntax: case [condition]"),
    ("errors.syntax.case_invalid_when", "Syntax Error in tag 'case' - Valid when condition: {% when [condition] [or condition2...] %}"),
    ("errors.syntax.case_invalid_else", "Syntax Error in tag 'case' - Valid else condition: {% else %} (no parameters) "),
    ("errors.syntax.cycle", "Syntax Error in 'cycle' - Valid syntax: cycle [name :] var [, var2, var3 ...]"),
    ("errors.syntax.echo", "Syntax Error in 'echo' - Valid syntax: echo [expression]"),
    ("errors.syntax.for", "Syntax Error in 'for loop' - Valid syntax: for [item] in [collection]"),
    ("errors.syntax.for_invalid_in", "For loops require an 'in' clause"),
    ("errors.syntax.for_invalid_attribute", "Invalid attribute in for loop. Valid attributes are limit and offset"),
    ("errors.syntax.if", "Syntax Error in tag 'if' - Valid syntax: if [expression]"),
    ("errors.syntax.include", "Error in tag 'include' - Valid syntax: include '[template]' (with|for) [object|collection]"),
    ("errors.syntax.increment", "Syntax Error in 'increment' - Valid syntax: increment [var]"),
    ("errors.syntax.decrement", "Syntax Error in 'decrement' - Valid syntax: decrement [var]"),
    ("errors.syntax.inline_comment_invalid", "Syntax error in tag '#' - Each line of comments must be prefixed by the '#' character"),
    ("errors.syntax.invalid_delimiter", "'%{tag}' is not a valid delimiter for %{block_name} tags. use %{block_delimiter}"),
    ("errors.syntax.render", "Syntax error in tag 'render' - Template name must be a quoted string"),
    ("errors.syntax.tag_never_closed", "'%{block_name}' tag was never closed"),
    ("errors.syntax.tag_termination", "Tag '%{token}' was not properly terminated with regexp: %{tag_end}"),
    ("errors.syntax.unexpected_else", "%{block_name} tag does not expect 'else' tag"),
    ("errors.syntax.unexpected_outer_tag", "Unexpected outer '%{tag}' tag"),
    ("errors.syntax.unknown_tag", "Unknown tag '%{tag}'"),
    ("errors.syntax.variable_termination", "Variable '%{token}' was not properly terminated with regexp: %{tag_end}"),
    ("errors.argument.include", "Argument error in tag 'include' - Illegal template name"),
    ("errors.disabled.tag", "usage is not allowed in this context"),
];

/// Translates message keys into human readable messages.
///
/// The default instance carries the English messages.  Additional or
/// replacement translations can be layered on top with
/// [`insert`](Self::insert).  Unknown keys translate to themselves.
#[derive(Debug, Clone)]
pub struct I18n {
    messages: HashMap<String, String>,
}

impl Default for I18n {
    fn default() -> Self {
        I18n::new()
    }
}

impl I18n {
    /// Creates the English locale.
    pub fn new() -> I18n {
        I18n {
            messages: EN
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Creates a locale without any messages.
    pub fn empty() -> I18n {
        I18n {
            messages: HashMap::new(),
        }
    }

    /// Adds or replaces a message.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, message: V) {
        self.messages.insert(key.into(), message.into());
    }

    /// Translates a key, interpolating `%{name}` placeholders.
    pub fn translate(&self, key: &str, vars: &[(&str, &str)]) -> String {
        match self.messages.get(key) {
            Some(message) => interpolate(message, vars),
            None => key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate() {
        let i18n = I18n::new();
        assert_eq!(
            i18n.translate("errors.syntax.unknown_tag", &[("tag", "foo")]),
            "Unknown tag 'foo'"
        );
        assert_eq!(
            i18n.translate("errors.syntax.block_tag_unexpected_args", &[("tag", "raw")]),
            "Syntax Error in 'raw' - Valid syntax: {% raw %}{% endraw %}"
        );
    }

    #[test]
    fn test_missing_key_falls_back() {
        assert_eq!(I18n::empty().translate("errors.whatever", &[]), "errors.whatever");
    }
}
