use regex::Regex;

/// A cursor over a source string.
///
/// The scanner works on bytes for peeking and consuming single
/// characters and on anchored regular expressions for larger tokens.
/// Positions are byte offsets and are always kept on character
/// boundaries by the callers.
#[derive(Debug, Clone)]
pub struct Scanner<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Scanner<'s> {
    /// Creates a scanner at the start of the source.
    pub fn new(source: &'s str) -> Scanner<'s> {
        Scanner { source, pos: 0 }
    }

    /// The full source.
    pub fn source(&self) -> &'s str {
        self.source
    }

    /// The current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute byte offset.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.source.len());
    }

    /// The unconsumed rest of the source.
    pub fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    /// Returns `true` if the whole source was consumed.
    pub fn is_eos(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Looks at the next byte without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    /// Consumes the next byte.
    pub fn scan_byte(&mut self) -> Option<u8> {
        let rv = self.peek_byte();
        if rv.is_some() {
            self.pos += 1;
        }
        rv
    }

    /// Skips over whitespace.
    pub fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Consumes the match of `re` if it matches at the cursor.
    pub fn scan(&mut self, re: &Regex) -> Option<&'s str> {
        let rest = self.rest();
        let m = some!(re.find(rest));
        if m.start() != 0 {
            return None;
        }
        self.pos += m.end();
        Some(&rest[..m.end()])
    }

    /// Advances past the next occurrence of `needle`.
    ///
    /// Returns the number of bytes skipped including the needle or `None`
    /// if the needle does not occur, in which case the cursor stays put.
    pub fn skip_until(&mut self, needle: &str) -> Option<usize> {
        let idx = some!(self.rest().find(needle));
        let len = idx + needle.len();
        self.pos += len;
        Some(len)
    }

    /// Consumes everything that is left.
    pub fn terminate(&mut self) -> &'s str {
        let rv = self.rest();
        self.pos = self.source.len();
        rv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_and_whitespace() {
        let mut s = Scanner::new("a  b");
        assert_eq!(s.scan_byte(), Some(b'a'));
        s.skip_whitespace();
        assert_eq!(s.rest(), "b");
        assert_eq!(s.scan_byte(), Some(b'b'));
        assert!(s.is_eos());
        assert_eq!(s.scan_byte(), None);
    }

    #[test]
    fn test_scan_is_anchored() {
        let re = Regex::new(r"\d+").unwrap();
        let mut s = Scanner::new("ab12");
        assert_eq!(s.scan(&re), None);
        s.set_pos(2);
        assert_eq!(s.scan(&re), Some("12"));
    }

    #[test]
    fn test_skip_until() {
        let mut s = Scanner::new("{% if %} rest");
        assert_eq!(s.skip_until("%}"), Some(8));
        assert_eq!(s.rest(), " rest");
        assert_eq!(s.skip_until("%}"), None);
        assert_eq!(s.terminate(), " rest");
    }
}
