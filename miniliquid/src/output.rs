use std::fmt;

/// The buffer a template renders into.
///
/// This is a utility type used by the engine which can be written into like
/// one can write into a [`std::fmt::Write`] value.  It is handed to every
/// [`Tag`](crate::Tag) so custom tags can emit text.  Tags like `capture`
/// redirect the output into a temporary buffer with
/// [`begin_capture`](Self::begin_capture) and
/// [`end_capture`](Self::end_capture).
#[derive(Debug)]
pub struct Output {
    buffer: String,
    capture_stack: Vec<String>,
}

impl Default for Output {
    fn default() -> Self {
        Output::new()
    }
}

impl Output {
    /// Creates an empty output.
    pub fn new() -> Output {
        Output {
            buffer: String::new(),
            capture_stack: Vec::new(),
        }
    }

    /// Begins capturing into a fresh buffer.
    pub fn begin_capture(&mut self) {
        self.capture_stack.push(String::new());
    }

    /// Ends the innermost capture and returns what was captured.
    pub fn end_capture(&mut self) -> String {
        self.capture_stack.pop().unwrap_or_default()
    }

    /// Returns `true` while a capture is active.
    pub fn is_capturing(&self) -> bool {
        !self.capture_stack.is_empty()
    }

    fn target(&mut self) -> &mut String {
        match self.capture_stack.last_mut() {
            Some(buffer) => buffer,
            None => &mut self.buffer,
        }
    }

    /// The length in bytes of the buffer currently written to.
    pub fn len(&self) -> usize {
        match self.capture_stack.last() {
            Some(buffer) => buffer.len(),
            None => self.buffer.len(),
        }
    }

    /// Returns `true` if the current buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes a string to the current buffer.
    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.target().push_str(s);
    }

    /// Writes some formatted information into the current buffer.
    #[inline]
    pub fn write_fmt(&mut self, a: fmt::Arguments<'_>) -> fmt::Result {
        fmt::Write::write_fmt(self.target(), a)
    }

    /// Discards everything written outside of captures.
    pub(crate) fn clear(&mut self) {
        self.buffer.clear();
        self.capture_stack.clear();
    }

    /// Returns the rendered string.
    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl fmt::Write for Output {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.target().push_str(s);
        Ok(())
    }

    #[inline]
    fn write_char(&mut self, c: char) -> fmt::Result {
        self.target().push(c);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture() {
        let mut out = Output::new();
        out.write_str("a");
        out.begin_capture();
        assert_eq!(out.len(), 0);
        write!(out, "{}-{}", 1, 2).unwrap();
        assert!(out.is_capturing());
        assert_eq!(out.end_capture(), "1-2");
        out.write_str("b");
        assert_eq!(out.into_string(), "ab");
    }
}
