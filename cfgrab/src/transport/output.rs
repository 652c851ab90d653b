//! Output cleaning shared by the protocol clients.

use vte::{Parser, Perform};

/// Longest error excerpt carried on a `ProtocolError`.
pub(crate) const EXCERPT_LEN: usize = 200;

/// Accumulates command output, stripping terminal control sequences.
///
/// Bytes are fed through a `vte` parser so escape sequences split across
/// SSH data packets are still recognised, and so are multi-byte UTF-8
/// characters. Carriage returns are dropped; tabs and newlines are kept.
pub struct OutputBuffer {
    parser: Parser,
    text: TextSink,
}

#[derive(Default)]
struct TextSink(String);

impl Perform for TextSink {
    fn print(&mut self, c: char) {
        self.0.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.0.push('\n'),
            b'\t' => self.0.push('\t'),
            _ => {}
        }
    }
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            text: TextSink::default(),
        }
    }

    /// Feed raw bytes from the device.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.text, data);
    }

    pub fn is_empty(&self) -> bool {
        self.text.0.trim().is_empty()
    }

    /// The cleaned text with surrounding whitespace removed.
    pub fn into_string(self) -> String {
        let text = self.text.0;
        let trimmed = text.trim();
        if trimmed.len() == text.len() {
            text
        } else {
            trimmed.to_string()
        }
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-emit a JSON object or array pretty-printed; anything else is
/// returned unchanged.
pub fn normalize_config(raw: String) -> String {
    let trimmed = raw.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return raw;
    }
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(raw),
        Err(_) => raw,
    }
}

/// The first failure pattern found in `output`, if any.
pub fn failure_marker<'a>(output: &str, patterns: &'a [String]) -> Option<&'a str> {
    patterns
        .iter()
        .find(|pattern| output.contains(pattern.as_str()))
        .map(String::as_str)
}

/// At most [`EXCERPT_LEN`] characters of `text`, trimmed.
pub fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
