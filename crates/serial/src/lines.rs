//! Delimited text lines from the inbound byte stream.

/// Upper bound for an unterminated line before it is discarded.
pub const MAX_PENDING_BYTES: usize = 16 * 1024;

/// Splits a chunked byte stream into text lines.
///
/// Bytes are buffered until the delimiter arrives, so multi-byte UTF-8
/// sequences split across reads decode intact. Carriage returns are
/// stripped from every line.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    delimiter: Vec<u8>,
    buf: Vec<u8>,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new("\n")
    }
}

impl LineDecoder {
    /// An empty delimiter falls back to `\n`.
    pub fn new(delimiter: &str) -> Self {
        let delimiter = if delimiter.is_empty() { "\n" } else { delimiter };
        Self {
            delimiter: delimiter.as_bytes().to_vec(),
            buf: Vec::new(),
        }
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = find(&self.buf, &self.delimiter) {
            let raw: Vec<u8> = self.buf.drain(..pos + self.delimiter.len()).collect();
            let line = String::from_utf8_lossy(&raw[..pos]).replace('\r', "");
            lines.push(line);
        }

        if self.buf.len() > MAX_PENDING_BYTES {
            tracing::warn!(bytes = self.buf.len(), "Discarding unterminated serial line");
            self.buf.clear();
        }
        lines
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_across_chunks() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(b"hel").is_empty());
        assert_eq!(decoder.push(b"lo\r\nwor"), vec!["hello"]);
        assert_eq!(decoder.push(b"ld\n\n"), vec!["world", ""]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_split_utf8_sequence() {
        let text = "µT ok\n".as_bytes();
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(&text[..1]).is_empty());
        assert_eq!(decoder.push(&text[1..]), vec!["µT ok"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut decoder = LineDecoder::new(";;");
        assert_eq!(decoder.push(b"a;;b;"), vec!["a"]);
        assert_eq!(decoder.push(b";c"), vec!["b"]);
        assert_eq!(decoder.pending(), 1);
    }

    #[test]
    fn test_binary_noise_is_tolerated() {
        let mut decoder = LineDecoder::default();
        let lines = decoder.push(&[0xFF, 0x00, 0x80, b'\n']);
        assert_eq!(lines.len(), 1);
    }
}
