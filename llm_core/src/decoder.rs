/// Incremental UTF-8 decoder.
///
/// Network chunks may split a multi-byte character. The incomplete tail of
/// one chunk is held back and completed by the next. Invalid sequences
/// decode to U+FFFD, as does a sequence still incomplete at `finish`.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk. Returns only complete characters.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // `valid_up_to` marks an already validated prefix.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// End of stream. Flushes an incomplete trailing sequence as U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(b"Hi there."), "Hi there.");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn test_split_multibyte_across_chunks() {
        let text = "안녕하세요";
        let bytes = text.as_bytes();
        let mut d = Utf8StreamDecoder::new();

        // "안" is 3 bytes; split after the first byte.
        assert_eq!(d.decode(&bytes[..1]), "");
        assert_eq!(d.pending.len(), 1);
        assert_eq!(d.decode(&bytes[1..4]), "안");
        assert_eq!(d.decode(&bytes[4..]), "녕하세요");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn test_byte_by_byte() {
        let text = "héllo 👋 세계";
        let mut d = Utf8StreamDecoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            out.push_str(&d.decode(std::slice::from_ref(b)));
        }
        out.push_str(&d.finish());
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.decode(b"ok\xffok"), "ok\u{FFFD}ok");
        assert_eq!(d.pending.len(), 0);
    }

    #[test]
    fn test_truncated_tail_at_finish() {
        let mut d = Utf8StreamDecoder::new();
        let emoji = "👋".as_bytes();
        assert_eq!(d.decode(&emoji[..2]), "");
        assert_eq!(d.finish(), "\u{FFFD}");
        assert_eq!(d.finish(), "");
    }
}
