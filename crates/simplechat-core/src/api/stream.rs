//! Incremental UTF-8 decoding for chunked response bodies.
//!
//! Network chunks can end in the middle of a multi-byte character. The
//! decoder hands back every complete character and holds on to the
//! incomplete tail until the next chunk arrives.

/// Streaming UTF-8 decoder with lossy handling of invalid bytes
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk. Invalid sequences become U+FFFD; an incomplete
    /// sequence at the end of the input is kept for the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence, wait for more bytes
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"hello "), "hello ");
        assert_eq!(decoder.decode(b"world"), "world");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_split_multibyte_character() {
        // "你好" is e4 bd a0 e5 a5 bd
        let bytes = "你好".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&bytes[..2]), "");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&bytes[2..4]), "你");
        assert_eq!(decoder.decode(&bytes[4..]), "好");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_split_emoji_across_three_chunks() {
        let bytes = "a👋b".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        out.push_str(&decoder.decode(&bytes[..2]));
        out.push_str(&decoder.decode(&bytes[2..4]));
        out.push_str(&decoder.decode(&bytes[4..]));
        assert_eq!(out, "a👋b");
    }

    #[test]
    fn test_invalid_byte_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'o', 0xff, b'k']), "o\u{fffd}k");
    }

    #[test]
    fn test_truncated_tail_flushed_lossy() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xe4, 0xbd]), "x");
        assert_eq!(decoder.finish(), "\u{fffd}");
    }
}
