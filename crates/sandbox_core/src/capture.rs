//! Output capture and truncation.
//!
//! Each stream is truncated independently against its own buffer: there is no
//! shared cursor or combined length between stdout and stderr. A prior
//! implementation this was ported from truncated one stream using the other's
//! length, which silently dropped bytes from whichever stream happened to be
//! captured second; that behavior is not reproduced here.

pub const DEFAULT_MAX_LEN: usize = 500;
pub const TRUNCATED_PREFIX_LEN: usize = 256;

/// Applies the truncation rule to one captured stream.
///
/// `buf.len() <= max_len` returns the buffer unchanged; otherwise returns the
/// first `prefix_len` bytes (clamped to a UTF-8 boundary) followed by `...`.
pub fn truncate(buf: &str, max_len: usize, prefix_len: usize) -> String {
    if buf.len() <= max_len {
        return buf.to_string();
    }
    let mut end = prefix_len.min(buf.len());
    while end > 0 && !buf.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &buf[..end])
}

pub fn truncate_default(buf: &str) -> String {
    truncate(buf, DEFAULT_MAX_LEN, TRUNCATED_PREFIX_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_is_unchanged() {
        assert_eq!(truncate_default("hello"), "hello");
    }

    #[test]
    fn long_buffer_is_prefixed_and_marked() {
        let long = "x".repeat(1000);
        let out = truncate_default(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.len(), TRUNCATED_PREFIX_LEN + 3);
    }

    #[test]
    fn streams_truncate_independently() {
        let stdout = "a".repeat(10);
        let stderr = "b".repeat(10_000);
        let out = truncate_default(&stdout);
        let err = truncate_default(&stderr);
        assert_eq!(out, stdout);
        assert!(err.ends_with("..."));
        assert!(err.starts_with('b'));
    }
}
