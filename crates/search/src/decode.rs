use crate::settings::Fallback;
use std::borrow::Cow;

/// Strip one trailing `\n` or `\r\n`.
fn trim_line_ending(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// Split one raw read (up to and including `\n`) into lines.
///
/// A lone `\r` also ends a line, so `a\rb\n` yields `a` and `b`, while
/// `a\r\n` yields just `a`.
///
/// ```
/// use logsift_search::split_lines;
///
/// let lines: Vec<&[u8]> = split_lines(b"a\rb\r\n").collect();
/// assert_eq!(lines, [&b"a"[..], &b"b"[..]]);
/// ```
pub fn split_lines(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    trim_line_ending(raw).split(|b| *b == b'\r')
}

/// Decode one line.
///
/// UTF-8 is tried first and borrowed when valid. Otherwise the `fallback`
/// decides: [`Latin1`](Fallback::Latin1) maps every byte to the code point of
/// the same value, so it cannot fail; [`None`](Fallback::None) reports the
/// line as undecodable and the caller skips it.
///
/// ```
/// use logsift_search::{Fallback, decode_line};
///
/// assert_eq!(decode_line(b"plain\r\n", Fallback::Latin1).unwrap(), "plain");
/// assert_eq!(decode_line(b"caf\xe9\n", Fallback::Latin1).unwrap(), "café");
/// assert!(decode_line(b"caf\xe9\n", Fallback::None).is_none());
/// ```
pub fn decode_line(raw: &[u8], fallback: Fallback) -> Option<Cow<'_, str>> {
    let bytes = trim_line_ending(raw);
    match std::str::from_utf8(bytes) {
        Ok(line) => Some(Cow::Borrowed(line)),
        Err(_) => match fallback {
            Fallback::Latin1 => Some(Cow::Owned(bytes.iter().copied().map(char::from).collect())),
            Fallback::None => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"line\n", "line")]
    #[case(b"line\r\n", "line")]
    #[case(b"no terminator", "no terminator")]
    #[case(b"\n", "")]
    fn test_line_endings(#[case] raw: &[u8], #[case] expected: &str) {
        assert_eq!(decode_line(raw, Fallback::Latin1).unwrap(), expected);
    }

    #[rstest]
    #[case(b"plain\n", &[b"plain" as &[u8]])]
    #[case(b"crlf\r\n", &[b"crlf" as &[u8]])]
    #[case(b"a\rb 4521\n", &[b"a" as &[u8], b"b 4521"])]
    #[case(b"a\r\rb", &[b"a" as &[u8], b"", b"b"])]
    #[case(b"\n", &[b"" as &[u8]])]
    fn test_split_lines(#[case] raw: &[u8], #[case] expected: &[&[u8]]) {
        assert_eq!(split_lines(raw).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_utf8_is_borrowed() {
        let decoded = decode_line("zürich 4521\n".as_bytes(), Fallback::Latin1).unwrap();
        assert!(matches!(decoded, Cow::Borrowed("zürich 4521")));
    }

    #[test]
    fn test_latin1_fallback_covers_every_byte() {
        let raw: Vec<u8> = (0x80..=0xFF).collect();
        let decoded = decode_line(&raw, Fallback::Latin1).unwrap();
        assert_eq!(decoded.chars().count(), raw.len());
        assert!(decoded.chars().zip(raw.iter()).all(|(c, b)| u32::from(c) == u32::from(*b)));
    }

    #[test]
    fn test_no_fallback_rejects_invalid_utf8() {
        assert!(decode_line(b"\xff\xfe 4521\n", Fallback::None).is_none());
        assert_eq!(decode_line(b"valid\n", Fallback::None).unwrap(), "valid");
    }
}
