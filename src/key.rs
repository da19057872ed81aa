//! Key ordering and rendering for [`BTree`](crate::BTree).
//!
//! Keys are opaque byte strings. The engine imposes one total order on them:
//! plain lexicographic comparison of unsigned bytes, with a shorter key
//! ordering before any longer key it is a prefix of. Every comparison in the
//! engine goes through [`compare`]; there is no case folding and no locale
//! sensitivity.

use std::cmp::Ordering;
use std::fmt::Write as _;

/// Compare two byte-string keys.
///
/// Bytes are compared pairwise up to the shorter length; the first mismatch
/// (as unsigned bytes) decides. If one key is a prefix of the other, the
/// shorter key is less. Two identical sequences are equal.
///
/// # Example
///
/// ```rust
/// use std::cmp::Ordering;
/// use bytetree::key::compare;
///
/// assert_eq!(compare(b"abc", b"abd"), Ordering::Less);
/// assert_eq!(compare(b"ab", b"abc"), Ordering::Less);
/// assert_eq!(compare(b"", b"a"), Ordering::Less);
/// assert_eq!(compare(b"abc", b"abc"), Ordering::Equal);
/// assert_eq!(compare(&[0xFF], &[0x01]), Ordering::Greater);
/// ```
#[must_use]
pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => {}
            decided => return decided,
        }
    }
    a.len().cmp(&b.len())
}

/// Render a key for diagnostic output.
///
/// Keys whose bytes are all printable ASCII (32–126) render as a quoted
/// string; anything else renders as `0x` followed by uppercase hex digits
/// with no separators. This format is for human eyes only and is not parsed
/// back anywhere.
///
/// # Example
///
/// ```rust
/// use bytetree::key::render;
///
/// assert_eq!(render(b"hello"), "\"hello\"");
/// assert_eq!(render(&[0x00, 0xAB]), "0x00AB");
/// assert_eq!(render(b""), "\"\"");
/// ```
#[must_use]
pub fn render(key: &[u8]) -> String {
    if key.iter().all(|&b| (32..=126).contains(&b)) {
        // All bytes printable ASCII, so the lossy conversion is lossless.
        format!("\"{}\"", String::from_utf8_lossy(key))
    } else {
        let mut out = String::with_capacity(2 + key.len() * 2);
        out.push_str("0x");
        for b in key {
            // Writing into a String cannot fail.
            let _ = write!(out, "{b:02X}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_matches_slice_ord() {
        // The engine's order must coincide with Rust's built-in byte-slice
        // order, which is the same lexicographic definition.
        let samples: &[&[u8]] = &[
            b"",
            b"a",
            b"ab",
            b"abc",
            b"b",
            &[0x00],
            &[0x00, 0xFF],
            &[0x7F],
            &[0x80],
            &[0xFF],
        ];
        for a in samples {
            for b in samples {
                assert_eq!(compare(a, b), a.cmp(b), "a={a:?} b={b:?}");
            }
        }
    }

    #[test]
    fn compare_is_unsigned() {
        // 0x80..0xFF must sort above 0x00..0x7F.
        assert_eq!(compare(&[0x80], &[0x7F]), Ordering::Greater);
        assert_eq!(compare(&[0xFF], &[0x00]), Ordering::Greater);
    }

    #[test]
    fn prefix_is_less() {
        assert_eq!(compare(b"abc", b"abcd"), Ordering::Less);
        assert_eq!(compare(b"abcd", b"abc"), Ordering::Greater);
    }

    #[test]
    fn empty_key_sorts_first() {
        assert_eq!(compare(b"", b""), Ordering::Equal);
        assert_eq!(compare(b"", &[0x00]), Ordering::Less);
    }

    #[test]
    fn render_printable_boundaries() {
        // 32 (space) and 126 (~) are printable; 31 and 127 are not.
        assert_eq!(render(&[32]), "\" \"");
        assert_eq!(render(&[126]), "\"~\"");
        assert_eq!(render(&[31]), "0x1F");
        assert_eq!(render(&[127]), "0x7F");
    }

    #[test]
    fn render_mixed_falls_back_to_hex() {
        assert_eq!(render(&[b'A', 0x00, b'B']), "0x410042");
    }
}
