//! URL-safe caption codec.
//!
//! Captions travel inside a URL path, one segment per text region:
//! `segment1/segment2/.../segmentN`. Within a segment spaces become `_` and
//! everything that could collide with the structure is prefix-escaped with
//! `~`, so `decode(&encode(s)) == s` holds exactly for any segment list.
//!
//! Escape table (internal contract, stable on the wire):
//!
//! | source  | encoded |
//! |---------|---------|
//! | space   | `_`     |
//! | `_`     | `~u`    |
//! | `~`     | `~~`    |
//! | `/`     | `~s`    |
//! | newline | `~n`    |
//! | tab     | `~t`    |
//!
//! Any other character passes through untouched; percent-encoding of
//! non-ASCII is left to the HTTP layer. The codec never changes case.

use crate::error::{MemeplateError, MemeplateResult};

/// Joins caption segments in the packed path form.
pub const SEGMENT_SEPARATOR: char = '/';

/// Stands in for a space within a segment.
pub const SPACE_MARKER: char = '_';

/// Prefix for escaped characters.
pub const ESCAPE: char = '~';

/// Pack caption segments into a single URL-path-safe slug.
///
/// Deterministic: the same input always yields the same slug.
pub fn encode<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push(SEGMENT_SEPARATOR);
        }
        encode_segment(segment.as_ref(), &mut out);
    }
    out
}

fn encode_segment(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            ' ' => out.push(SPACE_MARKER),
            '_' => out.push_str("~u"),
            '~' => out.push_str("~~"),
            '/' => out.push_str("~s"),
            '\n' => out.push_str("~n"),
            '\t' => out.push_str("~t"),
            other => out.push(other),
        }
    }
}

/// Recover caption segments from a slug.
///
/// Empty input decodes to a single empty segment. Fails with
/// [`MemeplateError::MalformedSlug`] on a trailing escape character or an
/// unrecognized escape code.
pub fn decode(slug: &str) -> MemeplateResult<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = slug.chars();

    while let Some(c) = chars.next() {
        match c {
            SEGMENT_SEPARATOR => segments.push(std::mem::take(&mut current)),
            SPACE_MARKER => current.push(' '),
            ESCAPE => match chars.next() {
                Some('u') => current.push('_'),
                Some('~') => current.push('~'),
                Some('s') => current.push('/'),
                Some('n') => current.push('\n'),
                Some('t') => current.push('\t'),
                Some(other) => {
                    return Err(MemeplateError::malformed_slug(format!(
                        "unknown escape '~{other}'"
                    )));
                }
                None => {
                    return Err(MemeplateError::malformed_slug(
                        "trailing escape character",
                    ));
                }
            },
            other => current.push(other),
        }
    }

    segments.push(current);
    Ok(segments)
}
