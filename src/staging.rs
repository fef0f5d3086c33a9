//! Naming and ordering of files staged in the engine's working storage.
//!
//! The engine reads and writes image sequences through a printf-style pattern
//! (`frame_%04d.png`), so every staged sequence member gets a fixed-width,
//! zero-padded index. Caller-supplied and engine-produced file names are
//! ordered with a numeric-aware comparison so that `frame_2.png` sorts before
//! `frame_10.png`.

use std::cmp::Ordering;

use crate::error::{FramesmithError, Result};

/// Digits in a sequence member's index.
pub const SEQUENCE_INDEX_WIDTH: usize = 4;

/// Largest index representable in [`SEQUENCE_INDEX_WIDTH`] digits.
pub const MAX_SEQUENCE_INDEX: u32 = 9_999;

/// Name of the sequence member at `index`, e.g. `frame_0001.png`.
///
/// Indices wider than [`SEQUENCE_INDEX_WIDTH`] digits are rejected instead of
/// being allowed to overflow the pattern the engine expects.
pub fn sequence_member_name(index: u32, extension: &str, prefix: &str) -> Result<String> {
    if index > MAX_SEQUENCE_INDEX {
        return Err(FramesmithError::Validation(format!(
            "sequence index {} exceeds the {}-digit limit of {}",
            index, SEQUENCE_INDEX_WIDTH, MAX_SEQUENCE_INDEX
        )));
    }
    Ok(format!(
        "{}{:0width$}.{}",
        prefix,
        index,
        extension,
        width = SEQUENCE_INDEX_WIDTH
    ))
}

/// Engine-side pattern matching every name produced by [`sequence_member_name`].
pub fn sequence_pattern(prefix: &str, extension: &str) -> String {
    format!("{}%0{}d.{}", prefix, SEQUENCE_INDEX_WIDTH, extension)
}

/// Whether `name` looks like `<prefix><digits>.<extension>`.
///
/// Any number of digits is accepted since the engine widens indices past
/// the pattern width rather than wrapping them.
pub fn is_sequence_member(name: &str, prefix: &str, extension: &str) -> bool {
    let Some(rest) = name.strip_prefix(prefix) else {
        return false;
    };
    let Some((digits, ext)) = rest.rsplit_once('.') else {
        return false;
    };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && ext.eq_ignore_ascii_case(extension)
}

/// Extension of `filename`: the text after the last `.`.
pub fn extension_of(filename: &str) -> Result<&str> {
    match file_name_component(filename).rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Ok(ext),
        _ => Err(FramesmithError::InvalidFilename(filename.to_string())),
    }
}

/// Final path component of a caller-supplied name.
///
/// Browsers and file pickers hand over bare names, but paths can slip in from
/// other callers and must not escape the working storage.
pub fn file_name_component(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Sort names in place, comparing embedded numbers by magnitude.
pub fn sort_numeric_filenames(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

/// Sort arbitrary items by a file name key, comparing embedded numbers by magnitude.
pub fn sort_by_filename<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| natural_cmp(key(a), key(b)));
}

/// Natural order comparison: digit runs compare by numeric value, other runs
/// case-insensitively. Names that compare equal that way fall back to plain
/// byte order so the result is a total order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let parts_a = split_numeric(a);
    let parts_b = split_numeric(b);

    for (pa, pb) in parts_a.iter().zip(parts_b.iter()) {
        let ord = match (pa, pb) {
            (Chunk::Digits(da), Chunk::Digits(db)) => cmp_digit_runs(da, db),
            _ => cmp_text(pa.as_str(), pb.as_str()),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    parts_a
        .len()
        .cmp(&parts_b.len())
        .then_with(|| a.cmp(b))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

impl<'a> Chunk<'a> {
    fn as_str(&self) -> &'a str {
        match self {
            Chunk::Digits(s) | Chunk::Text(s) => s,
        }
    }
}

fn split_numeric(s: &str) -> Vec<Chunk<'_>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_digits = None;

    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                parts.push(make_chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }

    if let Some(prev) = in_digits {
        parts.push(make_chunk(&s[start..], prev));
    }

    parts
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits { Chunk::Digits(s) } else { Chunk::Text(s) }
}

// Digit runs may exceed u64, so compare by significant length first.
fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    let lower_a = a.chars().flat_map(char::to_lowercase);
    let lower_b = b.chars().flat_map(char::to_lowercase);
    lower_a.cmp(lower_b)
}
