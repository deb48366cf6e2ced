//! HTML character reference decoding.
//!
//! References are decoded the way browsers decode text in an element body:
//!
//! - named references resolve against the HTML5 entity table, and the legacy
//!   names that table lists without a semicolon (`&amp`, `&nbsp`, `&lt`, ...)
//!   are decoded without one
//! - numeric references (`&#38;`, `&#x26;`) may omit the semicolon; C1 code
//!   points are read as windows-1252, and invalid code points become U+FFFD
//! - anything else is left untouched

use std::borrow::Cow;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;

/// Entity name (with its leading `&` and optional `;`) to replacement text.
static NAMED_REFERENCES: LazyLock<FxHashMap<&'static str, &'static str>> = LazyLock::new(|| {
    entities::ENTITIES
        .iter()
        .map(|entity| (entity.entity, entity.characters))
        .collect()
});

const REPLACEMENT: char = '\u{FFFD}';

/// Decode every character reference in `text`.
///
/// Returns the input unchanged (and unallocated) when it holds no `&`.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let reference = &rest[pos..];
        let consumed = decode_reference(reference, &mut out).unwrap_or_else(|| {
            out.push('&');
            1
        });
        rest = &reference[consumed..];
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Decode the reference at the start of `text` (which begins with `&`) into
/// `out`, returning the number of bytes consumed.
fn decode_reference(text: &str, out: &mut String) -> Option<usize> {
    let body = &text[1..];

    if let Some(numeric) = body.strip_prefix('#') {
        let (digits, radix, prefix) = match numeric.strip_prefix(|c: char| c == 'x' || c == 'X') {
            Some(hex) => (leading(hex, |b| b.is_ascii_hexdigit()), 16, 3),
            None => (leading(numeric, |b| b.is_ascii_digit()), 10, 2),
        };
        if digits.is_empty() {
            return None;
        }
        out.push(numeric_char(u32::from_str_radix(digits, radix).ok()));
        let len = prefix + digits.len();
        return Some(len + usize::from(text[len..].starts_with(';')));
    }

    let name = leading(body, |b| b.is_ascii_alphanumeric());
    if name.is_empty() {
        return None;
    }
    let len = 1 + name.len();
    let len = len + usize::from(text[len..].starts_with(';'));
    let characters = NAMED_REFERENCES.get(&text[..len])?;
    out.push_str(characters);
    Some(len)
}

/// The longest prefix of `text` whose bytes all satisfy `pred`.
fn leading(text: &str, pred: impl Fn(u8) -> bool) -> &str {
    let end = text.bytes().position(|b| !pred(b)).unwrap_or(text.len());
    &text[..end]
}

/// Resolve a numeric reference. `None` stands for a value too large to parse.
fn numeric_char(code: Option<u32>) -> char {
    match code {
        Some(code) => windows_1252(code)
            .or_else(|| char::from_u32(code))
            .unwrap_or(REPLACEMENT),
        None => REPLACEMENT,
    }
}

/// Remapped numeric references: NUL and the C1 controls windows-1252 assigns.
fn windows_1252(code: u32) -> Option<char> {
    let ch = match code {
        0x00 => REPLACEMENT,
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '•',
        0x96 => '–',
        0x97 => '\u{2014}',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        _ => return None,
    };
    Some(ch)
}
