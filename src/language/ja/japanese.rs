use std::sync::LazyLock;

use fancy_regex::Regex;

use crate::language::cjk_utils::{
    is_cjk_ideograph, is_code_point_in_range, is_code_point_in_ranges, CodepointRange,
};

pub const KATAKANA_SMALL_KA_CODE_POINT: u32 = 0x30f5;
pub const KATAKANA_SMALL_KE_CODE_POINT: u32 = 0x30f6;
pub const KANA_PROLONGED_SOUND_MARK_CODE_POINT: u32 = 0x30fc;

pub const HIRAGANA_CONVERSION_RANGE: CodepointRange = (0x3041, 0x3096);
pub const KATAKANA_CONVERSION_RANGE: CodepointRange = (0x30a1, 0x30f6);

pub const HIRAGANA_RANGES: &[CodepointRange] = &[
    (0x3041, 0x3096),
    (0x309d, 0x309f),
    (0x1b001, 0x1b11f), // Kana Supplement / Extended-A hentaigana
    (0x1b132, 0x1b132), // small ko
    (0x1b150, 0x1b152), // small wi, we, wo
];

pub const KATAKANA_RANGES: &[CodepointRange] = &[
    (0x30a1, 0x30fa),
    (0x30fc, 0x30ff), // includes the prolonged sound mark
    (0x31f0, 0x31ff), // Katakana Phonetic Extensions
    (0xff66, 0xff9d), // Halfwidth katakana
    (0x1aff0, 0x1afff), // Kana Extended-B
    (0x1b000, 0x1b000),
    (0x1b120, 0x1b122),
    (0x1b155, 0x1b155),
    (0x1b164, 0x1b167),
];

static NON_HEADWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^・ー\p{Han}\p{Hiragana}\p{Katakana}]").expect("static headword pattern")
});

static NON_READING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^ー\p{Hiragana}\p{Katakana}]").expect("static reading pattern"));

pub fn is_char_hiragana(c: char) -> bool {
    is_code_point_in_ranges(c as u32, HIRAGANA_RANGES)
}

pub fn is_char_katakana(c: char) -> bool {
    is_code_point_in_ranges(c as u32, KATAKANA_RANGES)
}

pub fn is_char_kana(c: char) -> bool {
    is_char_hiragana(c) || is_char_katakana(c)
}

pub fn is_string_entirely_kana<T: AsRef<str>>(str: T) -> bool {
    let str = str.as_ref();
    !str.is_empty() && str.chars().all(is_char_kana)
}

pub fn is_string_entirely_katakana<T: AsRef<str>>(str: T) -> bool {
    let str = str.as_ref();
    !str.is_empty() && str.chars().all(is_char_katakana)
}

pub fn contains_ideograph<T: AsRef<str>>(str: T) -> bool {
    str.as_ref().chars().any(is_cjk_ideograph)
}

pub fn ideograph_count<T: AsRef<str>>(str: T) -> usize {
    str.as_ref().chars().filter(|&c| is_cjk_ideograph(c)).count()
}

/// Everything in a kanji-bearing key that is not an ideograph (its okurigana).
///
/// `哀しぶ` -> `しぶ`, `額突き虫` -> `き`, `三台` -> ``
pub fn okurigana_residue<T: AsRef<str>>(str: T) -> String {
    str.as_ref().chars().filter(|&c| !is_cjk_ideograph(c)).collect()
}

/// Length in characters of the longest common suffix.
pub fn longest_common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Length in characters of the longest common prefix.
pub fn longest_common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Prolonged sound marks are kept as-is; `ヵ`/`ヶ` have no hiragana form.
pub fn convert_katakana_to_hiragana<T: AsRef<str>>(text: T) -> String {
    let offset = HIRAGANA_CONVERSION_RANGE.0 - KATAKANA_CONVERSION_RANGE.0;
    text.as_ref()
        .chars()
        .map(|c| match c as u32 {
            KATAKANA_SMALL_KA_CODE_POINT | KATAKANA_SMALL_KE_CODE_POINT => c,
            cp if is_code_point_in_range(cp, KATAKANA_CONVERSION_RANGE) => {
                char::from_u32(cp - offset).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

pub fn convert_hiragana_to_katakana<T: AsRef<str>>(text: T) -> String {
    let offset = KATAKANA_CONVERSION_RANGE.0 - HIRAGANA_CONVERSION_RANGE.0;
    text.as_ref()
        .chars()
        .map(|c| {
            let cp = c as u32;
            if is_code_point_in_range(cp, HIRAGANA_CONVERSION_RANGE) {
                char::from_u32(cp + offset).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

/// Strips everything but ideographs, kana, `ー` and the `・` separator.
pub fn clean_headword<T: AsRef<str>>(text: T) -> String {
    NON_HEADWORD_PATTERN
        .replace_all(text.as_ref(), "")
        .into_owned()
}

/// Strips everything but kana and `ー`.
pub fn clean_reading<T: AsRef<str>>(text: T) -> String {
    NON_READING_PATTERN
        .replace_all(text.as_ref(), "")
        .into_owned()
}

/// Mirrors the "is this only digits" check used to avoid linking bare
/// reference numbers; full-width digits count too.
pub fn is_numeric_text<T: AsRef<str>>(text: T) -> bool {
    let text = text.as_ref();
    !text.is_empty() && text.chars().all(char::is_numeric)
}
