use wana_kana::ConvertJapanese;

use super::japanese::is_string_entirely_kana;

/// Convert Romaji to Kana.
/// lowercase text will result in Hiragana,
/// and UPPERCASE text will result in Katakana.
pub fn convert_to_kana<T: AsRef<str>>(text: T) -> String {
    text.as_ref().to_kana()
}

/// Readings typed at the console may be romaji (`kanashibu`) or kana;
/// kana passes through untouched.
pub fn reading_from_input<T: AsRef<str>>(input: T) -> String {
    let input = input.as_ref().trim();
    if input.is_empty() || is_string_entirely_kana(input) {
        return input.to_string();
    }
    if input.is_ascii() {
        return convert_to_kana(input);
    }
    input.to_string()
}
