//! Prompt language detection.
//!
//! The engine only needs to know whether a prompt is already in the
//! translation target language. Detection is a pure function of the text.

/// Language code of English, the default translation target.
pub const LANG_ENGLISH: &str = "en";

/// Typographic punctuation that commonly appears in English text pasted
/// from editors: curly quotes, dashes and the ellipsis.
const ENGLISH_PUNCTUATION: &[char] = &[
    '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2013}', '\u{2014}', '\u{2026}',
];

/// Decides whether a text is written in a given language.
pub trait LanguageDetector: Send + Sync {
    fn is_language(&self, text: &str, language: &str) -> bool;
}

/// Character-set heuristic that recognises English only.
///
/// For any other language code it answers `false`, so non-English
/// targets always go through translation.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishDetector;

impl LanguageDetector for EnglishDetector {
    fn is_language(&self, text: &str, language: &str) -> bool {
        language.eq_ignore_ascii_case(LANG_ENGLISH) && is_english(text)
    }
}

/// `true` when every character is ASCII or English typographic punctuation.
pub fn is_english(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii() || ENGLISH_PUNCTUATION.contains(&c))
}
