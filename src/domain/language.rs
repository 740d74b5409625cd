/// Language tag used whenever detection has nothing better to offer.
pub const DEFAULT_LANGUAGE: &str = "zh";

/// Guesses a language tag from the script mix of a transcript.
///
/// Text whose share of CJK ideographs exceeds `chinese_ratio_threshold`
/// (measured over non-whitespace characters) is `zh`. Otherwise ASCII-only
/// text is `en`, text containing kana is `ja` and text containing hangul is
/// `ko`. Anything else falls back to `zh`.
pub fn detect_language(text: &str, chinese_ratio_threshold: f64) -> &'static str {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return DEFAULT_LANGUAGE;
    }

    let cjk = text.chars().filter(|c| is_cjk_ideograph(*c)).count();
    if cjk as f64 / total as f64 > chinese_ratio_threshold {
        return "zh";
    }

    if text.chars().all(is_latin_or_symbol) {
        "en"
    } else if text.chars().any(is_kana) {
        "ja"
    } else if text.chars().any(is_hangul) {
        "ko"
    } else {
        DEFAULT_LANGUAGE
    }
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30ff}').contains(&c)
}

fn is_hangul(c: char) -> bool {
    ('\u{ac00}'..='\u{d7af}').contains(&c)
}

// ASCII letters, any digit, whitespace, or anything that is not a word character.
fn is_latin_or_symbol(c: char) -> bool {
    c.is_ascii_alphabetic()
        || c.is_numeric()
        || c.is_whitespace()
        || !(c.is_alphanumeric() || c == '_')
}
