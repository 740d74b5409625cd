use subgen::domain::{DEFAULT_LANGUAGE, detect_language};

const THRESHOLD: f64 = 0.3;

#[test]
fn given_mostly_chinese_text_when_detecting_then_returns_zh() {
    assert_eq!(detect_language("今天天气很好 ok", THRESHOLD), "zh");
}

#[test]
fn given_ascii_text_when_detecting_then_returns_en() {
    assert_eq!(detect_language("Hello world, 42 times!", THRESHOLD), "en");
}

#[test]
fn given_kana_text_when_detecting_then_returns_ja() {
    assert_eq!(detect_language("こんにちは world", THRESHOLD), "ja");
}

#[test]
fn given_hangul_text_when_detecting_then_returns_ko() {
    assert_eq!(detect_language("안녕하세요 world", THRESHOLD), "ko");
}

#[test]
fn given_empty_text_when_detecting_then_returns_default() {
    assert_eq!(detect_language("   ", THRESHOLD), DEFAULT_LANGUAGE);
}

#[test]
fn given_cyrillic_text_when_detecting_then_falls_back_to_default() {
    assert_eq!(detect_language("привет", THRESHOLD), DEFAULT_LANGUAGE);
}

#[test]
fn given_few_ideographs_below_threshold_when_detecting_then_script_rules_apply() {
    // 2 ideographs out of 12 characters
    assert_eq!(detect_language("こんにちは世界ですよねえ", 0.5), "ja");
}
