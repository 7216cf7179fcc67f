//! Language name to ISO-639-1 mapping.

/// (ISO-639-1, English name, ISO-639-2 codes)
const LANGUAGES: &[(&str, &str, &[&str])] = &[
    ("en", "english", &["eng"]),
    ("de", "german", &["ger", "deu"]),
    ("fr", "french", &["fre", "fra"]),
    ("es", "spanish", &["spa"]),
    ("it", "italian", &["ita"]),
    ("pt", "portuguese", &["por"]),
    ("nl", "dutch", &["dut", "nld"]),
    ("sv", "swedish", &["swe"]),
    ("no", "norwegian", &["nor"]),
    ("da", "danish", &["dan"]),
    ("fi", "finnish", &["fin"]),
    ("pl", "polish", &["pol"]),
    ("ru", "russian", &["rus"]),
    ("uk", "ukrainian", &["ukr"]),
    ("cs", "czech", &["cze", "ces"]),
    ("hu", "hungarian", &["hun"]),
    ("ro", "romanian", &["rum", "ron"]),
    ("el", "greek", &["gre", "ell"]),
    ("tr", "turkish", &["tur"]),
    ("ar", "arabic", &["ara"]),
    ("he", "hebrew", &["heb"]),
    ("hi", "hindi", &["hin"]),
    ("ja", "japanese", &["jpn"]),
    ("zh", "chinese", &["chi", "zho"]),
    ("ko", "korean", &["kor"]),
];

/// Map a language name or code to its two-letter ISO-639-1 code.
///
/// Accepts English names ("English"), ISO-639-2 codes ("eng"), and
/// two-letter codes, optionally with a region suffix ("en-US").
pub fn to_iso639_1(language: &str) -> Option<String> {
    let lower = language.trim().to_lowercase();
    let base = lower
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() {
        return None;
    }

    LANGUAGES
        .iter()
        .find(|(code, name, alt)| *code == base || *name == base || alt.contains(&base))
        .map(|(code, _, _)| code.to_string())
}
