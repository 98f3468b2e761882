//! ISO 639 language code lookup for stream language tags.

// (ISO 639-1, ISO 639-2/B, ISO 639-2/T, English name)
static LANGUAGES: &[(&str, &str, &str, &str)] = &[
    ("ar", "ara", "ara", "Arabic"),
    ("bg", "bul", "bul", "Bulgarian"),
    ("ca", "cat", "cat", "Catalan"),
    ("cs", "cze", "ces", "Czech"),
    ("da", "dan", "dan", "Danish"),
    ("de", "ger", "deu", "German"),
    ("el", "gre", "ell", "Greek"),
    ("en", "eng", "eng", "English"),
    ("es", "spa", "spa", "Spanish"),
    ("et", "est", "est", "Estonian"),
    ("eu", "baq", "eus", "Basque"),
    ("fa", "per", "fas", "Persian"),
    ("fi", "fin", "fin", "Finnish"),
    ("fr", "fre", "fra", "French"),
    ("ga", "gle", "gle", "Irish"),
    ("gl", "glg", "glg", "Galician"),
    ("he", "heb", "heb", "Hebrew"),
    ("hi", "hin", "hin", "Hindi"),
    ("hr", "hrv", "hrv", "Croatian"),
    ("hu", "hun", "hun", "Hungarian"),
    ("id", "ind", "ind", "Indonesian"),
    ("is", "ice", "isl", "Icelandic"),
    ("it", "ita", "ita", "Italian"),
    ("ja", "jpn", "jpn", "Japanese"),
    ("ko", "kor", "kor", "Korean"),
    ("lt", "lit", "lit", "Lithuanian"),
    ("lv", "lav", "lav", "Latvian"),
    ("ms", "may", "msa", "Malay"),
    ("nb", "nob", "nob", "Norwegian Bokmål"),
    ("nl", "dut", "nld", "Dutch"),
    ("no", "nor", "nor", "Norwegian"),
    ("pl", "pol", "pol", "Polish"),
    ("pt", "por", "por", "Portuguese"),
    ("ro", "rum", "ron", "Romanian"),
    ("ru", "rus", "rus", "Russian"),
    ("sk", "slo", "slk", "Slovak"),
    ("sl", "slv", "slv", "Slovenian"),
    ("sr", "srp", "srp", "Serbian"),
    ("sv", "swe", "swe", "Swedish"),
    ("th", "tha", "tha", "Thai"),
    ("tr", "tur", "tur", "Turkish"),
    ("uk", "ukr", "ukr", "Ukrainian"),
    ("vi", "vie", "vie", "Vietnamese"),
    ("zh", "chi", "zho", "Chinese"),
];

/// English name for a two or three letter language code, case
/// insensitive. Region suffixes (`en-US`, `pt_BR`) are ignored.
pub fn language_name(code: &str) -> Option<&'static str> {
    let base = code
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or(code)
        .to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(two, bibliographic, terminology, _)| {
            *two == base || *bibliographic == base || *terminology == base
        })
        .map(|(_, _, _, name)| *name)
}
