use crate::config::EngineVariant;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static MARKUP_CHAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[|\-#*]").expect("static regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static PROMPT_ECHO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:User:\s*OCR:?\s*Assistant:\s*)+").expect("static regex")
});

/// Reduces raw engine output to comparable plain text.
///
/// The result never has leading/trailing whitespace or internal runs of more
/// than one space, and `normalize(normalize(s, v), v) == normalize(s, v)`.
pub fn normalize(raw: &str, variant: EngineVariant) -> String {
    match variant {
        EngineVariant::Markdown => normalize_markdown(raw),
        EngineVariant::PromptEcho => {
            let body = strip_prompt_echo(raw);
            // Markup inside the echo can hide a second prefix until tags are gone.
            strip_prompt_echo(&normalize_markdown(body)).to_string()
        }
    }
}

/// Drops HTML tags and the markdown characters `| - # *`, then collapses whitespace.
pub fn normalize_markdown(raw: &str) -> String {
    let text = TAG_RE.replace_all(raw, " ");
    let text = MARKUP_CHAR_RE.replace_all(&text, " ");
    collapse_whitespace(&text)
}

pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s, " ").trim().to_string()
}

/// Removes a leading `User: OCR: Assistant:` chat echo, case-insensitively.
pub fn strip_prompt_echo(raw: &str) -> &str {
    match PROMPT_ECHO_RE.find(raw) {
        Some(m) => &raw[m.end()..],
        None => raw,
    }
}

pub fn nfkc(s: &str) -> String {
    s.nfkc().collect()
}
