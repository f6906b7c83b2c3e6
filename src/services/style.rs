//! Font style inference from file names.
//!
//! Both the token-scan (`infer_style`) and the loose strip pass
//! (`base_family_name`) derive from the same token table so the two can
//! never drift apart on which keywords count as a style.

use regex::Regex;
use std::sync::OnceLock;

/// Recognized style keywords and their canonical display forms.
const STYLE_TOKENS: [(&str, &str); 11] = [
    ("thin", "Thin"),
    ("extralight", "ExtraLight"),
    ("light", "Light"),
    ("regular", "Regular"),
    ("medium", "Medium"),
    ("semibold", "SemiBold"),
    ("bold", "Bold"),
    ("extrabold", "ExtraBold"),
    ("black", "Black"),
    ("italic", "Italic"),
    ("bolditalic", "Bold Italic"),
];

pub const DEFAULT_STYLE: &str = "Regular";

/// Infer a style label from a font file name.
///
/// Strips the extension, splits on `-`, `_`, and space, then scans tokens
/// from the end toward the start. The first token matching a recognized
/// keyword (case-insensitively) wins; unmatched names default to "Regular".
///
/// `infer_style("Grotesk-Extra-Bold-Italic.otf")` is "Italic": the scan
/// runs backward and `italic` is hit before `bold`.
pub fn infer_style(file_name: &str) -> &'static str {
    let stem = strip_extension(file_name);
    for token in stem.split(['-', '_', ' ']).rev() {
        if token.is_empty() {
            continue;
        }
        if let Some((_, canonical)) = STYLE_TOKENS
            .iter()
            .find(|(keyword, _)| token.eq_ignore_ascii_case(keyword))
        {
            return canonical;
        }
    }
    DEFAULT_STYLE
}

/// Strip the style suffix from a font file name, leaving the family name.
///
/// Looser than the token scan: removes the first style keyword substring
/// found anywhere in the name (one case-insensitive pass, together with a
/// single leading separator), then trims. `"AuroraBold.otf"` becomes
/// `"Aurora"` here even though `infer_style` sees no style token in it.
pub fn base_family_name(file_name: &str) -> String {
    let stem = strip_extension(file_name);
    style_strip_re().replacen(stem, 1, "").trim().to_string()
}

/// Derive a URL-safe slug from a human-entered product name.
///
/// Lowercases, spells out `&` as "and", drops everything that is not
/// alphanumeric, hyphen, or whitespace, then collapses whitespace runs to
/// single hyphens.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase().replace('&', "and");
    let cleaned: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Drop the file extension, if any. A leading dot is not an extension.
fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(index) if index > 0 => &file_name[..index],
        _ => file_name,
    }
}

fn style_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Longest keywords first so `extralight` is not clipped to `light`.
        let mut keywords: Vec<&str> = STYLE_TOKENS.iter().map(|(keyword, _)| *keyword).collect();
        keywords.sort_by_key(|keyword| std::cmp::Reverse(keyword.len()));
        let pattern = format!("(?i)[-_ ]?({})", keywords.join("|"));
        Regex::new(&pattern).expect("style strip pattern is valid")
    })
}
