//! Flattening of a schedule page into reading-order text lines.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Turns a raw page into the ordered line sequence the resolver searches.
pub trait LineExtractor: Send + Sync {
    /// Non-empty, whitespace-collapsed text fragments in reading order.
    fn lines(&self, raw: &str) -> Vec<String>;
}

/// Splits HTML at every tag, so each text run between tags becomes one line.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLines;

static HIDDEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>",
    )
    .expect("invalid hidden-content regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[/!?A-Za-z][^>]*>").expect("invalid tag regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z]{2,8});")
        .expect("invalid entity regex")
});
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("invalid space regex"));

impl LineExtractor for HtmlLines {
    fn lines(&self, raw: &str) -> Vec<String> {
        let visible = HIDDEN_RE.replace_all(raw, " ");
        TAG_RE
            .split(&visible)
            .map(decode_entities)
            .map(|fragment| SPACE_RE.replace_all(&fragment, " ").trim().to_string())
            .filter(|fragment| !fragment.is_empty())
            .collect()
    }
}

fn decode_entities(fragment: &str) -> String {
    ENTITY_RE
        .replace_all(fragment, |caps: &Captures| {
            decode_entity(&caps[1])
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let value = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return match value {
            160 => Some(' '),
            other => char::from_u32(other),
        };
    }

    let decoded = match entity.to_ascii_lowercase().as_str() {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" | "ldquo" | "rdquo" => '"',
        "apos" | "lsquo" | "rsquo" => '\'',
        "nbsp" | "thinsp" | "ensp" | "emsp" => ' ',
        "ndash" | "mdash" => '-',
        "hellip" => '.',
        "eacute" => 'é',
        "uuml" => 'ü',
        _ => return None,
    };
    Some(decoded)
}
