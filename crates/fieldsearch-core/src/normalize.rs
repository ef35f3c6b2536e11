//! Text canonicalization applied to weighted fields and query text.
//!
//! `normalize` is the searchable form of a string: NFD with combining marks
//! dropped, lowercased, punctuation turned into word breaks, whitespace
//! collapsed. Apostrophes are removed rather than split on so that
//! "don't" and "dont" meet.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips tags and decodes entities from an HTML fragment.
///
/// Bridge utility for callers that only have markup; it is not part of the
/// ranking contract and makes no attempt at layout fidelity.
pub fn extract_plain_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(pos) = rest.find(['<', '&']) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        if rest.starts_with('<') {
            let Some(end) = rest.find('>') else {
                // Dangling '<' is text.
                out.push_str(rest);
                return collapse(&out);
            };
            let tag = &rest[1..end];
            let name = tag_name(tag);
            rest = &rest[end + 1..];
            if matches!(name.as_str(), "script" | "style") && !tag.starts_with('/') {
                let closing = format!("</{name}");
                rest = match find_ignore_ascii_case(rest, &closing) {
                    Some(close) => rest[close..].find('>').map_or("", |gt| &rest[close + gt + 1..]),
                    None => "",
                };
            }
            if is_block(&name) {
                out.push(' ');
            }
        } else {
            let (decoded, consumed) = decode_entity(rest);
            out.push_str(&decoded);
            rest = &rest[consumed..];
        }
    }
    out.push_str(rest);
    collapse(&out)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "br" | "p" | "div" | "li" | "ul" | "ol" | "tr" | "td" | "th" | "table" | "section"
            | "article" | "header" | "footer" | "blockquote" | "pre" | "hr"
            | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

/// Decodes the entity at the start of `input` (which begins with '&').
/// Returns the replacement text and the number of bytes consumed.
fn decode_entity(input: &str) -> (String, usize) {
    let Some(semi) = input.char_indices().take(12).find(|(_, c)| *c == ';').map(|(i, _)| i) else {
        return ("&".to_string(), 1);
    };
    let body = &input[1..semi];
    let named = match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    };
    let decoded = named.or_else(|| {
        let num = body.strip_prefix('#')?;
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        char::from_u32(code)
    });
    match decoded {
        Some(c) => (c.to_string(), semi + 1),
        None => ("&".to_string(), 1),
    }
}
