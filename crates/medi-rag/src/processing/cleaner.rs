//! Plain-text normalization for upstream content.
//!
//! Everything a source adapter puts into a `SourceResult` goes through
//! `clean_text`: markup stripped, entities decoded, `[n]` citation markers
//! removed, whitespace collapsed, and the result bounded in length.

use std::sync::LazyLock;

const ELLIPSIS: &str = "...";

static CITATION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\[\d+\]").expect("citation regex is valid")
});

/// Tags that force a word break when removed.
const BLOCK_TAGS: &[&str] = &[
    "p", "/p", "div", "/div", "br", "li", "/li", "tr", "/tr", "td", "th", "h1", "h2", "h3",
    "h4", "h5", "h6",
];

/// Full cleaning pipeline, bounded to `max_chars` characters (plus an
/// ellipsis when something was cut).
pub fn clean_text(raw: &str, max_chars: usize) -> String {
    let text = strip_html(raw);
    let text = remove_citations(&text);
    let text = normalize_whitespace(&text);
    truncate_chars(&text, max_chars)
}

/// Strip HTML tags and decode entities, returning visible text content.
///
/// `<script>` and `<style>` bodies are dropped entirely. A `<` that does not
/// open a tag is kept as text.
pub fn strip_html(html: &str) -> String {
    let chars: Vec<char> = html.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(html.len());
    let mut i = 0;

    while i < len {
        let ch = chars[i];

        if ch == '<' && opens_tag(&chars, i) {
            if let Some(block) = ["script", "style"]
                .iter()
                .find(|name| starts_with_ci(&chars, i + 1, name))
            {
                let closing = format!("</{}", block);
                i = match find_ci(&chars, i + 1, &closing) {
                    Some(pos) => skip_past(&chars, pos, '>'),
                    None => len,
                };
                result.push(' ');
                continue;
            }

            if BLOCK_TAGS.iter().any(|tag| is_tag_named(&chars, i + 1, tag)) {
                result.push(' ');
            }
            i = skip_past(&chars, i, '>');
            continue;
        }

        if ch == '&' {
            if let Some((decoded, consumed)) = decode_entity(&chars, i) {
                result.push(decoded);
                i += consumed;
                continue;
            }
        }

        result.push(ch);
        i += 1;
    }

    normalize_whitespace(&result)
}

/// Remove inline citation markers such as `[12]`.
pub fn remove_citations(text: &str) -> String {
    CITATION_RE.replace_all(text, "").into_owned()
}

/// Collapse every whitespace run (newlines included) to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_chars` characters on a char boundary,
/// appending `...` when anything was removed.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let mut cut = text[..byte_idx].trim_end().to_string();
            cut.push_str(ELLIPSIS);
            cut
        }
    }
}

/// First `max_sentences` sentences of `text`. A sentence ends at `.`, `!`
/// or `?` followed by whitespace or end of input. Text with fewer sentences
/// is returned whole.
pub fn extract_summary(text: &str, max_sentences: usize) -> String {
    if max_sentences == 0 {
        return String::new();
    }

    let mut found = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars
            .peek()
            .map(|(_, next)| next.is_whitespace())
            .unwrap_or(true);
        if at_boundary {
            found += 1;
            if found == max_sentences {
                return text[..idx + c.len_utf8()].trim().to_string();
            }
        }
    }

    text.trim().to_string()
}

fn opens_tag(chars: &[char], i: usize) -> bool {
    chars
        .get(i + 1)
        .map(|c| c.is_ascii_alphabetic() || *c == '/' || *c == '!')
        .unwrap_or(false)
}

fn starts_with_ci(chars: &[char], start: usize, pattern: &str) -> bool {
    let mut idx = start;
    for p in pattern.chars() {
        match chars.get(idx) {
            Some(c) if c.to_ascii_lowercase() == p => idx += 1,
            _ => return false,
        }
    }
    true
}

/// `<name` followed by a delimiter, so `<p>` matches "p" but `<pre>` does not.
fn is_tag_named(chars: &[char], start: usize, name: &str) -> bool {
    starts_with_ci(chars, start, name)
        && chars
            .get(start + name.chars().count())
            .map(|c| c.is_whitespace() || *c == '>' || *c == '/')
            .unwrap_or(true)
}

fn find_ci(chars: &[char], from: usize, pattern: &str) -> Option<usize> {
    (from..chars.len()).find(|&i| starts_with_ci(chars, i, pattern))
}

fn skip_past(chars: &[char], from: usize, target: char) -> usize {
    chars[from..]
        .iter()
        .position(|&c| c == target)
        .map(|p| from + p + 1)
        .unwrap_or(chars.len())
}

fn decode_entity(chars: &[char], start: usize) -> Option<(char, usize)> {
    let semicolon = chars[start + 1..]
        .iter()
        .take(10)
        .position(|&c| c == ';')?;
    let end = start + 1 + semicolon;
    let name: String = chars[start + 1..end].iter().collect();

    let decoded = match name.as_str() {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "eacute" => 'é',
        "egrave" => 'è',
        "ecirc" => 'ê',
        "agrave" => 'à',
        "ccedil" => 'ç',
        "ocirc" => 'ô',
        "laquo" => '«',
        "raquo" => '»',
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(|c| c == 'x' || c == 'X') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };

    Some((decoded, end - start + 1))
}
