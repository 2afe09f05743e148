//! Small text helpers for working with raw page markup.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>")
        .expect("script/style pattern")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").expect("entity pattern")
});

/// Remove tags, keeping their text. Script and style bodies are dropped.
pub fn strip_tags(markup: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(markup, " ");
    TAG.replace_all(&without_code, " ").into_owned()
}

/// Decode the entities that show up in the archive's pages.
///
/// Unknown named entities are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let entity = &caps[1];
            decode_entity(entity).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from);
    }

    let c = match entity {
        "nbsp" => ' ',
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "aacute" => 'á',
        "eacute" => 'é',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "Aacute" => 'Á',
        "Eacute" => 'É',
        "Iacute" => 'Í',
        "Oacute" => 'Ó',
        "Uacute" => 'Ú',
        "ntilde" => 'ñ',
        "Ntilde" => 'Ñ',
        "uuml" => 'ü',
        "Uuml" => 'Ü',
        "iquest" => '¿',
        "iexcl" => '¡',
        "ordm" => 'º',
        "ordf" => 'ª',
        "deg" => '°',
        "laquo" => '«',
        "raquo" => '»',
        "ndash" => '–',
        "mdash" => '—',
        _ => return None,
    };
    Some(c.to_string())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tag-stripped, entity-decoded, whitespace-collapsed text.
pub fn clean_text(markup: &str) -> String {
    collapse_whitespace(&decode_entities(&strip_tags(markup)))
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Escape text for inclusion in generated markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Whether byte offset `pos` falls inside a tag (between `<` and `>`).
pub fn is_inside_tag(markup: &str, pos: usize) -> bool {
    let before = &markup[..floor_char_boundary(markup, pos)];
    match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Largest char boundary not after `idx`.
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut idx = idx;
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let markup = "<h2 class=\"tema\">ACCI&Oacute;N&nbsp;DE   <b>TUTELA</b></h2><script>var x = '<b>';</script>";
        assert_eq!(clean_text(markup), "ACCIÓN DE TUTELA");
        assert_eq!(decode_entities("&#233;&#xF1;&bogus;"), "éñ&bogus;");
    }

    #[test]
    fn test_truncate_respects_chars() {
        assert_eq!(truncate_chars("educación", 8), "educació");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_is_inside_tag() {
        let markup = r#"<a href="/relatoria/2025/T-322-25.htm">T-322/25</a>"#;
        let in_attr = markup.find("T-322-25").unwrap();
        let in_text = markup.find("T-322/25").unwrap();
        assert!(is_inside_tag(markup, in_attr));
        assert!(!is_inside_tag(markup, in_text));
    }

    #[test]
    fn test_char_boundaries() {
        let text = "aé b";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 3), 3);
        assert_eq!(floor_char_boundary(text, 100), text.len());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
