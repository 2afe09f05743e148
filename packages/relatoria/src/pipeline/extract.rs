//! Pattern extraction - finds rulings in whatever a strategy returned.
//!
//! The extractor never looks at which strategy produced a payload. Markup is
//! scanned for ruling codes in text content; structured payloads are walked
//! for the field names the archive's search backend uses.
//!
//! For markup, each code gets:
//! - links from the nearest archive anchor (enclosing, or following it
//!   before the next code), or from the archive naming convention
//! - a topic and sub-topic from the headings, `tema`/`subtema` elements and
//!   labelled lines found in a window before it
//!
//! Extraction never fails. Content without codes yields an empty list.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::pipeline::markup::{self, clean_text, floor_char_boundary, is_inside_tag};
use crate::site;
use crate::types::payload::{PayloadBody, RawPayload};
use crate::types::ruling::{ExtractedRuling, RulingCode, RulingRecord, RULING_CODE, UNCATEGORIZED};

/// Maximum topic length in characters.
pub const TOPIC_MAX_CHARS: usize = 200;

/// Maximum sub-topic length in characters.
pub const SUBTOPIC_MAX_CHARS: usize = 300;

/// Rank of a `tema` element or `Tema:` line; outranks every heading.
const TOPIC_RANK: u8 = 0;

/// Rank of a `subtema` element or `Subtema:` line; below every heading.
const SUBTOPIC_RANK: u8 = 7;

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
        .expect("anchor pattern")
});

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("heading pattern")
});

static CLASS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<(?:div|span|p|td|th|li|section|strong|b|label)\b[^>]*?\bclass\s*=\s*["'][^"']*?\b(subtema|tema)\b[^"']*["'][^>]*>(.*?)</[a-z]+\s*>"#,
    )
    .expect("class block pattern")
});

static LABELLED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:^|>)[ \t]*(Tema|Materia|Asunto|Subtema|Descripci[oó]n|Resumen)[ \t]*:[ \t]*([^<\r\n]+)")
        .expect("labelled line pattern")
});

/// A piece of topical context found in the markup.
#[derive(Debug, Clone)]
struct ContextBlock {
    start: usize,
    end: usize,
    rank: u8,
    text: String,
}

#[derive(Debug, Clone)]
struct Anchor {
    start: usize,
    end: usize,
    href: String,
}

/// Strategy-agnostic ruling extractor.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    base_url: String,
    context_window: usize,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new(site::BASE_URL)
    }
}

impl PatternExtractor {
    /// Create an extractor resolving links against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            context_window: 4000,
        }
    }

    /// Set how many bytes around a code are searched for links and headings.
    pub fn with_context_window(mut self, bytes: usize) -> Self {
        self.context_window = bytes.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Extract rulings from a payload.
    pub fn extract(&self, payload: &RawPayload) -> Vec<ExtractedRuling> {
        let rulings = match &payload.body {
            PayloadBody::Markup(markup) => self.extract_markup(markup),
            PayloadBody::Structured(value) => self.extract_structured(value),
        };
        debug!(
            strategy = %payload.strategy,
            source = %payload.source_url,
            rulings = rulings.len(),
            "Extracted rulings from payload"
        );
        rulings
    }

    /// Extract rulings from page markup.
    pub fn extract_markup(&self, markup: &str) -> Vec<ExtractedRuling> {
        let codes: Vec<(usize, usize, RulingCode)> = RULING_CODE
            .captures_iter(markup)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if is_inside_tag(markup, whole.start()) {
                    return None;
                }
                Some((whole.start(), whole.end(), RulingCode::from_captures(&caps)))
            })
            .collect();

        if codes.is_empty() {
            return Vec::new();
        }

        let anchors = collect_anchors(markup);
        let blocks = collect_blocks(markup);

        codes
            .iter()
            .enumerate()
            .map(|(i, (start, end, code))| {
                let next_code = codes.get(i + 1).map(|(s, _, _)| *s).unwrap_or(markup.len());
                let record = self.link_record(markup, code, *start, *end, next_code, &anchors);
                let (topic, subtopic) = self.context_for(markup, *start, &blocks);
                ExtractedRuling::new(topic, subtopic, record)
            })
            .collect()
    }

    fn link_record(
        &self,
        markup: &str,
        code: &RulingCode,
        start: usize,
        end: usize,
        next_code: usize,
        anchors: &[Anchor],
    ) -> RulingRecord {
        let window_start = floor_char_boundary(markup, start.saturating_sub(self.context_window));
        let forward_limit = next_code.min(end.saturating_add(self.context_window));
        let stem = code.file_stem().to_ascii_lowercase();

        let in_window = |a: &&Anchor| a.start >= window_start && a.start < forward_limit;
        let is_marker = |a: &&Anchor| a.href.to_ascii_lowercase().contains(site::ARCHIVE_MARKER);

        // Preference: an href naming this ruling's file, then the enclosing
        // anchor, then the first archive anchor after the code that closes
        // before the next code starts.
        let mut candidates: Vec<&Anchor> = anchors
            .iter()
            .filter(in_window)
            .filter(|a| a.href.to_ascii_lowercase().contains(&stem))
            .collect();
        candidates.extend(
            anchors
                .iter()
                .filter(|a| a.start <= start && a.end >= end)
                .filter(is_marker),
        );
        candidates.extend(
            anchors
                .iter()
                .filter(|a| a.start >= end && a.end <= forward_limit)
                .filter(is_marker),
        );

        let html = candidates
            .iter()
            .find(|a| !site::is_pdf_link(&a.href))
            .map(|a| site::normalize_url(&self.base_url, &a.href));
        let pdf = candidates
            .iter()
            .find(|a| site::is_pdf_link(&a.href))
            .map(|a| site::normalize_url(&self.base_url, &a.href));

        let (convention_html, convention_pdf) = code.convention_links(&self.base_url);
        let (html, pdf) = match (html, pdf) {
            (Some(html), Some(pdf)) => (html, pdf),
            (Some(html), None) => {
                let pdf = site::pdf_from_html(&html);
                (html, pdf)
            }
            (None, Some(pdf)) => (convention_html, pdf),
            (None, None) => (convention_html, convention_pdf),
        };

        RulingRecord::new(code.identifier())
            .with_html_link(html)
            .with_pdf_link(pdf)
    }

    fn context_for(&self, markup: &str, pos: usize, blocks: &[ContextBlock]) -> (String, String) {
        let window_start = floor_char_boundary(markup, pos.saturating_sub(self.context_window));
        let before: Vec<&ContextBlock> = blocks
            .iter()
            .filter(|b| b.start >= window_start && b.end <= pos)
            .collect();

        let Some((nearest_idx, nearest)) = before.iter().enumerate().next_back() else {
            return (UNCATEGORIZED.to_string(), UNCATEGORIZED.to_string());
        };

        // A wrapper and the heading it wraps describe the same context.
        let higher = before[..nearest_idx]
            .iter()
            .rev()
            .filter(|b| !(b.end > nearest.start && b.text == nearest.text))
            .find(|b| b.rank < nearest.rank);

        match higher {
            Some(topic) => (
                markup::truncate_chars(&topic.text, TOPIC_MAX_CHARS),
                markup::truncate_chars(&nearest.text, SUBTOPIC_MAX_CHARS),
            ),
            None => (
                markup::truncate_chars(&nearest.text, TOPIC_MAX_CHARS),
                String::new(),
            ),
        }
    }

    /// Extract rulings from a decoded structured response.
    pub fn extract_structured(&self, value: &Value) -> Vec<ExtractedRuling> {
        let mut rulings = Vec::new();

        for item in structured_items(value) {
            let Some(obj) = item.as_object() else {
                continue;
            };

            let topic = first_text(item, &["tema", "materia", "subject"]);
            let subtopic = first_text(item, &["subtema", "descripcion", "resumen", "summary"]);
            let (topic, subtopic) = match (topic, subtopic) {
                (None, None) => (UNCATEGORIZED.to_string(), UNCATEGORIZED.to_string()),
                (None, Some(sub)) => (UNCATEGORIZED.to_string(), sub),
                (Some(topic), sub) => (topic, sub.unwrap_or_default()),
            };
            let topic = markup::truncate_chars(&topic, TOPIC_MAX_CHARS);
            let subtopic = markup::truncate_chars(&subtopic, SUBTOPIC_MAX_CHARS);

            match obj.get("providencias").and_then(Value::as_array) {
                Some(nested) => {
                    for entry in nested {
                        if let Some(record) = self.structured_record(entry) {
                            rulings.push(ExtractedRuling::new(&topic, &subtopic, record));
                        }
                    }
                }
                None => {
                    if let Some(record) = self.structured_record(item) {
                        rulings.push(ExtractedRuling::new(&topic, &subtopic, record));
                    }
                }
            }
        }

        rulings
    }

    fn structured_record(&self, item: &Value) -> Option<RulingRecord> {
        let raw_title = first_text(item, &["numero", "sentencia", "providencia", "titulo", "title"])?;
        let code = RulingCode::find(&raw_title);
        let identifier = code
            .as_ref()
            .map(RulingCode::identifier)
            .unwrap_or_else(|| raw_title.trim().to_string());

        let html = first_raw(item, &["url_html", "url", "link"])
            .map(|href| site::normalize_url(&self.base_url, &href))
            .or_else(|| {
                first_raw(item, &["rutahtml"]).map(|path| {
                    format!(
                        "{}/{}/{}",
                        self.base_url,
                        site::ARCHIVE_MARKER,
                        path.trim_start_matches('/')
                    )
                })
            });
        let pdf = first_raw(item, &["url_pdf"]).map(|href| site::normalize_url(&self.base_url, &href));

        let (html, pdf) = match (html, pdf, code) {
            (Some(html), Some(pdf), _) => (Some(html), Some(pdf)),
            (Some(html), None, _) => {
                let pdf = site::pdf_from_html(&html);
                (Some(html), Some(pdf))
            }
            (None, pdf, Some(code)) => {
                let (html, convention_pdf) = code.convention_links(&self.base_url);
                (Some(html), Some(pdf.unwrap_or(convention_pdf)))
            }
            (None, pdf, None) => (None, pdf),
        };

        let mut record = RulingRecord::new(identifier);
        if let Some(html) = html {
            record = record.with_html_link(html);
        }
        if let Some(pdf) = pdf {
            record = record.with_pdf_link(pdf);
        }
        Some(record)
    }
}

/// Whether a structured value has a shape the extractor understands.
pub fn is_usable_structure(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(obj) => {
            obj.get("results").is_some_and(Value::is_array)
                || value.pointer("/data/hits/hits").is_some_and(Value::is_array)
        }
        _ => false,
    }
}

fn structured_items(value: &Value) -> Vec<&Value> {
    if let Some(items) = value.as_array() {
        return items.iter().collect();
    }
    if let Some(items) = value.get("results").and_then(Value::as_array) {
        return items.iter().collect();
    }
    if let Some(hits) = value.pointer("/data/hits/hits").and_then(Value::as_array) {
        return hits.iter().map(|hit| hit.get("_source").unwrap_or(hit)).collect();
    }
    Vec::new()
}

/// First non-empty cleaned string (or number) among `keys`.
fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    first_raw(item, keys)
        .map(|raw| clean_text(&raw))
        .filter(|text| !text.is_empty())
}

fn first_raw(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn collect_anchors(markup: &str) -> Vec<Anchor> {
    ANCHOR
        .captures_iter(markup)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let href = markup::decode_entities(caps.get(1)?.as_str().trim());
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                return None;
            }
            Some(Anchor {
                start: whole.start(),
                end: whole.end(),
                href,
            })
        })
        .collect()
}

fn collect_blocks(markup: &str) -> Vec<ContextBlock> {
    let mut blocks = Vec::new();

    for caps in HEADING.captures_iter(markup) {
        let (Some(whole), Some(level), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let rank = level.as_str().parse::<u8>().unwrap_or(6);
        push_block(&mut blocks, whole.start(), whole.end(), rank, inner.as_str());
    }

    for caps in CLASS_BLOCK.captures_iter(markup) {
        let (Some(whole), Some(kind), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let rank = if kind.as_str().eq_ignore_ascii_case("subtema") {
            SUBTOPIC_RANK
        } else {
            TOPIC_RANK
        };
        push_block(&mut blocks, whole.start(), whole.end(), rank, inner.as_str());
    }

    for caps in LABELLED_LINE.captures_iter(markup) {
        let (Some(label), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let rank = match label.as_str().to_lowercase().as_str() {
            "tema" | "materia" | "asunto" => TOPIC_RANK,
            _ => SUBTOPIC_RANK,
        };
        push_block(&mut blocks, label.start(), value.end(), rank, value.as_str());
    }

    blocks.sort_by_key(|b| (b.start, b.end));
    blocks
}

fn push_block(blocks: &mut Vec<ContextBlock>, start: usize, end: usize, rank: u8, inner: &str) {
    let text = clean_text(inner);
    // A heading that is itself just a ruling code is not topical context.
    if text.is_empty() || RulingCode::parse(&text).is_some() {
        return;
    }
    blocks.push(ContextBlock {
        start,
        end,
        rank,
        text,
    });
}
