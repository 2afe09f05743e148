//! Ruling types - codes, records, topic groups, and the final result.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::site;

/// Topic and sub-topic used when no heading precedes a ruling.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Ruling-code grammar: chamber prefix, optional dash, serial, separator, year.
///
/// `AUTO` is accepted as a long form of the `A` (order) prefix and four-digit
/// years are reduced to two digits.
pub(crate) static RULING_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<chamber>SU|AUTO|[TCA])-?(?P<serial>\d{1,4})[/-](?P<year>\d{4}|\d{2})\b")
        .expect("ruling code pattern is valid")
});

/// A parsed ruling code such as `T-322/25` or `SU-456/19`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RulingCode {
    /// Chamber prefix: `T` (tutela), `C` (constitutionality), `SU` (unified), `A` (order)
    pub chamber: String,

    /// Serial number as written (leading zeros kept)
    pub serial: String,

    /// Two-digit year
    pub year: String,
}

impl RulingCode {
    /// Parse a string that is exactly one ruling code (surrounding whitespace allowed).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let caps = RULING_CODE.captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != text.len() {
            return None;
        }
        Some(Self::from_captures(&caps))
    }

    /// Find the first ruling code anywhere in `text`.
    pub fn find(text: &str) -> Option<Self> {
        RULING_CODE.captures(text).map(|caps| Self::from_captures(&caps))
    }

    pub(crate) fn from_captures(caps: &Captures<'_>) -> Self {
        let chamber = match &caps["chamber"] {
            "AUTO" => "A".to_string(),
            other => other.to_string(),
        };
        let year = &caps["year"];
        let year = if year.len() == 4 { &year[2..] } else { year };

        Self {
            chamber,
            serial: caps["serial"].to_string(),
            year: year.to_string(),
        }
    }

    /// Canonical identifier, e.g. `T-322/25`.
    pub fn identifier(&self) -> String {
        format!("{}-{}/{}", self.chamber, self.serial, self.year)
    }

    /// File stem used by the archive, e.g. `T-322-25`.
    pub fn file_stem(&self) -> String {
        format!("{}-{}-{}", self.chamber, self.serial, self.year)
    }

    /// Four-digit publication year.
    pub fn full_year(&self) -> u32 {
        site::full_year(self.year.parse().unwrap_or(0))
    }

    /// HTML and PDF links built from the archive naming convention.
    pub fn convention_links(&self, base_url: &str) -> (String, String) {
        let base = base_url.trim_end_matches('/');
        let html = format!(
            "{base}/{}/{}/{}.htm",
            site::ARCHIVE_MARKER,
            self.full_year(),
            self.file_stem()
        );
        let pdf = site::pdf_from_html(&html);
        (html, pdf)
    }
}

impl fmt::Display for RulingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// One ruling with its renditions.
///
/// Identity is the identifier: two records with the same identifier are the
/// same ruling, whichever strategy found them. Serialized field names are a
/// compatibility contract with the document backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulingRecord {
    /// Ruling code, displayed as the title
    #[serde(rename = "title")]
    pub identifier: String,

    /// HTML rendition
    #[serde(
        rename = "html_url",
        default,
        serialize_with = "empty_if_none",
        deserialize_with = "none_if_empty"
    )]
    pub html_link: Option<String>,

    /// PDF rendition
    #[serde(
        rename = "pdf_url",
        default,
        serialize_with = "empty_if_none",
        deserialize_with = "none_if_empty"
    )]
    pub pdf_link: Option<String>,
}

impl RulingRecord {
    /// Create a record without links.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            html_link: None,
            pdf_link: None,
        }
    }

    /// Set the HTML link.
    pub fn with_html_link(mut self, url: impl Into<String>) -> Self {
        self.html_link = Some(url.into()).filter(|u: &String| !u.is_empty());
        self
    }

    /// Set the PDF link.
    pub fn with_pdf_link(mut self, url: impl Into<String>) -> Self {
        self.pdf_link = Some(url.into()).filter(|u: &String| !u.is_empty());
        self
    }
}

fn empty_if_none<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

fn none_if_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// A ruling as found by the extractor, with the topical context around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRuling {
    pub topic: String,
    pub subtopic: String,
    pub record: RulingRecord,
}

impl ExtractedRuling {
    pub fn new(topic: impl Into<String>, subtopic: impl Into<String>, record: RulingRecord) -> Self {
        Self {
            topic: topic.into(),
            subtopic: subtopic.into(),
            record,
        }
    }
}

/// Rulings sharing a topic and sub-topic, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicGroup {
    pub topic: String,
    pub subtopic: String,
    pub rulings: Vec<RulingRecord>,
}

impl TopicGroup {
    pub fn new(topic: impl Into<String>, subtopic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            subtopic: subtopic.into(),
            rulings: Vec::new(),
        }
    }

    /// Whether a ruling with this identifier is already in the group.
    pub fn contains(&self, identifier: &str) -> bool {
        self.rulings.iter().any(|r| r.identifier == identifier)
    }
}

/// The grouped result handed back to callers.
///
/// Serializes as a bare array of groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    groups: Vec<TopicGroup>,
}

impl ExtractionResult {
    pub fn new(groups: Vec<TopicGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[TopicGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<TopicGroup> {
        self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Number of rulings across all groups.
    pub fn total_rulings(&self) -> usize {
        self.groups.iter().map(|g| g.rulings.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicGroup> {
        self.groups.iter()
    }

    /// Serialize in the backend's wire shape.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl IntoIterator for ExtractionResult {
    type Item = TopicGroup;
    type IntoIter = std::vec::IntoIter<TopicGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonicalizes_codes() {
        let code = RulingCode::parse("T-322/25").unwrap();
        assert_eq!(code.identifier(), "T-322/25");
        assert_eq!(code.file_stem(), "T-322-25");
        assert_eq!(code.full_year(), 2025);

        assert_eq!(RulingCode::parse("SU-456-19").unwrap().identifier(), "SU-456/19");
        assert_eq!(RulingCode::parse("C123/2020").unwrap().identifier(), "C-123/20");
        assert_eq!(RulingCode::parse("AUTO-100/20").unwrap().identifier(), "A-100/20");
        assert_eq!(RulingCode::parse(" T-038/22 ").unwrap().serial, "038");
    }

    #[test]
    fn test_parse_rejects_surrounding_text() {
        assert!(RulingCode::parse("Sentencia T-322/25").is_none());
        assert!(RulingCode::parse("X-322/25").is_none());
        assert!(RulingCode::parse("").is_none());
        assert_eq!(
            RulingCode::find("Sentencia T-322/25 de la Sala").unwrap().identifier(),
            "T-322/25"
        );
    }

    #[test]
    fn test_convention_links() {
        let code = RulingCode::parse("T-437/21").unwrap();
        let (html, pdf) = code.convention_links(site::BASE_URL);
        assert_eq!(
            html,
            "https://www.corteconstitucional.gov.co/relatoria/2021/T-437-21.htm"
        );
        assert_eq!(
            pdf,
            "https://www.corteconstitucional.gov.co/relatoria/2021/T-437-21.pdf"
        );

        let old = RulingCode::parse("C-004/92").unwrap();
        assert!(old.convention_links(site::BASE_URL).0.contains("/1992/"));
    }

    #[test]
    fn test_wire_shape() {
        let mut group = TopicGroup::new("EDUCACIÓN", "Acceso");
        group.rulings.push(
            RulingRecord::new("T-322/25")
                .with_html_link("https://x/relatoria/2025/T-322-25.htm")
                .with_pdf_link("https://x/relatoria/2025/T-322-25.pdf"),
        );
        group.rulings.push(RulingRecord::new("T-1/20"));
        let result = ExtractionResult::new(vec![group]);

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["topic"], "EDUCACIÓN");
        assert_eq!(json[0]["subtopic"], "Acceso");
        assert_eq!(json[0]["rulings"][0]["title"], "T-322/25");
        assert_eq!(
            json[0]["rulings"][0]["pdf_url"],
            "https://x/relatoria/2025/T-322-25.pdf"
        );
        assert_eq!(json[0]["rulings"][1]["html_url"], "");

        let back: ExtractionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.total_rulings(), 2);
    }
}
