//! Search parameters and the validated query built from them.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};
use crate::site;

/// Accepted input date layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Raw, unvalidated search parameters as a caller supplies them.
///
/// Field aliases accept the names used by the site's own search form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(alias = "fecha_inicio")]
    pub start_date: String,

    #[serde(alias = "fecha_fin")]
    pub end_date: String,

    #[serde(alias = "palabra", default)]
    pub keyword: String,

    #[serde(alias = "extra", default)]
    pub extra_filter: Option<String>,

    #[serde(alias = "pagina", default)]
    pub page_index: i64,
}

impl SearchParams {
    pub fn new(
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        keyword: impl Into<String>,
    ) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            keyword: keyword.into(),
            extra_filter: None,
            page_index: 0,
        }
    }

    /// Set the extra filter.
    pub fn with_extra_filter(mut self, extra: impl Into<String>) -> Self {
        self.extra_filter = Some(extra.into());
        self
    }

    /// Set the page index.
    pub fn with_page(mut self, page_index: i64) -> Self {
        self.page_index = page_index;
        self
    }

    /// Validate into a [`SearchQuery`].
    pub fn validate(&self) -> SearchResult<SearchQuery> {
        SearchQuery::new(
            &self.start_date,
            &self.end_date,
            &self.keyword,
            self.extra_filter.as_deref(),
            self.page_index,
        )
    }
}

/// Free-text keyword, or the wildcard when nothing was typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    Any,
    Term(String),
}

impl Keyword {
    /// Trim and collapse whitespace; empty input becomes the wildcard.
    pub fn parse(raw: &str) -> Self {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() || collapsed == "*" {
            Self::Any
        } else {
            Self::Term(collapsed)
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "*",
            Self::Term(term) => term,
        }
    }

    /// Path segment form: `*` or the percent-encoded term.
    pub fn url_segment(&self) -> String {
        match self {
            Self::Any => "*".to_string(),
            Self::Term(term) => urlencoding::encode(term).into_owned(),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated search request.
///
/// Invariants: `start_date <= end_date`, the keyword is either a non-empty
/// term or the wildcard, and the extra filter is never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
    keyword: Keyword,
    extra_filter: Option<String>,
    page_index: u32,
}

impl SearchQuery {
    /// Validate and normalize raw parameters.
    pub fn new(
        start_date: &str,
        end_date: &str,
        keyword: &str,
        extra_filter: Option<&str>,
        page_index: i64,
    ) -> SearchResult<Self> {
        let start = parse_date(start_date, "start date")?;
        let end = parse_date(end_date, "end date")?;

        if start > end {
            return Err(SearchError::invalid(format!(
                "start date {start} is after end date {end}"
            )));
        }
        if page_index < 0 {
            return Err(SearchError::invalid(format!(
                "page index must be non-negative, got {page_index}"
            )));
        }
        let page_index = u32::try_from(page_index)
            .map_err(|_| SearchError::invalid(format!("page index {page_index} is too large")))?;

        let extra_filter = extra_filter
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Ok(Self {
            start_date: start,
            end_date: end,
            keyword: Keyword::parse(keyword),
            extra_filter,
            page_index,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    pub fn extra_filter(&self) -> Option<&str> {
        self.extra_filter.as_deref()
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    /// Start date as `YYYY-MM-DD`.
    pub fn start_str(&self) -> String {
        self.start_date.format("%Y-%m-%d").to_string()
    }

    /// End date as `YYYY-MM-DD`.
    pub fn end_str(&self) -> String {
        self.end_date.format("%Y-%m-%d").to_string()
    }

    /// Lower-cased keyword words; empty for the wildcard.
    pub fn keyword_terms(&self) -> Vec<String> {
        match &self.keyword {
            Keyword::Any => Vec::new(),
            Keyword::Term(term) => term.split_whitespace().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Path-style URL of the search application for this query.
    pub fn search_url(&self, base_url: &str) -> String {
        let extra = self
            .extra_filter
            .as_deref()
            .map(|e| urlencoding::encode(e).into_owned())
            .unwrap_or_default();
        format!(
            "{}{}/{}/{}/{}/{}/{}",
            base_url.trim_end_matches('/'),
            site::SEARCH_PATH,
            self.start_str(),
            self.end_str(),
            self.keyword.url_segment(),
            extra,
            self.page_index
        )
    }
}

impl TryFrom<SearchParams> for SearchQuery {
    type Error = SearchError;

    fn try_from(params: SearchParams) -> SearchResult<Self> {
        params.validate()
    }
}

impl TryFrom<&SearchParams> for SearchQuery {
    type Error = SearchError;

    fn try_from(params: &SearchParams) -> SearchResult<Self> {
        params.validate()
    }
}

fn parse_date(raw: &str, field: &str) -> SearchResult<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SearchError::invalid(format!("{field} is empty")));
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| SearchError::invalid(format!("{field} '{raw}' is not a recognized date")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_formats_normalize() {
        for raw in ["2024-03-05", "2024/03/05", "05/03/2024", "05-03-2024"] {
            let q = SearchQuery::new(raw, "2024-12-31", "tutela", None, 0).unwrap();
            assert_eq!(q.start_str(), "2024-03-05", "input {raw}");
        }
    }

    #[test]
    fn test_rejects_inverted_range_and_negative_page() {
        let err = SearchQuery::new("2025-01-02", "2025-01-01", "x", None, 0).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));

        let err = SearchQuery::new("2025-01-01", "2025-01-02", "x", None, -1).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));

        let err = SearchQuery::new("yesterday", "2025-01-02", "x", None, 0).unwrap_err();
        assert!(err.to_string().contains("start date"));
    }

    #[test]
    fn test_keyword_and_extra_normalization() {
        let q = SearchQuery::new("2025-01-01", "2025-01-01", "  agente   Oficioso ", Some("  "), 2)
            .unwrap();
        assert_eq!(q.keyword(), &Keyword::Term("agente Oficioso".into()));
        assert_eq!(q.keyword_terms(), vec!["agente", "oficioso"]);
        assert_eq!(q.extra_filter(), None);
        assert_eq!(q.page_index(), 2);

        let q = SearchQuery::new("2025-01-01", "2025-01-01", "   ", None, 0).unwrap();
        assert!(q.keyword().is_any());
        assert!(q.keyword_terms().is_empty());
    }

    #[test]
    fn test_search_url() {
        let q = SearchQuery::new("1992-01-01", "2025-08-17", "agente oficioso", None, 0).unwrap();
        assert_eq!(
            q.search_url(site::BASE_URL),
            "https://www.corteconstitucional.gov.co/relatoria/buscador-jurisprudencia/texto/1992-01-01/2025-08-17/agente%20oficioso//0"
        );

        let q = SearchQuery::new("2020-01-01", "2020-12-31", "", Some("T"), 1).unwrap();
        assert!(q.search_url("http://localhost/").ends_with("/2020-01-01/2020-12-31/*/T/1"));
    }

    #[test]
    fn test_params_accept_site_field_names() {
        let params: SearchParams = serde_json::from_value(serde_json::json!({
            "fecha_inicio": "2025-01-01",
            "fecha_fin": "2025-06-30",
            "palabra": "educación",
            "pagina": 3
        }))
        .unwrap();
        let q = SearchQuery::try_from(params).unwrap();
        assert_eq!(q.page_index(), 3);
        assert_eq!(q.keyword().as_str(), "educación");
    }
}
