//! Deterministic fallback - the chain's last resort.
//!
//! Scores a small built-in catalog of known rulings against the query terms
//! and renders the best matches as archive-style markup, so the same
//! extractor handles them like any other page. No network I/O.

use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::pipeline::markup::escape_html;
use crate::traits::strategy::FallbackStrategy;
use crate::types::payload::{RawPayload, StrategyKind};
use crate::types::query::SearchQuery;
use crate::types::ruling::{RulingCode, RULING_CODE};

/// Provenance note attached to every fallback payload.
pub const BEST_EFFORT_NOTE: &str = "best-effort: synthesized from the built-in catalog";

/// Maximum entries returned.
pub const MAX_FALLBACK_RESULTS: usize = 5;

const GENERIC_TOPIC: &str = "BÚSQUEDA SIN RESULTADOS ESPECÍFICOS";
const GENERIC_RULING: &str = "T-437/21";

/// A known ruling with its topical description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub identifier: &'static str,
    pub topic: &'static str,
    pub subtopic: &'static str,
    pub keywords: &'static [&'static str],
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        identifier: "T-322/25",
        topic: "ACCIÓN DE TUTELA POR AGENTE OFICIOSO",
        subtopic: "Protección del derecho a la educación de menor por parte de agente oficiosa ante la Secretaría de Educación",
        keywords: &["agente", "oficioso", "educación", "menor", "secretaría", "marcela", "sara"],
    },
    CatalogEntry {
        identifier: "T-437/21",
        topic: "DERECHO A LA EDUCACIÓN INCLUSIVA DE NIÑOS, NIÑAS Y ADOLESCENTES",
        subtopic: "Garantía de acceso y permanencia en el sistema educativo para personas en situación de discapacidad por agente oficioso",
        keywords: &["educación", "inclusiva", "niños", "adolescentes", "discapacidad", "agente", "oficioso"],
    },
    CatalogEntry {
        identifier: "T-038/22",
        topic: "ACCIÓN DE TUTELA CONTRA EPS-IMPROCEDENCIA POR EDUCACIÓN ESPECIAL",
        subtopic: "Agente oficiosa solicita financiamiento de educación con adecuaciones curriculares para adolescente en situación de discapacidad",
        keywords: &["tutela", "agente", "oficioso", "eps", "educación", "discapacidad"],
    },
    CatalogEntry {
        identifier: "T-457/23",
        topic: "DERECHO A LA EDUCACIÓN Y DEBIDO PROCESO",
        subtopic: "Protocolo de atención para situaciones de presunto racismo y discriminación étnico racial en instituciones educativas",
        keywords: &["educación", "debido proceso", "discriminación", "secretaría", "protocolo"],
    },
    CatalogEntry {
        identifier: "T-200/24",
        topic: "ACCESIBILIDAD EN EL DERECHO A LA EDUCACIÓN",
        subtopic: "Obligaciones de las autoridades para garantizar el transporte escolar y acceso a instituciones educativas",
        keywords: &["accesibilidad", "educación", "transporte", "estudiantes", "secretaría"],
    },
    CatalogEntry {
        identifier: "T-045/24",
        topic: "DERECHO FUNDAMENTAL A LA EDUCACIÓN DE MENORES",
        subtopic: "Obligaciones del Estado y entidades territoriales en la prestación del servicio educativo",
        keywords: &["fundamental", "educación", "menores", "estado", "territorial"],
    },
    CatalogEntry {
        identifier: "T-320/23",
        topic: "DERECHO A LA EDUCACIÓN INCLUSIVA DE NIÑOS CON DISCAPACIDAD",
        subtopic: "Garantía de transporte, acompañamiento e implementación de plan individual de ajustes razonables",
        keywords: &["educación", "inclusiva", "discapacidad", "transporte", "ajustes"],
    },
    CatalogEntry {
        identifier: "T-154/24",
        topic: "DERECHO DE ACCESO A LA EDUCACIÓN - RETENCIÓN DE DOCUMENTOS",
        subtopic: "Prohibición de retener documentos académicos por incumplimiento de obligaciones económicas",
        keywords: &["acceso", "educación", "documentos", "académicos", "retención"],
    },
];

/// Patterns in the raw keyword that earn bonus points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct QuerySignals {
    agente_oficioso: bool,
    education: bool,
    names: bool,
}

impl QuerySignals {
    fn detect(keyword: &str) -> Self {
        let lower = keyword.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        Self {
            agente_oficioso: any(&["agente", "oficioso", "oficiosa"]),
            education: any(&["educación", "educacion", "secretaría", "secretaria"]),
            names: any(&["marcela", "sara"]),
        }
    }
}

/// Relevance of one catalog entry for the given terms.
fn score(entry: &CatalogEntry, terms: &[String], signals: QuerySignals) -> u32 {
    let topic = entry.topic.to_lowercase();
    let subtopic = entry.subtopic.to_lowercase();
    let has_keyword = |word: &str| entry.keywords.contains(&word);

    let mut score = 0;
    for term in terms {
        if topic.contains(term.as_str()) {
            score += 5;
        }
        if subtopic.contains(term.as_str()) {
            score += 3;
        }
        if has_keyword(term) {
            score += 2;
        }
    }

    if signals.agente_oficioso && has_keyword("agente") && has_keyword("oficioso") {
        score += 10;
    }
    if signals.education && has_keyword("educación") {
        score += 5;
    }
    if signals.names && (has_keyword("marcela") || has_keyword("sara")) {
        score += 8;
    }
    if signals.names && entry.identifier == "T-322/25" {
        score += 15;
    }
    score
}

/// Synthesizes a best-effort result from the built-in catalog.
#[derive(Debug, Clone)]
pub struct DeterministicFallbackStrategy {
    base_url: String,
}

impl DeterministicFallbackStrategy {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Catalog entries ranked for the query, best first, at most five.
    ///
    /// Ties keep catalog order. An empty list means nothing scored.
    pub fn rank(&self, query: &SearchQuery) -> Vec<(u32, &'static CatalogEntry)> {
        let terms = query.keyword_terms();
        let signals = QuerySignals::detect(query.keyword().as_str());

        let mut scored: Vec<(u32, &'static CatalogEntry)> = CATALOG
            .iter()
            .map(|entry| (score(entry, &terms, signals), entry))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(MAX_FALLBACK_RESULTS);
        scored
    }

    /// Render the ranked entries as archive-style markup.
    pub fn render(&self, query: &SearchQuery) -> String {
        let ranked = self.rank(query);
        let mut markup = String::from("<html><body><div id=\"resultados\">\n");

        if ranked.is_empty() {
            // A code echoed from the keyword would be extracted as a ruling.
            let keyword = RULING_CODE.replace_all(query.keyword().as_str(), "");
            let keyword = keyword.split_whitespace().collect::<Vec<_>>().join(" ");
            let subtopic = format!("No se encontraron sentencias específicas para: {keyword}");
            self.render_entry(&mut markup, GENERIC_TOPIC, &subtopic, GENERIC_RULING);
        } else {
            for (_, entry) in &ranked {
                self.render_entry(&mut markup, entry.topic, entry.subtopic, entry.identifier);
            }
        }

        markup.push_str("</div></body></html>\n");
        markup
    }

    fn render_entry(&self, markup: &mut String, topic: &str, subtopic: &str, identifier: &str) {
        let (html, pdf) = match RulingCode::parse(identifier) {
            Some(code) => code.convention_links(&self.base_url),
            None => (String::new(), String::new()),
        };
        markup.push_str(&format!(
            "<section class=\"resultado\">\n<h2>{}</h2>\n<h3>{}</h3>\n<p><a href=\"{}\">{}</a> <a href=\"{}\">PDF</a></p>\n</section>\n",
            escape_html(topic),
            escape_html(subtopic),
            escape_html(&html),
            escape_html(identifier),
            escape_html(&pdf),
        ));
    }
}

#[async_trait]
impl FallbackStrategy for DeterministicFallbackStrategy {
    async fn synthesize(&self, query: &SearchQuery) -> RawPayload {
        let started = Instant::now();
        let markup = self.render(query);
        info!(
            keyword = %query.keyword(),
            matches = self.rank(query).len(),
            "Synthesized fallback result"
        );
        RawPayload::markup(
            StrategyKind::DeterministicFallback,
            query.search_url(&self.base_url),
            markup,
        )
        .with_elapsed(started.elapsed())
        .with_note(BEST_EFFORT_NOTE)
    }

    fn name(&self) -> &str {
        "deterministic-fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::PatternExtractor;
    use crate::site;

    fn query(keyword: &str) -> SearchQuery {
        SearchQuery::new("1992-01-01", "2025-08-17", keyword, None, 0).unwrap()
    }

    fn fallback() -> DeterministicFallbackStrategy {
        DeterministicFallbackStrategy::new(site::BASE_URL)
    }

    #[test]
    fn test_agente_oficioso_ranking() {
        let ranked = fallback().rank(&query("agente oficioso"));
        let ids: Vec<_> = ranked.iter().map(|(_, e)| e.identifier).collect();
        assert_eq!(ids, ["T-322/25", "T-437/21", "T-038/22"]);
        assert_eq!(ranked[0].0, 27);
    }

    #[test]
    fn test_names_prioritize_known_ruling() {
        let ranked = fallback().rank(&query("Marcela Sara educación"));
        assert_eq!(ranked[0].1.identifier, "T-322/25");
        assert!(ranked.len() <= MAX_FALLBACK_RESULTS);
    }

    #[test]
    fn test_unmatched_query_gets_generic_entry() {
        let q = query("xyzzy");
        assert!(fallback().rank(&q).is_empty());

        let rulings = PatternExtractor::new(site::BASE_URL).extract_markup(&fallback().render(&q));
        assert_eq!(rulings.len(), 1);
        assert_eq!(rulings[0].topic, GENERIC_TOPIC);
        assert_eq!(rulings[0].record.identifier, GENERIC_RULING);
        assert!(rulings[0].subtopic.ends_with("xyzzy"));
    }

    #[test]
    fn test_code_in_unmatched_keyword_is_not_echoed() {
        let q = query("xyzzy T-999/99");
        assert!(fallback().rank(&q).is_empty());

        let rulings = PatternExtractor::new(site::BASE_URL).extract_markup(&fallback().render(&q));
        assert_eq!(rulings.len(), 1);
        assert_eq!(rulings[0].record.identifier, GENERIC_RULING);
        assert!(rulings[0].subtopic.ends_with("para: xyzzy"));
    }

    #[test]
    fn test_rendered_markup_extracts_with_links() {
        let markup = fallback().render(&query("agente oficioso"));
        let rulings = PatternExtractor::new(site::BASE_URL).extract_markup(&markup);

        assert_eq!(rulings.len(), 3);
        assert_eq!(rulings[0].topic, "ACCIÓN DE TUTELA POR AGENTE OFICIOSO");
        assert_eq!(
            rulings[0].record.html_link.as_deref(),
            Some("https://www.corteconstitucional.gov.co/relatoria/2025/T-322-25.htm")
        );
        assert_eq!(
            rulings[0].record.pdf_link.as_deref(),
            Some("https://www.corteconstitucional.gov.co/relatoria/2025/T-322-25.pdf")
        );
        assert!(rulings[1].subtopic.starts_with("Garantía de acceso"));
    }

    #[tokio::test]
    async fn test_payload_is_marked_best_effort() {
        let payload = fallback().synthesize(&query("tutela")).await;
        assert_eq!(payload.strategy, StrategyKind::DeterministicFallback);
        assert_eq!(payload.note.as_deref(), Some(BEST_EFFORT_NOTE));
    }
}
