//! Result assembly - grouping, deduplication and capping.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::types::ruling::{ExtractedRuling, ExtractionResult, RulingRecord, TopicGroup};

/// Groups extracted rulings by topic and sub-topic.
///
/// - Group keys compare case-insensitively after trimming; a group keeps the
///   text of its first occurrence.
/// - Within a group, a repeated identifier is dropped.
/// - Across groups, every occurrence of an identifier reuses the links of
///   its first occurrence.
/// - Groups are ordered by first appearance.
#[derive(Debug, Clone, Default)]
pub struct ResultAssembler {
    max_rulings: Option<usize>,
}

impl ResultAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the total number of rulings kept.
    pub fn with_max_rulings(mut self, max: Option<usize>) -> Self {
        self.max_rulings = max;
        self
    }

    /// Assemble flat extraction output into the grouped result.
    pub fn assemble(&self, rulings: Vec<ExtractedRuling>) -> ExtractionResult {
        let mut groups: IndexMap<(String, String), TopicGroup> = IndexMap::new();
        let mut first_links: HashMap<String, (Option<String>, Option<String>)> = HashMap::new();
        let mut kept = 0usize;

        for ruling in rulings {
            if self.max_rulings.is_some_and(|max| kept >= max) {
                break;
            }

            let topic = ruling.topic.trim();
            let subtopic = ruling.subtopic.trim();
            let key = (topic.to_lowercase(), subtopic.to_lowercase());

            let (html_link, pdf_link) = first_links
                .entry(ruling.record.identifier.clone())
                .or_insert_with(|| (ruling.record.html_link.clone(), ruling.record.pdf_link.clone()))
                .clone();

            let group = groups
                .entry(key)
                .or_insert_with(|| TopicGroup::new(topic, subtopic));
            if group.contains(&ruling.record.identifier) {
                continue;
            }

            group.rulings.push(RulingRecord {
                identifier: ruling.record.identifier,
                html_link,
                pdf_link,
            });
            kept += 1;
        }

        ExtractionResult::new(
            groups
                .into_values()
                .filter(|g| !g.rulings.is_empty())
                .collect(),
        )
    }

    /// Re-assemble an existing result. Produces the same result.
    pub fn reassemble(&self, result: &ExtractionResult) -> ExtractionResult {
        self.assemble(flatten(result))
    }
}

/// Flatten a grouped result back into extractor output, in order.
pub fn flatten(result: &ExtractionResult) -> Vec<ExtractedRuling> {
    result
        .iter()
        .flat_map(|group| {
            group
                .rulings
                .iter()
                .map(|record| ExtractedRuling::new(&group.topic, &group.subtopic, record.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruling(topic: &str, subtopic: &str, id: &str, html: &str) -> ExtractedRuling {
        ExtractedRuling::new(
            topic,
            subtopic,
            RulingRecord::new(id)
                .with_html_link(html)
                .with_pdf_link(html.replace(".htm", ".pdf")),
        )
    }

    #[test]
    fn test_groups_by_normalized_key_in_first_appearance_order() {
        let result = ResultAssembler::new().assemble(vec![
            ruling("SALUD", "Medicamentos", "T-1/20", "a.htm"),
            ruling("EDUCACIÓN", "", "T-2/20", "b.htm"),
            ruling("  salud ", "medicamentos", "T-3/20", "c.htm"),
        ]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.groups()[0].topic, "SALUD");
        assert_eq!(result.groups()[0].subtopic, "Medicamentos");
        let ids: Vec<_> = result.groups()[0].rulings.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, ["T-1/20", "T-3/20"]);
        assert_eq!(result.groups()[1].topic, "EDUCACIÓN");
    }

    #[test]
    fn test_dedup_within_group_and_first_links_across_groups() {
        let result = ResultAssembler::new().assemble(vec![
            ruling("A", "", "T-1/20", "first.htm"),
            ruling("A", "", "T-1/20", "second.htm"),
            ruling("B", "", "T-1/20", "third.htm"),
        ]);

        assert_eq!(result.groups()[0].rulings.len(), 1);
        assert_eq!(result.groups()[0].rulings[0].html_link.as_deref(), Some("first.htm"));
        assert_eq!(result.groups()[1].rulings[0].html_link.as_deref(), Some("first.htm"));
        assert_eq!(result.groups()[1].rulings[0].pdf_link.as_deref(), Some("first.pdf"));
    }

    #[test]
    fn test_cap_and_empty_input() {
        let assembler = ResultAssembler::new().with_max_rulings(Some(2));
        let result = assembler.assemble(vec![
            ruling("A", "", "T-1/20", "1.htm"),
            ruling("A", "", "T-1/20", "1.htm"),
            ruling("B", "", "T-2/20", "2.htm"),
            ruling("C", "", "T-3/20", "3.htm"),
        ]);
        assert_eq!(result.total_rulings(), 2);
        assert_eq!(result.len(), 2);

        assert!(ResultAssembler::new().assemble(Vec::new()).is_empty());
    }

    #[test]
    fn test_reassembly_is_idempotent() {
        let assembler = ResultAssembler::new();
        let once = assembler.assemble(vec![
            ruling("A", "x", "T-1/20", "1.htm"),
            ruling("B", "", "T-1/20", "other.htm"),
            ruling("a", "X", "C-2/21", "2.htm"),
            ruling("A", "x", "T-1/20", "1.htm"),
        ]);
        assert_eq!(assembler.reassemble(&once), once);
    }
}
