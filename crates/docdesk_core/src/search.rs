//! Title search over a local document list.

use crate::model::Document;

/// Documents whose title contains `query`, ignoring case, in their original
/// order. A blank query matches everything.
pub fn filter_by_title<'a>(documents: &'a [Document], query: &str) -> Vec<&'a Document> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return documents.iter().collect();
    }
    documents
        .iter()
        .filter(|doc| doc.title.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentType, NewDocument};
    use chrono::Utc;

    fn doc(id: &str, title: &str) -> Document {
        NewDocument::draft(title, DocumentType::Document, "u1", Utc::now())
            .unwrap()
            .into_document(id.to_string())
    }

    #[test]
    fn matches_case_insensitively_and_keeps_order() {
        let docs = vec![
            doc("1", "Quarterly Report"),
            doc("2", "Roadmap"),
            doc("3", "report draft"),
        ];
        let ids: Vec<&str> = filter_by_title(&docs, "REPORT")
            .into_iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn blank_query_returns_everything() {
        let docs = vec![doc("1", "a"), doc("2", "b")];
        assert_eq!(filter_by_title(&docs, "   ").len(), 2);
    }

    #[test]
    fn no_match_is_empty() {
        let docs = vec![doc("1", "Budget")];
        assert!(filter_by_title(&docs, "slides").is_empty());
    }
}
