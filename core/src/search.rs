use crate::error::{Error, Result};
use crate::highlight::highlight_ranges;
use crate::index::{DocId, Index};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: u64,
    pub path: String,
    pub title: String,
    /// Distinct query terms found in the title.
    pub title_matches: u32,
    /// Distinct query terms found in the body.
    pub body_matches: u32,
    pub matched_terms: Vec<String>,
    /// Byte ranges of `title` covering query terms.
    pub title_highlights: Vec<Range<usize>>,
}

#[derive(Default)]
struct Matches<'a> {
    title: u32,
    body: u32,
    terms: BTreeSet<&'a str>,
}

/// Free-function form of [`Index::search`].
pub fn search(index: &Index, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
    index.search(query, limit)
}

impl Index {
    /// Rank documents for `query`, best first, at most `limit` of them.
    ///
    /// Score is `title_matches * title_weight + body_matches * body_weight`;
    /// equal scores are ordered by ascending document id.
    pub fn search(&self, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
        if limit < 0 {
            return Err(Error::InvalidLimit(limit));
        }
        let terms = self.tokenizer().terms(query);
        if limit == 0 || terms.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self.collect_matches(&terms);
        let mut scored: Vec<(DocId, u64, Matches<'_>)> = matches
            .into_iter()
            .map(|(id, m)| (id, self.score(&m), m))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        let tokenizer = self.tokenizer();
        let hits = scored
            .into_iter()
            .filter_map(|(doc_id, score, m)| {
                let doc = self.documents.get(&doc_id)?;
                Some(SearchHit {
                    doc_id,
                    score,
                    path: doc.path.clone(),
                    title: doc.title.clone(),
                    title_matches: m.title,
                    body_matches: m.body,
                    matched_terms: m.terms.into_iter().map(str::to_string).collect(),
                    title_highlights: highlight_ranges(&tokenizer, &doc.title, &terms),
                })
            })
            .collect::<Vec<_>>();
        tracing::debug!(query, terms = terms.len(), hits = hits.len(), "search");
        Ok(hits)
    }

    fn score(&self, m: &Matches<'_>) -> u64 {
        let title = u64::from(m.title).saturating_mul(u64::from(self.config.title_weight));
        let body = u64::from(m.body).saturating_mul(u64::from(self.config.body_weight));
        title.saturating_add(body)
    }

    /// Number of documents matching at least one query term.
    pub fn total_hits(&self, query: &str) -> usize {
        let terms = self.tokenizer().terms(query);
        self.collect_matches(&terms).len()
    }

    fn collect_matches<'a>(&self, terms: &'a BTreeSet<String>) -> BTreeMap<DocId, Matches<'a>> {
        let mut matches: BTreeMap<DocId, Matches<'a>> = BTreeMap::new();
        for term in terms {
            if let Some(ids) = self.title_terms.get(term) {
                for &id in ids {
                    let m = matches.entry(id).or_default();
                    m.title += 1;
                    m.terms.insert(term.as_str());
                }
            }
            if let Some(ids) = self.postings.get(term) {
                for &id in ids {
                    let m = matches.entry(id).or_default();
                    m.body += 1;
                    m.terms.insert(term.as_str());
                }
            }
        }
        matches
    }
}
