use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type DocId = u32;
pub type PostingsMap = BTreeMap<String, BTreeSet<DocId>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    /// Relative locator of the page, e.g. `viewer/tut1.rst`.
    pub path: String,
    pub title: String,
}

/// Input to [`Index::build`]: a document with its extracted plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: DocId,
    pub path: String,
    pub title: String,
    #[serde(alias = "body", alias = "text")]
    pub raw_text: String,
}

impl SourceDocument {
    pub fn new(id: DocId, path: impl Into<String>, title: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self { id, path: path.into(), title: title.into(), raw_text: raw_text.into() }
    }
}

/// Immutable inverted index over a document collection.
///
/// Every id referenced from `postings` or `title_terms` exists in
/// `documents`; constructors refuse to produce an index otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub(crate) config: SearchConfig,
    pub(crate) documents: BTreeMap<DocId, Document>,
    pub(crate) postings: PostingsMap,
    pub(crate) title_terms: PostingsMap,
}

/// Postings gathered from a subset of the collection. Merging is a per-term
/// set union, so shards combine to the same result in any order.
#[derive(Default)]
struct Shard {
    body: PostingsMap,
    title: PostingsMap,
}

impl Shard {
    fn add(mut self, id: DocId, body: BTreeSet<String>, title: BTreeSet<String>) -> Self {
        for term in body { self.body.entry(term).or_default().insert(id); }
        for term in title { self.title.entry(term).or_default().insert(id); }
        self
    }

    fn merge(mut self, other: Shard) -> Self {
        union_into(&mut self.body, other.body);
        union_into(&mut self.title, other.title);
        self
    }
}

fn union_into(into: &mut PostingsMap, from: PostingsMap) {
    for (term, ids) in from {
        into.entry(term).or_default().extend(ids);
    }
}

/// Build an index with [`SearchConfig::default`].
pub fn build(documents: &[SourceDocument]) -> Result<Index> {
    Index::build(documents, SearchConfig::default())
}

impl Index {
    /// Build an index over `documents`. Either the whole collection is
    /// indexed or an error is returned; input order does not matter.
    pub fn build(documents: &[SourceDocument], config: SearchConfig) -> Result<Index> {
        config.validate()?;
        if documents.is_empty() {
            return Err(Error::EmptyCollection);
        }
        let mut ids: Vec<DocId> = documents.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::DuplicateDocumentId(pair[0]));
        }

        let tokenizer = Tokenizer::new(&config.tokenizer);
        let shard = documents
            .par_iter()
            .map(|doc| (doc.id, tokenizer.terms(&doc.raw_text), tokenizer.terms(&doc.title)))
            .fold(Shard::default, |acc, (id, body, title)| acc.add(id, body, title))
            .reduce(Shard::default, Shard::merge);

        let documents: BTreeMap<DocId, Document> = documents
            .iter()
            .map(|d| (d.id, Document { id: d.id, path: d.path.clone(), title: d.title.clone() }))
            .collect();

        let index = Index { config, documents, postings: shard.body, title_terms: shard.title };
        tracing::info!(num_docs = index.len(), num_terms = index.num_terms(), num_title_terms = index.title_terms.len(), "index built");
        Ok(index)
    }

    /// Assemble an index from already computed parts, rejecting dangling ids.
    pub(crate) fn from_parts(
        config: SearchConfig,
        documents: BTreeMap<DocId, Document>,
        postings: PostingsMap,
        title_terms: PostingsMap,
    ) -> Result<Index> {
        let index = Index { config, documents, postings, title_terms };
        index.validate()?;
        Ok(index)
    }

    /// Everything [`Index::build`] guarantees: a valid config, at least one
    /// document and no dangling postings.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.documents.is_empty() {
            return Err(Error::EmptyCollection);
        }
        self.check_integrity()
    }

    /// Verify that every posting refers to a known document.
    pub fn check_integrity(&self) -> Result<()> {
        for (term, ids) in self.postings.iter().chain(self.title_terms.iter()) {
            if let Some(&doc_id) = ids.iter().find(|id| !self.documents.contains_key(id)) {
                return Err(Error::DanglingPosting { term: term.clone(), doc_id });
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &SearchConfig { &self.config }

    /// Tokenizer equivalent to the one the index was built with.
    pub fn tokenizer(&self) -> Tokenizer { Tokenizer::new(&self.config.tokenizer) }

    pub fn documents(&self) -> impl Iterator<Item = &Document> { self.documents.values() }

    pub fn document(&self, id: DocId) -> Option<&Document> { self.documents.get(&id) }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    /// Number of distinct body terms.
    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn body_postings(&self, term: &str) -> Option<&BTreeSet<DocId>> { self.postings.get(term) }

    pub fn title_postings(&self, term: &str) -> Option<&BTreeSet<DocId>> { self.title_terms.get(term) }

    pub(crate) fn body_terms(&self) -> &PostingsMap { &self.postings }

    pub(crate) fn title_terms(&self) -> &PostingsMap { &self.title_terms }
}
