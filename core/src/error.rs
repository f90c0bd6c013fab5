use crate::DocId;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of index construction and querying.
///
/// Build errors never leave a partial index behind; query errors affect
/// only the call that produced them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("duplicate document id {0}")]
    DuplicateDocumentId(DocId),
    #[error("cannot build an index from an empty document collection")]
    EmptyCollection,
    #[error("invalid result limit {0}: must be >= 0")]
    InvalidLimit(i64),
    #[error("invalid search config: {0}")]
    InvalidConfig(String),
    #[error("term {term:?} references unknown document {doc_id}")]
    DanglingPosting { term: String, doc_id: DocId },
}
