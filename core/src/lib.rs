//! Inverted-index search for static documentation sites.
//!
//! An [`Index`] is built once from a collection of [`SourceDocument`]s and
//! then queried any number of times. Build and query share one
//! [`tokenizer::Tokenizer`], reconstructed from the configuration stored in
//! the index, so a term always normalizes the same way on both sides.

pub mod config;
pub mod error;
pub mod highlight;
pub mod index;
pub mod persist;
pub mod porter;
pub mod publish;
pub mod search;
pub mod sphinx;
pub mod tokenizer;

pub use config::{SearchConfig, StemmerAlgorithm, TokenizerConfig};
pub use error::{Error, Result};
pub use index::{build, DocId, Document, Index, SourceDocument};
pub use publish::IndexHandle;
pub use search::{search, SearchHit};
