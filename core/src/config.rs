use crate::error::{Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rules shared by indexing and querying. Stored inside every index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokens with fewer characters than this are dropped.
    pub min_token_len: usize,
    /// Drop common English words.
    pub stopwords: bool,
    /// Reduce tokens to their stem, using `stemmer`.
    pub stemming: bool,
    pub stemmer: StemmerAlgorithm,
}

/// Which English stemmer `stemming` applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerAlgorithm {
    /// Snowball English, also known as Porter2.
    #[default]
    English,
    /// The original 1980 Porter algorithm. Sphinx indexes are stemmed with this one.
    Porter,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { min_token_len: 2, stopwords: true, stemming: false, stemmer: StemmerAlgorithm::English }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub tokenizer: TokenizerConfig,
    /// Score added per query term found in a document title.
    pub title_weight: u32,
    /// Score added per query term found in a document body.
    pub body_weight: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { tokenizer: TokenizerConfig::default(), title_weight: 10, body_weight: 1 }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tokenizer.min_token_len == 0 {
            return Err(Error::InvalidConfig("min_token_len must be at least 1".into()));
        }
        if self.body_weight == 0 {
            return Err(Error::InvalidConfig("body_weight must be positive".into()));
        }
        if self.title_weight <= self.body_weight {
            return Err(Error::InvalidConfig(format!(
                "title_weight ({}) must exceed body_weight ({})",
                self.title_weight, self.body_weight
            )));
        }
        Ok(())
    }

    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SearchConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
}
