use crate::config::{StemmerAlgorithm, TokenizerConfig};
use crate::porter;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeSet, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// A normalized term plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    /// Ordinal of the raw token in the text, counting dropped tokens too.
    pub position: usize,
    /// Byte offsets into the original text.
    pub start: usize,
    pub end: usize,
}

/// Splits text into terms. Indexing and querying must go through the same
/// instance (or one built from an equal config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn config(&self) -> &TokenizerConfig { &self.config }

    /// Tokenize text using NFKC normalization, lowercase, length and stopword filtering, and optional stemming.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for (position, mat) in RE.find_iter(text).enumerate() {
            if let Some(term) = self.normalize(mat.as_str()) {
                tokens.push(Token { term, position, start: mat.start(), end: mat.end() });
            }
        }
        tokens
    }

    /// Distinct terms of `text`, ordered.
    pub fn terms(&self, text: &str) -> BTreeSet<String> {
        self.tokenize(text).into_iter().map(|t| t.term).collect()
    }

    /// Normalize one raw alphanumeric run; `None` if it is filtered out.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let folded = raw.nfkc().collect::<String>().to_lowercase();
        if folded.chars().count() < self.config.min_token_len { return None; }
        if self.config.stopwords && is_stopword(&folded) { return None; }
        if !self.config.stemming { return Some(folded); }
        Some(match self.config.stemmer {
            StemmerAlgorithm::English => STEMMER.stem(&folded).into_owned(),
            StemmerAlgorithm::Porter => porter::stem(&folded),
        })
    }
}

impl Default for Tokenizer {
    fn default() -> Self { Self::new(&TokenizerConfig::default()) }
}
