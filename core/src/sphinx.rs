//! Reading and writing Sphinx `searchindex.js` files.
//!
//! A Sphinx index is a single `Search.setIndex({...})` call. Documents are
//! numbered by their position in `docnames`; `terms` and `titleterms` map a
//! term to one document number or an array of them. Older Sphinx releases
//! write the object with unquoted keys, which [`from_searchindex_js`]
//! accepts as well.

use crate::config::{SearchConfig, StemmerAlgorithm, TokenizerConfig};
use crate::index::{DocId, Document, Index, PostingsMap};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const PREFIX: &str = "Search.setIndex(";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum DocRefs {
    One(u32),
    Many(Vec<u32>),
}

impl DocRefs {
    fn from_positions(positions: Vec<u32>) -> Self {
        if positions.len() == 1 {
            DocRefs::One(positions[0])
        } else {
            DocRefs::Many(positions)
        }
    }

    fn positions(&self) -> &[u32] {
        match self {
            DocRefs::One(p) => std::slice::from_ref(p),
            DocRefs::Many(v) => v,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SphinxIndex {
    docnames: Vec<String>,
    #[serde(default)]
    envversion: serde_json::Value,
    #[serde(default)]
    filenames: Vec<String>,
    #[serde(default)]
    objects: serde_json::Value,
    #[serde(default)]
    objnames: serde_json::Value,
    #[serde(default)]
    objtypes: serde_json::Value,
    terms: BTreeMap<String, DocRefs>,
    titles: Vec<String>,
    titleterms: BTreeMap<String, DocRefs>,
    /// Written by [`to_searchindex_js`] so a re-imported index keeps its
    /// tokenizer settings. Sphinx itself ignores the key.
    #[serde(default, rename = "docsearch_config", skip_serializing_if = "Option::is_none")]
    config: Option<SearchConfig>,
}

/// Render `index` as a Sphinx `searchindex.js`.
pub fn to_searchindex_js(index: &Index) -> Result<String> {
    let docs: Vec<&Document> = index.documents().collect();
    let position: BTreeMap<DocId, u32> = docs.iter().enumerate().map(|(pos, d)| (d.id, pos as u32)).collect();

    let convert = |postings: &PostingsMap| -> BTreeMap<String, DocRefs> {
        postings
            .iter()
            .map(|(term, ids)| {
                let positions = ids.iter().filter_map(|id| position.get(id).copied()).collect();
                (term.clone(), DocRefs::from_positions(positions))
            })
            .collect()
    };

    let empty = || serde_json::Value::Object(serde_json::Map::new());
    let sphinx = SphinxIndex {
        docnames: docs.iter().map(|d| docname(&d.path)).collect(),
        envversion: empty(),
        filenames: docs.iter().map(|d| d.path.clone()).collect(),
        objects: empty(),
        objnames: empty(),
        objtypes: empty(),
        terms: convert(index.body_terms()),
        titles: docs.iter().map(|d| d.title.clone()).collect(),
        titleterms: convert(index.title_terms()),
        config: Some(index.config().clone()),
    };
    Ok(format!("{PREFIX}{})", serde_json::to_string(&sphinx)?))
}

/// Parse a Sphinx `searchindex.js` into an [`Index`].
///
/// Document ids are the Sphinx document numbers. Term keys are lowercased.
/// Files written by Sphinx carry stemmed terms, so unless the file records
/// its own tokenizer settings the resulting index stems queries.
pub fn from_searchindex_js(src: &str) -> Result<Index> {
    let body = src.trim().trim_end_matches(';').trim_end();
    let body = body
        .strip_prefix(PREFIX)
        .and_then(|b| b.strip_suffix(')'))
        .context("not a Search.setIndex(...) file")?;

    let sphinx: SphinxIndex = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => serde_json::from_str(&quote_bare_keys(body)).context("parsing search index object")?,
    };

    let n = sphinx.docnames.len();
    if sphinx.titles.len() != n {
        bail!("titles has {} entries but docnames has {n}", sphinx.titles.len());
    }
    if !sphinx.filenames.is_empty() && sphinx.filenames.len() != n {
        bail!("filenames has {} entries but docnames has {n}", sphinx.filenames.len());
    }

    let mut documents = BTreeMap::new();
    for (pos, (docname, title)) in sphinx.docnames.iter().zip(&sphinx.titles).enumerate() {
        let id = pos as DocId;
        let path = sphinx.filenames.get(pos).cloned().unwrap_or_else(|| docname.clone());
        documents.insert(id, Document { id, path, title: title.clone() });
    }

    let config = sphinx.config.clone().unwrap_or_else(|| SearchConfig {
        tokenizer: TokenizerConfig {
            min_token_len: 1,
            stopwords: true,
            stemming: true,
            stemmer: StemmerAlgorithm::Porter,
        },
        ..SearchConfig::default()
    });
    let index = Index::from_parts(config, documents, lowercase_terms(&sphinx.terms), lowercase_terms(&sphinx.titleterms))?;
    tracing::info!(num_docs = index.len(), num_terms = index.num_terms(), "imported sphinx index");
    Ok(index)
}

fn lowercase_terms(terms: &BTreeMap<String, DocRefs>) -> PostingsMap {
    let mut out = PostingsMap::new();
    for (term, refs) in terms {
        let ids: &mut BTreeSet<DocId> = out.entry(term.to_lowercase()).or_default();
        ids.extend(refs.positions().iter().copied());
    }
    out
}

/// `viewer\tut1.rst` -> `viewer/tut1`
fn docname(path: &str) -> String {
    let path = path.replace('\\', "/");
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => path[..file_start + dot].to_string(),
        _ => path,
    }
}

/// Quote identifier keys of a JavaScript object literal so it parses as JSON.
fn quote_bare_keys(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len() + src.len() / 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                expect_key = false;
                out.push(c);
            }
            '{' | ',' => {
                expect_key = true;
                out.push(c);
            }
            c if expect_key && (c.is_ascii_alphabetic() || c == '_' || c == '$') => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if next == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                expect_key = false;
                continue;
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                expect_key = false;
                out.push(c);
            }
        }
        i += 1;
    }
    out
}
