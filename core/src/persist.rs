//! On-disk layout of an index directory.
//!
//! ```text
//! <root>/CURRENT              name of the live generation, e.g. `gen-00000003`
//! <root>/gen-00000003/index.bin
//! <root>/gen-00000003/meta.json
//! <root>/gen-00000003/texts/{id}.txt
//! ```
//!
//! A new generation is written into `<name>.staging` and only becomes visible
//! when [`StagedGeneration::commit`] renames it and repoints `CURRENT`. A
//! failed write leaves the live generation untouched.

use crate::{DocId, Index};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir, create_dir_all, rename, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 2;

const CURRENT: &str = "CURRENT";
const GEN_PREFIX: &str = "gen-";
const STAGING_SUFFIX: &str = ".staging";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

fn count_u32(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).with_context(|| format!("{n} {what} do not fit the meta file"))
}

impl MetaFile {
    pub fn for_index(index: &Index) -> Result<Self> {
        Ok(Self {
            num_docs: count_u32(index.len(), "documents")?,
            num_terms: count_u32(index.num_terms(), "terms")?,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
        })
    }
}

/// Files of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn texts_dir(&self) -> PathBuf { self.root.join("texts") }
    /// Relative path of a document's stored text, e.g. `texts/3.txt`.
    pub fn text_rel(doc_id: DocId) -> String { format!("texts/{doc_id}.txt") }
}

/// An index directory holding numbered generations.
#[derive(Debug, Clone)]
pub struct IndexRoot {
    root: PathBuf,
}

impl IndexRoot {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path { &self.root }

    /// Paths of the live generation. A directory written before generations
    /// existed (no `CURRENT`, files at the top level) is its own generation.
    pub fn current(&self) -> Result<IndexPaths> {
        let pointer = self.root.join(CURRENT);
        if !pointer.exists() && self.root.join("index.bin").exists() {
            return Ok(IndexPaths::new(&self.root));
        }
        let name = fs::read_to_string(&pointer).with_context(|| format!("reading {}", pointer.display()))?;
        let name = name.trim();
        if parse_generation(name).is_none() {
            bail!("{} names an invalid generation {name:?}", pointer.display());
        }
        Ok(IndexPaths::new(self.root.join(name)))
    }

    /// Load the live generation, returning it with its paths.
    pub fn open(&self) -> Result<(Index, IndexPaths)> {
        let paths = self.current()?;
        let index = load_index(&paths)?;
        Ok((index, paths))
    }

    /// Create an empty staging directory for the next generation.
    pub fn stage(&self) -> Result<StagedGeneration> {
        create_dir_all(&self.root).with_context(|| format!("creating {}", self.root.display()))?;
        let next = self.generations()?.into_iter().max().unwrap_or(0) + 1;
        let name = format!("{GEN_PREFIX}{next:08}");
        let staging = self.root.join(format!("{name}{STAGING_SUFFIX}"));
        if staging.is_dir() {
            fs::remove_dir_all(&staging)?;
        }
        create_dir(&staging).with_context(|| format!("creating {}", staging.display()))?;
        Ok(StagedGeneration { root: self.root.clone(), name, paths: IndexPaths::new(staging), committed: false })
    }

    /// Numbers of the committed generation directories.
    fn generations(&self) -> Result<Vec<u64>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() { continue; }
            if let Some(n) = entry.file_name().to_str().and_then(parse_generation) {
                out.push(n);
            }
        }
        Ok(out)
    }

    fn current_name(&self) -> Option<String> {
        fs::read_to_string(self.root.join(CURRENT)).ok().map(|s| s.trim().to_string())
    }

    /// Remove committed generations other than `keep`.
    fn prune(&self, keep: &[&str]) {
        let Ok(entries) = fs::read_dir(&self.root) else { return };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if parse_generation(name).is_none() || keep.contains(&name) { continue; }
            if let Err(err) = fs::remove_dir_all(entry.path()) {
                tracing::warn!(generation = name, %err, "could not remove old generation");
            }
        }
    }
}

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix(GEN_PREFIX)?.parse().ok()
}

/// A generation being written. Dropped without [`commit`](Self::commit), its
/// directory is removed.
#[derive(Debug)]
pub struct StagedGeneration {
    root: PathBuf,
    name: String,
    paths: IndexPaths,
    committed: bool,
}

impl StagedGeneration {
    pub fn paths(&self) -> &IndexPaths { &self.paths }

    /// Make the staged generation live. The generation it replaces is kept so
    /// readers holding it can finish; older ones are removed.
    pub fn commit(mut self) -> Result<IndexPaths> {
        let root = IndexRoot::new(&self.root);
        let previous = root.current_name();
        let target = self.root.join(&self.name);
        rename(&self.paths.root, &target)
            .with_context(|| format!("moving {} to {}", self.paths.root.display(), target.display()))?;
        self.paths = IndexPaths::new(&target);

        let tmp = self.root.join(format!("{CURRENT}.tmp"));
        let mut f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(self.name.as_bytes())?;
        f.sync_all()?;
        rename(&tmp, self.root.join(CURRENT))?;
        self.committed = true;

        let mut keep = vec![self.name.as_str()];
        if let Some(prev) = previous.as_deref() { keep.push(prev); }
        root.prune(&keep);
        tracing::info!(generation = %self.name, "index generation committed");
        Ok(self.paths.clone())
    }
}

impl Drop for StagedGeneration {
    fn drop(&mut self) {
        if !self.committed && self.paths.root.exists() {
            if let Err(err) = fs::remove_dir_all(&self.paths.root) {
                tracing::warn!(path = %self.paths.root.display(), %err, "could not remove staging directory");
            }
        }
    }
}

/// Write the index next to its final location and rename it into place.
pub fn save_index(paths: &IndexPaths, index: &Index) -> Result<()> {
    create_dir_all(&paths.root)?;
    let tmp = paths.root.join("index.bin.tmp");
    let bytes = bincode::serialize(index)?;
    let mut f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    rename(&tmp, paths.index())?;
    Ok(())
}

/// Read and check an index. The same rules apply as when building one.
pub fn load_index(paths: &IndexPaths) -> Result<Index> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        bail!("index format version {} is not supported (expected {FORMAT_VERSION})", meta.version);
    }
    let path = paths.index();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index: Index = bincode::deserialize(&buf).context("decoding index")?;
    index.validate().with_context(|| format!("checking {}", path.display()))?;
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Persist the index and its meta file together.
pub fn save_all(paths: &IndexPaths, index: &Index) -> Result<MetaFile> {
    let meta = MetaFile::for_index(index)?;
    save_index(paths, index)?;
    save_meta(paths, &meta)?;
    Ok(meta)
}

/// Store a document's raw text for snippet extraction.
pub fn save_text(paths: &IndexPaths, doc_id: DocId, text: &str) -> Result<()> {
    create_dir_all(paths.texts_dir())?;
    fs::write(paths.root.join(IndexPaths::text_rel(doc_id)), text)?;
    Ok(())
}

/// Stored text of a document, or `None` if none was saved.
pub fn load_text(paths: &IndexPaths, doc_id: DocId) -> Option<String> {
    fs::read_to_string(paths.root.join(IndexPaths::text_rel(doc_id))).ok()
}
