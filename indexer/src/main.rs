use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docsearch_core::persist::{load_meta, save_all, save_text, IndexRoot};
use docsearch_core::sphinx::{from_searchindex_js, to_searchindex_js};
use docsearch_core::{Index, SearchConfig, SourceDocument};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, query and convert documentation search indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// JSON file with tokenizer and weighting settings
        #[arg(long)]
        config: Option<String>,
    },
    /// Run a query against a built index
    Query {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        q: String,
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        limit: i64,
    },
    /// Write a Sphinx searchindex.js for a built index
    ExportSphinx {
        #[arg(long)]
        index: String,
        #[arg(long)]
        output: String,
    },
    /// Convert a Sphinx searchindex.js into an index directory
    ImportSphinx {
        #[arg(long)]
        input: String,
        #[arg(long)]
        output: String,
    },
    /// Print index statistics
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config } => {
            let config = match config {
                Some(path) => SearchConfig::from_json_file(path)?,
                None => SearchConfig::default(),
            };
            build_index(Path::new(&input), Path::new(&output), config)
        }
        Commands::Query { index, q, limit } => {
            let (index, _) = IndexRoot::new(&index).open()?;
            for hit in index.search(&q, limit)? {
                println!("{}\t{}\t{}\t{}", hit.score, hit.doc_id, hit.path, hit.title);
            }
            Ok(())
        }
        Commands::ExportSphinx { index, output } => {
            let (index, _) = IndexRoot::new(&index).open()?;
            fs::write(&output, to_searchindex_js(&index)?).with_context(|| format!("writing {output}"))?;
            tracing::info!(output, "sphinx index written");
            Ok(())
        }
        Commands::ImportSphinx { input, output } => {
            let src = fs::read_to_string(&input).with_context(|| format!("reading {input}"))?;
            let index = from_searchindex_js(&src)?;
            let staged = IndexRoot::new(&output).stage()?;
            save_all(staged.paths(), &index)?;
            staged.commit()?;
            tracing::info!(output, "sphinx index imported");
            Ok(())
        }
        Commands::Stats { index } => {
            let (index, paths) = IndexRoot::new(&index).open()?;
            let meta = load_meta(&paths)?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            println!("config: {}", serde_json::to_string(index.config())?);
            Ok(())
        }
    }
}

fn build_index(input: &Path, output: &Path, config: SearchConfig) -> Result<()> {
    let docs = read_documents(input)?;
    tracing::info!(num_docs = docs.len(), "read documents");

    // Nothing is written unless the whole collection indexes cleanly, and
    // nothing replaces the live generation until it is completely written.
    let index = Index::build(&docs, config)?;
    let staged = IndexRoot::new(output).stage()?;
    for doc in &docs {
        save_text(staged.paths(), doc.id, &doc.raw_text)?;
    }
    let meta = save_all(staged.paths(), &index)?;
    staged.commit()?;
    tracing::info!(output = %output.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "index build complete");
    Ok(())
}

/// Collect source documents from a JSON/JSONL file or every such file below a directory.
fn read_documents(input: &Path) -> Result<Vec<SourceDocument>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        anyhow::bail!("input {} does not exist", input.display());
    }

    let mut docs = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }
    Ok(docs)
}

fn read_jsonl(file: &Path, docs: &mut Vec<SourceDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: SourceDocument = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        docs.push(doc);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<SourceDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v).with_context(|| format!("document in {}", file.display()))?);
            }
        }
        serde_json::Value::Object(_) => {
            docs.push(serde_json::from_value(json).with_context(|| format!("document in {}", file.display()))?);
        }
        _ => tracing::warn!(file = %file.display(), "skipping file without documents"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_json_arrays_objects_and_jsonl() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"id":1,"path":"a.rst","title":"A","body":"peak"}]"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"id":2,"path":"b.rst","title":"B","raw_text":"stress"}"#).unwrap();
        fs::write(dir.path().join("c.jsonl"), "{\"id\":3,\"path\":\"c\",\"title\":\"C\",\"text\":\"x\"}\n\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let docs = read_documents(dir.path()).unwrap();
        assert_eq!(docs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(docs[1].raw_text, "stress");
    }

    #[test]
    fn build_writes_nothing_on_duplicate_ids() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("docs.json");
        fs::write(&input, r#"[{"id":1,"path":"a","title":"A","body":"x"},{"id":1,"path":"b","title":"B","body":"y"}]"#).unwrap();
        let out = dir.path().join("index");
        assert!(build_index(&input, &out, SearchConfig::default()).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn build_then_load() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("docs.jsonl");
        fs::write(&input, "{\"id\":5,\"path\":\"viewer/index.rst\",\"title\":\"P61A::Viewer\",\"body\":\"peak tracking\"}\n").unwrap();
        let out = dir.path().join("index");
        build_index(&input, &out, SearchConfig::default()).unwrap();
        let (index, paths) = IndexRoot::new(&out).open().unwrap();
        assert_eq!(index.search("viewer", 10).unwrap()[0].doc_id, 5);
        assert_eq!(fs::read_to_string(paths.root.join("texts/5.txt")).unwrap(), "peak tracking");
    }

    #[test]
    fn rebuild_replaces_texts_of_removed_documents() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("index");
        let first = dir.path().join("first.jsonl");
        fs::write(&first, "{\"id\":1,\"path\":\"a\",\"title\":\"A\",\"body\":\"peak\"}\n").unwrap();
        build_index(&first, &out, SearchConfig::default()).unwrap();

        let second = dir.path().join("second.jsonl");
        fs::write(&second, "{\"id\":2,\"path\":\"b\",\"title\":\"B\",\"body\":\"stress\"}\n").unwrap();
        build_index(&second, &out, SearchConfig::default()).unwrap();

        let (index, paths) = IndexRoot::new(&out).open().unwrap();
        assert!(index.document(1).is_none());
        assert!(!paths.root.join("texts/1.txt").exists());
        assert_eq!(fs::read_to_string(paths.root.join("texts/2.txt")).unwrap(), "stress");
    }
}
