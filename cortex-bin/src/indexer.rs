//! Project chunk indexer backing the `index` subcommand.
//!
//! The core treats chunk *retrieval* as its own subsystem (spec §4.4)
//! but leaves how chunks get populated unspecified beyond the data
//! model (spec §3). This walks the project tree, splits text files into
//! fixed-size chunks, embeds them, and upserts them into the store —
//! grounded on `cortex_tool::LsTool`'s directory-walk style, generalized
//! to recurse and to skip binary/vendor directories.

use std::path::{Path, PathBuf};

use chrono::Utc;
use cortex_core::{ChunkId, ProjectId};
use cortex_embed::EmbeddingsClient;
use cortex_store::{Chunk, Store};

const CHUNK_SIZE_BYTES: usize = 2_000;
const MAX_FILE_SIZE_BYTES: u64 = 1_000_000;
const SKIP_DIRS: &[&str] = &[".git", ".cortex", "target", "node_modules", "dist", "build"];

/// Walk `root`, splitting each text file into ~[`CHUNK_SIZE_BYTES`]
/// chunks, embed them, and upsert them for `project_id`. Returns the
/// number of chunks written.
pub async fn index_project(
    root: &Path,
    project_id: &ProjectId,
    store: &Store,
    embeddings: &dyn EmbeddingsClient,
) -> anyhow::Result<usize> {
    let mut files = Vec::new();
    collect_files(root, &mut files)?;

    let mut written = 0usize;
    for path in files {
        let Ok(content) = tokio::fs::read_to_string(&path).await else {
            continue; // binary or unreadable; skip rather than fail the whole index
        };
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .display()
            .to_string();

        let mut offset = 0usize;
        let mut texts = Vec::new();
        let mut ranges = Vec::new();
        while offset < content.len() {
            let end = char_boundary_at_or_before(&content, offset + CHUNK_SIZE_BYTES);
            if end <= offset {
                break;
            }
            texts.push(content[offset..end].to_string());
            ranges.push((offset, end));
            offset = end;
        }
        if texts.is_empty() {
            continue;
        }

        let outcomes = embeddings.embed(&texts).await?;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let (start, end) = ranges[i];
            let chunk = Chunk {
                id: ChunkId::new(format!("{rel}#{start}-{end}")),
                project_id: project_id.clone(),
                path: rel.clone(),
                content: texts[i].clone(),
                chunk_type: "code".into(),
                byte_start: start as i64,
                byte_end: end as i64,
                embedding: outcome.vector.to_bytes(),
                embedding_degraded: outcome.degraded,
                last_used_at: Utc::now(),
            };
            store.upsert_chunk(&chunk)?;
            written += 1;
        }
    }
    Ok(written)
}

/// The largest char boundary of `text` at or before `max`, so a chunk
/// split never lands inside a multi-byte UTF-8 sequence.
fn char_boundary_at_or_before(text: &str, max: usize) -> usize {
    let max = max.min(text.len());
    let mut b = max;
    while b > 0 && !text.is_char_boundary(b) {
        b -= 1;
    }
    b
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() {
            if SKIP_DIRS.contains(&name.as_ref()) || name.starts_with('.') {
                continue;
            }
            collect_files(&path, out)?;
        } else if let Ok(meta) = entry.metadata() {
            if meta.len() <= MAX_FILE_SIZE_BYTES {
                out.push(path);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cortex_core::error::EmbeddingError;
    use cortex_embed::EmbeddingOutcome;
    use cortex_embed::EmbeddingVector;

    struct FixedEmbeddings;

    #[async_trait]
    impl EmbeddingsClient for FixedEmbeddings {
        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingOutcome>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|_| EmbeddingOutcome {
                    vector: EmbeddingVector::new(vec![1.0, 0.0, 0.0]),
                    degraded: false,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn indexes_text_files_and_skips_dotdirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("ignored"), "x").unwrap();

        let store = Store::open_in_memory().unwrap();
        let project_id = ProjectId::new("p1");
        store
            .create_project(&cortex_store::Project {
                id: project_id.clone(),
                root_path: dir.path().display().to_string(),
                name: "p1".into(),
                created_at: Utc::now(),
            })
            .unwrap();

        let written = index_project(dir.path(), &project_id, &store, &FixedEmbeddings)
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.list_chunks(&project_id).unwrap().len(), 1);
    }
}
