//! Git context layer — recent commit history ranked by relevance to the
//! current query (spec §4.4, §3).
//!
//! First use per session shells out to `git log` and caches the parse in
//! `cortex_store`'s `git_commit` table; later `gather` calls in the same
//! session reuse the cache unless a `GitRefreshRequested` event arrives.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use cortex_core::ProjectId;
use cortex_embed::{cosine_similarity, EmbeddingVector, EmbeddingsClient};
use cortex_store::{GitCommitRecord, Store};
use cortex_tokens::TokenBudget;

use crate::error::MemoryError;
use crate::types::{GatherRequest, LayerOutput};

const MAX_COMMITS: usize = 50;
const LOG_WALL_CLOCK_CEILING: Duration = Duration::from_secs(3);
const TOP_N: usize = 8;

/// Ranks and formats recent commit history for a project.
pub struct GitContextLayer {
    store: Arc<Store>,
    embeddings: Arc<dyn EmbeddingsClient>,
    root_path: String,
    refreshed: AtomicBool,
    warned_not_a_repo: AtomicBool,
}

impl GitContextLayer {
    /// Construct a layer rooted at `root_path`, the project's working
    /// directory.
    pub fn new(store: Arc<Store>, embeddings: Arc<dyn EmbeddingsClient>, root_path: impl Into<String>) -> Self {
        Self {
            store,
            embeddings,
            root_path: root_path.into(),
            refreshed: AtomicBool::new(false),
            warned_not_a_repo: AtomicBool::new(false),
        }
    }

    /// Force the next `gather` to re-read and re-embed commit history.
    pub fn invalidate(&self) {
        self.refreshed.store(false, Ordering::SeqCst);
    }

    /// Rank cached commits by similarity to `request.query` and format
    /// the top matches within `budget_tokens`. Inert (returns empty
    /// output) when the project root isn't a git repository.
    pub async fn gather(&self, request: &GatherRequest, budget_tokens: usize) -> Result<LayerOutput, MemoryError> {
        if !self.refreshed.swap(true, Ordering::SeqCst) {
            self.refresh(&request.project_id).await?;
        }

        let commits = self.store.list_git_commits(&request.project_id)?;
        if commits.is_empty() {
            return Ok(LayerOutput::empty());
        }

        let query_embedding = self
            .embeddings
            .embed(std::slice::from_ref(&request.query))
            .await?
            .pop()
            .map(|o| o.vector)
            .ok_or_else(|| {
                cortex_core::error::EmbeddingError::Unavailable("empty embed response".into())
            })?;

        let mut ranked: Vec<(f32, &GitCommitRecord)> = Vec::with_capacity(commits.len());
        for commit in &commits {
            let vector = match EmbeddingVector::from_bytes(&commit.embedding) {
                Ok(v) if v.dim() == query_embedding.dim() => v,
                _ => continue,
            };
            let similarity = cosine_similarity(&vector, &query_embedding)?;
            ranked.push((similarity, commit));
        }
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut out = String::new();
        let mut tokens_used = 0usize;
        for (_, commit) in ranked.into_iter().take(TOP_N) {
            let short_hash = &commit.hash[..commit.hash.len().min(8)];
            let line = format!(
                "{short_hash} - {} ({} files)",
                commit.message.lines().next().unwrap_or(""),
                commit.files_changed.len()
            );
            let line_tokens = TokenBudget::count(&line);
            if tokens_used + line_tokens > budget_tokens {
                break;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&line);
            tokens_used += line_tokens;
        }

        Ok(LayerOutput {
            text: out,
            tokens_used,
            chunk_ids: Vec::new(),
        })
    }

    async fn refresh(&self, project_id: &ProjectId) -> Result<(), MemoryError> {
        let started = Instant::now();
        let commits = match self.read_git_log() {
            Some(commits) => commits,
            None => {
                if !self.warned_not_a_repo.swap(true, Ordering::SeqCst) {
                    tracing::warn!(root = %self.root_path, "git context layer: not a git repository");
                }
                return Ok(());
            }
        };

        let texts: Vec<String> = commits
            .iter()
            .map(|c| format!("{}\n{}", c.message, c.files_changed.join(" ")))
            .collect();
        let embedded = self.embeddings.embed(&texts).await?;

        for (commit, outcome) in commits.into_iter().zip(embedded.into_iter()) {
            if started.elapsed() > LOG_WALL_CLOCK_CEILING {
                // Accept partial results rather than blocking the turn
                // any longer on history that keeps growing.
                break;
            }
            self.store.upsert_git_commit(&GitCommitRecord {
                project_id: project_id.clone(),
                hash: commit.hash,
                author: commit.author,
                date: commit.date,
                message: commit.message,
                files_changed: commit.files_changed,
                diff_chunks: Vec::new(),
                embedding: outcome.vector.to_bytes(),
                embedding_degraded: outcome.degraded,
            })?;
        }
        Ok(())
    }

    fn read_git_log(&self) -> Option<Vec<GitCommitRecord>> {
        let output = Command::new("git")
            .args([
                "log",
                &format!("-{MAX_COMMITS}"),
                "--name-only",
                "--date=iso-strict",
                "--pretty=format:%H%x1f%an <%ae>%x1f%ad%x1f%s%x1e",
            ])
            .current_dir(&self.root_path)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut commits = Vec::new();
        for record in stdout.split('\u{1e}') {
            let record = record.trim();
            if record.is_empty() {
                continue;
            }
            let mut fields = record.splitn(4, '\u{1f}');
            let (Some(hash), Some(author), Some(date), Some(rest)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let mut lines = rest.lines();
            let message = lines.next().unwrap_or_default().to_string();
            let files_changed: Vec<String> = lines.filter(|l| !l.trim().is_empty()).map(str::to_string).collect();
            let date = chrono::DateTime::parse_from_rfc3339(date)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            commits.push(GitCommitRecord {
                project_id: ProjectId::new(""),
                hash: hash.to_string(),
                author: author.to_string(),
                date,
                message,
                files_changed,
                diff_chunks: Vec::new(),
                embedding: Vec::new(),
                embedding_degraded: false,
            });
        }
        Some(commits)
    }
}
