//! `cortex` — CLI entry point wiring every component in §4 into one
//! running process (spec §6): config/env loading, tracing setup,
//! session startup/resume, and the single-turn or `index` command.

mod approval_prompt;
mod cli;
mod config;
mod exit;
mod indexer;
mod observer;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cortex_core::error::ConfigError;
use cortex_core::hook::ObserverRegistry;
use cortex_embed::{CachedEmbeddingsClient, EmbeddingsClient, HttpEmbeddingsClient};
use cortex_exec::{ApprovalGate, ApprovalPrompt, AutoDenyPrompt, Executor, PermissionPolicy};
use cortex_memory::{EphemeralLayer, GitContextLayer, KnowledgeLayer, MemoryManager, RetrievalLayer};
use cortex_orch::{KnowledgeStateStore, Orchestrator, SessionManager};
use cortex_planner::Planner;
use cortex_provider::{AnthropicLikeProvider, Provider};
use cortex_store::Store;
use cortex_tokens::OperatingMode;

use crate::approval_prompt::TtyApprovalPrompt;
use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::observer::{HttpMonitoringObserver, TracingObserver};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("cortex: {err}");
            exit::GENERIC_FAILURE
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("cortex: configuration error: {e}");
            return Ok(exit::CONFIG_ERROR);
        }
    };
    init_tracing(cfg.debug);

    let root = cli
        .root
        .clone()
        .unwrap_or(std::env::current_dir().map_err(|e| ConfigError::Invalid(e.to_string()))?);

    let db_path = root.join(".cortex").join("store.db");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = match Store::open(&db_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("cortex: storage unavailable: {e}");
            return Ok(exit::GENERIC_FAILURE);
        }
    };

    let embeddings = build_embeddings_client(&cfg, store.clone());

    if matches!(cli.command, Some(Command::Index)) {
        return run_index(&root, &store, embeddings.as_ref()).await;
    }

    let mode = OperatingMode::Concise;
    let (mut session, resumed) = match SessionManager::start(&root, store.clone(), mode) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("cortex: {e}");
            return Ok(exit::GENERIC_FAILURE);
        }
    };

    let ephemeral = Arc::new(EphemeralLayer::new());
    if let Some(resumed) = resumed {
        ephemeral.restore(resumed.turns, resumed.working);
    }

    let memory = Arc::new(MemoryManager::new(
        ephemeral.clone(),
        RetrievalLayer::new(store.clone(), embeddings.clone()),
        KnowledgeLayer::new(store.clone()),
        GitContextLayer::new(store.clone(), embeddings.clone(), root.display().to_string()),
    ));

    let provider: Arc<dyn Provider> = match &cfg.anthropic_api_key {
        Some(key) => Arc::new(AnthropicLikeProvider::new(key.clone()).model(cfg.model.clone())),
        None => {
            eprintln!("cortex: configuration error: ANTHROPIC_API_KEY is not set");
            return Ok(exit::CONFIG_ERROR);
        }
    };
    let planner = Arc::new(Planner::new(provider));

    let memory_store = Arc::new(KnowledgeStateStore::new(store.clone()));
    let registry = Arc::new(cortex_tool::canonical_registry(memory_store));

    let gate = ApprovalGate::new(cfg.approval_mode);
    let policy = PermissionPolicy::default();
    let prompt: Arc<dyn ApprovalPrompt> = if cli.non_interactive {
        Arc::new(AutoDenyPrompt)
    } else {
        Arc::new(TtyApprovalPrompt)
    };

    let mut observers = ObserverRegistry::new();
    observers.add(Arc::new(TracingObserver));
    if cfg.enable_monitoring {
        observers.add(Arc::new(HttpMonitoringObserver::new(cfg.monitoring_url.clone())));
    }
    let observers = Arc::new(observers);

    let executor = Arc::new(Executor::new(registry.clone(), gate, policy, prompt, observers.clone()));

    let orchestrator = Orchestrator::new(
        session.project_id().clone(),
        session.session_id().clone(),
        mode,
        memory,
        planner,
        executor,
        registry,
        observers,
        root.clone(),
    );

    let user_prompt = match cli.prompt_text() {
        Some(text) => text.to_string(),
        None => read_stdin_prompt()?,
    };

    let result = orchestrator.handle_turn(&user_prompt).await;

    if let Some(text) = &result.response {
        println!("{text}");
    }
    if let Some(err) = &result.error {
        eprintln!("cortex: {err}");
    }

    session.record_turn(
        &ephemeral,
        mode,
        result.total_tokens,
        result.section_usage.clone(),
        result.chunk_ids.clone(),
    )?;
    session.shutdown()?;

    Ok(if result.success { exit::SUCCESS } else { exit::GENERIC_FAILURE })
}

fn build_embeddings_client(cfg: &AppConfig, store: Arc<Store>) -> Arc<dyn EmbeddingsClient> {
    let inner = match &cfg.embeddings_api_key {
        Some(key) => HttpEmbeddingsClient::new(
            key.clone(),
            cfg.embeddings_url.clone(),
            cfg.embeddings_model.clone(),
            cfg.embeddings_dimension,
        ),
        None => {
            tracing::warn!("no embeddings API key configured, retrieval runs entirely on the pseudo-embedding fallback");
            HttpEmbeddingsClient::new(
                String::new(),
                cfg.embeddings_url.clone(),
                cfg.embeddings_model.clone(),
                cfg.embeddings_dimension,
            )
        }
    };
    Arc::new(CachedEmbeddingsClient::new(inner, store, cfg.embeddings_model.clone()))
}

async fn run_index(root: &PathBuf, store: &Arc<Store>, embeddings: &dyn EmbeddingsClient) -> anyhow::Result<i32> {
    let project_id = cortex_core::ProjectId::from_root_path(&root.display().to_string());
    if store.get_project(&project_id)?.is_none() {
        store.create_project(&cortex_store::Project {
            id: project_id.clone(),
            root_path: root.display().to_string(),
            name: root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root.display().to_string()),
            created_at: chrono::Utc::now(),
        })?;
    }
    let written = indexer::index_project(root, &project_id, store, embeddings).await?;
    println!("indexed {written} chunks under {}", root.display());
    Ok(exit::SUCCESS)
}

fn read_stdin_prompt() -> anyhow::Result<String> {
    use std::io::Read;
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("missing prompt: pass --prompt/-p or pipe one over stdin"));
    }
    Ok(trimmed.to_string())
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
