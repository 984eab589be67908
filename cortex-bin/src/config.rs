//! Environment-driven configuration (spec §6): approval mode, debug
//! logging, monitoring, and LLM/embedding provider credentials. Loading,
//! parsing, and CLI flags are explicitly out of scope for the core
//! (spec §1) — this module is the thin, uninteresting shim the rest of
//! the binary depends on.

use cortex_core::error::ConfigError;
use cortex_exec::ApprovalMode;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1/embeddings";

/// Resolved process configuration, layered from environment variables
/// via the `config` crate (spec §1: "Configuration loading... CLI flag
/// parsing" are named as out-of-scope collaborators, not absent ones).
pub struct AppConfig {
    /// `APPROVAL_MODE` — default/autoEdit/yolo (spec §4.7).
    pub approval_mode: ApprovalMode,
    /// `DEBUG` — verbose tracing output.
    pub debug: bool,
    /// `ENABLE_MONITORING` — emit events to the loopback observer endpoint.
    pub enable_monitoring: bool,
    /// Anthropic-shaped API key for the LLM provider.
    pub anthropic_api_key: Option<String>,
    /// Model id override for the LLM provider.
    pub model: String,
    /// API key for the embeddings provider. Absent means retrieval runs
    /// entirely on the pseudo-embedding fallback (spec §4.2).
    pub embeddings_api_key: Option<String>,
    /// Embeddings endpoint URL.
    pub embeddings_url: String,
    /// Embeddings model id.
    pub embeddings_model: String,
    /// Fixed embedding dimension for this project (spec §4.2).
    pub embeddings_dimension: usize,
    /// Loopback URL the monitoring observer posts events to, when enabled.
    pub monitoring_url: String,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let source = config::Config::builder()
            .set_default("approval_mode", "default")
            .map_err(env_err)?
            .set_default("debug", false)
            .map_err(env_err)?
            .set_default("enable_monitoring", false)
            .map_err(env_err)?
            .set_default("model", DEFAULT_MODEL)
            .map_err(env_err)?
            .set_default("embeddings_url", DEFAULT_EMBEDDING_URL)
            .map_err(env_err)?
            .set_default("embeddings_model", DEFAULT_EMBEDDING_MODEL)
            .map_err(env_err)?
            .set_default("embeddings_dimension", DEFAULT_EMBEDDING_DIMENSION as i64)
            .map_err(env_err)?
            .set_default("monitoring_url", "http://127.0.0.1:9797/events")
            .map_err(env_err)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .map_err(env_err)?;

        let approval_mode_str: String = source.get("approval_mode").map_err(env_err)?;
        let approval_mode = match approval_mode_str.as_str() {
            "default" => ApprovalMode::Default,
            "autoEdit" | "autoedit" | "auto_edit" => ApprovalMode::AutoEdit,
            "yolo" => ApprovalMode::Yolo,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "APPROVAL_MODE must be one of default/autoEdit/yolo, got {other:?}"
                )))
            }
        };

        Ok(Self {
            approval_mode,
            debug: source.get("debug").map_err(env_err)?,
            enable_monitoring: source.get("enable_monitoring").map_err(env_err)?,
            anthropic_api_key: source.get("anthropic_api_key").ok(),
            model: source.get("model").map_err(env_err)?,
            embeddings_api_key: source.get("embeddings_api_key").ok(),
            embeddings_url: source.get("embeddings_url").map_err(env_err)?,
            embeddings_model: source.get("embeddings_model").map_err(env_err)?,
            embeddings_dimension: source
                .get::<i64>("embeddings_dimension")
                .map_err(env_err)? as usize,
            monitoring_url: source.get("monitoring_url").map_err(env_err)?,
        })
    }
}

fn env_err(e: config::ConfigError) -> ConfigError {
    ConfigError::Invalid(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_with_no_environment_overrides() {
        // SAFETY: test-only; no other test in this process reads these vars.
        unsafe {
            std::env::remove_var("APPROVAL_MODE");
            std::env::remove_var("DEBUG");
        }
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert!(!cfg.debug);
        assert!(matches!(cfg.approval_mode, ApprovalMode::Default));
    }
}
