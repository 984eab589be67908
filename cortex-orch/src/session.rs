//! Session Manager (spec §4.9, component C11): project/session
//! lifecycle, crash detection and resume, advisory locking, and
//! periodic snapshotting.
//!
//! Grounded on `neuron-state-fs`'s plain-filesystem persistence style,
//! generalized from a single state blob to the snapshot/resume cycle
//! spec §4.9 describes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use cortex_core::error::StorageError;
use cortex_core::{ProjectId, SessionId};
use cortex_memory::{EphemeralLayer, Turn, WorkingContext};
use cortex_store::{Project, Session, SessionSnapshot, Store};
use cortex_tokens::{OperatingMode, Section, TokenBudget};
use std::collections::HashMap;
use uuid::Uuid;

use crate::lock::AdvisoryLock;

/// Write a snapshot every this many recorded turns (spec §4.9: "every
/// K operations").
const SNAPSHOT_EVERY_N_TURNS: u64 = 3;
/// Keep at most this many snapshots per session (spec §9 decision: M=20).
const MAX_SNAPSHOTS_PER_SESSION: i64 = 20;
/// A session whose latest snapshot is older than this is abandoned
/// rather than resumed (spec §4.9 step 2).
const RESUME_WINDOW: ChronoDuration = ChronoDuration::hours(24);

fn mode_str(mode: OperatingMode) -> &'static str {
    match mode {
        OperatingMode::Direct => "direct",
        OperatingMode::Concise => "concise",
        OperatingMode::Deep => "deep",
    }
}

/// Ephemeral-layer state recovered from a snapshot, handed back to the
/// caller so it can restore the memory manager before the first turn.
pub struct ResumedState {
    /// Recent turns to replay into the ephemeral layer.
    pub turns: Vec<Turn>,
    /// Working context (current file, focus files, last error, diff).
    pub working: WorkingContext,
    /// Token budget usage recorded at snapshot time.
    pub token_budget: TokenBudget,
    /// Chunk ids that were in context at snapshot time.
    pub retrieval_ids: Vec<String>,
}

/// Owns the project's advisory lock and the active session row. Writes
/// a snapshot every [`SNAPSHOT_EVERY_N_TURNS`] recorded turns and on
/// clean shutdown; prunes to the last [`MAX_SNAPSHOTS_PER_SESSION`].
pub struct SessionManager {
    store: Arc<Store>,
    project: Project,
    session: Session,
    lock: Option<AdvisoryLock>,
    next_seq: i64,
    turns_since_snapshot: u64,
}

impl SessionManager {
    /// Start-up flow (spec §4.9 steps 1-4): hash the project root to a
    /// project id, look for an existing open session to resume (if its
    /// latest snapshot is fresh enough) or start fresh, then acquire the
    /// project's advisory lock.
    pub fn start(
        root_path: impl AsRef<Path>,
        store: Arc<Store>,
        mode: OperatingMode,
    ) -> Result<(Self, Option<ResumedState>), StorageError> {
        let root_path = root_path.as_ref();
        let root_str = root_path.display().to_string();
        let project_id = ProjectId::from_root_path(&root_str);

        let project = match store.get_project(&project_id)? {
            Some(p) => p,
            None => {
                let name = root_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| root_str.clone());
                let project = Project {
                    id: project_id.clone(),
                    root_path: root_str.clone(),
                    name,
                    created_at: Utc::now(),
                };
                store.create_project(&project)?;
                project
            }
        };

        let lock_path = root_path.join(".cortex").join("lock");
        let lock = AdvisoryLock::acquire(&lock_path).map_err(|e| StorageError::Other(Box::new(e)))?;

        let open_session = store
            .list_sessions(&project.id)?
            .into_iter()
            .find(|s| s.ended_at.is_none());

        let (session, resumed, next_seq) = match open_session {
            Some(existing) => {
                let latest = store.latest_snapshot(&existing.id)?;
                let fresh_enough = latest
                    .as_ref()
                    .map(|s| Utc::now() - s.created_at < RESUME_WINDOW)
                    .unwrap_or(false);

                if fresh_enough {
                    let snapshot = latest.expect("fresh_enough implies latest is Some");
                    tracing::info!(session_id = %existing.id, seq = snapshot.seq, "resuming crashed session from snapshot");
                    let resumed = decode_snapshot(&snapshot)?;
                    (existing, Some(resumed), snapshot.seq + 1)
                } else {
                    tracing::warn!(session_id = %existing.id, "session has no recent snapshot, marking ended and starting fresh");
                    store.end_session(&existing.id, Utc::now(), existing.turn_count, existing.tokens_used)?;
                    (new_session_row(&store, &project.id, mode)?, None, 0)
                }
            }
            None => (new_session_row(&store, &project.id, mode)?, None, 0),
        };

        let manager = Self {
            store,
            project,
            session,
            lock: Some(lock),
            next_seq,
            turns_since_snapshot: 0,
        };
        Ok((manager, resumed))
    }

    /// The active session's id.
    pub fn session_id(&self) -> &SessionId {
        &self.session.id
    }

    /// The active project's id.
    pub fn project_id(&self) -> &ProjectId {
        &self.project.id
    }

    /// Update the running turn/token counters after a turn completes,
    /// writing a snapshot every [`SNAPSHOT_EVERY_N_TURNS`] turns.
    pub fn record_turn(
        &mut self,
        ephemeral: &EphemeralLayer,
        mode: OperatingMode,
        tokens_used: usize,
        section_usage: HashMap<Section, usize>,
        retrieval_ids: Vec<String>,
    ) -> Result<(), StorageError> {
        self.session.turn_count += 1;
        self.session.tokens_used += tokens_used as i64;
        self.turns_since_snapshot += 1;

        if self.turns_since_snapshot >= SNAPSHOT_EVERY_N_TURNS {
            self.write_snapshot(ephemeral, mode, section_usage, retrieval_ids)?;
            self.turns_since_snapshot = 0;
        }
        Ok(())
    }

    /// Force a snapshot regardless of the turn counter (used on clean
    /// shutdown so the last turns aren't lost before the next resume
    /// window check).
    pub fn write_snapshot(
        &mut self,
        ephemeral: &EphemeralLayer,
        mode: OperatingMode,
        section_usage: HashMap<Section, usize>,
        retrieval_ids: Vec<String>,
    ) -> Result<(), StorageError> {
        let ephemeral_state = serde_json::to_vec(&EphemeralSnapshot {
            turns: ephemeral.turns(),
            working: ephemeral.working_context(),
        })
        .map_err(|e| StorageError::Other(Box::new(e)))?;
        let retrieval_blob =
            serde_json::to_vec(&retrieval_ids).map_err(|e| StorageError::Other(Box::new(e)))?;
        let token_budget_blob =
            serde_json::to_vec(&section_usage).map_err(|e| StorageError::Other(Box::new(e)))?;

        self.store.create_snapshot(&SessionSnapshot {
            id: Uuid::new_v4().to_string(),
            session_id: self.session.id.clone(),
            seq: self.next_seq,
            ephemeral_state,
            retrieval_ids: retrieval_blob,
            mode: mode_str(mode).to_string(),
            token_budget: token_budget_blob,
            created_at: Utc::now(),
        })?;
        self.next_seq += 1;
        self.store.prune_snapshots(&self.session.id, MAX_SNAPSHOTS_PER_SESSION)?;
        // Keep the store's row in sync so a crash (no `shutdown` call)
        // still leaves cumulative turn/token counters intact for the
        // next `start` to resume from (spec §8 scenario 5).
        self.store
            .update_session_counters(&self.session.id, self.session.turn_count, self.session.tokens_used)?;
        Ok(())
    }

    /// Clean shutdown: mark the session ended and release the advisory
    /// lock. Idempotent — calling it twice is a no-op the second time.
    pub fn shutdown(&mut self) -> Result<(), StorageError> {
        if self.session.ended_at.is_none() {
            self.store.end_session(
                &self.session.id,
                Utc::now(),
                self.session.turn_count,
                self.session.tokens_used,
            )?;
            self.session.ended_at = Some(Utc::now());
        }
        self.lock.take();
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct EphemeralSnapshot {
    turns: Vec<Turn>,
    working: WorkingContext,
}

fn new_session_row(store: &Store, project_id: &ProjectId, mode: OperatingMode) -> Result<Session, StorageError> {
    let session = Session {
        id: SessionId::new(Uuid::new_v4().to_string()),
        project_id: project_id.clone(),
        mode: mode_str(mode).to_string(),
        started_at: Utc::now(),
        ended_at: None,
        turn_count: 0,
        tokens_used: 0,
    };
    store.create_session(&session)?;
    Ok(session)
}

fn decode_snapshot(snapshot: &SessionSnapshot) -> Result<ResumedState, StorageError> {
    let decoded: EphemeralSnapshot =
        serde_json::from_slice(&snapshot.ephemeral_state).map_err(|e| StorageError::Other(Box::new(e)))?;
    let retrieval_ids: Vec<String> =
        serde_json::from_slice(&snapshot.retrieval_ids).map_err(|e| StorageError::Other(Box::new(e)))?;
    let section_usage: HashMap<Section, usize> =
        serde_json::from_slice(&snapshot.token_budget).map_err(|e| StorageError::Other(Box::new(e)))?;
    let mode = match snapshot.mode.as_str() {
        "direct" => OperatingMode::Direct,
        "deep" => OperatingMode::Deep,
        _ => OperatingMode::Concise,
    };
    Ok(ResumedState {
        turns: decoded.turns,
        working: decoded.working,
        token_budget: TokenBudget::from_used(mode, section_usage),
        retrieval_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_root() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn start_creates_project_and_session_for_a_fresh_root() {
        let dir = tmp_root();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (mgr, resumed) = SessionManager::start(dir.path(), store, OperatingMode::Concise).unwrap();
        assert!(resumed.is_none());
        assert_eq!(mgr.session.turn_count, 0);
    }

    #[test]
    fn record_turn_snapshots_every_n_turns() {
        let dir = tmp_root();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (mut mgr, _) = SessionManager::start(dir.path(), store.clone(), OperatingMode::Concise).unwrap();
        let ephemeral = EphemeralLayer::new();

        for _ in 0..SNAPSHOT_EVERY_N_TURNS {
            mgr.record_turn(&ephemeral, OperatingMode::Concise, 10, HashMap::new(), vec![])
                .unwrap();
        }

        let latest = store.latest_snapshot(mgr.session_id()).unwrap();
        assert!(latest.is_some());
    }

    #[test]
    fn shutdown_ends_the_session_and_releases_the_lock() {
        let dir = tmp_root();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let lock_path = dir.path().join(".cortex").join("lock");
        let (mut mgr, _) = SessionManager::start(dir.path(), store.clone(), OperatingMode::Concise).unwrap();
        assert!(lock_path.exists());
        mgr.shutdown().unwrap();
        assert!(!lock_path.exists());
        let session = store.get_session(mgr.session_id()).unwrap().unwrap();
        assert!(session.ended_at.is_some());
    }

    #[test]
    fn second_start_on_a_locked_root_fails() {
        let dir = tmp_root();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (_mgr, _) = SessionManager::start(dir.path(), store.clone(), OperatingMode::Concise).unwrap();
        let second = SessionManager::start(dir.path(), store, OperatingMode::Concise);
        assert!(second.is_err());
    }

    #[test]
    fn fresh_open_session_is_resumed_from_its_snapshot() {
        let dir = tmp_root();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let ephemeral = EphemeralLayer::new();
        ephemeral.update(&cortex_memory::MemoryEvent::TurnAppended(Turn::new(
            cortex_memory::TurnRole::User,
            "hello",
        )));
        ephemeral.update(&cortex_memory::MemoryEvent::TurnAppended(Turn::new(
            cortex_memory::TurnRole::Assistant,
            "hi there",
        )));

        let crashed_turn_count;
        let crashed_tokens_used;
        let crashed_session_id;
        {
            let (mut mgr, _) = SessionManager::start(dir.path(), store.clone(), OperatingMode::Concise).unwrap();
            mgr.record_turn(&ephemeral, OperatingMode::Concise, 21, HashMap::new(), vec!["chunk-1".into()])
                .unwrap();
            mgr.record_turn(&ephemeral, OperatingMode::Concise, 21, HashMap::new(), vec!["chunk-1".into()])
                .unwrap();
            mgr.write_snapshot(&ephemeral, OperatingMode::Concise, HashMap::new(), vec!["chunk-1".into()])
                .unwrap();
            crashed_turn_count = mgr.session.turn_count;
            crashed_tokens_used = mgr.session.tokens_used;
            crashed_session_id = mgr.session_id().clone();
            // Process "crashes" here: the lock drops at end of scope and
            // `shutdown` is never called, so the session row is left with
            // ended_at = None, same as a real crash.
        }

        let (mgr, resumed) = SessionManager::start(dir.path(), store.clone(), OperatingMode::Concise).unwrap();
        assert_eq!(mgr.session_id(), &crashed_session_id);
        let resumed = resumed.expect("a snapshot younger than 24h must be resumed");
        assert_eq!(resumed.turns.len(), 2);
        assert_eq!(resumed.retrieval_ids, vec!["chunk-1".to_string()]);
        assert_eq!(mgr.session.turn_count, crashed_turn_count);
        assert_eq!(mgr.session.tokens_used, crashed_tokens_used);
    }

    #[test]
    fn stale_open_session_is_ended_not_resumed() {
        let dir = tmp_root();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let project_id = ProjectId::from_root_path(&dir.path().display().to_string());
        store
            .create_project(&Project {
                id: project_id.clone(),
                root_path: dir.path().display().to_string(),
                name: "x".into(),
                created_at: Utc::now(),
            })
            .unwrap();
        let stale_session = Session {
            id: SessionId::new("stale"),
            project_id: project_id.clone(),
            mode: "concise".into(),
            started_at: Utc::now() - ChronoDuration::hours(48),
            ended_at: None,
            turn_count: 3,
            tokens_used: 900,
        };
        store.create_session(&stale_session).unwrap();

        let (mgr, resumed) = SessionManager::start(dir.path(), store.clone(), OperatingMode::Concise).unwrap();
        assert!(resumed.is_none());
        assert_ne!(mgr.session_id().as_str(), "stale");
        let stale_fetched = store.get_session(&SessionId::new("stale")).unwrap().unwrap();
        assert!(stale_fetched.ended_at.is_some());
    }
}
