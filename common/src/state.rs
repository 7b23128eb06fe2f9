// Persistent monitor state: per-user cursors and already-notified problems
//
// The state lives in a single JSON file that is rewritten after every change.
// Persistence is best-effort: a failed write is logged and reported, while the
// in-memory state keeps the new value.

use crate::errors::StateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// Default location of the state file, relative to the working directory
pub const DEFAULT_STATE_PATH: &str = "data/state.json";

/// StateStore tracks what has already been observed for each user
pub trait StateStore: Send {
    /// Epoch second of the latest processed submission, `None` before the first check
    fn cursor(&self, user_id: &str) -> Option<i64>;

    /// Overwrite the cursor for a user and persist
    fn set_cursor(&mut self, user_id: &str, epoch_second: i64) -> Result<(), StateError>;

    /// Whether an acceptance of this problem was already notified
    fn is_solved(&self, user_id: &str, problem_id: &str) -> bool;

    /// Record that this problem has been notified and persist. Idempotent.
    fn mark_solved(&mut self, user_id: &str, problem_id: &str) -> Result<(), StateError>;
}

/// Key used for a solved (user, problem) pair in the state file
pub fn solved_key(user_id: &str, problem_id: &str) -> String {
    format!("{}:{}", user_id, problem_id)
}

/// On-disk representation of the monitor state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(rename = "lastChecked", default)]
    pub last_checked: BTreeMap<String, i64>,
    #[serde(rename = "solvedProblems", default)]
    pub solved_problems: BTreeMap<String, bool>,
}

impl PersistedState {
    /// Build state from arbitrary JSON, dropping anything malformed.
    ///
    /// A missing or non-object `lastChecked` / `solvedProblems` becomes empty;
    /// individual entries of the wrong type are skipped. Only `true` marks count.
    pub fn from_json(value: &Value) -> Self {
        let mut state = PersistedState::default();

        if let Some(cursors) = value.get("lastChecked").and_then(Value::as_object) {
            for (user_id, epoch) in cursors {
                let parsed = epoch
                    .as_i64()
                    .or_else(|| epoch.as_f64().map(|secs| secs as i64));
                match parsed {
                    Some(epoch_second) => {
                        state.last_checked.insert(user_id.clone(), epoch_second);
                    }
                    None => {
                        warn!(user_id = %user_id, "Ignoring non-numeric cursor in state file");
                    }
                }
            }
        }

        if let Some(solved) = value.get("solvedProblems").and_then(Value::as_object) {
            for (key, flag) in solved {
                if flag.as_bool() == Some(true) {
                    state.solved_problems.insert(key.clone(), true);
                }
            }
        }

        state
    }
}

/// StateStore backed by a JSON file
pub struct JsonFileStateStore {
    path: PathBuf,
    state: PersistedState,
}

impl JsonFileStateStore {
    /// Open the store at `path`, creating the parent directory when needed.
    ///
    /// Never fails on a missing or corrupt file: both start from empty state.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                error!(error = %e, "Failed to create state directory");
            }
        }

        let state = Self::load(&path);
        info!(
            users = state.last_checked.len(),
            solved = state.solved_problems.len(),
            "State store opened"
        );

        Self { path, state }
    }

    fn load(path: &Path) -> PersistedState {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("State file does not exist yet, starting with empty state");
                return PersistedState::default();
            }
            Err(e) => {
                error!(error = %e, "Failed to read state file, using empty state");
                return PersistedState::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(value) => PersistedState::from_json(&value),
            Err(e) => {
                error!(error = %e, "Failed to parse state file, using empty state");
                PersistedState::default()
            }
        }
    }

    /// Write the current state through a temp file so a crash never leaves a truncated file
    fn save(&self) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(&self.state)?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }

    fn save_logged(&self) -> Result<(), StateError> {
        self.save().map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Failed to save state file");
            e
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the in-memory state
    pub fn snapshot(&self) -> PersistedState {
        self.state.clone()
    }
}

impl StateStore for JsonFileStateStore {
    fn cursor(&self, user_id: &str) -> Option<i64> {
        self.state.last_checked.get(user_id).copied()
    }

    fn set_cursor(&mut self, user_id: &str, epoch_second: i64) -> Result<(), StateError> {
        self.state
            .last_checked
            .insert(user_id.to_string(), epoch_second);
        self.save_logged()
    }

    fn is_solved(&self, user_id: &str, problem_id: &str) -> bool {
        self.state
            .solved_problems
            .get(&solved_key(user_id, problem_id))
            .copied()
            .unwrap_or(false)
    }

    fn mark_solved(&mut self, user_id: &str, problem_id: &str) -> Result<(), StateError> {
        if self.is_solved(user_id, problem_id) {
            return Ok(());
        }
        self.state
            .solved_problems
            .insert(solved_key(user_id, problem_id), true);
        self.save_logged()
    }
}

/// Non-durable StateStore, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: PersistedState,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PersistedState {
        self.state.clone()
    }
}

impl StateStore for MemoryStateStore {
    fn cursor(&self, user_id: &str) -> Option<i64> {
        self.state.last_checked.get(user_id).copied()
    }

    fn set_cursor(&mut self, user_id: &str, epoch_second: i64) -> Result<(), StateError> {
        self.state
            .last_checked
            .insert(user_id.to_string(), epoch_second);
        Ok(())
    }

    fn is_solved(&self, user_id: &str, problem_id: &str) -> bool {
        self.state
            .solved_problems
            .contains_key(&solved_key(user_id, problem_id))
    }

    fn mark_solved(&mut self, user_id: &str, problem_id: &str) -> Result<(), StateError> {
        self.state
            .solved_problems
            .insert(solved_key(user_id, problem_id), true);
        Ok(())
    }
}
