//! Write-through persistence for user state
//!
//! One pretty-printed JSON document per user id. Writes go to a temp file in
//! the same directory and are renamed into place so a crash mid-write never
//! leaves a torn document behind.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::store::state::UserState;

/// Disk layout manager for per-user state documents
pub struct StatePersistence {
    storage_dir: PathBuf,
}

impl StatePersistence {
    /// Create a persistence manager rooted at `storage_dir`
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        if !storage_dir.exists() {
            fs::create_dir_all(&storage_dir)
                .context("Failed to create user state storage directory")?;
        }

        Ok(Self { storage_dir })
    }

    /// Save one user's state, replacing any previous document
    pub fn save(&self, user_id: &str, state: &UserState) -> Result<()> {
        let path = self.user_path(user_id);
        let tmp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(state)
            .context("Failed to serialize user state")?;

        fs::write(&tmp_path, json)
            .context("Failed to write user state file")?;
        fs::rename(&tmp_path, &path)
            .context("Failed to move user state file into place")?;

        Ok(())
    }

    /// Load one user's state; a user never seen before starts empty
    pub fn load(&self, user_id: &str) -> Result<UserState> {
        let path = self.user_path(user_id);

        if !path.exists() {
            return Ok(UserState::default());
        }

        let json = fs::read_to_string(&path)
            .context("Failed to read user state file")?;

        let state: UserState = serde_json::from_str(&json)
            .context("Failed to deserialize user state")?;

        Ok(state)
    }

    /// List all persisted user ids
    pub fn list_users(&self) -> Result<Vec<String>> {
        let mut users = Vec::new();

        for entry in fs::read_dir(&self.storage_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() {
                if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                    if let Some(id) = filename
                        .strip_prefix("user_")
                        .and_then(|rest| rest.strip_suffix(".json"))
                    {
                        users.push(id.to_string());
                    }
                }
            }
        }

        Ok(users)
    }

    /// Get storage directory
    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    fn user_path(&self, user_id: &str) -> PathBuf {
        self.storage_dir.join(format!("user_{}.json", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_persistence() -> (StatePersistence, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let persistence = StatePersistence::new(temp_dir.path().to_path_buf()).unwrap();
        (persistence, temp_dir)
    }

    #[test]
    fn test_persistence_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let persistence = StatePersistence::new(nested.clone()).unwrap();
        assert!(persistence.storage_dir().exists());
        assert_eq!(persistence.storage_dir(), &nested);
    }

    #[test]
    fn test_unknown_user_starts_empty() {
        let (persistence, _temp) = create_test_persistence();
        let state = persistence.load("alice").unwrap();
        assert!(state.sessions.is_empty());
        assert_eq!(state.progress().total_sessions, 0);
    }

    #[test]
    fn test_save_and_reload() {
        let (persistence, _temp) = create_test_persistence();

        let mut state = UserState::default();
        state.append_chat_turn("s1", "hi", "hello", 1000);
        persistence.save("alice", &state).unwrap();

        let loaded = persistence.load("alice").unwrap();
        assert_eq!(loaded.chat_history("s1").len(), 2);
    }

    #[test]
    fn test_list_users() {
        let (persistence, _temp) = create_test_persistence();

        persistence.save("alice", &UserState::default()).unwrap();
        persistence.save("bob", &UserState::default()).unwrap();

        let mut users = persistence.list_users().unwrap();
        users.sort();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (persistence, _temp) = create_test_persistence();
        persistence.save("alice", &UserState::default()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(persistence.storage_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }
}
