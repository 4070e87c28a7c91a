use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A named shortcut mapped to a full command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub alias: String,
    pub command: String,
    pub description: String,
}

/// One row of the append-only execution history. Identity is the
/// `(command, timestamp)` pair; only `favorite` is mutable after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub command: String,
    pub timestamp: DateTime<Utc>,
    pub favorite: bool,
}

/// SQLite-backed store for aliases and execution history.
///
/// A single connection behind a mutex: SQLite is not safe for unsynchronized
/// concurrent writers, so every operation takes the lock. The handle is cheap
/// to clone and safe to share with the execution unit's thread.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database at `path`. Schema creation is idempotent.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS saved_commands (
                id INTEGER PRIMARY KEY,
                alias TEXT NOT NULL UNIQUE,
                command TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )
            "#,
            [],
        )?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY,
                command TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                favorite INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp)",
            [],
        )?;
        Ok(())
    }

    /// Insert a new alias. Fails with `DuplicateAlias` if the key exists;
    /// the existing row is left untouched.
    pub fn save_alias(&self, alias: &str, command: &str, description: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO saved_commands (alias, command, description) VALUES (?1, ?2, ?3)",
            params![alias, command, description],
        )
        .map_err(|e| map_unique_violation(e, alias))?;
        tracing::info!(alias, command, "alias saved");
        Ok(())
    }

    /// Replace the row keyed by `old`. Renaming onto an existing key fails
    /// with `DuplicateAlias`; a missing `old` fails with `AliasNotFound`.
    pub fn update_alias(
        &self,
        old: &str,
        new_alias: &str,
        new_command: &str,
        new_description: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE saved_commands SET alias = ?1, command = ?2, description = ?3 WHERE alias = ?4",
                params![new_alias, new_command, new_description, old],
            )
            .map_err(|e| map_unique_violation(e, new_alias))?;
        if updated == 0 {
            return Err(Error::AliasNotFound(old.to_string()));
        }
        tracing::info!(old, new_alias, "alias updated");
        Ok(())
    }

    /// Idempotent removal; a missing key is not an error.
    pub fn delete_alias(&self, alias: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM saved_commands WHERE alias = ?1",
            params![alias],
        )?;
        Ok(())
    }

    /// Exact-match lookup.
    pub fn find_alias(&self, alias: &str) -> Result<Option<Alias>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT alias, command, description FROM saved_commands WHERE alias = ?1",
                params![alias],
                |row| {
                    Ok(Alias {
                        alias: row.get(0)?,
                        command: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Case-insensitive substring search over alias, command and description,
    /// ordered by alias key.
    pub fn search_aliases(&self, term: &str) -> Result<Vec<Alias>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", term);
        let mut stmt = conn.prepare(
            "SELECT alias, command, description FROM saved_commands
             WHERE alias LIKE ?1 OR command LIKE ?1 OR description LIKE ?1
             ORDER BY alias",
        )?;
        let rows = stmt.query_map(params![pattern], |row| {
            Ok(Alias {
                alias: row.get(0)?,
                command: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        let mut aliases = Vec::new();
        for row in rows {
            aliases.push(row?);
        }
        Ok(aliases)
    }

    /// All alias keys, for the suggestion set.
    pub fn alias_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT alias FROM saved_commands")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    /// Bulk insert that continues past individual duplicate keys rather than
    /// failing the whole batch. Returns the number of rows inserted.
    pub fn import_aliases(&self, entries: &[Alias]) -> Result<usize> {
        let mut inserted = 0;
        for entry in entries {
            match self.save_alias(&entry.alias, &entry.command, &entry.description) {
                Ok(()) => inserted += 1,
                Err(Error::DuplicateAlias(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(inserted)
    }

    /// Insert-only history write.
    pub fn append_history(&self, command: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO history (command, timestamp) VALUES (?1, ?2)",
            params![command, timestamp],
        )?;
        Ok(())
    }

    /// Distinct command strings, most recent first.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT command FROM history
             GROUP BY command
             ORDER BY MAX(timestamp) DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get(0))?;
        let mut commands = Vec::new();
        for row in rows {
            commands.push(row?);
        }
        Ok(commands)
    }

    /// History page sorted favorites first, then most recent first, with an
    /// optional case-insensitive command filter.
    pub fn list_history(&self, filter: Option<&str>, limit: usize) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let pattern = filter.map(|f| format!("%{}%", f));
        let mut stmt = conn.prepare(
            "SELECT command, timestamp, favorite FROM history
             WHERE ?1 IS NULL OR command LIKE ?1
             ORDER BY favorite DESC, timestamp DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok(HistoryEntry {
                command: row.get(0)?,
                timestamp: row.get(1)?,
                favorite: row.get::<_, i64>(2)? != 0,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Flip the favorite flag on the exact `(command, timestamp)` pair.
    /// No-op when the pair does not exist.
    pub fn toggle_favorite(&self, command: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE history SET favorite = 1 - favorite WHERE command = ?1 AND timestamp = ?2",
            params![command, timestamp],
        )?;
        Ok(())
    }
}

fn map_unique_violation(err: rusqlite::Error, alias: &str) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::DuplicateAlias(alias.to_string())
        }
        _ => Error::Storage(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, secs).unwrap()
    }

    #[test]
    fn test_alias_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("ll", "ls -la", "").unwrap();

        let found = store.find_alias("ll").unwrap().unwrap();
        assert_eq!(found.alias, "ll");
        assert_eq!(found.command, "ls -la");
        assert_eq!(found.description, "");
    }

    #[test]
    fn test_duplicate_alias_leaves_original() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("ll", "ls -la", "").unwrap();

        let err = store.save_alias("ll", "ls -l", "short").unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias(a) if a == "ll"));

        let found = store.find_alias("ll").unwrap().unwrap();
        assert_eq!(found.command, "ls -la");
    }

    #[test]
    fn test_alias_keys_are_case_sensitive() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("ll", "ls -la", "").unwrap();
        store.save_alias("LL", "ls -L", "").unwrap();
        assert!(store.find_alias("LL").unwrap().is_some());
        assert!(store.find_alias("Ll").unwrap().is_none());
    }

    #[test]
    fn test_update_alias_rename() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("gs", "git status", "").unwrap();
        store
            .update_alias("gs", "st", "git status -sb", "short status")
            .unwrap();

        assert!(store.find_alias("gs").unwrap().is_none());
        let found = store.find_alias("st").unwrap().unwrap();
        assert_eq!(found.command, "git status -sb");
        assert_eq!(found.description, "short status");
    }

    #[test]
    fn test_update_alias_rename_onto_existing_fails() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("gs", "git status", "").unwrap();
        store.save_alias("gl", "git log", "").unwrap();

        let err = store.update_alias("gs", "gl", "git status", "").unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias(a) if a == "gl"));
        // Both rows unchanged.
        assert_eq!(store.find_alias("gs").unwrap().unwrap().command, "git status");
        assert_eq!(store.find_alias("gl").unwrap().unwrap().command, "git log");
    }

    #[test]
    fn test_update_missing_alias_fails() {
        let store = Store::open_in_memory().unwrap();
        let err = store.update_alias("nope", "x", "y", "").unwrap_err();
        assert!(matches!(err, Error::AliasNotFound(a) if a == "nope"));
    }

    #[test]
    fn test_delete_alias_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("ll", "ls -la", "").unwrap();
        store.delete_alias("ll").unwrap();
        store.delete_alias("ll").unwrap();
        assert!(store.find_alias("ll").unwrap().is_none());
    }

    #[test]
    fn test_search_aliases_matches_all_columns() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("deploy", "make release", "push to prod").unwrap();
        store.save_alias("build", "make all", "").unwrap();
        store.save_alias("clean", "make clean", "").unwrap();

        // By alias, case-insensitive.
        let hits = store.search_aliases("DEPLOY").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].alias, "deploy");

        // By command.
        let hits = store.search_aliases("make").unwrap();
        assert_eq!(hits.len(), 3);
        // Ordered by alias key.
        assert_eq!(hits[0].alias, "build");
        assert_eq!(hits[1].alias, "clean");
        assert_eq!(hits[2].alias, "deploy");

        // By description.
        let hits = store.search_aliases("prod").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].alias, "deploy");
    }

    #[test]
    fn test_import_continues_past_duplicates() {
        let store = Store::open_in_memory().unwrap();
        store.save_alias("ll", "ls -la", "").unwrap();

        let entries = vec![
            Alias {
                alias: "ll".into(),
                command: "ls -l".into(),
                description: String::new(),
            },
            Alias {
                alias: "gs".into(),
                command: "git status".into(),
                description: String::new(),
            },
            Alias {
                alias: "gl".into(),
                command: "git log".into(),
                description: String::new(),
            },
        ];
        let inserted = store.import_aliases(&entries).unwrap();
        assert_eq!(inserted, 2);
        // The pre-existing row kept its command.
        assert_eq!(store.find_alias("ll").unwrap().unwrap().command, "ls -la");
    }

    #[test]
    fn test_recent_history_distinct_most_recent_first() {
        let store = Store::open_in_memory().unwrap();
        store.append_history("ls", ts(1)).unwrap();
        store.append_history("git status", ts(2)).unwrap();
        store.append_history("ls", ts(3)).unwrap();

        let recent = store.recent_history(20).unwrap();
        assert_eq!(recent, vec!["ls".to_string(), "git status".to_string()]);

        let recent = store.recent_history(1).unwrap();
        assert_eq!(recent, vec!["ls".to_string()]);
    }

    #[test]
    fn test_list_history_favorites_first_then_recent() {
        let store = Store::open_in_memory().unwrap();
        store.append_history("a", ts(1)).unwrap();
        store.append_history("b", ts(2)).unwrap();
        store.append_history("c", ts(3)).unwrap();
        store.toggle_favorite("a", ts(1)).unwrap();

        let entries = store.list_history(None, 100).unwrap();
        let commands: Vec<&str> = entries.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["a", "c", "b"]);
        assert!(entries[0].favorite);
    }

    #[test]
    fn test_list_history_filter() {
        let store = Store::open_in_memory().unwrap();
        store.append_history("git status", ts(1)).unwrap();
        store.append_history("ls -la", ts(2)).unwrap();

        let entries = store.list_history(Some("GIT"), 100).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command, "git status");
    }

    #[test]
    fn test_toggle_favorite_double_application_restores() {
        let store = Store::open_in_memory().unwrap();
        store.append_history("ls", ts(1)).unwrap();

        store.toggle_favorite("ls", ts(1)).unwrap();
        assert!(store.list_history(None, 10).unwrap()[0].favorite);

        store.toggle_favorite("ls", ts(1)).unwrap();
        assert!(!store.list_history(None, 10).unwrap()[0].favorite);
    }

    #[test]
    fn test_toggle_favorite_missing_pair_is_noop() {
        let store = Store::open_in_memory().unwrap();
        store.append_history("ls", ts(1)).unwrap();
        // Same command, different instant: not this entry's identity.
        store.toggle_favorite("ls", ts(2)).unwrap();
        assert!(!store.list_history(None, 10).unwrap()[0].favorite);
    }

    #[test]
    fn test_open_is_idempotent_on_existing_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.db");
        {
            let store = Store::open(&path).unwrap();
            store.save_alias("ll", "ls -la", "").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.find_alias("ll").unwrap().unwrap().command, "ls -la");
    }
}
