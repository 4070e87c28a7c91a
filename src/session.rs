use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{self, ExecutionRequest, ExecutionUnit};
use crate::safety::{self, Verdict};
use crate::store::Store;
use crate::suggest;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-session state: working directory, theme, config and the store handle.
/// One session drives at most one execution unit at a time.
pub struct Session {
    store: Store,
    config: Config,
    working_dir: PathBuf,
    theme: String,
    in_flight: Arc<AtomicBool>,
}

impl Session {
    pub fn new(store: Store, config: Config) -> Result<Self> {
        let working_dir = match &config.general.working_dir {
            Some(dir) if dir.is_dir() => dir.clone(),
            _ => std::env::current_dir()?,
        };
        let theme = config.general.theme.clone();
        Ok(Self {
            store,
            config,
            working_dir,
            theme,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Validate, resolve and dispatch one command.
    ///
    /// Order: empty check, safety gate on the raw trimmed input, single-level
    /// alias resolution, dispatch. The `confirm` callback is consulted only
    /// for the `Confirm` verdict; declining cancels with no dispatch and no
    /// history write. History records the resolved command as soon as the
    /// unit is started, before its completion.
    pub fn execute(&self, raw: &str, confirm: impl FnOnce(&str) -> bool) -> Result<ExecutionUnit> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyCommand);
        }

        match safety::validate(trimmed, &self.config.safety.forbidden) {
            Verdict::Blocked => {
                tracing::warn!(command = trimmed, "blocked by deny-list");
                return Err(Error::UnsafeCommand(trimmed.to_string()));
            }
            Verdict::Confirm => {
                if !confirm(trimmed) {
                    tracing::warn!(command = trimmed, "confirmation declined");
                    return Err(Error::ConfirmationDeclined);
                }
            }
            Verdict::Allowed => {}
        }

        // Single-level resolution: the substituted command is not resolved
        // again, so alias cycles cannot form.
        let resolved = match self.store.find_alias(trimmed)? {
            Some(alias) => alias.command,
            None => trimmed.to_string(),
        };

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(Error::SessionBusy);
        }

        tracing::info!(command = %resolved, dir = %self.working_dir.display(), "dispatching");
        let unit = executor::dispatch(
            ExecutionRequest {
                command: resolved.clone(),
                working_dir: self.working_dir.clone(),
            },
            self.in_flight.clone(),
        );

        self.store.append_history(&resolved, Utc::now())?;
        Ok(unit)
    }

    /// Adopt a new working directory. Relative input resolves against the
    /// current one; anything that is not an existing directory leaves the
    /// prior value unchanged.
    pub fn set_working_dir(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path: PathBuf = path.into();
        let candidate = if path.is_absolute() {
            path.clone()
        } else {
            self.working_dir.join(&path)
        };
        let candidate = candidate
            .canonicalize()
            .map_err(|_| Error::InvalidDirectory(path.clone()))?;
        if !candidate.is_dir() {
            return Err(Error::InvalidDirectory(path));
        }
        self.working_dir = candidate;
        Ok(())
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Fresh suggestion candidates for the current working directory.
    pub fn suggestions(&self) -> Result<HashSet<String>> {
        suggest::suggestions(
            &self.store,
            &self.working_dir,
            self.config.display.suggestion_history,
        )
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Config with the session's current working directory and theme folded
    /// in, ready to be written back at session end.
    pub fn snapshot_config(&self) -> Config {
        let mut config = self.config.clone();
        config.general.working_dir = Some(self.working_dir.clone());
        config.general.theme = self.theme.clone();
        config
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: impl Into<String>) {
        self.theme = theme.into();
    }
}
