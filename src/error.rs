use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the core. None of these is fatal to a session: the
/// caller reports them and keeps running.
#[derive(Debug, Error)]
pub enum Error {
    #[error("command cannot be empty")]
    EmptyCommand,

    /// The deny-list matched. This gate is advisory, not a security boundary.
    #[error("potentially destructive command blocked: {0}")]
    UnsafeCommand(String),

    /// The user declined a risky-pattern confirmation. A cancellation, not a
    /// failure: nothing was dispatched and nothing was recorded.
    #[error("execution cancelled")]
    ConfirmationDeclined,

    #[error("alias '{0}' already exists")]
    DuplicateAlias(String),

    #[error("alias '{0}' not found")]
    AliasNotFound(String),

    #[error("not a directory: {}", .0.display())]
    InvalidDirectory(PathBuf),

    /// A second dispatch was requested while an execution unit is in flight.
    #[error("a command is already running")]
    SessionBusy,

    /// The spawned process could not be started or crashed the runner, as
    /// distinct from the command merely exiting non-zero.
    #[error("execution failed: {0}")]
    Execution(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
