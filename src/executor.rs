use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

/// Emitted instead of captured output when the command is a terminal-clear
/// directive; no OS process is spawned for these.
const CLEAR_DIRECTIVES: &[&str] = &["clear", "cls"];

/// Placeholder shown when a successful command produced nothing on stdout.
pub const NO_OUTPUT: &str = "(no output)";

/// Ephemeral per-invocation value; never persisted.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub command: String,
    pub working_dir: PathBuf,
}

/// A single output signal from the execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    /// Sentinel meaning "clear the visible transcript".
    Clear,
    Text(String),
}

/// Events delivered by the unit: zero or one `Output`, then `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    Output(OutputChunk),
    Completed,
}

/// Handle to one in-flight execution unit.
#[derive(Debug)]
pub struct ExecutionUnit {
    events: Receiver<ExecEvent>,
    handle: thread::JoinHandle<()>,
}

impl ExecutionUnit {
    /// The unit's event stream. `Completed` is always the last event.
    pub fn events(&self) -> &Receiver<ExecEvent> {
        &self.events
    }

    /// Block until the unit has finished and return all events in order.
    /// Convenience for one-shot callers; interactive callers iterate
    /// `events()` instead.
    pub fn wait(self) -> Vec<ExecEvent> {
        let collected: Vec<ExecEvent> = self.events.iter().collect();
        let _ = self.handle.join();
        collected
    }
}

/// Spawn the isolated execution unit for a resolved command.
///
/// The worker runs concurrently with the control thread and reports through
/// the channel; it never panics outward. `in_flight` is cleared before the
/// completion event is sent, so a caller observing `Completed` sees an idle
/// session. Send failures are ignored: a dropped receiver just means nobody
/// is watching anymore.
pub fn dispatch(request: ExecutionRequest, in_flight: Arc<AtomicBool>) -> ExecutionUnit {
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let lowered = request.command.to_lowercase();
        if CLEAR_DIRECTIVES.contains(&lowered.as_str()) {
            let _ = tx.send(ExecEvent::Output(OutputChunk::Clear));
        } else {
            let text = match run_process(&request) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(command = %request.command, error = %e, "execution fault");
                    format!("unexpected error: {}", e)
                }
            };
            let _ = tx.send(ExecEvent::Output(OutputChunk::Text(text)));
        }
        in_flight.store(false, Ordering::SeqCst);
        let _ = tx.send(ExecEvent::Completed);
    });

    ExecutionUnit { events: rx, handle }
}

/// Run the command through the OS shell and fold the captured streams into
/// one transcript string: stdout on success, `Error:`-prefixed stderr on a
/// non-zero exit.
fn run_process(request: &ExecutionRequest) -> Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(&request.command)
        .current_dir(&request.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| Error::Execution(e.to_string()))?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            Ok(NO_OUTPUT.to_string())
        } else {
            Ok(stdout)
        }
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(format!("Error: {}", stderr))
    }
}
