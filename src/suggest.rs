use crate::error::Result;
use crate::store::Store;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Build the live suggestion set: alias keys, the most recent distinct
/// history commands, and the non-hidden entries of the working directory.
///
/// Recomputed on demand; holds no state of its own. An unreadable directory
/// contributes nothing rather than failing the whole set.
pub fn suggestions(store: &Store, working_dir: &Path, history_depth: usize) -> Result<HashSet<String>> {
    let mut set: HashSet<String> = HashSet::new();

    set.extend(store.alias_keys()?);
    set.extend(store.recent_history(history_depth)?);

    if let Ok(entries) = fs::read_dir(working_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                set.insert(name);
            }
        }
    }

    Ok(set)
}

/// Case-insensitive substring match against user input.
pub fn matches(input: &str, candidate: &str) -> bool {
    candidate.to_lowercase().contains(&input.to_lowercase())
}

/// Completion candidates for the word under the cursor: the suggestion set
/// filtered against that word, sorted, plus the byte offset where the
/// replacement starts.
pub fn complete_line(
    store: &Store,
    working_dir: &Path,
    history_depth: usize,
    line: &str,
    pos: usize,
) -> Result<(usize, Vec<String>)> {
    let prefix = &line[..pos];
    let start = prefix
        .rfind(char::is_whitespace)
        .map(|i| i + 1)
        .unwrap_or(0);
    let word = &prefix[start..];

    let mut candidates: Vec<String> = suggestions(store, working_dir, history_depth)?
        .into_iter()
        .filter(|candidate| matches(word, candidate))
        .collect();
    candidates.sort();
    Ok((start, candidates))
}
