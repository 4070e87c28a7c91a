/// Default deny-list, matched as lower-cased substrings. Over-blocking on
/// benign strings that happen to contain one of these is accepted behavior.
pub const DEFAULT_DENY_LIST: &[&str] = &["rm -rf", "format", "del"];

/// Shell metacharacters that chain or background commands.
const CHAIN_CHARS: &[char] = &['|', '&', ';'];

/// Three-way classification of a command prior to execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked,
    /// The caller must obtain explicit user confirmation before proceeding.
    Confirm,
}

/// Classify a command against the deny-list and chain metacharacters.
///
/// Substring match, not a parsed command. Empty input is rejected earlier
/// and never reaches this check.
pub fn validate(command: &str, deny_list: &[String]) -> Verdict {
    let lowered = command.to_lowercase();

    if deny_list
        .iter()
        .any(|entry| lowered.contains(entry.to_lowercase().as_str()))
    {
        return Verdict::Blocked;
    }

    if command.contains(CHAIN_CHARS) {
        return Verdict::Confirm;
    }

    Verdict::Allowed
}
