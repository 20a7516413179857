//! # Error Suggestions
//!
//! Helpers that build operator-facing CLI errors with hints. Errors should say
//! what went wrong and how to fix it.
//!
//! ```rust,ignore
//! use reftree::suggestions;
//!
//! return Err(suggestions::unknown_config_key("PROTCOL"));
//! ```

use crate::config::KNOWN_KEYS;
use crate::scm::BackendKind;

/// Error for a settings key the tool does not understand.
pub fn unknown_config_key(key: &str) -> anyhow::Error {
    let names: Vec<&str> = KNOWN_KEYS.iter().map(|(name, _)| *name).collect();
    let did_you_mean = find_similar(&key.to_ascii_uppercase(), &names)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unknown setting: {key}{did_you_mean}\n\n\
         Known settings are: {keys}\n\
         hint: Run 'reftree config --list' to see the current values",
        keys = names.join(", ")
    )
}

/// Error for an unsupported `--scm` value.
pub fn unknown_scm(name: &str) -> anyhow::Error {
    let names: Vec<&str> = [BackendKind::Git, BackendKind::Hg]
        .iter()
        .map(|kind| kind.name())
        .chain(["none"])
        .collect();
    let did_you_mean = find_similar(&name.to_ascii_lowercase(), &names)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unknown source control system: {name}{did_you_mean}\n\n\
         Supported values are: {names}",
        names = names.join(", ")
    )
}

/// Error for `cache` subcommands when no cache directory is configured.
pub fn cache_not_configured() -> anyhow::Error {
    anyhow::anyhow!(
        "No cache directory is configured\n\n\
         hint: Enable caching with 'reftree config --global CACHE <dir>'\n\
         hint: Or pass --cache-dir <dir> (also read from REFTREE_CACHE)"
    )
}

/// Error for destructive update flags given without `--clean`.
pub fn clean_required(flag: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "{flag} requires --clean\n\n\
         hint: Run 'reftree update --clean {flag}' to confirm that local changes may be discarded"
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single rolling row
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let next = (row[j + 1] + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}
