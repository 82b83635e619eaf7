use std::collections::BTreeSet;

use crate::repos::SubtreeEntry;

/// The configured `category/name` prefixes.
pub fn valid_prefixes(entries: &[SubtreeEntry]) -> BTreeSet<String> {
    let prefixes: BTreeSet<String> = entries.iter().map(SubtreeEntry::prefix).collect();
    tracing::debug!(prefixes = ?prefixes, "Valid subtree prefixes");
    prefixes
}

/// First two segments of a POSIX path, or `None` when there are fewer.
pub fn candidate_prefix(path: &str) -> Option<String> {
    let mut parts = path.splitn(3, '/');
    let category = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{category}/{name}"))
}

/// Sorted, deduplicated subtree names touched by `changed_files`.
pub fn find_matched_subtrees(
    changed_files: &[String],
    valid_prefixes: &BTreeSet<String>,
) -> Vec<String> {
    let matched: BTreeSet<String> = changed_files
        .iter()
        .filter_map(|path| candidate_prefix(path))
        .filter(|prefix| valid_prefixes.contains(prefix))
        .filter_map(|prefix| prefix.split_once('/').map(|(_, name)| name.to_string()))
        .collect();
    let matched: Vec<String> = matched.into_iter().collect();
    tracing::debug!(subtrees = ?matched, "Matched subtrees");
    matched
}

/// Configured entries touched by `changed_files`, in name order.
pub fn matched_entries<'a>(
    changed_files: &[String],
    entries: &'a [SubtreeEntry],
) -> Vec<&'a SubtreeEntry> {
    let names = find_matched_subtrees(changed_files, &valid_prefixes(entries));
    names
        .iter()
        .filter_map(|name| entries.iter().find(|e| &e.name == name))
        .collect()
}
