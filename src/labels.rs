use std::collections::{BTreeMap, BTreeSet};

use crate::repos::SubtreeEntry;

/// Labels to add to and remove from a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDiff {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Derives `"<prefix>: <name>"` labels for the subtrees a PR touches.
#[derive(Debug, Clone)]
pub struct CategoryLabeler {
    prefixes: BTreeMap<String, String>,
    managed: BTreeSet<String>,
}

impl CategoryLabeler {
    /// The managed namespace covers every mapped prefix and the category of
    /// every configured entry, mapped or not.
    pub fn new(prefixes: BTreeMap<String, String>, entries: &[SubtreeEntry]) -> Self {
        let managed = prefixes
            .values()
            .cloned()
            .chain(entries.iter().map(|entry| {
                prefixes
                    .get(&entry.category)
                    .unwrap_or(&entry.category)
                    .clone()
            }))
            .collect();
        Self { prefixes, managed }
    }

    pub fn label_for(&self, entry: &SubtreeEntry) -> String {
        let prefix = self
            .prefixes
            .get(&entry.category)
            .unwrap_or(&entry.category);
        format!("{prefix}: {}", entry.name)
    }

    pub fn desired<'a>(&self, matched: impl IntoIterator<Item = &'a SubtreeEntry>) -> BTreeSet<String> {
        matched.into_iter().map(|e| self.label_for(e)).collect()
    }

    /// Whether `label` belongs to this labeler's namespace and may be removed by it.
    pub fn is_managed(&self, label: &str) -> bool {
        label
            .split_once(": ")
            .is_some_and(|(prefix, _)| self.managed.contains(prefix))
    }

    pub fn diff(&self, existing: &[String], desired: &BTreeSet<String>) -> LabelDiff {
        let existing: BTreeSet<&String> = existing.iter().collect();
        let add = desired
            .iter()
            .filter(|label| !existing.contains(label))
            .cloned()
            .collect();
        let remove = existing
            .into_iter()
            .filter(|label| self.is_managed(label) && !desired.contains(*label))
            .cloned()
            .collect();
        LabelDiff { add, remove }
    }
}

/// Source labels the target repository defines and its PR does not carry yet.
///
/// Additive only: labels already on the mirrored PR are never candidates for
/// removal.
pub fn labels_to_propagate(
    source: &[String],
    target_vocabulary: &[String],
    target_current: &[String],
) -> Vec<String> {
    let vocabulary: BTreeSet<&str> = target_vocabulary.iter().map(String::as_str).collect();
    let current: BTreeSet<&str> = target_current.iter().map(String::as_str).collect();
    let picked: BTreeSet<&str> = source
        .iter()
        .map(String::as_str)
        .filter(|label| vocabulary.contains(label) && !current.contains(label))
        .collect();
    picked.into_iter().map(str::to_string).collect()
}
