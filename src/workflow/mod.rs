pub mod category_label;
pub mod close;
pub mod detect;
pub mod fanout;
pub mod label_catalog;
pub mod reflect;
pub mod sync_labels;
pub mod types;

/// The monorepo pull request a step runs for.
#[derive(Debug, Clone)]
pub struct PrTarget {
    pub repo: String,
    pub pr: u64,
}

impl PrTarget {
    pub fn new(repo: impl Into<String>, pr: u64) -> Self {
        Self {
            repo: repo.into(),
            pr,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::repos::SubtreeEntry;

    pub const MONOREPO: &str = "ROCm/rocm-libraries";

    pub fn entry(category: &str, name: &str) -> SubtreeEntry {
        SubtreeEntry {
            category: category.to_string(),
            name: name.to_string(),
            url: format!("ROCm/{name}"),
            branch: "develop".to_string(),
        }
    }

    pub fn entries() -> Vec<SubtreeEntry> {
        vec![
            entry("projects", "rocBLAS"),
            entry("projects", "hipBLAS"),
            entry("shared", "rocSPARSE"),
        ]
    }
}
