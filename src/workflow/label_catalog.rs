//! Shared label catalog: collected from every sub-repository, applied to one.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::platform::types::LabelDefinition;
use crate::platform::Platform;
use crate::repos::SubtreeEntry;
use crate::workflow::types::{CatalogAction, StepReport};

/// Union of every sub-repository's label definitions, sorted by name
/// case-insensitively. The first repository to define a name wins.
pub async fn collect_labels(
    platform: &dyn Platform,
    entries: &[SubtreeEntry],
) -> Result<Vec<LabelDefinition>> {
    let mut catalog: Vec<LabelDefinition> = Vec::new();
    for entry in entries {
        tracing::info!(repo = %entry.url, "Collecting labels");
        for label in platform.list_label_definitions(&entry.url).await? {
            if !catalog.iter().any(|known| known.name == label.name) {
                catalog.push(label);
            }
        }
    }
    catalog.sort_by_key(|label| label.name.to_lowercase());
    Ok(catalog)
}

/// Write the catalog as YAML, or log it when `dry_run` is set.
pub fn write_catalog(path: &Path, catalog: &[LabelDefinition], dry_run: bool) -> Result<()> {
    let yaml = serde_yaml::to_string(catalog)?;
    if dry_run {
        tracing::info!(dry_run = true, path = %path.display(), labels = catalog.len(), "Would write label catalog");
        tracing::debug!("{yaml}");
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, yaml)?;
    tracing::info!(path = %path.display(), labels = catalog.len(), "Wrote label catalog");
    Ok(())
}

/// Read a catalog file. Missing or malformed files are configuration errors.
pub fn read_catalog(path: &Path) -> Result<Vec<LabelDefinition>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read label catalog at {}: {e}",
            path.display()
        ))
    })?;
    serde_yaml::from_str(&raw).map_err(|e| {
        AppError::Config(format!("Invalid label catalog at {}: {e}", path.display()))
    })
}

/// Create missing labels in `repo` and update those whose color or
/// description differ. Identical labels are left alone.
pub async fn apply_label_catalog(
    platform: &dyn Platform,
    repo: &str,
    catalog: &[LabelDefinition],
) -> Result<StepReport<CatalogAction>> {
    let existing: HashMap<String, LabelDefinition> = platform
        .list_label_definitions(repo)
        .await?
        .into_iter()
        .map(|label| (label.name.clone(), label))
        .collect();

    let mut report = StepReport::new("apply-label-catalog");
    for label in catalog {
        let result = match existing.get(&label.name) {
            None => {
                tracing::info!(repo, label = %label.name, "Creating label");
                platform
                    .create_label(repo, label)
                    .await
                    .map(|()| CatalogAction::Created)
            }
            Some(current) if current.differs_from(label) => {
                tracing::info!(repo, label = %label.name, "Updating label");
                platform
                    .update_label(repo, label)
                    .await
                    .map(|()| CatalogAction::Updated)
            }
            Some(_) => {
                tracing::debug!(repo, label = %label.name, "Label up to date");
                Ok(CatalogAction::Unchanged)
            }
        };
        report.record(&label.name, result);
    }
    Ok(report)
}
