use crate::error::{AppError, Result};

/// Where one subtree got to during fanout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutState {
    /// Nothing pushed yet.
    NoRemoteBranch,
    /// Subtree branch force-pushed.
    Pushed,
    /// Mirrored PR created.
    PrOpen,
    /// Mirrored PR already existed; `changed` is false when title and body matched.
    PrUpdated { changed: bool },
}

/// Result of reflecting one subtree's checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectOutcome {
    NoMirror,
    Reflected { upserted: usize, unchanged: usize },
}

/// Result of syncing labels onto one mirrored PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSyncOutcome {
    NoMirror,
    Applied(Vec<String>),
}

/// Result of closing one mirrored PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    NoMirror,
    Closed { pr_number: u64 },
}

/// What applying the label catalog did to one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogAction {
    Created,
    Updated,
    Unchanged,
}

/// Per-item results of a step that keeps going past failures.
#[derive(Debug)]
pub struct StepReport<T> {
    pub step: &'static str,
    pub done: Vec<(String, T)>,
    pub failed: Vec<String>,
}

impl<T> StepReport<T> {
    pub fn new(step: &'static str) -> Self {
        Self {
            step,
            done: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, result: Result<T>) {
        match result {
            Ok(outcome) => self.done.push((name.to_string(), outcome)),
            Err(e) => {
                tracing::error!(step = self.step, item = name, error = %e, "Step failed");
                self.failed.push(name.to_string());
            }
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&T> {
        self.done
            .iter()
            .find(|(done, _)| done == name)
            .map(|(_, outcome)| outcome)
    }

    /// `Incomplete` when anything failed.
    pub fn finish(self) -> Result<Vec<(String, T)>> {
        if self.failed.is_empty() {
            Ok(self.done)
        } else {
            Err(AppError::Incomplete {
                step: self.step,
                failed: self.failed,
            })
        }
    }
}
