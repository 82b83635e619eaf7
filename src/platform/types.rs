use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub head_sha: String,
    pub base_branch: String,
}

#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}

/// A label as defined in a repository's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: String,
}

impl LabelDefinition {
    /// Whether `other` would change this label if written over it.
    pub fn differs_from(&self, other: &LabelDefinition) -> bool {
        !self.color.eq_ignore_ascii_case(&other.color) || self.description != other.description
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Waiting => "waiting",
            Self::Requested => "requested",
            Self::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    StartupFailure,
}

impl CheckConclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Neutral => "neutral",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Stale => "stale",
            Self::StartupFailure => "startup_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    pub head_sha: String,
    pub status: CheckStatus,
    /// Absent until the run completes.
    pub conclusion: Option<CheckConclusion>,
    pub summary: String,
    pub details_url: String,
}

/// Desired state of a named check run on a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRunUpsert {
    pub name: String,
    pub head_sha: String,
    pub status: CheckStatus,
    /// `Neutral` while the run is still in progress.
    pub conclusion: CheckConclusion,
    pub summary: String,
    pub details_url: String,
}

impl CheckRunUpsert {
    /// Whether writing this would change `existing`.
    pub fn differs_from(&self, existing: &CheckRun) -> bool {
        existing.status != self.status
            || existing.conclusion.unwrap_or(CheckConclusion::Neutral) != self.conclusion
            || existing.summary != self.summary
    }

    /// Request body for the checks API. GitHub treats a conclusion as
    /// completing the run, so it is only sent with a `completed` status.
    pub fn payload(&self, now: chrono::DateTime<chrono::Utc>) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "name": self.name,
            "head_sha": self.head_sha,
            "status": self.status.as_str(),
            "output": {
                "title": self.name,
                "summary": self.summary,
            },
        });
        if !self.details_url.is_empty() {
            payload["details_url"] = self.details_url.clone().into();
        }
        if self.status == CheckStatus::Completed {
            payload["conclusion"] = self.conclusion.as_str().into();
            payload["completed_at"] = now.to_rfc3339().into();
        }
        payload
    }
}
