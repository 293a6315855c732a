//! Jobs and their lifecycle state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Entity;

/// Lifecycle state of a job.
///
/// `NEW → CLAIMED → QUEUED → RUNNING → {PAUSED, STOPPED, SUCCESS}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    New,
    Claimed,
    Queued,
    Running,
    Paused,
    Stopped,
    Success,
}

impl JobState {
    /// Completed jobs drop out of their slave's job list.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Claimed => "CLAIMED",
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Success => "SUCCESS",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "CLAIMED" => Ok(Self::Claimed),
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "PAUSED" => Ok(Self::Paused),
            "STOPPED" => Ok(Self::Stopped),
            "SUCCESS" => Ok(Self::Success),
            _ => Err(format!("Unknown job state: {}", s)),
        }
    }
}

/// A unit of scheduled work, as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Identity key.
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
    /// Host currently executing the job.
    #[serde(
        rename = "processingHost",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub processing_host: Option<String>,
    /// Opaque progress/statistics blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
    /// Owning slave's `_id`.
    #[serde(rename = "slaveID", default, skip_serializing_if = "Option::is_none")]
    pub slave_id: Option<String>,
    /// Fields this client does not interpret, kept as received.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    pub fn is_complete(&self) -> bool {
        self.state.is_some_and(|s| s.is_complete())
    }

    /// Whether this job is assigned to slave `slave_id`.
    pub fn belongs_to(&self, slave_id: &str) -> bool {
        self.slave_id.as_deref() == Some(slave_id)
    }
}

impl Entity for Job {
    fn key(&self) -> &str {
        &self.id
    }

    fn merge_from(&mut self, incoming: &Self) {
        self.state = incoming.state;
        self.processing_host = incoming.processing_host.clone();
        self.statistics = incoming.statistics.clone();
    }
}
