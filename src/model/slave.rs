//! Slaves: worker nodes and their assigned jobs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, Job};

/// A worker node to which jobs are assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slave {
    /// Identity key.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Jobs currently running on the slave.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
    #[serde(
        rename = "maxConcurrency",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_concurrency: Option<u32>,
    /// Last heartbeat as sent by the server (format is server-defined).
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Value>,
    /// Assigned jobs that have not completed.
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Slave {
    /// Replace `jobs` with the non-complete jobs from `all` assigned to this slave.
    pub fn derive_jobs<'a, I>(&mut self, all: I)
    where
        I: IntoIterator<Item = &'a Job>,
    {
        self.jobs = all
            .into_iter()
            .filter(|j| j.belongs_to(&self.id) && !j.is_complete())
            .cloned()
            .collect();
    }
}

impl Entity for Slave {
    fn key(&self) -> &str {
        &self.id
    }

    fn merge_from(&mut self, incoming: &Self) {
        self.concurrency = incoming.concurrency;
        self.max_concurrency = incoming.max_concurrency;
        self.last_updated = incoming.last_updated.clone();
        self.jobs = incoming
            .jobs
            .iter()
            .filter(|j| !j.is_complete())
            .cloned()
            .collect();
    }
}
