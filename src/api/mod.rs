//! REST API access to the job, slave and workflow services.
//!
//! [`DashboardApi`] is the seam the controllers talk to; [`HttpApi`] is the
//! reqwest implementation used in production.

pub mod http;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{Job, JobState, Slave, Workflow};

pub use http::HttpApi;

/// A user-initiated action on a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobAction {
    Pause,
    Resume,
    Stop,
}

impl JobAction {
    /// URL segment: `/api/job/<jobId>/<segment>/<slaveId>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend operations used by the dashboard. All calls are GETs.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// `GET /api/jobs`, optionally filtered with `?states=A|B`.
    async fn list_jobs(&self, states: &[JobState]) -> Result<Vec<Job>, ApiError>;

    /// `GET /api/job/<job_id>/<action>/<slave_id>`. Returns the updated job.
    async fn job_action(
        &self,
        action: JobAction,
        job_id: &str,
        slave_id: &str,
    ) -> Result<Option<Job>, ApiError>;

    /// `GET /api/slaves`
    async fn list_slaves(&self) -> Result<Vec<Slave>, ApiError>;

    /// `GET /api/workflows`
    async fn list_workflows(&self) -> Result<Vec<Workflow>, ApiError>;
}

/// Pipe-joined state filter, e.g. `RUNNING|PAUSED`.
pub fn states_query(states: &[JobState]) -> String {
    states
        .iter()
        .map(JobState::as_str)
        .collect::<Vec<_>>()
        .join("|")
}
