//! Workflow list controller.

use std::sync::Arc;

use tracing::error;

use crate::context::AppContext;
use crate::model::Workflow;
use crate::store::Collection;

pub struct WorkflowController {
    ctx: Arc<AppContext>,
}

impl WorkflowController {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// `GET /api/workflows` and merge the result. Failures are toasted.
    pub async fn refresh(&self) -> bool {
        let ticket = self.ctx.store.begin_refresh(Collection::Workflows).await;
        match self.ctx.api.list_workflows().await {
            Ok(workflows) => {
                self.ctx.store.apply_workflows(ticket, &workflows).await;
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh workflows");
                self.ctx
                    .notifier
                    .error("Failed to refresh workflows", e.user_message());
                false
            }
        }
    }

    pub async fn workflows(&self) -> Vec<Workflow> {
        self.ctx.store.workflows().await
    }
}
