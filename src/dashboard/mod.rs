//! Dashboard controllers and their background tasks.
//!
//! [`Dashboard::start`] wires everything in order: bus listener first so no
//! push event is missed, then the push channel, the initial load and the
//! fallback refresh timer.

pub mod controller;
pub mod workflows;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::socket::{PushClient, ReconnectConfig};

pub use controller::{ActionOutcome, MainController};
pub use workflows::WorkflowController;

/// Running controllers plus the tasks that keep them in sync.
pub struct Dashboard {
    pub main: Arc<MainController>,
    pub workflows: Arc<WorkflowController>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Dashboard {
    pub async fn start(ctx: Arc<AppContext>) -> Self {
        let cancel = CancellationToken::new();
        let main = Arc::new(MainController::new(Arc::clone(&ctx)));
        let workflows = Arc::new(WorkflowController::new(Arc::clone(&ctx)));

        let mut tasks = vec![main.spawn_event_listener(cancel.child_token())];

        match PushClient::new(
            ctx.config.ws_url.clone(),
            Arc::clone(&ctx.bus),
            ReconnectConfig::from(&ctx.config),
        ) {
            Ok(client) => {
                info!(url = client.url(), "Starting push channel");
                tasks.push(client.spawn(cancel.child_token()));
            }
            Err(e) => {
                warn!(error = %e, "Push channel disabled, relying on polling");
                ctx.notifier
                    .warning("Live updates unavailable", e.to_string());
            }
        }

        main.refresh().await;
        workflows.refresh().await;

        tasks.push(main.spawn_refresh_timer(cancel.child_token()));

        Self {
            main,
            workflows,
            cancel,
            tasks,
        }
    }

    /// Stop all background tasks and wait for them.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Dashboard stopped");
    }
}
