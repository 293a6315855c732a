use std::collections::BTreeMap;

use jobdash::config::DashboardConfig;
use jobdash::context::AppContext;
use jobdash::dashboard::Dashboard;
use jobdash::notify::ToastLevel;
use jobdash::store::{Snapshot, Store};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = DashboardConfig::from_env()?;

    eprintln!("jobdash v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.api_url);
    eprintln!("   Push: {}", config.ws_url);
    eprintln!("   Refresh: every {}s", config.refresh_interval.as_secs());
    if !config.job_states.is_empty() {
        let states: Vec<_> = config.job_states.iter().map(|s| s.as_str()).collect();
        eprintln!("   States: {}", states.join("|"));
    }
    eprintln!("   Ctrl-C to exit.\n");

    let ctx = AppContext::from_config(config)?;

    // Toasts go to stderr
    let mut toasts = ctx.notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match toasts.recv().await {
                Ok(toast) => {
                    let tag = match toast.level {
                        ToastLevel::Info => "info",
                        ToastLevel::Warning => "warn",
                        ToastLevel::Error => "error",
                    };
                    eprintln!("[{tag}] {}: {}", toast.title, toast.message);
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Print a summary line whenever the store changes
    let store = std::sync::Arc::clone(&ctx.store);
    let mut changes = store.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => print_summary(&store).await,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let dashboard = Dashboard::start(ctx).await;

    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down...");
    dashboard.shutdown().await;

    Ok(())
}

async fn print_summary(store: &Store) {
    let Snapshot {
        jobs,
        slaves,
        workflows,
    } = store.snapshot().await;

    let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
    for job in &jobs {
        let state = job
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        *by_state.entry(state).or_default() += 1;
    }
    let states: Vec<String> = by_state
        .iter()
        .map(|(state, count)| format!("{state}={count}"))
        .collect();

    let busy: usize = slaves.iter().map(|s| s.jobs.len()).sum();
    println!(
        "jobs: {} [{}] | slaves: {} ({} active jobs) | workflows: {}",
        jobs.len(),
        states.join(" "),
        slaves.len(),
        busy,
        workflows.len()
    );
}
