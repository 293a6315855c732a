//! Dashboard state container.
//!
//! The [`Store`] is the only place jobs, slaves and workflows live and the
//! only code that mutates them. Each mutation runs under a single write lock,
//! keeps every slave's job sublist consistent with the global job list, and
//! broadcasts which collection changed. Readers get cloned snapshots.
//!
//! Refresh responses carry a [`Ticket`]; a response whose ticket has been
//! superseded by a newer request is discarded instead of overwriting newer
//! data.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use crate::api::JobAction;
use crate::model::{Job, Slave, Upsert, Workflow, upsert, upsert_all};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// The cached collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Jobs,
    Slaves,
    Workflows,
}

/// Generation token handed out when a refresh starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    collection: Collection,
    generation: u64,
}

impl Ticket {
    pub fn collection(&self) -> Collection {
        self.collection
    }
}

/// Read-only copy of the whole store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub jobs: Vec<Job>,
    pub slaves: Vec<Slave>,
    pub workflows: Vec<Workflow>,
}

#[derive(Default)]
struct Inner {
    jobs: Vec<Job>,
    slaves: Vec<Slave>,
    workflows: Vec<Workflow>,
    generations: HashMap<Collection, u64>,
    /// Latest action ticket per job id.
    action_tickets: HashMap<String, u64>,
    next_action_ticket: u64,
}

impl Inner {
    /// Re-derive the job sublist of every slave (or just `only`).
    fn derive_slave_jobs(&mut self, only: Option<&str>) {
        let Inner { jobs, slaves, .. } = self;
        for slave in slaves
            .iter_mut()
            .filter(|s| only.is_none_or(|id| s.id == id))
        {
            slave.derive_jobs(jobs.iter());
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.generations.get(&ticket.collection).copied().unwrap_or(0) == ticket.generation
    }

    fn merge_job(&mut self, job: &Job) -> Upsert {
        let result = upsert(&mut self.jobs, job);
        if let Upsert::Inserted(i) | Upsert::Updated(i) = result {
            let owner = self.jobs[i].slave_id.clone();
            if let Some(owner) = owner {
                self.derive_slave_jobs(Some(&owner));
            }
        }
        result
    }

    /// Fold a slave's embedded jobs into the global list, then the slave itself.
    fn merge_slave(&mut self, slave: &Slave) -> Upsert {
        if slave.id.is_empty() {
            return Upsert::Skipped;
        }
        for job in &slave.jobs {
            let mut job = job.clone();
            if job.slave_id.is_none() {
                job.slave_id = Some(slave.id.clone());
            }
            upsert(&mut self.jobs, &job);
        }
        upsert(&mut self.slaves, slave)
    }
}

/// Global pause/resume/stop in-flight flags, one bit per action.
///
/// Only one action may be in flight across all jobs at a time.
#[derive(Default)]
struct ActionFlags(AtomicU8);

fn action_bit(action: JobAction) -> u8 {
    match action {
        JobAction::Pause => 0b001,
        JobAction::Resume => 0b010,
        JobAction::Stop => 0b100,
    }
}

/// Clears its action's in-flight flag when dropped.
pub struct InFlightGuard<'a> {
    flags: &'a ActionFlags,
    bit: u8,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flags.0.fetch_and(!self.bit, Ordering::AcqRel);
    }
}

/// In-memory dashboard state with change broadcast.
pub struct Store {
    inner: RwLock<Inner>,
    actions: ActionFlags,
    tx: broadcast::Sender<Collection>,
}

impl Store {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            inner: RwLock::new(Inner::default()),
            actions: ActionFlags::default(),
            tx,
        })
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Collection> {
        self.tx.subscribe()
    }

    fn notify(&self, collection: Collection) {
        let _ = self.tx.send(collection);
    }

    // ── Refresh tickets ─────────────────────────────────────────────────

    /// Start a refresh of `collection`. Any older outstanding ticket for the
    /// same collection becomes stale.
    pub async fn begin_refresh(&self, collection: Collection) -> Ticket {
        let mut inner = self.inner.write().await;
        let generation = inner.generations.entry(collection).or_insert(0);
        *generation += 1;
        Ticket {
            collection,
            generation: *generation,
        }
    }

    /// Apply a jobs listing. Returns `false` if the ticket was stale.
    pub async fn apply_jobs(&self, ticket: Ticket, jobs: &[Job]) -> bool {
        let mut inner = self.inner.write().await;
        if ticket.collection != Collection::Jobs || !inner.is_current(ticket) {
            debug!(generation = ticket.generation, "Discarding stale jobs response");
            return false;
        }
        let applied = upsert_all(&mut inner.jobs, jobs);
        inner.derive_slave_jobs(None);
        info!(received = jobs.len(), applied, total = inner.jobs.len(), "Jobs refreshed");
        drop(inner);

        self.notify(Collection::Jobs);
        self.notify(Collection::Slaves);
        true
    }

    /// Apply a slaves listing. Returns `false` if the ticket was stale.
    pub async fn apply_slaves(&self, ticket: Ticket, slaves: &[Slave]) -> bool {
        let mut inner = self.inner.write().await;
        if ticket.collection != Collection::Slaves || !inner.is_current(ticket) {
            debug!(generation = ticket.generation, "Discarding stale slaves response");
            return false;
        }
        let applied = slaves
            .iter()
            .filter(|s| inner.merge_slave(s).changed())
            .count();
        inner.derive_slave_jobs(None);
        info!(received = slaves.len(), applied, total = inner.slaves.len(), "Slaves refreshed");
        drop(inner);

        self.notify(Collection::Slaves);
        self.notify(Collection::Jobs);
        true
    }

    /// Apply a workflows listing. Returns `false` if the ticket was stale.
    pub async fn apply_workflows(&self, ticket: Ticket, workflows: &[Workflow]) -> bool {
        let mut inner = self.inner.write().await;
        if ticket.collection != Collection::Workflows || !inner.is_current(ticket) {
            debug!(generation = ticket.generation, "Discarding stale workflows response");
            return false;
        }
        let applied = upsert_all(&mut inner.workflows, workflows);
        info!(received = workflows.len(), applied, "Workflows refreshed");
        drop(inner);

        self.notify(Collection::Workflows);
        true
    }

    // ── Incremental updates ─────────────────────────────────────────────

    /// Merge a single job and update its slave's sublist.
    pub async fn merge_job(&self, job: &Job) -> Upsert {
        let result = self.inner.write().await.merge_job(job);
        if result.changed() {
            self.notify(Collection::Jobs);
            self.notify(Collection::Slaves);
        }
        result
    }

    /// Merge a single slave (and its embedded jobs).
    pub async fn merge_slave(&self, slave: &Slave) -> Upsert {
        let result = {
            let mut inner = self.inner.write().await;
            let result = inner.merge_slave(slave);
            inner.derive_slave_jobs(None);
            result
        };
        if result.changed() {
            self.notify(Collection::Slaves);
            self.notify(Collection::Jobs);
        }
        result
    }

    pub async fn merge_workflow(&self, workflow: &Workflow) -> Upsert {
        let result = upsert(&mut self.inner.write().await.workflows, workflow);
        if result.changed() {
            self.notify(Collection::Workflows);
        }
        result
    }

    // ── Actions ─────────────────────────────────────────────────────────

    /// Claim the global action lock for `action`. `None` while any action
    /// is already in flight.
    pub fn try_begin_action(&self, action: JobAction) -> Option<InFlightGuard<'_>> {
        let bit = action_bit(action);
        self.actions
            .0
            .compare_exchange(0, bit, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flags: &self.actions,
                bit,
            })
    }

    pub fn action_in_flight(&self, action: JobAction) -> bool {
        self.actions.0.load(Ordering::Acquire) & action_bit(action) != 0
    }

    pub fn any_action_in_flight(&self) -> bool {
        self.actions.0.load(Ordering::Acquire) != 0
    }

    /// Issue a ticket for an action on `job_id`, superseding older ones.
    pub async fn begin_action(&self, job_id: &str) -> u64 {
        let mut inner = self.inner.write().await;
        inner.next_action_ticket += 1;
        let ticket = inner.next_action_ticket;
        inner.action_tickets.insert(job_id.to_string(), ticket);
        ticket
    }

    /// Drop the ticket of an action that produced nothing to merge. A newer
    /// ticket for the same job is left alone.
    pub async fn end_action(&self, job_id: &str, ticket: u64) {
        let mut inner = self.inner.write().await;
        if inner.action_tickets.get(job_id) == Some(&ticket) {
            inner.action_tickets.remove(job_id);
        }
    }

    /// Jobs with an action ticket still outstanding.
    pub async fn pending_actions(&self) -> usize {
        self.inner.read().await.action_tickets.len()
    }

    /// Merge an action response unless a newer action on the same job
    /// superseded it.
    pub async fn apply_action_result(&self, job_id: &str, ticket: u64, job: &Job) -> bool {
        let result = {
            let mut inner = self.inner.write().await;
            if inner.action_tickets.get(job_id) != Some(&ticket) {
                debug!(job_id, ticket, "Discarding superseded action response");
                return false;
            }
            inner.action_tickets.remove(job_id);
            inner.merge_job(job)
        };
        if result.changed() {
            self.notify(Collection::Jobs);
            self.notify(Collection::Slaves);
        }
        true
    }

    // ── Read views ──────────────────────────────────────────────────────

    pub async fn jobs(&self) -> Vec<Job> {
        self.inner.read().await.jobs.clone()
    }

    pub async fn slaves(&self) -> Vec<Slave> {
        self.inner.read().await.slaves.clone()
    }

    pub async fn workflows(&self) -> Vec<Workflow> {
        self.inner.read().await.workflows.clone()
    }

    pub async fn job(&self, id: &str) -> Option<Job> {
        self.inner.read().await.jobs.iter().find(|j| j.id == id).cloned()
    }

    /// `_id` of the slave whose `_id` equals `job.slaveID`, if cached.
    pub async fn owning_slave_id(&self, job: &Job) -> Option<String> {
        let slave_id = job.slave_id.as_deref()?;
        self.inner
            .read()
            .await
            .slaves
            .iter()
            .find(|s| s.id == slave_id)
            .map(|s| s.id.clone())
    }

    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().await;
        Snapshot {
            jobs: inner.jobs.clone(),
            slaves: inner.slaves.clone(),
            workflows: inner.workflows.clone(),
        }
    }
}
