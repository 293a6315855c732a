//! Data model and the upsert-by-identity merge.
//!
//! Every entity is a client-side cache of server-owned data. Entities are
//! never created locally; they are only merged in from API responses and
//! push events through [`upsert`].

pub mod job;
pub mod slave;
pub mod workflow;

pub use job::{Job, JobState};
pub use slave::Slave;
pub use workflow::Workflow;

/// A server entity identified by a stable key.
pub trait Entity {
    /// The identity key (`_id` on the wire).
    fn key(&self) -> &str;

    /// Overwrite the fields that change over the entity's lifetime with
    /// `incoming`'s values. Identity and untracked fields stay as they are.
    fn merge_from(&mut self, incoming: &Self);
}

/// What [`upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// Appended at this index.
    Inserted(usize),
    /// Merged into the element at this index.
    Updated(usize),
    /// Incoming entity had no key; list untouched.
    Skipped,
}

impl Upsert {
    /// Whether the list was modified.
    pub fn changed(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Find-or-append merge keyed by [`Entity::key`].
pub fn upsert<T: Entity + Clone>(list: &mut Vec<T>, incoming: &T) -> Upsert {
    if incoming.key().is_empty() {
        return Upsert::Skipped;
    }

    match list.iter().position(|e| e.key() == incoming.key()) {
        Some(i) => {
            list[i].merge_from(incoming);
            Upsert::Updated(i)
        }
        None => {
            list.push(incoming.clone());
            Upsert::Inserted(list.len() - 1)
        }
    }
}

/// Upsert every entity in `incoming`. Returns how many were applied.
pub fn upsert_all<T: Entity + Clone>(list: &mut Vec<T>, incoming: &[T]) -> usize {
    incoming
        .iter()
        .filter(|e| upsert(list, e).changed())
        .count()
}
