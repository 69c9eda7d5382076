//! # Reconciler
//!
//! Applies a fresh [`Snapshot`](crate::scanner::Snapshot) to the live
//! [`ResourceIndex`] in three passes:
//!
//! 1. **Kept** ids. A changed modification time replaces the row (after
//!    cancelling its ticket) and queues it for resolution. A changed status
//!    or metadata record is patched in place. Unchanged rows are skipped,
//!    except unresolved ones which are queued again.
//! 2. **Removed** ids. Tickets are cancelled first, then rows are removed
//!    highest first in maximal contiguous ranges.
//! 3. **Added** ids are appended in snapshot order and queued.
//!
//! The id → row map is rebuilt once, when the structural edit closes.
//! Notifications are listed in the order they apply: row numbers in each
//! one are valid against the index as left by the previous notifications.

use std::collections::BTreeMap;

use tracing::debug;

use crate::index::ResourceIndex;
use crate::resource::Resource;
use crate::scheduler::Ticket;

/// Cancels outstanding parse tickets on behalf of the reconciler.
pub trait TicketCanceller {
    /// Cancels `ticket`. Returns `false` if it was not live.
    fn cancel(&mut self, ticket: Ticket) -> bool;
}

/// Row-range notification, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexChange {
    Changed { first: usize, last: usize },
    Removed { first: usize, last: usize },
    Inserted { first: usize, last: usize },
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub changes: Vec<IndexChange>,
    /// Ids that should be handed to the scheduler, looked up again by id.
    pub to_resolve: Vec<String>,
    pub inserted: usize,
    pub removed: usize,
    pub changed: usize,
}

/// Merges `snapshot` into `index`.
pub fn apply(
    index: &mut ResourceIndex,
    canceller: &mut dyn TicketCanceller,
    mut snapshot: BTreeMap<String, Resource>,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    let current: Vec<String> = index.ids().map(str::to_string).collect();
    let mut removed_rows = Vec::new();

    for (row, id) in current.iter().enumerate() {
        let Some(fresh) = snapshot.remove(id) else {
            removed_rows.push(row);
            continue;
        };
        let Some(existing) = index.at(row) else {
            continue;
        };

        if existing.last_modified() != fresh.last_modified() {
            if let Some(ticket) = existing.ticket() {
                canceller.cancel(ticket);
            }
            index.replace(row, fresh);
            outcome.changes.push(IndexChange::Changed { first: row, last: row });
            outcome.to_resolve.push(id.clone());
            outcome.changed += 1;
        } else if existing.status() != fresh.status() || existing.metadata() != fresh.metadata() {
            let mut fresh = fresh;
            index.update_row(row, |resource| {
                resource.set_status(fresh.status());
                resource.set_metadata(fresh.take_metadata());
            });
            outcome.changes.push(IndexChange::Changed { first: row, last: row });
            outcome.changed += 1;
            if index.at(row).is_some_and(Resource::should_resolve) {
                outcome.to_resolve.push(id.clone());
            }
        } else if existing.should_resolve() {
            outcome.to_resolve.push(id.clone());
        }
    }

    for &row in &removed_rows {
        if let Some(ticket) = index.at(row).and_then(Resource::ticket) {
            canceller.cancel(ticket);
        }
    }

    let mut edit = index.edit();

    for (first, last) in descending_ranges(&removed_rows) {
        let gone = edit.remove_range(first, last);
        debug!(first, last, count = gone.len(), "Removed rows");
        outcome.changes.push(IndexChange::Removed { first, last });
        outcome.removed += gone.len();
    }

    if !snapshot.is_empty() {
        let first = edit.len();
        for (id, resource) in snapshot {
            edit.push(resource);
            outcome.to_resolve.push(id);
        }
        let last = edit.len() - 1;
        outcome.changes.push(IndexChange::Inserted { first, last });
        outcome.inserted = last - first + 1;
    }

    drop(edit);
    outcome
}

/// Groups row numbers into maximal contiguous `(first, last)` ranges, highest
/// range first, so each removal leaves the remaining ranges valid.
fn descending_ranges(rows: &[usize]) -> Vec<(usize, usize)> {
    let mut sorted = rows.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for row in sorted {
        match ranges.last_mut() {
            Some((first, _)) if *first == row + 1 => *first = row,
            _ => ranges.push((row, row)),
        }
    }
    ranges
}
