//! Scan + reconcile properties over sequences of folder states

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use core_sync::{reconciler, scan, IndexChange, ResourceIndex, Ticket, TicketCanceller};
use tempfile::TempDir;

const NAMES: [&str; 10] = [
    "a.jar", "b.jar", "c.jar", "d.jar", "e.jar", "f.jar", "g.jar", "h.jar", "i.jar", "j.jar",
];

#[derive(Default)]
struct CountingCanceller {
    cancelled: usize,
}

impl TicketCanceller for CountingCanceller {
    fn cancel(&mut self, _ticket: Ticket) -> bool {
        self.cancelled += 1;
        true
    }
}

/// Deterministic pseudo-random subsets of `NAMES`.
fn states(count: usize) -> Vec<BTreeSet<&'static str>> {
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    (0..count)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            NAMES
                .iter()
                .enumerate()
                .filter(|(bit, _)| seed & (1 << bit) != 0)
                .map(|(_, name)| *name)
                .collect()
        })
        .collect()
}

fn write_state(dir: &Path, state: &BTreeSet<&str>) {
    for name in NAMES {
        let path = dir.join(name);
        if state.contains(name) {
            if !path.exists() {
                fs::write(&path, name).unwrap();
            }
        } else if path.exists() {
            fs::remove_file(&path).unwrap();
        }
    }
}

#[test]
fn test_index_tracks_every_state() {
    let dir = TempDir::new().unwrap();
    let mut index = ResourceIndex::new();
    let mut canceller = CountingCanceller::default();

    for state in states(40) {
        write_state(dir.path(), &state);
        let before: Vec<String> = index.ids().map(str::to_string).collect();

        let snapshot = scan(dir.path(), &dir.path().join(".index"), false, false).unwrap();
        let outcome = reconciler::apply(&mut index, &mut canceller, snapshot.resources);

        // Same id set as the folder
        let after: BTreeSet<&str> = index.ids().collect();
        assert_eq!(after, state);

        // Kept rows keep their relative order
        let kept_before: Vec<&String> = before.iter().filter(|id| state.contains(id.as_str())).collect();
        let kept_after: Vec<&str> = index.ids().filter(|id| before.iter().any(|b| b.as_str() == *id)).collect();
        assert_eq!(kept_before.len(), kept_after.len());
        for (a, b) in kept_before.iter().zip(&kept_after) {
            assert_eq!(a.as_str(), *b);
        }

        // Lookup map never stale
        for (row, resource) in index.iter().enumerate() {
            assert_eq!(index.row_of(resource.id()), Some(row));
        }

        assert_eq!(outcome.inserted + before.len() - outcome.removed, index.size());
    }

    // Nothing was ever resolving
    assert_eq!(canceller.cancelled, 0);
}

#[test]
fn test_removal_notifications_replay_onto_old_rows() {
    let dir = TempDir::new().unwrap();
    let mut index = ResourceIndex::new();
    let mut canceller = CountingCanceller::default();

    for state in states(25) {
        write_state(dir.path(), &state);
        let mut replay: Vec<String> = index.ids().map(str::to_string).collect();

        let snapshot = scan(dir.path(), &dir.path().join(".index"), false, false).unwrap();
        let appended = snapshot
            .resources
            .keys()
            .filter(|id| !replay.contains(id))
            .count();
        let outcome = reconciler::apply(&mut index, &mut canceller, snapshot.resources);

        for change in &outcome.changes {
            match *change {
                IndexChange::Removed { first, last } => {
                    replay.drain(first..=last);
                }
                IndexChange::Inserted { first, last } => {
                    assert_eq!(first, replay.len());
                    assert_eq!(last - first + 1, appended);
                    replay.extend(index.ids().skip(first).map(str::to_string));
                }
                IndexChange::Changed { .. } => {}
            }
        }

        assert_eq!(replay, index.ids().map(str::to_string).collect::<Vec<_>>());
    }
}
