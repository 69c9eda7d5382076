//! Messages delivered back to the folder model from background work.

use bridge_traits::ChangeNotice;
use core_metadata::ResourceDetails;

use crate::error::Result;
use crate::scanner::Snapshot;
use crate::scheduler::Ticket;

#[derive(Debug)]
pub enum ModelMessage {
    /// A scan dispatched as `generation` finished.
    ScanFinished {
        generation: u64,
        result: Result<Snapshot>,
    },
    /// A parse task finished. `resource_id` is the id at dispatch time.
    ParseFinished {
        ticket: Ticket,
        resource_id: String,
        outcome: ParseOutcome,
    },
    /// The watcher saw a change in the managed folder or its index.
    FilesystemChanged(ChangeNotice),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Resolved(ResourceDetails),
    Failed(String),
    /// The task observed its cancellation token and stopped early.
    Cancelled,
}
