//! # Resolution Scheduler
//!
//! Dispatches one background parse per unresolved resource and tracks it by
//! [`Ticket`].
//!
//! ## Ticket lifecycle
//!
//! ```text
//! Unresolved --resolve()--> Resolving(ticket) --finish()--> Resolved / Unresolved
//!                                  |
//!                                  +--cancel()--> ticket forgotten, token cancelled
//! ```
//!
//! A ticket leaves the live map the moment it is cancelled, not when its task
//! exits. A completion that arrives afterwards finds no live ticket and is
//! dropped by the model, whichever side wins the race.
//!
//! Parse jobs run on the injected [`WorkerPool`], so at most
//! `max_workers` archives are open at once. Each job works on a
//! [`ParseRequest`] copy and never touches the live resource.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use core_async::pool::WorkerPool;
use core_async::sync::{mpsc, CancellationToken};
use core_async::task;
use core_metadata::{MetadataError, ParseRequest, ResourceParser};

use crate::message::{ModelMessage, ParseOutcome};
use crate::resource::Resource;

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Handle for one outstanding parse task. Process-wide and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    /// Allocates the next ticket.
    pub fn next() -> Self {
        Self(NEXT_TICKET.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct ActiveParse {
    resource_id: String,
    cancel: CancellationToken,
}

pub struct ResolutionScheduler {
    pool: WorkerPool,
    parser: Arc<dyn ResourceParser>,
    sender: mpsc::UnboundedSender<ModelMessage>,
    active: HashMap<Ticket, ActiveParse>,
}

impl ResolutionScheduler {
    pub fn new(
        pool: WorkerPool,
        parser: Arc<dyn ResourceParser>,
        sender: mpsc::UnboundedSender<ModelMessage>,
    ) -> Self {
        Self {
            pool,
            parser,
            sender,
            active: HashMap::new(),
        }
    }

    /// Starts a parse for `resource` if it needs one.
    ///
    /// Marks the resource `Resolving` and returns the new ticket, or `None`
    /// if the resource is already resolving, resolved, or has no file. Must
    /// be called from within a Tokio runtime.
    pub fn resolve(&mut self, resource: &mut Resource) -> Option<Ticket> {
        if !resource.should_resolve() {
            return None;
        }

        let ticket = Ticket::next();
        let cancel = CancellationToken::new();
        let request = ParseRequest::new(resource.id(), resource.path(), resource.kind());

        resource.set_resolving(ticket);
        self.active.insert(
            ticket,
            ActiveParse {
                resource_id: resource.id().to_string(),
                cancel: cancel.clone(),
            },
        );
        debug!(ticket = %ticket, resource_id = %resource.id(), "Dispatched parse task");

        let pool = self.pool.clone();
        let parser = Arc::clone(&self.parser);
        let sender = self.sender.clone();
        let resource_id = resource.id().to_string();

        task::spawn(async move {
            let job_cancel = cancel.clone();
            let result = pool
                .run(move || {
                    if job_cancel.is_cancelled() {
                        return Err(MetadataError::Cancelled);
                    }
                    parser.parse(&request, &job_cancel)
                })
                .await;

            let outcome = match result {
                Ok(Ok(details)) => ParseOutcome::Resolved(details),
                Ok(Err(MetadataError::Cancelled)) => ParseOutcome::Cancelled,
                Ok(Err(err)) => ParseOutcome::Failed(err.to_string()),
                Err(err) => ParseOutcome::Failed(err.to_string()),
            };

            // The model may already be gone
            if sender
                .send(ModelMessage::ParseFinished {
                    ticket,
                    resource_id,
                    outcome,
                })
                .is_err()
            {
                trace!(ticket = %ticket, "Parse result dropped, model closed");
            }
        });

        Some(ticket)
    }

    /// Forgets `ticket` and signals its task to stop. Returns the id of the
    /// resource it was parsing, or `None` if the ticket was not live.
    pub fn cancel(&mut self, ticket: Ticket) -> Option<String> {
        let parse = self.active.remove(&ticket)?;
        parse.cancel.cancel();
        debug!(ticket = %ticket, resource_id = %parse.resource_id, "Cancelled parse task");
        Some(parse.resource_id)
    }

    /// Retires a live ticket on completion, returning the id its resource
    /// currently has. `None` means the ticket was cancelled or never issued.
    pub fn finish(&mut self, ticket: Ticket) -> Option<String> {
        self.active.remove(&ticket).map(|parse| parse.resource_id)
    }

    pub fn is_live(&self, ticket: Ticket) -> bool {
        self.active.contains_key(&ticket)
    }

    /// Records that the resource behind `ticket` was renamed.
    pub fn rebind(&mut self, ticket: Ticket, resource_id: impl Into<String>) {
        if let Some(parse) = self.active.get_mut(&ticket) {
            parse.resource_id = resource_id.into();
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.active.len()
    }

    /// Cancels every live ticket. Returns how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.active.len();
        for (_, parse) in self.active.drain() {
            parse.cancel.cancel();
        }
        count
    }
}

impl fmt::Debug for ResolutionScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionScheduler")
            .field("pool", &self.pool)
            .field("pending", &self.active.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_metadata::ResourceDetails;
    use std::fs;
    use tempfile::TempDir;

    struct NamedParser;

    impl ResourceParser for NamedParser {
        fn parse(
            &self,
            request: &ParseRequest,
            _cancel: &CancellationToken,
        ) -> core_metadata::Result<ResourceDetails> {
            Ok(ResourceDetails {
                name: Some(request.resource_id.to_uppercase()),
                ..Default::default()
            })
        }
    }

    fn setup() -> (
        TempDir,
        ResolutionScheduler,
        mpsc::UnboundedReceiver<ModelMessage>,
    ) {
        let dir = TempDir::new().unwrap();
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = ResolutionScheduler::new(WorkerPool::new(2), Arc::new(NamedParser), sender);
        (dir, scheduler, receiver)
    }

    fn resource(dir: &TempDir, name: &str) -> Resource {
        let path = dir.path().join(name);
        fs::write(&path, name).unwrap();
        Resource::from_path(path).unwrap()
    }

    #[test]
    fn test_tickets_are_monotonic() {
        let a = Ticket::next();
        let b = Ticket::next();
        assert!(b > a);
        assert_eq!(format!("{}", a), format!("#{}", a.value()));
    }

    #[tokio::test]
    async fn test_resolve_sends_completion() {
        let (dir, mut scheduler, mut receiver) = setup();
        let mut jei = resource(&dir, "jei.jar");

        let ticket = scheduler.resolve(&mut jei).unwrap();
        assert_eq!(jei.ticket(), Some(ticket));
        assert!(scheduler.is_live(ticket));

        // Already resolving
        assert!(scheduler.resolve(&mut jei).is_none());

        match receiver.recv().await.unwrap() {
            ModelMessage::ParseFinished {
                ticket: finished,
                resource_id,
                outcome,
            } => {
                assert_eq!(finished, ticket);
                assert_eq!(resource_id, "jei.jar");
                assert!(matches!(outcome, ParseOutcome::Resolved(d) if d.name.as_deref() == Some("JEI.JAR")));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        assert_eq!(scheduler.finish(ticket), Some("jei.jar".to_string()));
        assert!(!scheduler.has_pending());
    }

    #[tokio::test]
    async fn test_cancel_forgets_ticket_immediately() {
        let (dir, mut scheduler, _receiver) = setup();
        let mut a = resource(&dir, "a.jar");

        let ticket = scheduler.resolve(&mut a).unwrap();
        assert_eq!(scheduler.cancel(ticket), Some("a.jar".to_string()));
        assert!(!scheduler.is_live(ticket));
        assert_eq!(scheduler.cancel(ticket), None);
        assert_eq!(scheduler.finish(ticket), None);
    }

    #[tokio::test]
    async fn test_rebind_and_cancel_all() {
        let (dir, mut scheduler, _receiver) = setup();
        let mut a = resource(&dir, "a.jar");
        let mut b = resource(&dir, "b.jar");

        let first = scheduler.resolve(&mut a).unwrap();
        scheduler.resolve(&mut b).unwrap();
        scheduler.rebind(first, "a.jar.disabled");
        assert_eq!(scheduler.pending(), 2);

        assert_eq!(scheduler.finish(first), Some("a.jar.disabled".to_string()));
        assert_eq!(scheduler.cancel_all(), 1);
        assert!(!scheduler.has_pending());
    }
}
