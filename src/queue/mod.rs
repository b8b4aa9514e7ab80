use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::events::Event;
use crate::server::AppState;

/// An event waiting for the processor.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event: Event,
    pub enqueued_at: DateTime<Utc>,
}

/// Pending events, FIFO per repository, served round-robin across repositories.
///
/// At most one event per issue is queued; a newer event for the same issue
/// replaces the older one in place.
#[derive(Default)]
pub struct EventQueue {
    queues: HashMap<String, VecDeque<QueuedEvent>>,
    /// Repositories with pending work, in serving order.
    order: VecDeque<String>,
    notify: Option<mpsc::UnboundedSender<()>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_notifier(&mut self, tx: mpsc::UnboundedSender<()>) {
        self.notify = Some(tx);
    }

    pub fn enqueue(&mut self, event: Event) {
        let repo = event.repository().full_name.clone();
        let issue = event.issue().number;
        let queued = QueuedEvent {
            event,
            enqueued_at: Utc::now(),
        };

        let queue = self.queues.entry(repo.clone()).or_default();
        if let Some(existing) = queue.iter_mut().find(|q| q.event.issue().number == issue) {
            tracing::info!(repo = %repo, issue, "Issue already queued, replacing event");
            *existing = queued;
        } else {
            tracing::info!(repo = %repo, event = %queued.event.description(), "Enqueuing event");
            queue.push_back(queued);
            if !self.order.contains(&repo) {
                self.order.push_back(repo);
            }
        }

        if let Some(ref tx) = self.notify {
            let _ = tx.send(());
        }
    }

    /// Take the oldest event of the next repository in turn.
    pub fn take_next(&mut self) -> Option<QueuedEvent> {
        let repo = self.order.pop_front()?;
        let queue = self.queues.get_mut(&repo)?;
        let next = queue.pop_front();

        if queue.is_empty() {
            self.queues.remove(&repo);
        } else {
            self.order.push_back(repo);
        }
        next
    }

    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Descriptions of every pending event, in no particular order.
    pub fn pending(&self) -> Vec<String> {
        self.queues
            .values()
            .flatten()
            .map(|q| q.event.description())
            .collect()
    }
}

/// Run the background queue processor.
pub async fn run_queue_processor(state: Arc<AppState>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    state.queue.write().await.set_notifier(tx);

    tracing::info!("Queue processor started");

    while rx.recv().await.is_some() {
        loop {
            let next = state.queue.write().await.take_next();
            let Some(queued) = next else {
                break;
            };

            let description = queued.event.description();
            let waited = Utc::now() - queued.enqueued_at;
            tracing::info!(
                event = %description,
                waited_ms = waited.num_milliseconds(),
                "Processing event"
            );

            match state.pipeline.run(&queued.event).await {
                Ok(()) => tracing::info!(event = %description, "Event completed"),
                Err(e) => tracing::error!(event = %description, error = %e, "Event failed"),
            }
        }
    }
}
