//! Last-write-wins refreshes for listing views.
//!
//! Every refresh of a view takes a [RefreshTicket]. Starting another refresh of the same view
//! for the same user supersedes the earlier ticket, and a handler still waiting on superseded
//! work gives up with [Error::Superseded] instead of answering with stale data.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::watch;

use crate::{Error, auth::UserID};

/// The view name for the transaction listing.
pub const TRANSACTIONS_VIEW: &str = "transactions";
/// The view name for the analytics buckets.
pub const ANALYTICS_VIEW: &str = "analytics";

type ViewKey = (UserID, &'static str);

/// Hands out refresh tickets per user and view.
#[derive(Debug, Clone, Default)]
pub struct RefreshRegistry {
    generations: Arc<Mutex<HashMap<ViewKey, watch::Sender<u64>>>>,
}

impl RefreshRegistry {
    /// Start a refresh of `view` for `user_id`, superseding any refresh already in flight.
    pub fn begin(&self, user_id: UserID, view: &'static str) -> RefreshTicket {
        // The map only holds senders, so a panic elsewhere cannot leave it inconsistent.
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let sender = generations
            .entry((user_id, view))
            .or_insert_with(|| watch::channel(0).0);

        let mut generation = 0;
        sender.send_modify(|current| {
            *current += 1;
            generation = *current;
        });

        RefreshTicket {
            generation,
            receiver: sender.subscribe(),
        }
    }
}

/// A claim on the latest refresh of one view.
#[derive(Debug)]
pub struct RefreshTicket {
    generation: u64,
    receiver: watch::Receiver<u64>,
}

impl RefreshTicket {
    /// Whether no newer refresh of the same view has started.
    pub fn is_current(&self) -> bool {
        *self.receiver.borrow() == self.generation
    }

    /// Resolves once a newer refresh of the same view starts.
    pub async fn superseded(mut self) {
        loop {
            if *self.receiver.borrow_and_update() != self.generation {
                return;
            }

            if self.receiver.changed().await.is_err() {
                // The registry is gone, so nothing can supersede this ticket any more.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Run blocking `work` on the blocking thread pool unless `ticket` is superseded first.
///
/// # Errors
///
/// Returns [Error::Superseded] if a newer refresh started before `work` finished,
/// [Error::TaskFailed] if `work` panicked, or the error returned by `work`.
pub async fn run_unless_superseded<T, F>(ticket: RefreshTicket, work: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);

    tokio::select! {
        biased;

        _ = ticket.superseded() => {
            tracing::debug!("Refresh superseded by a newer request");
            Err(Error::Superseded)
        }
        result = task => result.map_err(|error| {
            tracing::error!("Refresh task failed: {error}");
            Error::TaskFailed(error.to_string())
        })?,
    }
}
