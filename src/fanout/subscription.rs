use std::future::{self, Future};

use actix_web::rt;
use tokio::{sync::{broadcast::{self, error::{RecvError, TryRecvError}}, mpsc}, task::JoinHandle};
use tracing::{debug, trace, warn};

use super::{feed::{Change, ChangeFeed, Interest}, Applied};
use crate::error::Error;

/// One query result, tagged with the subscription round and batch it came from
#[derive(Debug)]
pub struct Snapshot<T> {
    pub generation: u64,
    pub batch: usize,
    pub result: Result<T, Error>,
}

/// A query that re-runs whenever a matching change is published
///
/// Runs on the current thread's event loop. Dropping the handle disposes it.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn spawn<T, F, Fut>(
        feed: &ChangeFeed,
        interest: Interest,
        generation: u64,
        batch: usize,
        sink: mpsc::UnboundedSender<Snapshot<T>>,
        query: F,
    ) -> Self
    where
        T: 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, Error>> + 'static,
    {
        // Listen before the first fetch so writes landing during it are not missed
        let mut changes = feed.subscribe();

        let handle = rt::spawn(async move {
            loop {
                let result = query().await;

                if let Err(err) = &result {
                    warn!(generation, batch, %err, "subscription query failed");
                }

                if sink.send(Snapshot { generation, batch, result }).is_err() {
                    debug!(generation, batch, "snapshot receiver dropped, ending subscription");
                    return;
                }

                if !wait_for_change(&mut changes, &interest).await {
                    debug!(generation, batch, "change feed closed, ending subscription");
                    return;
                }

                trace!(generation, batch, "refetching after change");
            }
        });

        Self { handle }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Waits for a change matching `interest`, then swallows whatever else is already
/// queued so a burst of writes costs one refetch. False once the feed is gone.
async fn wait_for_change(changes: &mut broadcast::Receiver<Change>, interest: &Interest) -> bool {
    loop {
        match changes.recv().await {
            Ok(change) if interest.matches(&change) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "change feed lagged, refetching");
                break;
            }
            Err(RecvError::Closed) => return false,
        }
    }

    loop {
        match changes.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return true,
        }
    }
}

/// A single unbatched subscription and its latest value
#[derive(Debug)]
pub struct LiveQuery<T> {
    generation: u64,
    value: Option<T>,
    failure: Option<String>,
    fired: bool,
    sink: mpsc::UnboundedSender<Snapshot<T>>,
    source: mpsc::UnboundedReceiver<Snapshot<T>>,
    subscription: Option<Subscription>,
}

impl<T: 'static> LiveQuery<T> {
    pub fn new() -> Self {
        let (sink, source) = mpsc::unbounded_channel();

        Self {
            generation: 0,
            value: None,
            failure: None,
            fired: false,
            sink,
            source,
            subscription: None,
        }
    }

    /// Replaces the running subscription, forgetting the previous value
    pub fn subscribe<F, Fut>(&mut self, feed: &ChangeFeed, interest: Interest, query: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, Error>> + 'static,
    {
        self.dispose();

        self.generation += 1;
        self.value = None;
        self.failure = None;
        self.fired = false;

        self.subscription = Some(Subscription::spawn(feed, interest, self.generation, 0, self.sink.clone(), query));
    }

    pub fn dispose(&mut self) {
        self.subscription = None;
    }

    pub fn apply(&mut self, snapshot: Snapshot<T>) -> Applied {
        if snapshot.generation != self.generation {
            trace!(stale = snapshot.generation, current = self.generation, "dropping stale snapshot");
            return Applied::Stale;
        }

        self.fired = true;

        match snapshot.result {
            Ok(value) => {
                self.value = Some(value);
                self.failure = None;
                Applied::Merged { batch: 0 }
            }
            Err(err) => {
                self.failure = Some(err.to_string());
                Applied::Failed { batch: 0 }
            }
        }
    }

    /// Waits for and applies the next snapshot
    pub async fn next(&mut self) -> Applied {
        match self.source.recv().await {
            Some(snapshot) => self.apply(snapshot),
            // `self.sink` keeps the channel open
            None => future::pending().await,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Whether the current subscription delivered at least once
    pub fn is_ready(&self) -> bool {
        self.fired
    }
}
