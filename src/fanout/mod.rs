//! Batched queries and subscriptions
//!
//! The store caps `IN` filters at [`MAX_IN_CLAUSE`](crate::consts::MAX_IN_CLAUSE)
//! values, so per-employee queries are split into batches. Every batch runs and
//! refreshes on its own; results are merged by staff id as they arrive.

use std::{collections::HashMap, future::{self, Future}};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;

use accumulator::Accumulator;
use feed::{ChangeFeed, Collection, Interest};
use subscription::{Snapshot, Subscription};

pub mod accumulator;
pub mod feed;
pub mod subscription;

/// What applying one snapshot did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// From a superseded round, ignored
    Stale,
    Merged { batch: usize },
    Failed { batch: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub batch: usize,
    pub error: String,
}

/// A batched subscription over per-employee records
#[derive(Debug)]
pub struct FanOut<V> {
    batch_size: usize,
    accumulator: Accumulator<V>,
    sink: mpsc::UnboundedSender<Snapshot<HashMap<Uuid, V>>>,
    source: mpsc::UnboundedReceiver<Snapshot<HashMap<Uuid, V>>>,
    subscriptions: Vec<Subscription>,
}

impl<V: 'static> FanOut<V> {
    pub fn new(batch_size: usize) -> Self {
        let (sink, source) = mpsc::unbounded_channel();

        Self {
            batch_size,
            accumulator: Accumulator::new(),
            sink,
            source,
            subscriptions: Vec::new(),
        }
    }

    /// Tears down the current subscriptions, then subscribes one query per batch of `ids`
    pub fn subscribe<F, Fut>(&mut self, feed: &ChangeFeed, collection: Collection, ids: &[Uuid], query: F)
    where
        F: Fn(Vec<Uuid>) -> Fut + Clone + 'static,
        Fut: Future<Output = Result<HashMap<Uuid, V>, Error>> + 'static,
    {
        self.dispose();

        let (generation, batches) = self.accumulator.reset(ids, self.batch_size);
        debug!(generation, batches = batches.len(), ?collection, "subscribing fan-out");

        self.subscriptions = batches
            .into_iter()
            .enumerate()
            .map(|(index, batch)| {
                let interest = Interest::staff(collection, &batch);
                let query = query.clone();

                Subscription::spawn(feed, interest, generation, index, self.sink.clone(), move || query(batch.clone()))
            })
            .collect();
    }

    pub fn dispose(&mut self) {
        self.subscriptions.clear();
    }

    /// Waits for and merges the next snapshot from any batch
    pub async fn next(&mut self) -> Applied {
        match self.source.recv().await {
            Some(snapshot) => self.accumulator.apply(snapshot),
            // `self.sink` keeps the channel open
            None => future::pending().await,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.accumulator.is_complete()
    }

    pub fn get(&self, id: Uuid) -> Option<&V> {
        self.accumulator.get(id)
    }

    pub fn failures(&self) -> Vec<BatchFailure> {
        self.accumulator.failures()
    }
}

/// Runs one query per batch concurrently and merges whatever succeeded
pub async fn fetch_batched<V, F, Fut>(ids: &[Uuid], batch_size: usize, query: F) -> (HashMap<Uuid, V>, Vec<BatchFailure>)
where
    F: Fn(Vec<Uuid>) -> Fut,
    Fut: Future<Output = Result<HashMap<Uuid, V>, Error>>,
{
    let batches = accumulator::partition(ids, batch_size);
    let results = join_all(batches.into_iter().map(&query)).await;

    let mut merged = HashMap::new();
    let mut failures = Vec::new();

    for (batch, result) in results.into_iter().enumerate() {
        match result {
            Ok(entries) => merged.extend(entries),
            Err(err) => {
                warn!(batch, %err, "batched fetch failed");
                failures.push(BatchFailure { batch, error: err.to_string() });
            }
        }
    }

    (merged, failures)
}

#[cfg(test)]
impl<V> FanOut<V> {
    pub fn accumulator(&self) -> &Accumulator<V> {
        &self.accumulator
    }
}
