use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{trace, warn};
use uuid::Uuid;

use super::{subscription::Snapshot, Applied, BatchFailure};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Ready,
    Failed(String),
}

#[derive(Debug)]
struct Batch<V> {
    ids: HashSet<Uuid>,
    state: BatchState,
    fired: bool,
    entries: HashMap<Uuid, V>,
}

/// Splits `ids` into consecutive batches of at most `batch_size`, dropping repeats
pub fn partition(ids: &[Uuid], batch_size: usize) -> Vec<Vec<Uuid>> {
    let mut seen = HashSet::new();
    let unique = ids.iter().copied().filter(|id| seen.insert(*id)).collect::<Vec<_>>();

    unique.chunks(batch_size.max(1)).map(<[Uuid]>::to_vec).collect()
}

/// Merged per-employee results of a batched subscription
///
/// Every batch owns a disjoint set of ids and its latest snapshot replaces only its
/// own entries. A failed refresh keeps the batch's previous entries. Snapshots from an
/// earlier round are dropped.
#[derive(Debug)]
pub struct Accumulator<V> {
    generation: u64,
    batches: Vec<Batch<V>>,
    owners: HashMap<Uuid, usize>,
}

impl<V> Default for Accumulator<V> {
    fn default() -> Self {
        Self {
            generation: 0,
            batches: Vec::new(),
            owners: HashMap::new(),
        }
    }
}

impl<V> Accumulator<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new round for `ids`, returning its generation and batches
    pub fn reset(&mut self, ids: &[Uuid], batch_size: usize) -> (u64, Vec<Vec<Uuid>>) {
        let batches = partition(ids, batch_size);

        self.generation += 1;
        self.owners = batches
            .iter()
            .enumerate()
            .flat_map(|(index, batch)| batch.iter().map(move |id| (*id, index)))
            .collect();
        self.batches = batches
            .iter()
            .map(|batch| Batch {
                ids: batch.iter().copied().collect(),
                state: BatchState::Pending,
                fired: false,
                entries: HashMap::new(),
            })
            .collect();

        (self.generation, batches)
    }

    pub fn apply(&mut self, snapshot: Snapshot<HashMap<Uuid, V>>) -> Applied {
        let index = snapshot.batch;

        if snapshot.generation != self.generation {
            trace!(stale = snapshot.generation, current = self.generation, batch = index, "dropping stale snapshot");
            return Applied::Stale;
        }

        let Some(batch) = self.batches.get_mut(index) else {
            warn!(batch = index, "snapshot for unknown batch");
            return Applied::Stale;
        };

        batch.fired = true;

        match snapshot.result {
            Ok(entries) => {
                let before = entries.len();
                batch.entries = entries.into_iter().filter(|(id, _)| batch.ids.contains(id)).collect();

                if batch.entries.len() != before {
                    warn!(batch = index, dropped = before - batch.entries.len(), "snapshot held ids outside its batch");
                }

                batch.state = BatchState::Ready;
                Applied::Merged { batch: index }
            }
            Err(err) => {
                warn!(batch = index, %err, "batch failed, keeping its previous entries");

                batch.state = BatchState::Failed(err.to_string());
                Applied::Failed { batch: index }
            }
        }
    }

    /// Whether every batch of the current round has delivered at least once
    pub fn is_complete(&self) -> bool {
        self.batches.iter().all(|batch| batch.fired)
    }

    pub fn get(&self, id: Uuid) -> Option<&V> {
        let index = *self.owners.get(&id)?;

        self.batches[index].entries.get(&id)
    }

    pub fn failures(&self) -> Vec<BatchFailure> {
        self.batches
            .iter()
            .enumerate()
            .filter_map(|(index, batch)| match &batch.state {
                BatchState::Failed(error) => Some(BatchFailure { batch: index, error: error.clone() }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl<V> Accumulator<V> {
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(|batch| batch.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &V)> {
        self.batches.iter().flat_map(|batch| batch.entries.iter())
    }

    pub fn states(&self) -> impl Iterator<Item = &BatchState> {
        self.batches.iter().map(|batch| &batch.state)
    }
}
