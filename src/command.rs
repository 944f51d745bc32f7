//! Optimistic local state for writes that are still in flight

/// A value with at most one unconfirmed local change applied on top
///
/// [`apply`](Self::apply) keeps the confirmed value aside until the write either
/// [`commit`](Self::commit)s or [`rollback`](Self::rollback)s. A fresh snapshot
/// from the store replaces the value outright and settles any pending change,
/// since the store now holds the truth.
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    current: T,
    confirmed: Option<T>,
}

impl<T: Clone> Optimistic<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: value,
            confirmed: None,
        }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn replace(&mut self, value: T) {
        self.current = value;
        self.confirmed = None;
    }

    /// Changes the value locally, remembering what to restore on rollback
    pub fn apply<R>(&mut self, change: impl FnOnce(&mut T) -> R) -> R {
        if self.confirmed.is_none() {
            self.confirmed = Some(self.current.clone());
        }

        change(&mut self.current)
    }

    pub fn commit(&mut self) {
        self.confirmed = None;
    }

    pub fn rollback(&mut self) {
        if let Some(confirmed) = self.confirmed.take() {
            self.current = confirmed;
        }
    }
}

#[cfg(test)]
impl<T> Optimistic<T> {
    fn is_pending(&self) -> bool {
        self.confirmed.is_some()
    }
}
