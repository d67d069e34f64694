//! Synchronous change notification shared by the stores.
//!
//! Callbacks are cloned out of the registry before they run, so a callback
//! may read or mutate the store that invoked it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Table<E> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Callback<E>)>,
}

pub struct Listeners<E> {
    table: Mutex<Table<E>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut table = self.table.lock();
        let id = SubscriptionId(table.next_id);
        table.next_id += 1;
        table.entries.push((id, Arc::new(callback)));
        trace!(subscription = id.0, "listener subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.lock();
        let before = table.entries.len();
        table.entries.retain(|(existing, _)| *existing != id);
        before != table.entries.len()
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every listener in subscription order.
    pub fn notify(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .table
            .lock()
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn notifies_in_subscription_order_until_unsubscribed() {
        let listeners = Listeners::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = Arc::clone(&seen);
            listeners.subscribe(move |v| seen.lock().push(("first", *v)))
        };
        {
            let seen = Arc::clone(&seen);
            listeners.subscribe(move |v| seen.lock().push(("second", *v)));
        }

        listeners.notify(&1);
        assert!(listeners.unsubscribe(first));
        assert!(!listeners.unsubscribe(first));
        listeners.notify(&2);

        assert_eq!(
            *seen.lock(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
    }

    #[test]
    fn listener_may_subscribe_during_notify() {
        let listeners = Arc::new(Listeners::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        {
            let inner = Arc::clone(&listeners);
            let calls = Arc::clone(&calls);
            listeners.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                inner.subscribe(|_| {});
            });
        }

        listeners.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 2);
    }
}
