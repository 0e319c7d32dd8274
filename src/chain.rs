use std::{
    cell::{Cell, Ref, RefCell},
    num::NonZero,
    rc::{Rc, Weak},
};

use tracing::trace;

use crate::{Result, Timestamp};

/// Change notification sent from a provider to its subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The record at `index` of the provider's cache was appended or
    /// revised in place. Only ever the newest record.
    Add { index: usize },
    /// Every record at or after `from` may have changed, been inserted or
    /// been removed. Subscribers drop their results from `from` and replay.
    Rebuild { from: Timestamp },
}

/// Receives [`Event`]s from a [`Provider`].
///
/// `upstream` is the provider's full cache after the change was applied.
pub trait Observer<T> {
    /// # Errors
    ///
    /// Propagates the first error raised by this observer or any of its
    /// descendants.
    fn on_event(&self, event: Event, upstream: &[T]) -> Result<()>;

    /// The provider stopped transmitting and dropped this subscription.
    fn on_completed(&self);

    /// Upstream records, ending at an item, that this observer or anything
    /// below it reads to recompute that item.
    fn lookback(&self) -> usize {
        1
    }
}

/// A node whose cache others can subscribe to.
pub trait Provider<T> {
    /// Diagnostic name, e.g. `QUOTES` or `SMA(20)`.
    fn label(&self) -> &str;

    /// Borrows the current cache.
    ///
    /// # Errors
    ///
    /// [`Error::Reentrant`](crate::Error::Reentrant) while the node is
    /// being mutated.
    fn results(&self) -> Result<Ref<'_, [T]>>;

    /// Registers `observer`. The provider holds it weakly: dropping the
    /// last strong handle ends the subscription.
    fn subscribe(&self, observer: Weak<dyn Observer<T>>) -> SubscriberId;

    /// Returns `false` when `id` was not subscribed.
    fn unsubscribe(&self, id: SubscriberId) -> bool;

    /// Bound inherited by every subscriber's own cache.
    fn max_cache_size(&self) -> Option<NonZero<usize>>;
}

/// Anything a [`Hub`](crate::Hub) can be attached to.
pub trait Upstream<T> {
    fn provider(&self) -> Rc<dyn Provider<T>>;
}

/// Handle returned by [`Provider::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Subscriber list shared by every provider implementation.
///
/// Observers are notified in subscription order. The list is never
/// borrowed while an observer runs, so observers may subscribe or
/// unsubscribe from inside a callback.
pub(crate) struct Subscribers<T> {
    observers: RefCell<Vec<(SubscriberId, Weak<dyn Observer<T>>)>>,
    next_id: Cell<u64>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            observers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub(crate) fn subscribe(&self, observer: Weak<dyn Observer<T>>) -> SubscriberId {
        let id = SubscriberId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.observers.borrow_mut().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Live subscribers. Dropped observers are pruned first.
    pub(crate) fn len(&self) -> usize {
        self.prune_dead();
        self.observers.borrow().len()
    }

    /// Deepest [`Observer::lookback`] among live subscribers, 1 without any.
    pub(crate) fn lookback(&self) -> usize {
        let live: Vec<_> = self
            .observers
            .borrow()
            .iter()
            .filter_map(|(_, observer)| observer.upgrade())
            .collect();

        live.iter()
            .map(|observer| observer.lookback())
            .max()
            .unwrap_or(1)
    }

    /// Delivers `event` depth-first: each observer, and everything below
    /// it, finishes before the next one starts. Stops at the first error.
    pub(crate) fn notify(&self, event: Event, items: &[T]) -> Result<()> {
        let live: Vec<_> = {
            self.prune_dead();
            self.observers
                .borrow()
                .iter()
                .filter_map(|(_, observer)| observer.upgrade())
                .collect()
        };

        if !live.is_empty() {
            trace!(?event, subscribers = live.len(), "notifying subscribers");
        }

        for observer in live {
            observer.on_event(event, items)?;
        }

        Ok(())
    }

    /// Detaches every subscriber and tells each of them.
    pub(crate) fn end_transmission(&self) {
        let observers = std::mem::take(&mut *self.observers.borrow_mut());

        for (_, observer) in observers {
            if let Some(observer) = observer.upgrade() {
                observer.on_completed();
            }
        }
    }

    fn prune_dead(&self) {
        self.observers
            .borrow_mut()
            .retain(|(_, observer)| observer.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<(Event, usize)>>,
        completed: Cell<bool>,
        fail: bool,
        depth: usize,
    }

    impl Observer<u8> for Recorder {
        fn on_event(&self, event: Event, upstream: &[u8]) -> Result<()> {
            self.events.borrow_mut().push((event, upstream.len()));
            if self.fail {
                Err(Error::Faulted("recorder".into()))
            } else {
                Ok(())
            }
        }

        fn on_completed(&self) {
            self.completed.set(true);
        }

        fn lookback(&self) -> usize {
            self.depth.max(1)
        }
    }

    fn attach(subscribers: &Subscribers<u8>, recorder: &Rc<Recorder>) -> SubscriberId {
        let observer: Rc<dyn Observer<u8>> = recorder.clone();
        subscribers.subscribe(Rc::downgrade(&observer))
    }

    #[test]
    fn notifies_in_subscription_order() {
        let subscribers = Subscribers::new();
        let first = Rc::new(Recorder::default());
        let second = Rc::new(Recorder::default());
        attach(&subscribers, &first);
        attach(&subscribers, &second);

        subscribers.notify(Event::Add { index: 0 }, &[1]).unwrap();

        assert_eq!(first.events.borrow().len(), 1);
        assert_eq!(second.events.borrow()[0], (Event::Add { index: 0 }, 1));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subscribers = Subscribers::new();
        let recorder = Rc::new(Recorder::default());
        let id = attach(&subscribers, &recorder);

        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.notify(Event::Rebuild { from: 0 }, &[]).unwrap();

        assert!(recorder.events.borrow().is_empty());
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let subscribers = Subscribers::new();
        let recorder = Rc::new(Recorder::default());
        attach(&subscribers, &recorder);
        assert_eq!(subscribers.len(), 1);

        drop(recorder);
        assert_eq!(subscribers.len(), 0);
    }

    #[test]
    fn first_error_stops_propagation() {
        let subscribers = Subscribers::new();
        let failing = Rc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let after = Rc::new(Recorder::default());
        attach(&subscribers, &failing);
        attach(&subscribers, &after);

        let result = subscribers.notify(Event::Add { index: 0 }, &[1]);

        assert!(matches!(result, Err(Error::Faulted(_))));
        assert!(after.events.borrow().is_empty());
    }

    #[test]
    fn lookback_is_deepest_live_subscriber() {
        let subscribers = Subscribers::new();
        assert_eq!(subscribers.lookback(), 1);

        let shallow = Rc::new(Recorder {
            depth: 3,
            ..Recorder::default()
        });
        let deep = Rc::new(Recorder {
            depth: 5,
            ..Recorder::default()
        });
        attach(&subscribers, &shallow);
        attach(&subscribers, &deep);
        assert_eq!(subscribers.lookback(), 5);

        drop(deep);
        assert_eq!(subscribers.lookback(), 3);
    }

    #[test]
    fn end_transmission_completes_and_detaches() {
        let subscribers = Subscribers::new();
        let recorder = Rc::new(Recorder::default());
        attach(&subscribers, &recorder);

        subscribers.end_transmission();

        assert!(recorder.completed.get());
        assert_eq!(subscribers.len(), 0);
    }
}
