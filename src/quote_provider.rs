use std::{
    cell::{Ref, RefCell, RefMut},
    num::NonZero,
    rc::{Rc, Weak},
};

use tracing::{debug, instrument, trace, warn};

use crate::{
    Error, Event, Observer, Provider, ProviderConfig, Result, Series, SubscriberId, Timestamp,
    Upstream, cache::Cache, chain::Subscribers,
};

/// What a [`QuoteProvider`] did with an incoming record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Act {
    /// Appended past the tail.
    Append,
    /// Replaced the tail record (same timestamp): a same-bar revision.
    ReviseLast,
    /// Inserted before the tail: a late arrival.
    InsertLate,
    /// Replaced an older record with the same timestamp.
    ReplaceLate,
    /// Dropped: a repeat of the previous arrival, or a late record that
    /// would need pruned history to recompute from.
    Ignore,
}

struct ProviderCore<Q> {
    cache: Cache<Q>,
    last_arrival: Option<Q>,
    repeats: u8,
    faulted: bool,
    /// Timestamp of the newest record evicted by pruning.
    pruned_through: Option<Timestamp>,
}

struct ProviderNode<Q> {
    label: String,
    config: ProviderConfig,
    core: RefCell<ProviderCore<Q>>,
    subscribers: Subscribers<Q>,
}

/// Root of a chain: an ordered cache of raw input records.
///
/// Every mutation is applied to the cache and then propagated,
/// synchronously and depth-first, to every attached [`Hub`](crate::Hub).
/// When a call returns, the whole chain reflects the change.
///
/// Handles are cheap to clone and share one underlying cache. The read
/// accessors ([`len`](Self::len), [`index_of`](Self::index_of),
/// [`is_faulted`](Self::is_faulted)) may be called from subscriber
/// callbacks; mutations from a callback fail with [`Error::Reentrant`].
///
/// # Example
///
/// ```
/// use quantedge_hub::{Act, Quote, QuoteProvider};
///
/// let quotes = QuoteProvider::new();
///
/// assert_eq!(quotes.add(Quote::flat(1, 10.0)).unwrap(), Act::Append);
/// assert_eq!(quotes.add(Quote::flat(2, 11.0)).unwrap(), Act::Append);
/// // same timestamp: revise the newest bar in place
/// assert_eq!(quotes.add(Quote::flat(2, 11.5)).unwrap(), Act::ReviseLast);
/// // older timestamp: late arrival
/// assert_eq!(quotes.add(Quote::flat(0, 9.0)).unwrap(), Act::InsertLate);
///
/// assert_eq!(quotes.len(), 3);
/// ```
pub struct QuoteProvider<Q> {
    node: Rc<ProviderNode<Q>>,
}

impl<Q> Clone for QuoteProvider<Q> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<Q> Default for QuoteProvider<Q>
where
    Q: Series + Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> QuoteProvider<Q>
where
    Q: Series + Clone + PartialEq + 'static,
{
    /// Unbounded provider.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ProviderConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ProviderConfig) -> Self {
        Self {
            node: Rc::new(ProviderNode {
                label: "QUOTES".to_owned(),
                config,
                core: RefCell::new(ProviderCore {
                    cache: Cache::new(),
                    last_arrival: None,
                    repeats: 0,
                    faulted: false,
                    pruned_through: None,
                }),
                subscribers: Subscribers::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.node.config
    }

    /// Adds a record.
    ///
    /// A newer timestamp appends, the tail's timestamp revises the tail in
    /// place, an older one is handled like [`insert`](Self::insert).
    ///
    /// Once the cache has pruned its head, a late record is ignored when
    /// some subscriber would have to read pruned records to recompute from
    /// it.
    ///
    /// # Errors
    ///
    /// - [`Error::Overflow`] once more than `max_repeats` identical records
    ///   arrive in a row; the provider then faults and ends transmission.
    /// - [`Error::Faulted`] after such an overflow.
    /// - [`Error::Reentrant`] when called while this provider is notifying.
    /// - Any error raised by a subscriber.
    pub fn add(&self, item: Q) -> Result<Act> {
        let Some(core) = self.node.admit(self.node.lock()?, &item)? else {
            return Ok(Act::Ignore);
        };

        let last = core.cache.last_timestamp();
        match last {
            Some(last) if item.timestamp() < last => self.node.insert_late(core, item),
            Some(last) if item.timestamp() == last => self.node.revise_last(core, item),
            _ => self.node.append(core, item),
        }
    }

    /// Adds records in timestamp order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing [`add`](Self::add).
    pub fn add_batch(&self, items: impl IntoIterator<Item = Q>) -> Result<()> {
        let mut items: Vec<Q> = items.into_iter().collect();
        items.sort_by_key(Series::timestamp);

        for item in items {
            self.add(item)?;
        }

        Ok(())
    }

    /// Inserts a record at its timestamp position, replacing an existing
    /// record with the same timestamp. Subscribers rebuild from that
    /// timestamp. A record past the tail is appended.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn insert(&self, item: Q) -> Result<Act> {
        let Some(core) = self.node.admit(self.node.lock()?, &item)? else {
            return Ok(Act::Ignore);
        };

        let last = core.cache.last_timestamp();
        if last.is_none_or(|last| item.timestamp() > last) {
            return self.node.append(core, item);
        }

        self.node.insert_late(core, item)
    }

    /// Removes the record at `timestamp`. Subscribers rebuild from it.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] when no record has that timestamp.
    /// - [`Error::HistoryPruned`] when a subscriber would have to read
    ///   pruned records to recompute from it, or to recompute the tail
    ///   left behind.
    /// - Otherwise as [`add`](Self::add).
    #[instrument(level = "debug", skip(self), fields(label = %self.node.label))]
    pub fn remove(&self, timestamp: Timestamp) -> Result<Q> {
        let mut core = self.node.lock()?;
        core.ensure_healthy(&self.node.label)?;

        let index = core
            .cache
            .index_of(timestamp)
            .ok_or(Error::NotFound(timestamp))?;
        let len = core.cache.len();
        if self.node.reaches_pruned(&core, index, false)
            || self.node.keeps_too_few(&core, len - 1)
        {
            return Err(Error::HistoryPruned(timestamp));
        }

        let removed = core.remove_at(index);
        drop(core);

        debug!(index, "removed record");
        self.node.publish(Event::Rebuild { from: timestamp })?;
        Ok(removed)
    }

    /// Removes the record at cache position `index`.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] for a position past the tail, otherwise
    /// as [`remove`](Self::remove).
    pub fn remove_at(&self, index: usize) -> Result<Q> {
        let mut core = self.node.lock()?;
        core.ensure_healthy(&self.node.label)?;

        let len = core.cache.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        if self.node.reaches_pruned(&core, index, false)
            || self.node.keeps_too_few(&core, len - 1)
        {
            let ts = core.cache.as_slice()[index].timestamp();
            return Err(Error::HistoryPruned(ts));
        }

        let removed = core.remove_at(index);
        let from = removed.timestamp();
        drop(core);

        debug!(index, ts = from, "removed record");
        self.node.publish(Event::Rebuild { from })?;
        Ok(removed)
    }

    /// Removes every record at or after `from`. Returns how many were
    /// removed; nothing is propagated when that is zero.
    ///
    /// # Errors
    ///
    /// [`Error::HistoryPruned`] when the range reaches back into pruned
    /// records, or leaves fewer records than a subscriber reads to compute
    /// the next one. Otherwise as [`add`](Self::add).
    pub fn remove_range(&self, from: Timestamp) -> Result<usize> {
        let mut core = self.node.lock()?;
        core.ensure_healthy(&self.node.label)?;

        let index = core.cache.index_gte(from);
        let truncates = index < core.cache.len();
        if core.pruned_through.is_some_and(|through| from <= through)
            || (truncates && self.node.keeps_too_few(&core, index))
        {
            return Err(Error::HistoryPruned(from));
        }

        let removed = core.cache.truncate_from(index);
        core.last_arrival = None;
        core.repeats = 0;
        drop(core);

        if removed > 0 {
            debug!(from, removed, "removed range");
            self.node.publish(Event::Rebuild { from })?;
        }

        Ok(removed)
    }

    /// Detaches every subscriber. Each detached hub ends transmission to
    /// its own subscribers in turn. Calling it again is a no-op.
    pub fn end_transmission(&self) {
        debug!(label = %self.node.label, "ending transmission");
        self.node.subscribers.end_transmission();
    }

    /// Borrows the cache.
    ///
    /// # Errors
    ///
    /// [`Error::Reentrant`] while a mutation is in progress.
    pub fn results(&self) -> Result<Ref<'_, [Q]>> {
        self.node.results()
    }

    /// Copies the cache.
    ///
    /// # Errors
    ///
    /// Same as [`results`](Self::results).
    pub fn to_vec(&self) -> Result<Vec<Q>> {
        Ok(self.results()?.to_vec())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.node.core.borrow().cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn index_of(&self, timestamp: Timestamp) -> Option<usize> {
        self.node.core.borrow().cache.index_of(timestamp)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.node.subscribers.len()
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.node.core.borrow().faulted
    }

    /// Clears a fault raised by repeated identical records. Subscribers
    /// detached by the fault stay detached.
    ///
    /// # Errors
    ///
    /// [`Error::Reentrant`] while a mutation is in progress.
    pub fn reset_fault(&self) -> Result<()> {
        let mut core = self.node.lock()?;
        core.faulted = false;
        core.repeats = 0;
        core.last_arrival = None;
        Ok(())
    }
}

impl<Q> ProviderCore<Q>
where
    Q: Series,
{
    fn ensure_healthy(&self, label: &str) -> Result<()> {
        if self.faulted {
            Err(Error::Faulted(label.to_owned()))
        } else {
            Ok(())
        }
    }

    fn remove_at(&mut self, index: usize) -> Q {
        self.last_arrival = None;
        self.repeats = 0;
        self.cache.remove_at(index)
    }
}

impl<Q> ProviderNode<Q>
where
    Q: Series + Clone + PartialEq,
{
    fn lock(&self) -> Result<RefMut<'_, ProviderCore<Q>>> {
        self.core
            .try_borrow_mut()
            .map_err(|_| Error::Reentrant(self.label.clone()))
    }

    /// Duplicate suppression. Hands the lock back when the record should be
    /// applied, `Ok(None)` drops it. On overflow the lock is released before
    /// subscribers are told the stream has ended.
    fn admit<'a>(
        &self,
        mut core: RefMut<'a, ProviderCore<Q>>,
        item: &Q,
    ) -> Result<Option<RefMut<'a, ProviderCore<Q>>>> {
        core.ensure_healthy(&self.label)?;

        if core.last_arrival.as_ref() != Some(item) {
            core.repeats = 0;
            core.last_arrival = Some(item.clone());
            return Ok(Some(core));
        }

        core.repeats = core.repeats.saturating_add(1);
        if core.repeats <= self.config.max_repeats() {
            trace!(ts = item.timestamp(), "suppressed repeated record");
            return Ok(None);
        }

        core.faulted = true;
        drop(core);

        warn!(
            label = %self.label,
            limit = self.config.max_repeats(),
            "repeated record limit exceeded, ending transmission"
        );
        self.subscribers.end_transmission();

        Err(Error::Overflow {
            label: self.label.clone(),
            limit: self.config.max_repeats(),
        })
    }

    fn append(&self, mut core: RefMut<'_, ProviderCore<Q>>, item: Q) -> Result<Act> {
        let ts = item.timestamp();
        // only reachable once an emptied cache has pruned before
        if core.pruned_through.is_some_and(|through| ts <= through) {
            return Ok(self.ignore_late(ts));
        }

        core.cache.push(item);
        self.prune(&mut core);
        let index = core.cache.len() - 1;
        drop(core);

        trace!(ts, "appended record");
        self.publish(Event::Add { index })?;
        Ok(Act::Append)
    }

    fn revise_last(&self, mut core: RefMut<'_, ProviderCore<Q>>, item: Q) -> Result<Act> {
        let ts = item.timestamp();
        let index = core.cache.len() - 1;
        core.cache.replace_at(index, item);
        drop(core);

        trace!(ts, "revised last record");
        self.publish(Event::Add { index })?;
        Ok(Act::ReviseLast)
    }

    /// Places a record older than the tail.
    fn insert_late(&self, mut core: RefMut<'_, ProviderCore<Q>>, item: Q) -> Result<Act> {
        let ts = item.timestamp();

        let act = if let Some(index) = core.cache.index_of(ts) {
            if self.reaches_pruned(&core, index, false) {
                return Ok(self.ignore_late(ts));
            }

            core.cache.replace_at(index, item);
            Act::ReplaceLate
        } else {
            let index = core.cache.index_gte(ts);
            let full = self
                .config
                .max_cache_size()
                .is_some_and(|max| core.cache.len() >= max.get());

            let behind_pruned = core.pruned_through.is_some_and(|through| ts <= through);
            if behind_pruned || (full && index == 0) {
                return Ok(self.ignore_late(ts));
            }

            // position of the record once the head is pruned
            let settled = if full { index - 1 } else { index };
            if self.reaches_pruned(&core, settled, full) {
                return Ok(self.ignore_late(ts));
            }

            core.cache.insert_at(index, item);
            self.prune(&mut core);
            Act::InsertLate
        };
        drop(core);

        debug!(ts, ?act, "late arrival");
        self.publish(Event::Rebuild { from: ts })?;
        Ok(act)
    }

    fn ignore_late(&self, ts: Timestamp) -> Act {
        warn!(
            label = %self.label,
            ts,
            "late arrival precedes retained history, ignoring"
        );
        Act::Ignore
    }

    /// Whether replaying from cache position `at` makes some subscriber
    /// read records that were pruned, or that `evicts` is about to prune.
    fn reaches_pruned(&self, core: &ProviderCore<Q>, at: usize, evicts: bool) -> bool {
        (core.pruned_through.is_some() || evicts) && at + 1 < self.subscribers.lookback()
    }

    /// Whether shrinking a pruned cache to `len` records leaves a tail, or
    /// the next append, that some subscriber cannot recompute.
    fn keeps_too_few(&self, core: &ProviderCore<Q>, len: usize) -> bool {
        if core.pruned_through.is_none() {
            return false;
        }

        let lookback = self.subscribers.lookback();
        if len == 0 { lookback > 1 } else { len < lookback }
    }

    fn prune(&self, core: &mut ProviderCore<Q>) {
        let Some(max) = self.config.max_cache_size() else {
            return;
        };

        let excess = core.cache.len().saturating_sub(max.get());
        if excess > 0 {
            core.pruned_through = Some(core.cache.as_slice()[excess - 1].timestamp());
            let evicted = core.cache.prune_to(max.get());
            trace!(evicted, "pruned cache head");
        }
    }

    fn publish(&self, event: Event) -> Result<()> {
        let core = self
            .core
            .try_borrow()
            .map_err(|_| Error::Reentrant(self.label.clone()))?;
        self.subscribers.notify(event, core.cache.as_slice())
    }
}

impl<Q> Provider<Q> for ProviderNode<Q>
where
    Q: Series + Clone + PartialEq,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn results(&self) -> Result<Ref<'_, [Q]>> {
        let core = self
            .core
            .try_borrow()
            .map_err(|_| Error::Reentrant(self.label.clone()))?;
        Ok(Ref::map(core, |core| core.cache.as_slice()))
    }

    fn subscribe(&self, observer: Weak<dyn Observer<Q>>) -> SubscriberId {
        let id = self.subscribers.subscribe(observer);
        debug!(label = %self.label, ?id, "subscribed");
        id
    }

    fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.unsubscribe(id);
        debug!(label = %self.label, ?id, removed, "unsubscribed");
        removed
    }

    fn max_cache_size(&self) -> Option<NonZero<usize>> {
        self.config.max_cache_size()
    }
}

impl<Q> Upstream<Q> for QuoteProvider<Q>
where
    Q: Series + Clone + PartialEq + 'static,
{
    fn provider(&self) -> Rc<dyn Provider<Q>> {
        self.node.clone()
    }
}
