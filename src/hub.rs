use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    fmt::Display,
    marker::PhantomData,
    num::NonZero,
    rc::{Rc, Weak},
};

use tracing::{debug, instrument, trace, warn};

use crate::{
    Context, Error, Event, Indicator, Observer, Provider, Result, Series, SubscriberId,
    Timestamp, Upstream,
    cache::{self, Cache},
    chain::Subscribers,
    state_cache::StateCache,
};

struct HubCore<In, I: Indicator<In>>
where
    In: Series,
{
    indicator: I,
    cache: Cache<I::Output>,
    states: StateCache<I::State>,
    max_cache_size: Option<NonZero<usize>>,
    _input: PhantomData<fn(&In)>,
}

impl<In, I> HubCore<In, I>
where
    In: Series,
    I: Indicator<In>,
{
    fn new(indicator: I, max_cache_size: Option<NonZero<usize>>) -> Self {
        Self {
            indicator,
            cache: Cache::new(),
            states: StateCache::new(),
            max_cache_size,
            _input: PhantomData,
        }
    }

    /// Applies an upstream change and returns the event to forward.
    fn react(&mut self, event: Event, upstream: &[In]) -> Result<Event> {
        match event {
            Event::Add { index } => {
                let ts = upstream
                    .get(index)
                    .map(Series::timestamp)
                    .ok_or(Error::IndexOutOfRange {
                        index,
                        len: upstream.len(),
                    })?;

                match self.cache.last_timestamp() {
                    Some(last) if ts == last => self.revise_last(upstream, index),
                    Some(last) if ts < last => self.rebuild(upstream, ts),
                    _ => self.append(upstream, index),
                }
            }
            Event::Rebuild { from } => self.rebuild(upstream, from),
        }
    }

    fn append(&mut self, upstream: &[In], index: usize) -> Result<Event> {
        let mut state = self.state_before(self.cache.len());
        let out = self.compute(upstream, index, self.cache.len(), &mut state)?;

        trace!(ts = out.timestamp(), "appended result");
        self.cache.push(out);
        if I::STATEFUL {
            self.states.push(state);
        }
        self.prune();

        Ok(Event::Add {
            index: self.cache.len() - 1,
        })
    }

    /// Recomputes the newest result from the state preceding it.
    fn revise_last(&mut self, upstream: &[In], index: usize) -> Result<Event> {
        let last = self.cache.len() - 1;
        let mut state = self.state_before(last);
        let out = self.compute(upstream, index, last, &mut state)?;

        trace!(ts = out.timestamp(), "revised last result");
        self.cache.replace_at(last, out);
        if I::STATEFUL {
            self.states.replace_last(state);
        }

        Ok(Event::Add { index: last })
    }

    /// Drops results at or after `from` and replays the upstream from
    /// there.
    fn rebuild(&mut self, upstream: &[In], from: Timestamp) -> Result<Event> {
        let pos = self.cache.index_gte(from);
        self.cache.truncate_from(pos);
        if I::STATEFUL {
            self.states.truncate(pos);
        }

        let mut state = self.state_before(pos);
        let start = cache::index_gte(upstream, from);

        for index in start..upstream.len() {
            let out = self.compute(upstream, index, self.cache.len(), &mut state)?;
            self.cache.push(out);
            if I::STATEFUL {
                self.states.push(state.clone());
            }
        }
        self.prune();

        debug!(
            from,
            replayed = upstream.len() - start,
            len = self.cache.len(),
            "rebuilt results"
        );
        Ok(Event::Rebuild { from })
    }

    fn compute(
        &self,
        upstream: &[In],
        index: usize,
        results: usize,
        state: &mut I::State,
    ) -> Result<I::Output> {
        let results = &self.cache.as_slice()[..results];
        let ctx = Context::new(upstream, index, results).ok_or(Error::IndexOutOfRange {
            index,
            len: upstream.len(),
        })?;

        Ok(self.indicator.compute(&ctx, state))
    }

    fn state_before(&self, index: usize) -> I::State {
        if I::STATEFUL {
            self.states.snapshot_before(index)
        } else {
            I::State::default()
        }
    }

    fn prune(&mut self) {
        let Some(max) = self.max_cache_size else {
            return;
        };

        let evicted = self.cache.prune_to(max.get());
        if evicted > 0 {
            if I::STATEFUL {
                self.states.evict(evicted);
            }
            trace!(evicted, "pruned cache head");
        }
        debug_assert!(!I::STATEFUL || self.states.len() == self.cache.len());
    }

    fn reset(&mut self) {
        self.cache.clear();
        self.states.clear();
    }
}

struct HubNode<In, I>
where
    In: Series,
    I: Indicator<In>,
{
    label: String,
    upstream: Rc<dyn Provider<In>>,
    subscription: Cell<Option<SubscriberId>>,
    max_cache_size: Option<NonZero<usize>>,
    lookback: usize,
    core: RefCell<HubCore<In, I>>,
    subscribers: Subscribers<I::Output>,
}

impl<In, I> HubNode<In, I>
where
    In: Series + 'static,
    I: Indicator<In> + 'static,
{
    fn lock(&self) -> Result<RefMut<'_, HubCore<In, I>>> {
        self.core
            .try_borrow_mut()
            .map_err(|_| Error::Reentrant(self.label.clone()))
    }

    fn subscribe(self: &Rc<Self>) {
        let observer: Weak<Self> = Rc::downgrade(self);
        let id = self.upstream.subscribe(observer);
        self.subscription.set(Some(id));
    }

    fn unsubscribe(&self) -> bool {
        self.subscription
            .take()
            .is_some_and(|id| self.upstream.unsubscribe(id))
    }

    /// Recomputes from `from` against the upstream's current cache.
    fn rebuild_from(&self, from: Timestamp) -> Result<()> {
        let event = {
            let upstream = self.upstream.results()?;
            let mut core = self.lock()?;
            core.rebuild(&upstream, from)?
        };

        self.publish(event)
    }

    fn publish(&self, event: Event) -> Result<()> {
        let core = self
            .core
            .try_borrow()
            .map_err(|_| Error::Reentrant(self.label.clone()))?;
        self.subscribers.notify(event, core.cache.as_slice())
    }
}

impl<In, I> Observer<In> for HubNode<In, I>
where
    In: Series + 'static,
    I: Indicator<In> + 'static,
{
    fn on_event(&self, event: Event, upstream: &[In]) -> Result<()> {
        let event = self.lock()?.react(event, upstream)?;
        self.publish(event)
    }

    fn on_completed(&self) {
        self.subscription.set(None);
        debug!(label = %self.label, "upstream ended transmission");
        self.subscribers.end_transmission();
    }

    fn lookback(&self) -> usize {
        self.lookback.max(self.subscribers.lookback())
    }
}

impl<In, I> Provider<I::Output> for HubNode<In, I>
where
    In: Series + 'static,
    I: Indicator<In> + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn results(&self) -> Result<Ref<'_, [I::Output]>> {
        let core = self
            .core
            .try_borrow()
            .map_err(|_| Error::Reentrant(self.label.clone()))?;
        Ok(Ref::map(core, |core| core.cache.as_slice()))
    }

    fn subscribe(&self, observer: Weak<dyn Observer<I::Output>>) -> SubscriberId {
        let id = self.subscribers.subscribe(observer);
        debug!(label = %self.label, ?id, "subscribed");
        id
    }

    fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    fn max_cache_size(&self) -> Option<NonZero<usize>> {
        self.max_cache_size
    }
}

impl<In, I> Drop for HubNode<In, I>
where
    In: Series,
    I: Indicator<In>,
{
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.upstream.unsubscribe(id);
        }
    }
}

/// An [`Indicator`] bound to one upstream, keeping one result per upstream
/// record.
///
/// The hub subscribes to its upstream at construction, computes results for
/// the history already cached there, and from then on follows every
/// mutation: appends extend the results, a revision of the newest record
/// recomputes only the newest result, and inserts or removals truncate the
/// results at the changed timestamp and replay from there. Hubs are
/// themselves providers, so they can be chained.
///
/// The cache bound of the upstream is inherited and applied after every
/// change.
///
/// Handles are cheap to clone. Dropping every handle detaches the hub.
///
/// # Example
///
/// ```
/// use quantedge_hub::{Quote, QuoteProvider, Sma, SmaConfig};
/// use std::num::NonZero;
///
/// let quotes = QuoteProvider::new();
/// let sma = Sma::new(SmaConfig::new(NonZero::new(3).unwrap()))
///     .attach(&quotes)
///     .unwrap();
///
/// for (ts, price) in [(10, 10.0), (20, 11.0), (30, 12.0)] {
///     quotes.add(Quote::flat(ts, price)).unwrap();
/// }
/// assert_eq!(sma.results().unwrap()[2].sma, Some(11.0));
///
/// // late arrival: SMA(3) of [10, 11, 100, 12] ends at (11 + 100 + 12) / 3
/// quotes.add(Quote::flat(25, 100.0)).unwrap();
/// assert_eq!(sma.results().unwrap()[3].sma, Some(41.0));
/// ```
pub struct Hub<In, I>
where
    In: Series,
    I: Indicator<In>,
{
    node: Rc<HubNode<In, I>>,
}

impl<In, I> Clone for Hub<In, I>
where
    In: Series,
    I: Indicator<In>,
{
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<In, I> Hub<In, I>
where
    In: Series + 'static,
    I: Indicator<In> + 'static,
{
    /// Attaches `indicator` to `upstream`.
    ///
    /// # Errors
    ///
    /// Propagates the upstream's [`Error::Reentrant`] when called while the
    /// upstream is being mutated.
    pub fn new(upstream: &impl Upstream<In>, indicator: I) -> Result<Self> {
        let upstream = upstream.provider();
        let max_cache_size = upstream.max_cache_size();
        let label = indicator.to_string();
        let lookback = indicator.lookback();

        if let Some(max) = max_cache_size
            && max.get() < lookback
        {
            warn!(
                %label,
                max_cache_size = max.get(),
                lookback,
                "cache bound is shorter than the lookback, results will diverge from a full history"
            );
        }

        let node = Rc::new(HubNode {
            label,
            upstream,
            subscription: Cell::new(None),
            max_cache_size,
            lookback,
            core: RefCell::new(HubCore::new(indicator, max_cache_size)),
            subscribers: Subscribers::new(),
        });

        {
            let items = node.upstream.results()?;
            node.lock()?.rebuild(&items, Timestamp::MIN)?;
        }
        node.subscribe();

        debug!(
            label = %node.label,
            upstream = node.upstream.label(),
            "attached hub"
        );
        Ok(Self { node })
    }

    /// Borrows the results.
    ///
    /// # Errors
    ///
    /// [`Error::Reentrant`] while this hub is recomputing.
    pub fn results(&self) -> Result<Ref<'_, [I::Output]>> {
        self.node.results()
    }

    /// Copies the results.
    ///
    /// # Errors
    ///
    /// Same as [`results`](Self::results).
    pub fn to_vec(&self) -> Result<Vec<I::Output>> {
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

    /// Diagnostic name, e.g. `SMA(20)`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.node.label
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.node.subscription.get().is_some()
    }

    /// Stops following the upstream. Results are kept as they are.
    /// Returns `false` when the hub was already detached.
    pub fn unsubscribe(&self) -> bool {
        let removed = self.node.unsubscribe();
        debug!(label = %self.node.label, removed, "unsubscribed hub");
        removed
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.node.subscribers.len()
    }

    /// Recomputes every result from the upstream's current cache.
    ///
    /// # Errors
    ///
    /// [`Error::Reentrant`] during propagation, or any subscriber error.
    pub fn rebuild(&self) -> Result<()> {
        self.rebuild_from(Timestamp::MIN)
    }

    /// Recomputes results at or after `from`.
    ///
    /// Over a pruned upstream, results whose window reaches past the
    /// retained head come out empty.
    ///
    /// # Errors
    ///
    /// Same as [`rebuild`](Self::rebuild).
    pub fn rebuild_from(&self, from: Timestamp) -> Result<()> {
        self.node.rebuild_from(from)
    }

    /// Detaches, forgets every result and hidden state, rebuilds from the
    /// upstream and subscribes again.
    ///
    /// # Errors
    ///
    /// Same as [`rebuild`](Self::rebuild).
    #[instrument(level = "debug", skip(self), fields(label = %self.node.label))]
    pub fn reinitialize(&self) -> Result<()> {
        self.node.unsubscribe();
        self.node.lock()?.reset();
        self.node.rebuild_from(Timestamp::MIN)?;
        self.node.subscribe();
        Ok(())
    }
}

impl<In, I> Display for Hub<In, I>
where
    In: Series,
    I: Indicator<In>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.node.label)
    }
}

impl<In, I> std::fmt::Debug for Hub<In, I>
where
    In: Series,
    I: Indicator<In>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("label", &self.node.label)
            .field("subscription", &self.node.subscription.get())
            .finish_non_exhaustive()
    }
}

impl<In, I> Upstream<I::Output> for Hub<In, I>
where
    In: Series + 'static,
    I: Indicator<In> + 'static,
{
    fn provider(&self) -> Rc<dyn Provider<I::Output>> {
        self.node.clone()
    }
}
