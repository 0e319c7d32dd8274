use crate::{Series, Timestamp};

/// Timestamp-ordered record storage owned by one node.
///
/// Records are kept strictly ascending by timestamp. Head pruning only
/// advances an offset; the evicted prefix is compacted away once it grows
/// as large as the live part, so pruning after every append stays
/// amortized O(1).
#[derive(Clone, Debug)]
pub(crate) struct Cache<T> {
    items: Vec<T>,
    start: usize,
}

impl<T: Series> Cache<T> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            start: 0,
        }
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.items[self.start..]
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len() - self.start
    }

    #[inline]
    pub(crate) fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    #[inline]
    pub(crate) fn last_timestamp(&self) -> Option<Timestamp> {
        self.last().map(Series::timestamp)
    }

    /// Exact position of `timestamp`.
    pub(crate) fn index_of(&self, timestamp: Timestamp) -> Option<usize> {
        self.as_slice()
            .binary_search_by_key(&timestamp, Series::timestamp)
            .ok()
    }

    /// Position of the first record at or after `timestamp`, `len()` when
    /// every record is older.
    pub(crate) fn index_gte(&self, timestamp: Timestamp) -> usize {
        index_gte(self.as_slice(), timestamp)
    }

    #[inline]
    pub(crate) fn push(&mut self, item: T) {
        debug_assert!(
            self.last_timestamp()
                .is_none_or(|last| last < item.timestamp()),
            "push must extend the tail"
        );
        self.items.push(item);
    }

    pub(crate) fn insert_at(&mut self, index: usize, item: T) {
        debug_assert!(self.fits_at(index, &item), "insert breaks ordering");
        self.items.insert(self.start + index, item);
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> T {
        self.items.remove(self.start + index)
    }

    /// Swaps the record at `index` for one with the same timestamp.
    pub(crate) fn replace_at(&mut self, index: usize, item: T) -> T {
        let slot = &mut self.items[self.start + index];
        debug_assert_eq!(slot.timestamp(), item.timestamp());
        std::mem::replace(slot, item)
    }

    /// Drops every record from `index` to the tail.
    pub(crate) fn truncate_from(&mut self, index: usize) -> usize {
        let removed = self.len().saturating_sub(index);
        self.items.truncate(self.start + index.min(self.len()));
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.start = 0;
    }

    /// Evicts head records until at most `max` remain. Returns how many
    /// were evicted.
    pub(crate) fn prune_to(&mut self, max: usize) -> usize {
        let excess = self.len().saturating_sub(max);
        if excess == 0 {
            return 0;
        }

        self.start += excess;
        if self.start >= self.len() {
            self.items.drain(..self.start);
            self.start = 0;
        }

        excess
    }

    fn fits_at(&self, index: usize, item: &T) -> bool {
        let items = self.as_slice();
        let ts = item.timestamp();
        let after_prev = index == 0 || items[index - 1].timestamp() < ts;
        let before_next = items.get(index).is_none_or(|next| ts < next.timestamp());
        after_prev && before_next
    }
}

/// First position in an ascending slice whose timestamp is at or after
/// `timestamp`.
#[inline]
pub(crate) fn index_gte<T: Series>(items: &[T], timestamp: Timestamp) -> usize {
    items.partition_point(|item| item.timestamp() < timestamp)
}
