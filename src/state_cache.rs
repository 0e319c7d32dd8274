use std::collections::VecDeque;

/// Per-bar snapshots of an indicator's hidden state.
///
/// Entry `i` is the state right after computing result `i` of the owning
/// hub. The snapshot of the last evicted bar is kept as `anchor`, so the
/// state preceding the first retained bar survives head pruning.
#[derive(Clone, Debug)]
pub(crate) struct StateCache<S> {
    history: VecDeque<S>,
    anchor: Option<S>,
}

impl<S: Clone + Default> StateCache<S> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            history: VecDeque::new(),
            anchor: None,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub(crate) fn push(&mut self, state: S) {
        self.history.push_back(state);
    }

    #[inline]
    pub(crate) fn replace_last(&mut self, state: S) {
        match self.history.back_mut() {
            Some(last) => *last = state,
            None => self.history.push_back(state),
        }
    }

    /// State to resume from when recomputing bar `index`.
    pub(crate) fn snapshot_before(&self, index: usize) -> S {
        match index.checked_sub(1) {
            Some(prev) => self.history.get(prev).cloned().unwrap_or_default(),
            None => self.anchor.clone().unwrap_or_default(),
        }
    }

    /// Drops snapshots from `index` onwards.
    pub(crate) fn truncate(&mut self, index: usize) {
        self.history.truncate(index);
    }

    /// Drops the `count` oldest snapshots, keeping the newest evicted one
    /// as the anchor.
    pub(crate) fn evict(&mut self, count: usize) {
        for _ in 0..count {
            match self.history.pop_front() {
                Some(state) => self.anchor = Some(state),
                None => break,
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.history.clear();
        self.anchor = None;
    }
}
