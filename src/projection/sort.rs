use {
    crate::{
        buffer::move_vec::MoveVec,
        compare::{with_fallback, Comparer, MultiComparer, PropertyComparer},
        projection::order_index::{binary_search, search_key, OrderIndex, Slot, SlotCounter},
        view::{
            port::{observe_source, Activation, Cache},
            CollectionDiff, Identity, Item, Listeners, LiveView, SharedView, Subscription,
            Watcher, COUNT,
        },
    },
    std::{
        cmp::Ordering,
        collections::HashMap,
        ops::Range,
        sync::{Arc, RwLock, Weak},
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

struct Entry<T> {
    slot: Slot,
    item: T,
}

struct SortState<T> {
    /// slot of every source position, in source order
    sources: MoveVec<Slot>,
    /// sorted entries, keyed in sorted order
    items: MoveVec<Entry<T>>,
    order: OrderIndex<Slot>,
    item_subs: HashMap<Slot, Subscription>,
    _source_sub: Subscription,
}

impl<T: Clone> SortState<T> {
    fn locate(&self, slot: Slot) -> Option<usize> {
        let key = self.order.get(&slot)?;
        search_key(&self.items, key, None, |e| {
            self.order.get(&e.slot).unwrap_or_default()
        })
        .ok()
    }

    fn slots(&self) -> Vec<Slot> {
        self.items.iter().map(|e| e.slot).collect()
    }

    fn values(&self) -> Vec<T> {
        self.items.iter().map(|e| e.item.clone()).collect()
    }

    /// Keys the entries `at .. at + count` between their sorted neighbours.
    fn place(&mut self, at: usize, count: usize) {
        let run: Vec<Slot> = self.items[at..at + count].iter().map(|e| e.slot).collect();
        let before = at.checked_sub(1).map(|i| self.items[i].slot);
        let after = self.items.get(at + count).map(|e| e.slot);
        let items = &self.items;
        self.order.place(&run, before.as_ref(), after.as_ref(), || {
            items.iter().map(|e| e.slot).collect()
        });
    }
}

impl<T: Clone + Identity> SortState<T> {
    /// The run of entries around `at` that hold the same item.
    fn occurrences(&self, at: usize) -> Range<usize> {
        let id = self.items[at].item.identity();
        let same = |i: &usize| self.items[*i].item.identity() == id;
        let lo = (0..at).rev().take_while(same).last().unwrap_or(at);
        let hi = (at + 1..self.items.len()).take_while(same).last().map_or(at + 1, |i| i + 1);
        lo..hi
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                   Sort
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Live sorted copy of a source view.
///
/// Ties under the comparer are broken by identity, so every distinct item
/// has exactly one place; repeated items sit next to each other. The
/// source order is irrelevant: source moves are ignored.
pub struct Sort<T: Item + Identity> {
    weak: Weak<Self>,
    source: RwLock<SharedView<T>>,
    comparer: RwLock<Comparer<T>>,
    ranking: RwLock<Comparer<T>>,
    watcher: RwLock<Watcher<T>>,
    slot_ids: SlotCounter,
    cache: Cache<SortState<T>>,
    listeners: Listeners<T>,
}

impl<T: Item + Identity> Sort<T> {
    pub fn new(source: SharedView<T>, comparer: Comparer<T>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            Sort {
                weak: weak.clone(),
                source: RwLock::new(source),
                ranking: RwLock::new(with_fallback(comparer.clone())),
                comparer: RwLock::new(comparer),
                watcher: RwLock::new(Watcher::none()),
                slot_ids: SlotCounter::default(),
                cache: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    /// Re-ranks an item whenever `watcher` reports a change of it.
    pub fn watch_items(self: Arc<Self>, watcher: Watcher<T>) -> Arc<Self> {
        *self.watcher.write().unwrap() = watcher;
        if let Some(slots) = self.cache.read(|st| st.sources.to_vec()) {
            let subs = self.track_run(&slots, &self.source().snapshot());
            let old = self.cache.write(|st| std::mem::replace(&mut st.item_subs, subs));
            drop(old);
        }
        self
    }

    pub fn comparer(&self) -> Comparer<T> {
        self.comparer.read().unwrap().clone()
    }

    /// Swaps the ordering; an active view re-sorts and resets.
    pub fn set_comparer(&self, comparer: Comparer<T>) {
        let ranking = with_fallback(comparer.clone());
        *self.comparer.write().unwrap() = comparer;
        *self.ranking.write().unwrap() = ranking.clone();
        tracing::debug!("sort comparer replaced");

        let resorted = self.cache.write(|st| {
            let mut items = std::mem::take(&mut st.items).into_vec();
            items.sort_by(|a, b| ranking.compare(&a.item, &b.item));
            st.items = items.into();
            let slots = st.slots();
            st.order.respace(slots);
        });
        if resorted.is_some() {
            self.listeners.notify(&CollectionDiff::Reset);
        }
    }

    /// Appends a secondary ordering criterion.
    pub fn then_by<K: Ord + 'static>(&self, key: impl Fn(&T) -> K + Send + Sync + 'static) {
        self.chain(Arc::new(PropertyComparer::new(key)));
    }

    pub fn then_by_descending<K: Ord + 'static>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) {
        self.chain(Arc::new(PropertyComparer::descending(key)));
    }

    fn chain(&self, next: Comparer<T>) {
        let chained = MultiComparer::new([self.comparer(), next]);
        self.set_comparer(Arc::new(chained));
    }

    pub fn set_source(&self, source: SharedView<T>) {
        *self.source.write().unwrap() = source;
        if self.cache.rebuild(|| self.build()) {
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
        }
    }

    pub fn is_active(&self) -> bool {
        self.cache.is_active()
    }

    /// Order key regenerations since the last activation.
    pub fn order_regenerations(&self) -> usize {
        self.cache
            .read(|st| st.order.regenerations())
            .unwrap_or(0)
    }

    fn source(&self) -> SharedView<T> {
        self.source.read().unwrap().clone()
    }

    fn ranking(&self) -> Comparer<T> {
        self.ranking.read().unwrap().clone()
    }

    fn sorted(&self, mut items: Vec<T>) -> Vec<T> {
        let ranking = self.ranking();
        items.sort_by(|a, b| ranking.compare(a, b));
        items
    }

    fn track_run(&self, slots: &[Slot], items: &[T]) -> HashMap<Slot, Subscription> {
        let watcher = self.watcher.read().unwrap().clone();
        slots
            .iter()
            .zip(items)
            .filter_map(|(slot, x)| self.track(&watcher, *slot, x).map(|sub| (*slot, sub)))
            .collect()
    }

    fn track(&self, watcher: &Watcher<T>, slot: Slot, item: &T) -> Option<Subscription> {
        let weak = self.weak.clone();
        watcher.watch(item, move || {
            if let Some(sort) = weak.upgrade() {
                sort.on_item_changed(slot);
            }
        })
    }

    /// Sorted entries and source slots for a fresh copy of `items`.
    fn entries(&self, items: Vec<T>) -> (MoveVec<Slot>, Vec<Entry<T>>) {
        let ranking = self.ranking();
        let slots = self.slot_ids.take(items.len());
        let mut entries: Vec<Entry<T>> = slots
            .iter()
            .zip(items)
            .map(|(slot, item)| Entry { slot: *slot, item })
            .collect();
        entries.sort_by(|a, b| ranking.compare(&a.item, &b.item));
        (slots.into(), entries)
    }

    fn build(&self) -> SortState<T> {
        let source = self.source();
        let source_sub = observe_source(&*source, &self.weak, Self::on_source);

        let items = source.snapshot();
        let (sources, entries) = self.entries(items.clone());
        let item_subs = self.track_run(&sources, &items);
        let mut order = OrderIndex::new();
        order.respace(entries.iter().map(|e| e.slot));

        SortState {
            sources,
            items: entries.into(),
            order,
            item_subs,
            _source_sub: source_sub,
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    fn on_source(&self, diff: &CollectionDiff<T>) {
        match diff {
            CollectionDiff::Add { index, items } => self.on_add(*index, items),
            CollectionDiff::Remove { index, items } => self.on_remove(*index, items.len()),
            CollectionDiff::Replace {
                index,
                old_items,
                new_items,
            } => {
                self.on_remove(*index, old_items.len());
                self.on_add(*index, new_items);
            }
            CollectionDiff::Move {
                old_index,
                new_index,
                items,
            } => {
                let count = items.len();
                let moved = self
                    .cache
                    .write(|st| st.sources.move_range(*old_index, *new_index, count));
                if let Some(Err(err)) = moved {
                    tracing::warn!(%err, "sort: source move out of step");
                }
            }
            CollectionDiff::Reset => self.resync(),
        }
    }

    fn on_add(&self, index: usize, items: &[T]) {
        let ranking = self.ranking();
        let slots = self.slot_ids.take(items.len());
        let subs = self.track_run(&slots, items);

        let opened = self.cache.write(|st| {
            st.item_subs.extend(subs);
            st.sources.insert_range(index, slots.iter().copied())
        });
        if !matches!(opened, Some(Ok(()))) {
            return;
        }

        for (slot, item) in slots.into_iter().zip(items) {
            let diff = self.cache.write(|st| {
                let at = binary_search(st.items.len(), None, |i| {
                    ranking.compare(&st.items[i].item, item)
                })
                .unwrap_or_else(|at| at);
                let entry = Entry {
                    slot,
                    item: item.clone(),
                };
                st.items.insert(at, entry).ok()?;
                st.place(at, 1);

                Some(CollectionDiff::add(at, item.clone()))
            });

            if let Some(diff) = diff.flatten() {
                self.listeners.notify(&diff);
                self.listeners.notify_property(COUNT);
            }
        }
    }

    fn on_remove(&self, index: usize, count: usize) {
        let gone = self
            .cache
            .write(|st| st.sources.remove_range(index, count).unwrap_or_default())
            .unwrap_or_default();

        for slot in gone {
            let removed = self.cache.write(|st| {
                let sub = st.item_subs.remove(&slot);
                let diff = match st.locate(slot) {
                    Some(at) => st
                        .items
                        .remove(at)
                        .ok()
                        .map(|e| CollectionDiff::remove(at, e.item)),
                    None => {
                        tracing::warn!(slot, "sort: removed item was not tracked");
                        None
                    }
                };
                st.order.remove(&slot);
                (diff, sub)
            });

            if let Some((Some(diff), sub)) = removed {
                drop(sub);
                self.listeners.notify(&diff);
                self.listeners.notify_property(COUNT);
            }
        }
    }

    /// Relocates every occurrence of the changed item as one run.
    fn on_item_changed(&self, slot: Slot) {
        let ranking = self.ranking();

        let diff = self.cache.write(|st| {
            let run = st.occurrences(st.locate(slot)?);
            let (old, count) = (run.start, run.len());
            let item = st.items[old].item.clone();

            let after_prev = old.checked_sub(1).map_or(true, |i| {
                ranking.compare(&st.items[i].item, &item) == Ordering::Less
            });
            let before_next = st.items.get(run.end).map_or(true, |next| {
                ranking.compare(&item, &next.item) == Ordering::Less
            });
            if after_prev && before_next {
                return None;
            }

            let new = binary_search(st.items.len(), Some(run), |i| {
                ranking.compare(&st.items[i].item, &item)
            })
            .unwrap_or_else(|at| at);
            if new == old {
                return None;
            }
            st.items.move_range(old, new, count).ok()?;
            for entry in &st.items[new..new + count] {
                st.order.remove(&entry.slot);
            }
            st.place(new, count);

            Some(CollectionDiff::Move {
                old_index: old,
                new_index: new,
                items: vec![item; count],
            })
        });

        if let Some(diff) = diff.flatten() {
            self.listeners.notify(&diff);
        }
    }

    fn resync(&self) {
        if !self.cache.is_active() {
            return;
        }

        let items = self.source().snapshot();
        let (sources, entries) = self.entries(items.clone());
        let subs = self.track_run(&sources, &items);

        let old_subs = self.cache.write(|st| {
            st.order.respace(entries.iter().map(|e| e.slot));
            st.sources = sources;
            st.items = entries.into();
            std::mem::replace(&mut st.item_subs, subs)
        });

        if let Some(old_subs) = old_subs {
            drop(old_subs);
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
        }
    }
}

impl<T: Item + Identity> Activation for Sort<T> {
    fn listeners_changed(&self) {
        self.cache
            .sync("sort", || self.listeners.is_observed(), || self.build());
    }
}

impl<T: Item + Identity> LiveView<T> for Sort<T> {
    fn len(&self) -> usize {
        self.cache
            .read(|st| st.items.len())
            .unwrap_or_else(|| self.source().len())
    }

    fn get(&self, index: usize) -> Option<T> {
        match self.cache.read(|st| st.items.get(index).map(|e| e.item.clone())) {
            Some(item) => item,
            None => self.sorted(self.source().snapshot()).into_iter().nth(index),
        }
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<T> {
        self.cache
            .read(|st| st.values())
            .unwrap_or_else(|| self.sorted(self.source().snapshot()))
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
