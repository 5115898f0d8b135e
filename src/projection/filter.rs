use {
    crate::{
        buffer::move_vec::MoveVec,
        projection::order_index::{search_key, OrderKey, Slot, SlotCounter, SourceSlots},
        view::{
            port::{observe_source, Activation, Cache},
            CollectionDiff, Item, Listeners, LiveView, SharedView, Subscription, Watcher, COUNT,
        },
    },
    std::{
        collections::HashMap,
        ops::Range,
        sync::{Arc, RwLock, Weak},
    },
};

/// Narrowing function: `Some` keeps the item (possibly converted).
pub type Selector<S, U> = Arc<dyn Fn(&S) -> Option<U> + Send + Sync>;

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

struct Entry<U> {
    slot: Slot,
    value: U,
}

struct FilterState<U> {
    /// every source item, visible or not
    slots: SourceSlots,
    visible: MoveVec<Entry<U>>,
    item_subs: HashMap<Slot, Subscription>,
    _source_sub: Subscription,
}

impl<U> FilterState<U> {
    fn search(&self, key: OrderKey, skip: Option<Range<usize>>) -> Result<usize, usize> {
        search_key(&self.visible, key, skip, |e| {
            self.slots.key(e.slot).unwrap_or_default()
        })
    }

    /// Position of a source slot in the visible list; `Err` if it is hidden.
    fn locate(&self, slot: Slot) -> Option<Result<usize, usize>> {
        let key = self.slots.key(slot)?;
        Some(self.search(key, None))
    }

    fn values(&self, range: Range<usize>) -> Vec<U>
    where
        U: Clone,
    {
        self.visible[range].iter().map(|e| e.value.clone()).collect()
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Filter
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Live subset of a source view.
///
/// With `U = S` this is a plain filter; with a converting selector it
/// narrows the source to the items of one shape (see [`OfType`]).
/// Selectors must not read the view they define.
///
/// Source positions are tracked by slot, so repeated items are kept
/// once per occurrence.
pub struct Filter<S: Item, U: Item = S> {
    weak: Weak<Self>,
    source: RwLock<SharedView<S>>,
    selector: RwLock<Selector<S, U>>,
    watcher: RwLock<Watcher<S>>,
    slot_ids: SlotCounter,
    cache: Cache<FilterState<U>>,
    listeners: Listeners<U>,
}

/// Type-narrowing view: keeps the items for which the selector yields a `U`.
pub type OfType<S, U> = Filter<S, U>;

impl<S: Item, U: Item> Filter<S, U> {
    pub fn with_selector(source: SharedView<S>, selector: Selector<S, U>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            Filter {
                weak: weak.clone(),
                source: RwLock::new(source),
                selector: RwLock::new(selector),
                watcher: RwLock::new(Watcher::none()),
                slot_ids: SlotCounter::default(),
                cache: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    /// Re-evaluates an item whenever `watcher` reports a change of it.
    /// An item that stays visible is announced as replaced by its new value.
    pub fn watch_items(self: Arc<Self>, watcher: Watcher<S>) -> Arc<Self> {
        *self.watcher.write().unwrap() = watcher;
        if let Some(slots) = self.cache.read(|st| st.slots.all()) {
            let subs = self.track_run(&slots, &self.source().snapshot());
            let old = self.cache.write(|st| std::mem::replace(&mut st.item_subs, subs));
            drop(old);
        }
        self
    }

    pub fn set_selector(&self, selector: Selector<S, U>) {
        *self.selector.write().unwrap() = selector;
        tracing::debug!("filter selector replaced");
        self.resync();
    }

    pub fn set_source(&self, source: SharedView<S>) {
        *self.source.write().unwrap() = source;
        if self.cache.rebuild(|| self.build()) {
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
        }
    }

    pub fn is_active(&self) -> bool {
        self.cache.is_active()
    }

    /// Order key regenerations since the last activation or reset.
    pub fn order_regenerations(&self) -> usize {
        self.cache
            .read(|st| st.slots.regenerations())
            .unwrap_or(0)
    }

    fn source(&self) -> SharedView<S> {
        self.source.read().unwrap().clone()
    }

    fn selector(&self) -> Selector<S, U> {
        self.selector.read().unwrap().clone()
    }

    fn select_run(&self, slots: &[Slot], items: &[S]) -> Vec<Entry<U>> {
        let selector = self.selector();
        slots
            .iter()
            .zip(items)
            .filter_map(|(slot, x)| selector(x).map(|value| Entry { slot: *slot, value }))
            .collect()
    }

    fn track_run(&self, slots: &[Slot], items: &[S]) -> HashMap<Slot, Subscription> {
        let watcher = self.watcher.read().unwrap().clone();
        slots
            .iter()
            .zip(items)
            .filter_map(|(slot, x)| self.track(&watcher, *slot, x).map(|sub| (*slot, sub)))
            .collect()
    }

    fn track(&self, watcher: &Watcher<S>, slot: Slot, item: &S) -> Option<Subscription> {
        let weak = self.weak.clone();
        let tracked = item.clone();
        watcher.watch(item, move || {
            if let Some(filter) = weak.upgrade() {
                filter.on_item_changed(slot, &tracked);
            }
        })
    }

    fn derive(&self) -> Vec<U> {
        let selector = self.selector();
        self.source()
            .snapshot()
            .iter()
            .filter_map(|x| selector(x))
            .collect()
    }

    fn build(&self) -> FilterState<U> {
        let source = self.source();
        let source_sub = observe_source(&*source, &self.weak, Self::on_source);

        let items = source.snapshot();
        let slots = self.slot_ids.take(items.len());

        FilterState {
            visible: self.select_run(&slots, &items).into(),
            item_subs: self.track_run(&slots, &items),
            slots: SourceSlots::new(slots),
            _source_sub: source_sub,
        }
    }

    fn emit(&self, diffs: Vec<CollectionDiff<U>>) {
        let resized = diffs.iter().any(|d| d.len_delta() != Some(0));
        for diff in &diffs {
            self.listeners.notify(diff);
        }
        if resized {
            self.listeners.notify_property(COUNT);
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    fn on_source(&self, diff: &CollectionDiff<S>) {
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
            } => self.on_move(*old_index, *new_index, items.len()),
            CollectionDiff::Reset => self.resync(),
        }
    }

    fn on_add(&self, index: usize, items: &[S]) {
        let slots = self.slot_ids.take(items.len());
        let passing = self.select_run(&slots, items);
        let subs = self.track_run(&slots, items);

        let diff = self.cache.write(|st| {
            st.slots.insert(index, &slots);
            st.item_subs.extend(subs);

            let key = st.slots.key(passing.first()?.slot)?;
            let at = st.search(key, None).unwrap_or_else(|at| at);
            let count = passing.len();
            st.visible.insert_range(at, passing).ok()?;

            Some(CollectionDiff::Add {
                index: at,
                items: st.values(at..at + count),
            })
        });
        self.emit(diff.flatten().into_iter().collect());
    }

    fn on_remove(&self, index: usize, count: usize) {
        let removed = self.cache.write(|st| {
            let gone = st.slots.remove(index, count);
            let mut diffs: Vec<CollectionDiff<U>> = Vec::new();
            let mut subs = Vec::new();

            for slot in &gone {
                subs.extend(st.item_subs.remove(slot));
                let entry = match st.locate(*slot) {
                    Some(Ok(at)) => st.visible.remove(at).ok().map(|e| (at, e.value)),
                    _ => None,
                };
                // the visible part of a removed run is contiguous
                if let Some((at, value)) = entry {
                    match diffs.last_mut() {
                        Some(CollectionDiff::Remove { index, items }) if *index == at => {
                            items.push(value)
                        }
                        _ => diffs.push(CollectionDiff::remove(at, value)),
                    }
                }
            }
            st.slots.release(&gone);
            (diffs, subs)
        });

        if let Some((diffs, subs)) = removed {
            drop(subs);
            self.emit(diffs);
        }
    }

    fn on_move(&self, old_index: usize, new_index: usize, count: usize) {
        let diff = self.cache.write(|st| {
            // the visible part of the run, found through the old keys
            let mut first = None;
            let mut visible = 0;
            for slot in st.slots.run(old_index, count) {
                if let Some(Ok(at)) = st.locate(slot) {
                    first.get_or_insert(at);
                    visible += 1;
                }
            }

            st.slots.relocate(old_index, new_index, count);

            let old = first?;
            let key = st.slots.key(st.visible[old].slot)?;
            let new = st.search(key, Some(old..old + visible)).unwrap_or_else(|at| at);
            if new == old {
                return None;
            }
            st.visible.move_range(old, new, visible).ok()?;

            Some(CollectionDiff::Move {
                old_index: old,
                new_index: new,
                items: st.values(new..new + visible),
            })
        });
        self.emit(diff.flatten().into_iter().collect());
    }

    fn on_item_changed(&self, slot: Slot, item: &S) {
        let now = (self.selector())(item);

        let diff = self.cache.write(|st| match (st.locate(slot)?, now) {
            (Ok(at), None) => st
                .visible
                .remove(at)
                .ok()
                .map(|e| CollectionDiff::remove(at, e.value)),
            (Err(at), Some(value)) => {
                st.visible
                    .insert(
                        at,
                        Entry {
                            slot,
                            value: value.clone(),
                        },
                    )
                    .ok()?;
                Some(CollectionDiff::add(at, value))
            }
            (Ok(at), Some(value)) => {
                let entry = st.visible.get_mut(at)?;
                let old = std::mem::replace(&mut entry.value, value.clone());
                Some(CollectionDiff::replace(at, old, value))
            }
            (Err(_), None) => None,
        });
        self.emit(diff.flatten().into_iter().collect());
    }

    /// Rebuilds slots and the visible list from the source and announces a reset.
    fn resync(&self) {
        if !self.cache.is_active() {
            return;
        }

        let items = self.source().snapshot();
        let slots = self.slot_ids.take(items.len());
        let visible: MoveVec<_> = self.select_run(&slots, &items).into();
        let subs = self.track_run(&slots, &items);

        let old_subs = self.cache.write(|st| {
            st.slots = SourceSlots::new(slots);
            st.visible = visible;
            std::mem::replace(&mut st.item_subs, subs)
        });

        if let Some(old_subs) = old_subs {
            drop(old_subs);
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
        }
    }
}

impl<T: Item> Filter<T, T> {
    pub fn new(source: SharedView<T>, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Filter::with_selector(source, predicate_selector(predicate))
    }

    /// Swaps the predicate; an active filter resets, a dormant one
    /// simply uses it on its next read.
    pub fn set_predicate(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) {
        self.set_selector(predicate_selector(predicate));
    }
}

fn predicate_selector<T: Item>(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Selector<T, T> {
    Arc::new(move |x: &T| predicate(x).then(|| x.clone()))
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<S: Item, U: Item> Activation for Filter<S, U> {
    fn listeners_changed(&self) {
        self.cache
            .sync("filter", || self.listeners.is_observed(), || self.build());
    }
}

impl<S: Item, U: Item> LiveView<U> for Filter<S, U> {
    fn len(&self) -> usize {
        self.cache
            .read(|st| st.visible.len())
            .unwrap_or_else(|| self.derive().len())
    }

    fn get(&self, index: usize) -> Option<U> {
        match self.cache.read(|st| st.visible.get(index).map(|e| e.value.clone())) {
            Some(value) => value,
            None => self.derive().into_iter().nth(index),
        }
    }

    fn listeners(&self) -> &Listeners<U> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<U> {
        self.cache
            .read(|st| st.visible.iter().map(|e| e.value.clone()).collect())
            .unwrap_or_else(|| self.derive())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use crate::{
        buffer::{singleton::ItemCell, vec::ObservableVec},
        projection::ProjectionExt,
        view::{testing::Recorder, CollectionDiff, LiveView, Watcher, COUNT},
    };

    fn even(x: &i32) -> bool {
        x % 2 == 0
    }

    #[test]
    fn filter_add_lands_between_visible_neighbours() {
        let source = ObservableVec::with_data(vec![4, 6, 7, 9]);
        let evens = source.filter(even);
        assert_eq!(evens.snapshot(), vec![4, 6]);

        let rec = Recorder::attach(&evens);
        source.push(10).unwrap();

        assert_eq!(rec.take(), vec![CollectionDiff::add(2, 10)]);
        assert_eq!(rec.take_properties(), vec![COUNT]);
        assert_eq!(evens.snapshot(), vec![4, 6, 10]);

        source.insert_range(1, vec![1, 2, 3, 8]).unwrap();
        assert_eq!(
            rec.take(),
            vec![CollectionDiff::Add {
                index: 1,
                items: vec![2, 8]
            }]
        );
        assert_eq!(rec.mirror(), vec![4, 2, 8, 6, 10]);

        source.push(11).unwrap();
        assert!(rec.take().is_empty());
    }

    #[test]
    fn dormant_filter_does_not_subscribe() {
        let source = ObservableVec::with_data(vec![1, 2, 3, 4]);
        let evens = source.filter(even);

        assert_eq!(source.listeners().count(), 0);
        assert_eq!(evens.snapshot(), vec![2, 4]);
        assert_eq!(evens.len(), 2);
        assert_eq!(evens.get(1), Some(4));
        assert!(!evens.is_active());

        let rec = Recorder::attach(&evens);
        assert_eq!(source.listeners().count(), 1);
        assert_eq!(rec.mirror(), vec![2, 4]);

        drop(rec);
        assert_eq!(source.listeners().count(), 0);
        assert!(!evens.is_active());
    }

    #[test]
    fn filter_remove_visible_and_hidden() {
        let source = ObservableVec::with_data(vec![4, 6, 7, 9]);
        let evens = source.filter(even);
        let rec = Recorder::attach(&evens);

        source.remove(&7).unwrap();
        assert!(rec.take().is_empty());
        assert!(rec.take_properties().is_empty());

        source.remove(&6).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::remove(1, 6)]);

        source.remove_range(0, 2).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::remove(0, 4)]);
        assert!(evens.is_empty());
    }

    #[test]
    fn filter_move_single_and_range() {
        let source = ObservableVec::with_data(vec![1, 2, 3, 4, 5, 6]);
        let evens = source.filter(even);
        let rec = Recorder::attach(&evens);

        source.move_item(1, 4).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::moved(0, 1, 2)]);
        assert_eq!(evens.snapshot(), vec![4, 2, 6]);

        source.move_item(0, 1).unwrap();
        assert!(rec.take().is_empty());

        let source = ObservableVec::with_data((1..=8).collect());
        let evens = source.filter(even);
        let rec = Recorder::attach(&evens);

        source.move_range(0, 4, 4).unwrap();
        assert_eq!(
            rec.take(),
            vec![CollectionDiff::Move {
                old_index: 0,
                new_index: 2,
                items: vec![2, 4]
            }]
        );
        assert_eq!(rec.mirror(), vec![6, 8, 2, 4]);
    }

    #[test]
    fn filter_replace_and_reset() {
        let source = ObservableVec::with_data(vec![1, 2, 3]);
        let evens = source.filter(even);
        let rec = Recorder::attach(&evens);

        source.replace(1, 4).unwrap();
        assert_eq!(
            rec.take(),
            vec![CollectionDiff::remove(0, 2), CollectionDiff::add(0, 4)]
        );

        source.reset_with(vec![2, 3, 6, 8]).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::Reset]);
        assert_eq!(rec.mirror(), vec![2, 6, 8]);
    }

    #[test]
    fn predicate_swap_resets_only_while_active() {
        let source = ObservableVec::with_data(vec![1, 2, 3, 4]);
        let evens = source.filter(even);

        evens.set_predicate(|x| *x > 2);
        assert_eq!(evens.snapshot(), vec![3, 4]);

        let rec = Recorder::attach(&evens);
        evens.set_predicate(|x| *x < 2);
        assert_eq!(rec.take(), vec![CollectionDiff::Reset]);
        assert_eq!(rec.mirror(), vec![1]);
    }

    #[test]
    fn source_swap_resets() {
        let first = ObservableVec::with_data(vec![1, 2]);
        let second = ObservableVec::with_data(vec![6, 7, 8]);
        let evens = first.filter(even);
        let rec = Recorder::attach(&evens);

        evens.set_source(second.shared());
        assert_eq!(rec.take(), vec![CollectionDiff::Reset]);
        assert_eq!(rec.mirror(), vec![6, 8]);
        assert_eq!(first.listeners().count(), 0);
        assert_eq!(second.listeners().count(), 1);
    }

    #[test]
    fn item_changes_flip_relevance() {
        let cells: Vec<ItemCell<i32>> = [5, 20, 30].into_iter().map(ItemCell::new).collect();
        let source = ObservableVec::with_data(cells.clone());
        let big = source
            .filter(|c: &ItemCell<i32>| c.get() > 10)
            .watch_items(Watcher::notifying());
        let rec = Recorder::attach(&big);

        cells[0].set(15);
        cells[1].set(0);
        cells[2].set(31);

        let events: Vec<CollectionDiff<i32>> =
            rec.take().iter().map(|d| d.map(|c| c.get())).collect();
        assert_eq!(
            events,
            vec![
                CollectionDiff::add(0, 15),
                CollectionDiff::remove(1, 0),
                CollectionDiff::replace(1, 31, 31)
            ]
        );
        assert_eq!(
            big.snapshot().iter().map(|c| c.get()).collect::<Vec<_>>(),
            vec![15, 31]
        );

        source.remove_at(0).unwrap();
        rec.take();
        cells[0].set(99);
        assert!(rec.take().is_empty());
    }

    #[test]
    fn repeated_values_are_kept_per_occurrence() {
        let source = ObservableVec::with_data(vec![2, 4, 2]);
        let evens = source.filter(even);
        let rec = Recorder::attach(&evens);

        source.remove_at(0).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::remove(0, 2)]);
        assert_eq!(evens.snapshot(), vec![4, 2]);

        source.remove_at(1).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::remove(1, 2)]);
        assert_eq!(evens.snapshot(), vec![4]);

        source.extend(vec![4, 3, 4]).unwrap();
        source.move_item(3, 0).unwrap();
        assert_eq!(source.snapshot(), vec![4, 4, 4, 3]);
        assert_eq!(evens.snapshot(), vec![4, 4, 4]);
        assert_eq!(rec.mirror(), evens.snapshot());

        source.remove_range(0, 2).unwrap();
        assert_eq!(
            rec.take().last(),
            Some(&CollectionDiff::Remove {
                index: 0,
                items: vec![4, 4]
            })
        );
        assert_eq!(rec.mirror(), vec![4]);
    }

    #[test]
    fn narrowed_values_follow_item_changes() {
        let cells: Vec<ItemCell<i32>> = [1, 2].into_iter().map(ItemCell::new).collect();
        let source = ObservableVec::with_data(cells.clone());
        let tens = source
            .narrow(|c: &ItemCell<i32>| (c.get() > 0).then(|| c.get() * 10))
            .watch_items(Watcher::notifying());
        let rec = Recorder::attach(&tens);

        cells[0].set(5);
        assert_eq!(rec.take(), vec![CollectionDiff::replace(0, 10, 50)]);
        assert!(rec.take_properties().is_empty());
        assert_eq!(tens.snapshot(), vec![50, 20]);
        assert_eq!(rec.mirror(), vec![50, 20]);

        cells[1].set(-1);
        assert_eq!(rec.take(), vec![CollectionDiff::remove(1, 20)]);
        assert_eq!(rec.mirror(), vec![50]);
    }

    #[test]
    fn appends_rarely_regenerate_keys() {
        let source = ObservableVec::new();
        let evens = source.filter(even);
        let _rec = Recorder::attach(&evens);

        for i in 0..1000 {
            source.push(i).unwrap();
        }
        for i in 0..1000 {
            source.insert(0, -(i + 1)).unwrap();
        }

        assert_eq!(evens.order_regenerations(), 0);
        assert_eq!(evens.len(), 1000);
    }
}
