use {
    crate::{
        buffer::move_vec::MoveVec,
        projection::order_index::{search_key, OrderKey, Slot, SlotCounter, SourceSlots},
        view::{
            port::{observe_source, Activation, Cache},
            CollectionDiff, Identity, Item, Listeners, LiveView, Notification, SharedView,
            Subscription, Watcher, COUNT,
        },
    },
    std::{
        collections::HashMap,
        hash::Hash,
        ops::Range,
        sync::{Arc, RwLock, Weak},
    },
};

/// Bound for grouping keys.
pub trait GroupKey: Hash + Eq + Clone + Send + Sync + 'static {}
impl<K: Hash + Eq + Clone + Send + Sync + 'static> GroupKey for K {}

pub type KeySelector<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                   Group
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// The items of a grouped source that share one key, in source order.
pub struct Group<K, T: Item> {
    key: K,
    items: RwLock<MoveVec<T>>,
    listeners: Listeners<T>,
}

impl<K: GroupKey, T: Item> Group<K, T> {
    fn new(key: K, items: Vec<T>) -> Arc<Self> {
        Arc::new(Group {
            key,
            items: RwLock::new(items.into()),
            listeners: Listeners::new(),
        })
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: GroupKey, T: Item> LiveView<T> for Group<K, T> {
    fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.items.read().unwrap().get(index).cloned()
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<T> {
        self.items.read().unwrap().to_vec()
    }
}

impl<K: std::fmt::Debug, T: Item> std::fmt::Debug for Group<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("key", &self.key)
            .field("len", &self.items.read().unwrap().len())
            .finish()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

enum Fanout<K, T: Item> {
    Outer(Notification<Arc<Group<K, T>>>),
    Inner(Arc<Group<K, T>>, Notification<T>),
}

struct GroupState<K, T: Item + Identity> {
    groups: Vec<Arc<Group<K, T>>>,
    by_key: HashMap<K, Arc<Group<K, T>>>,
    /// slot of every source position, shown or not
    slots: SourceSlots,
    ids: HashMap<Slot, T::Id>,
    occurrences: HashMap<T::Id, Vec<Slot>>,
    /// the occurrence that stands for an item in its group
    shown: HashMap<T::Id, Slot>,
    keys: HashMap<T::Id, K>,
    item_subs: HashMap<T::Id, Subscription>,
    _source_sub: Subscription,
}

fn search_group<T: Identity>(
    slots: &SourceSlots,
    shown: &HashMap<T::Id, Slot>,
    items: &[T],
    key: OrderKey,
    skip: Option<Range<usize>>,
) -> Result<usize, usize> {
    search_key(items, key, skip, |x| {
        shown
            .get(&x.identity())
            .and_then(|slot| slots.key(*slot))
            .unwrap_or_default()
    })
}

impl<K: GroupKey, T: Item + Identity> GroupState<K, T> {
    fn shown_key(&self, id: &T::Id) -> Option<OrderKey> {
        self.shown.get(id).and_then(|slot| self.slots.key(*slot))
    }

    fn group_of(&self, id: &T::Id) -> Option<Arc<Group<K, T>>> {
        self.keys.get(id).and_then(|k| self.by_key.get(k)).cloned()
    }

    /// Adds items of one key, already shown and ordered; creates the group if needed.
    fn insert_run(&mut self, key: K, run: Vec<T>) -> Vec<Fanout<K, T>> {
        let group = match self.by_key.get(&key) {
            Some(group) => group.clone(),
            None => {
                let group = Group::new(key.clone(), run);
                self.groups.push(group.clone());
                self.by_key.insert(key, group.clone());
                return vec![
                    Fanout::Outer(Notification::Collection(CollectionDiff::add(
                        self.groups.len() - 1,
                        group,
                    ))),
                    Fanout::Outer(Notification::Property(COUNT)),
                ];
            }
        };

        let first = match run.first().and_then(|x| self.shown_key(&x.identity())) {
            Some(first) => first,
            None => return Vec::new(),
        };
        let mut items = group.items.write().unwrap();
        let at = search_group(&self.slots, &self.shown, &items, first, None)
            .unwrap_or_else(|at| at);
        if items.insert_range(at, run.iter().cloned()).is_err() {
            return Vec::new();
        }
        drop(items);

        vec![
            Fanout::Inner(
                group.clone(),
                Notification::Collection(CollectionDiff::Add {
                    index: at,
                    items: run,
                }),
            ),
            Fanout::Inner(group, Notification::Property(COUNT)),
        ]
    }

    /// Takes one item out of its group, dropping the group once empty.
    /// The item's key and shown slot stay untouched.
    fn extract(&mut self, id: &T::Id) -> Vec<Fanout<K, T>> {
        let key = match self.keys.get(id) {
            Some(key) => key.clone(),
            None => {
                tracing::warn!("group: removed item was not tracked");
                return Vec::new();
            }
        };
        let (group, order_key) = match (self.by_key.get(&key), self.shown_key(id)) {
            (Some(group), Some(order_key)) => (group.clone(), order_key),
            _ => return Vec::new(),
        };

        let mut items = group.items.write().unwrap();
        let removed = search_group(&self.slots, &self.shown, &items, order_key, None)
            .ok()
            .and_then(|at| items.remove(at).ok().map(|x| (at, x)));
        let now_empty = items.is_empty();
        drop(items);

        let mut out = Vec::new();
        if let Some((at, item)) = removed {
            out.push(Fanout::Inner(
                group.clone(),
                Notification::Collection(CollectionDiff::remove(at, item)),
            ));
            out.push(Fanout::Inner(group.clone(), Notification::Property(COUNT)));
        }

        if now_empty {
            self.by_key.remove(&key);
            if let Some(at) = self.groups.iter().position(|g| Arc::ptr_eq(g, &group)) {
                self.groups.remove(at);
                out.push(Fanout::Outer(Notification::Collection(CollectionDiff::remove(
                    at, group,
                ))));
                out.push(Fanout::Outer(Notification::Property(COUNT)));
            }
        }
        out
    }

    /// Lets the first remaining occurrence of `id` stand for it,
    /// moving the item inside its group when its position changes.
    fn promote(&mut self, id: &T::Id) -> Vec<Fanout<K, T>> {
        let first = self
            .occurrences
            .get(id)
            .and_then(|slots| slots.iter().copied().min_by_key(|s| self.slots.key(*s)));
        let (first, old_key) = match (first, self.shown.get(id)) {
            (Some(first), Some(shown)) if first != *shown => match self.slots.key(*shown) {
                Some(old_key) => (first, old_key),
                None => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        let group = match self.group_of(id) {
            Some(group) => group,
            None => return Vec::new(),
        };

        let mut items = group.items.write().unwrap();
        let old = search_group(&self.slots, &self.shown, &items, old_key, None).ok();
        self.shown.insert(id.clone(), first);

        let (old, new_key) = match (old, self.slots.key(first)) {
            (Some(old), Some(new_key)) => (old, new_key),
            _ => return Vec::new(),
        };
        let new = search_group(&self.slots, &self.shown, &items, new_key, Some(old..old + 1))
            .unwrap_or_else(|at| at);
        if new == old || items.move_item(old, new).is_err() {
            return Vec::new();
        }
        let item = items[new].clone();
        drop(items);

        vec![Fanout::Inner(
            group,
            Notification::Collection(CollectionDiff::moved(old, new, item)),
        )]
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Group By
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Live partition of a source view into groups of equal key.
///
/// Groups appear in the order their keys were first seen and keep the
/// source order internally. An item is grouped once, at its first
/// occurrence; later occurrences only take its place when that one leaves.
pub struct GroupBy<K: GroupKey, T: Item + Identity> {
    weak: Weak<Self>,
    source: RwLock<SharedView<T>>,
    key_of: RwLock<KeySelector<T, K>>,
    watcher: RwLock<Watcher<T>>,
    slot_ids: SlotCounter,
    cache: Cache<GroupState<K, T>>,
    listeners: Listeners<Arc<Group<K, T>>>,
}

impl<K: GroupKey, T: Item + Identity> GroupBy<K, T> {
    pub fn new(source: SharedView<T>, key_of: KeySelector<T, K>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            GroupBy {
                weak: weak.clone(),
                source: RwLock::new(source),
                key_of: RwLock::new(key_of),
                watcher: RwLock::new(Watcher::none()),
                slot_ids: SlotCounter::default(),
                cache: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    /// Re-keys an item whenever `watcher` reports a change of it.
    pub fn watch_items(self: Arc<Self>, watcher: Watcher<T>) -> Arc<Self> {
        *self.watcher.write().unwrap() = watcher;
        let items = self.source().snapshot();
        let subs = self.track_all(&items);
        let old = self.cache.write(|st| std::mem::replace(&mut st.item_subs, subs));
        drop(old);
        self
    }

    /// The live group for `key`, if any item currently has that key.
    pub fn group(&self, key: &K) -> Option<Arc<Group<K, T>>> {
        match self.cache.read(|st| st.by_key.get(key).cloned()) {
            Some(group) => group,
            None => self.derive().into_iter().find(|g| g.key() == key),
        }
    }

    pub fn set_key_selector(&self, key_of: KeySelector<T, K>) {
        *self.key_of.write().unwrap() = key_of;
        tracing::debug!("group key selector replaced");
        self.resync();
    }

    pub fn set_source(&self, source: SharedView<T>) {
        *self.source.write().unwrap() = source;
        let retired = self.cache.read(|st| st.groups.clone());
        if self.cache.rebuild(|| self.build()) {
            self.retire(retired.unwrap_or_default());
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
        }
    }

    pub fn is_active(&self) -> bool {
        self.cache.is_active()
    }

    fn source(&self) -> SharedView<T> {
        self.source.read().unwrap().clone()
    }

    fn key_of(&self) -> KeySelector<T, K> {
        self.key_of.read().unwrap().clone()
    }

    fn track_all(&self, items: &[T]) -> HashMap<T::Id, Subscription> {
        let watcher = self.watcher.read().unwrap().clone();
        items
            .iter()
            .filter_map(|x| self.track(&watcher, x).map(|sub| (x.identity(), sub)))
            .collect()
    }

    fn track(&self, watcher: &Watcher<T>, item: &T) -> Option<Subscription> {
        let weak = self.weak.clone();
        let tracked = item.clone();
        watcher.watch(item, move || {
            if let Some(group_by) = weak.upgrade() {
                group_by.on_item_changed(&tracked);
            }
        })
    }

    /// Groups in first-seen key order, each identity at its first occurrence.
    fn partition(&self, items: &[T]) -> (Vec<(K, Vec<T>)>, HashMap<T::Id, K>) {
        let key_of = self.key_of();
        let mut runs: Vec<(K, Vec<T>)> = Vec::new();
        let mut slot: HashMap<K, usize> = HashMap::new();
        let mut keys = HashMap::new();

        for item in items {
            let id = item.identity();
            if keys.contains_key(&id) {
                tracing::warn!("group: repeated item, grouped at its first occurrence");
                continue;
            }
            let key = key_of(item);
            keys.insert(id, key.clone());
            match slot.get(&key) {
                Some(i) => runs[*i].1.push(item.clone()),
                None => {
                    slot.insert(key.clone(), runs.len());
                    runs.push((key, vec![item.clone()]));
                }
            }
        }
        (runs, keys)
    }

    fn derive(&self) -> Vec<Arc<Group<K, T>>> {
        let (runs, _) = self.partition(&self.source().snapshot());
        runs.into_iter().map(|(k, items)| Group::new(k, items)).collect()
    }

    fn state_from(&self, items: &[T], source_sub: Subscription) -> GroupState<K, T> {
        let (runs, keys) = self.partition(items);
        let slots = self.slot_ids.take(items.len());

        let mut ids = HashMap::new();
        let mut occurrences: HashMap<T::Id, Vec<Slot>> = HashMap::new();
        let mut shown = HashMap::new();
        for (slot, item) in slots.iter().zip(items) {
            let id = item.identity();
            ids.insert(*slot, id.clone());
            occurrences.entry(id.clone()).or_default().push(*slot);
            shown.entry(id).or_insert(*slot);
        }

        let groups: Vec<Arc<Group<K, T>>> =
            runs.into_iter().map(|(k, items)| Group::new(k, items)).collect();
        let by_key = groups.iter().map(|g| (g.key.clone(), g.clone())).collect();

        GroupState {
            groups,
            by_key,
            slots: SourceSlots::new(slots),
            ids,
            occurrences,
            shown,
            keys,
            item_subs: self.track_all(items),
            _source_sub: source_sub,
        }
    }

    fn build(&self) -> GroupState<K, T> {
        let source = self.source();
        let source_sub = observe_source(&*source, &self.weak, Self::on_source);
        self.state_from(&source.snapshot(), source_sub)
    }

    fn emit(&self, out: Vec<Fanout<K, T>>) {
        for fanout in out {
            match fanout {
                Fanout::Outer(n) => self.listeners.dispatch(&n),
                Fanout::Inner(group, n) => group.listeners.dispatch(&n),
            }
        }
    }

    /// Empties groups that are no longer part of this view.
    fn retire(&self, groups: Vec<Arc<Group<K, T>>>) {
        for group in groups {
            group.items.write().unwrap().clear();
            group.listeners.notify(&CollectionDiff::Reset);
            group.listeners.notify_property(COUNT);
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
            } => self.on_move(*old_index, *new_index, items.len()),
            CollectionDiff::Reset => self.resync(),
        }
    }

    fn on_add(&self, index: usize, items: &[T]) {
        let key_of = self.key_of();
        let keys: Vec<K> = items.iter().map(|x| key_of(x)).collect();
        let slots = self.slot_ids.take(items.len());
        let subs = self.track_all(items);

        let out = self.cache.write(|st| {
            st.slots.insert(index, &slots);

            // items new to the view, per key, in source order
            let mut runs: Vec<(K, Vec<T>)> = Vec::new();
            let mut repeated = Vec::new();
            for ((slot, item), key) in slots.iter().zip(items).zip(keys) {
                let id = item.identity();
                st.ids.insert(*slot, id.clone());
                let occurrences = st.occurrences.entry(id.clone()).or_default();
                occurrences.push(*slot);
                if occurrences.len() > 1 {
                    tracing::warn!("group: repeated item, grouped at its first occurrence");
                    repeated.push(id);
                    continue;
                }

                st.shown.insert(id.clone(), *slot);
                st.keys.insert(id, key.clone());
                match runs.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, run)) => run.push(item.clone()),
                    None => runs.push((key, vec![item.clone()])),
                }
            }

            let mut unused = Vec::new();
            for (id, sub) in subs {
                if st.item_subs.contains_key(&id) {
                    unused.push(sub);
                } else {
                    st.item_subs.insert(id, sub);
                }
            }

            let mut out = Vec::new();
            for (key, run) in runs {
                out.extend(st.insert_run(key, run));
            }
            for id in repeated {
                out.extend(st.promote(&id));
            }
            (out, unused)
        });

        if let Some((out, unused)) = out {
            drop(unused);
            self.emit(out);
        }
    }

    fn on_remove(&self, index: usize, count: usize) {
        let removed = self.cache.write(|st| {
            let gone = st.slots.remove(index, count);
            let mut out = Vec::new();
            let mut subs = Vec::new();

            for slot in &gone {
                let id = match st.ids.remove(slot) {
                    Some(id) => id,
                    None => {
                        tracing::warn!(slot, "group: removed item was not tracked");
                        continue;
                    }
                };
                let remaining = st.occurrences.get_mut(&id).map_or(0, |occurrences| {
                    occurrences.retain(|s| s != slot);
                    occurrences.len()
                });
                if st.shown.get(&id) != Some(slot) {
                    continue;
                }

                if remaining > 0 {
                    out.extend(st.promote(&id));
                } else {
                    out.extend(st.extract(&id));
                    st.occurrences.remove(&id);
                    st.shown.remove(&id);
                    st.keys.remove(&id);
                    subs.extend(st.item_subs.remove(&id));
                }
            }
            st.slots.release(&gone);
            (out, subs)
        });

        if let Some((out, subs)) = removed {
            drop(subs);
            self.emit(out);
        }
    }

    fn on_move(&self, old_index: usize, new_index: usize, count: usize) {
        let out = self.cache.write(|st| {
            let moved: Vec<T::Id> = st
                .slots
                .run(old_index, count)
                .into_iter()
                .filter_map(|slot| st.ids.get(&slot).map(|id| (slot, id)))
                .filter(|(slot, id)| st.shown.get(*id) == Some(slot))
                .map(|(_, id)| id.clone())
                .collect();

            // per group: the run of moved members, located through the old keys
            let mut runs: Vec<(Arc<Group<K, T>>, usize, usize, T::Id)> = Vec::new();
            for id in &moved {
                let group = match st.group_of(id) {
                    Some(group) => group,
                    None => continue,
                };
                match runs.iter_mut().find(|r| Arc::ptr_eq(&r.0, &group)) {
                    Some(run) => run.2 += 1,
                    None => {
                        let found = st.shown_key(id).and_then(|key| {
                            let items = group.items.read().unwrap();
                            search_group(&st.slots, &st.shown, &items, key, None).ok()
                        });
                        if let Some(at) = found {
                            runs.push((group, at, 1, id.clone()));
                        }
                    }
                }
            }

            let relocated = st.slots.relocate(old_index, new_index, count);

            let mut out = Vec::new();
            for (group, old, count, first) in runs {
                let key = match st.shown_key(&first) {
                    Some(key) => key,
                    None => continue,
                };
                let mut items = group.items.write().unwrap();
                let new = search_group(&st.slots, &st.shown, &items, key, Some(old..old + count))
                    .unwrap_or_else(|at| at);
                if new == old || items.move_range(old, new, count).is_err() {
                    continue;
                }
                let moved = items[new..new + count].to_vec();
                drop(items);

                out.push(Fanout::Inner(
                    group,
                    Notification::Collection(CollectionDiff::Move {
                        old_index: old,
                        new_index: new,
                        items: moved,
                    }),
                ));
            }

            // a moved occurrence may now come first, or no longer
            let mut repeated: Vec<T::Id> = relocated
                .iter()
                .filter_map(|slot| st.ids.get(slot))
                .filter(|id| st.occurrences.get(*id).map_or(0, Vec::len) > 1)
                .cloned()
                .collect();
            repeated.sort();
            repeated.dedup();
            for id in repeated {
                out.extend(st.promote(&id));
            }
            out
        });
        self.emit(out.unwrap_or_default());
    }

    fn on_item_changed(&self, item: &T) {
        let id = item.identity();
        let new_key = (self.key_of())(item);

        let moved_out = self.cache.write(|st| match st.keys.get(&id) {
            Some(old_key) if *old_key != new_key => {
                let out = st.extract(&id);
                st.keys.insert(id.clone(), new_key.clone());
                Some(out)
            }
            _ => None,
        });

        if let Some(Some(out)) = moved_out {
            self.emit(out);
            let out = self
                .cache
                .write(|st| st.insert_run(new_key, vec![item.clone()]));
            self.emit(out.unwrap_or_default());
        }
    }

    fn resync(&self) {
        if !self.cache.is_active() {
            return;
        }

        let items = self.source().snapshot();
        let fresh = self.state_from(&items, Subscription::empty());
        let retired = self.cache.write(|st| {
            let source_sub = std::mem::replace(&mut st._source_sub, Subscription::empty());
            let old = std::mem::replace(
                st,
                GroupState {
                    _source_sub: source_sub,
                    ..fresh
                },
            );
            old
        });

        if let Some(old) = retired {
            let groups = old.groups.clone();
            drop(old);
            self.retire(groups);
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<K: GroupKey, T: Item + Identity> Activation for GroupBy<K, T> {
    fn listeners_changed(&self) {
        self.cache
            .sync("group_by", || self.listeners.is_observed(), || self.build());
    }
}

impl<K: GroupKey, T: Item + Identity> LiveView<Arc<Group<K, T>>> for GroupBy<K, T> {
    fn len(&self) -> usize {
        self.cache
            .read(|st| st.groups.len())
            .unwrap_or_else(|| self.derive().len())
    }

    fn get(&self, index: usize) -> Option<Arc<Group<K, T>>> {
        match self.cache.read(|st| st.groups.get(index).cloned()) {
            Some(group) => group,
            None => self.derive().into_iter().nth(index),
        }
    }

    fn listeners(&self) -> &Listeners<Arc<Group<K, T>>> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<Arc<Group<K, T>>> {
        self.cache
            .read(|st| st.groups.clone())
            .unwrap_or_else(|| self.derive())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
