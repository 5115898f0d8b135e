use {
    crate::{
        buffer::move_vec::MoveVec,
        view::{
            port::{observe_source, Activation, Cache},
            CollectionDiff, Item, Listeners, LiveView, Notification, SharedView, Subscription,
            COUNT,
        },
    },
    std::{
        ops::Range,
        sync::{Arc, RwLock, Weak},
    },
};

struct WindowState<T> {
    items: MoveVec<T>,
    _source_sub: Subscription,
}

fn slice<T: Item>(source: &dyn LiveView<T>, range: Range<usize>) -> Vec<T> {
    range.filter_map(|i| source.get(i)).collect()
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Window
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// The slice `skip .. skip + take` of a source view.
///
/// Insertions and removals are translated into edge updates: items
/// pushed out of the window leave through a `Remove`, items pulled in
/// arrive through an `Add`. Moves and resizing replacements rewrite the
/// window from the first affected position onward.
pub struct Window<T: Item> {
    weak: Weak<Self>,
    source: RwLock<SharedView<T>>,
    skip: usize,
    take: Option<usize>,
    cache: Cache<WindowState<T>>,
    listeners: Listeners<T>,
}

impl<T: Item> Window<T> {
    pub fn new(source: SharedView<T>, skip: usize, take: Option<usize>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            Window {
                weak: weak.clone(),
                source: RwLock::new(source),
                skip,
                take,
                cache: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    /// `(skip, take)` as given at construction.
    pub fn bounds(&self) -> (usize, Option<usize>) {
        (self.skip, self.take)
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

    fn source(&self) -> SharedView<T> {
        self.source.read().unwrap().clone()
    }

    fn capacity(&self) -> usize {
        self.take.unwrap_or(usize::MAX)
    }

    /// Window length for a source of `len` items.
    fn fill(&self, len: usize) -> usize {
        self.capacity().min(len.saturating_sub(self.skip))
    }

    fn derive(&self) -> Vec<T> {
        let source = self.source();
        slice(&*source, self.skip..self.skip + self.fill(source.len()))
    }

    fn build(&self) -> WindowState<T> {
        let source = self.source();
        let source_sub = observe_source(&*source, &self.weak, Self::on_source);
        WindowState {
            items: self.derive().into(),
            _source_sub: source_sub,
        }
    }

    fn emit(&self, out: Option<(Vec<Notification<T>>, bool)>) {
        if let Some((notifications, resized)) = out {
            self.listeners.dispatch_all(notifications);
            if resized {
                self.listeners.notify_property(COUNT);
            }
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    fn on_source(&self, diff: &CollectionDiff<T>) {
        match diff {
            CollectionDiff::Add { index, items } => self.on_add(*index, items.len()),
            CollectionDiff::Remove { index, items } => self.on_remove(*index, items.len()),
            CollectionDiff::Replace {
                index,
                old_items,
                new_items,
            } => {
                if old_items.len() == new_items.len() {
                    self.on_replace(*index, new_items);
                } else {
                    self.rewrite_from(*index);
                }
            }
            CollectionDiff::Move {
                old_index,
                new_index,
                items,
            } => {
                let end = old_index.max(new_index) + items.len();
                if end > self.skip {
                    self.rewrite_from(*old_index.min(new_index));
                }
            }
            CollectionDiff::Reset => self.resync(),
        }
    }

    fn on_add(&self, index: usize, count: usize) {
        let source = self.source();
        let (skip, capacity) = (self.skip, self.capacity());

        let out = self.cache.write(|st| {
            let len = st.items.len();
            // insertions in front of the window enter at its head
            let at = index.saturating_sub(skip);
            if at > len || at >= capacity {
                return (Vec::new(), false);
            }

            let entering = count
                .min(capacity - at)
                .min(source.len().saturating_sub(skip + at));
            let evicted = (len + entering).saturating_sub(capacity);

            let mut out = Vec::new();
            if evicted > 0 {
                if let Ok(tail) = st.items.remove_range(len - evicted, evicted) {
                    out.push(Notification::Collection(CollectionDiff::Remove {
                        index: len - evicted,
                        items: tail,
                    }));
                }
            }
            if entering > 0 {
                let items = slice(&*source, skip + at..skip + at + entering);
                if st.items.insert_range(at, items.iter().cloned()).is_ok() {
                    out.push(Notification::Collection(CollectionDiff::Add { index: at, items }));
                }
            }
            (out, st.items.len() != len)
        });
        self.emit(out);
    }

    fn on_remove(&self, index: usize, count: usize) {
        let source = self.source();
        let skip = self.skip;
        let target = self.fill(source.len());

        let out = self.cache.write(|st| {
            let len = st.items.len();
            let at = index.saturating_sub(skip);
            let leaving = if index < skip {
                count.min(len)
            } else {
                count.min(len.saturating_sub(at))
            };

            let mut out = Vec::new();
            if leaving > 0 {
                if let Ok(items) = st.items.remove_range(at, leaving) {
                    out.push(Notification::Collection(CollectionDiff::Remove { index: at, items }));
                }
            }

            let kept = st.items.len();
            if target > kept {
                let items = slice(&*source, skip + kept..skip + target);
                if st.items.insert_range(kept, items.iter().cloned()).is_ok() {
                    out.push(Notification::Collection(CollectionDiff::Add {
                        index: kept,
                        items,
                    }));
                }
            }
            (out, st.items.len() != len)
        });
        self.emit(out);
    }

    fn on_replace(&self, index: usize, new_items: &[T]) {
        let skip = self.skip;
        let out = self.cache.write(|st| {
            let lo = index.max(skip);
            let hi = (index + new_items.len()).min(skip + st.items.len());
            if lo >= hi {
                return (Vec::new(), false);
            }

            let at = lo - skip;
            let incoming = new_items[lo - index..hi - index].to_vec();
            let outgoing: Vec<T> = incoming
                .iter()
                .enumerate()
                .filter_map(|(i, item)| st.items.set(at + i, item.clone()).ok())
                .collect();

            let diff = CollectionDiff::Replace {
                index: at,
                old_items: outgoing,
                new_items: incoming,
            };
            (vec![Notification::Collection(diff)], false)
        });
        self.emit(out);
    }

    /// Drops the window content from source position `first` on and refills it.
    fn rewrite_from(&self, first: usize) {
        let source = self.source();
        let skip = self.skip;
        let target = self.fill(source.len());

        let out = self.cache.write(|st| {
            let len = st.items.len();
            let at = first.saturating_sub(skip);

            let mut out = Vec::new();
            if at < len {
                if let Ok(items) = st.items.remove_range(at, len - at) {
                    out.push(Notification::Collection(CollectionDiff::Remove { index: at, items }));
                }
            }
            let kept = st.items.len();
            if target > kept {
                let items = slice(&*source, skip + kept..skip + target);
                if st.items.insert_range(kept, items.iter().cloned()).is_ok() {
                    out.push(Notification::Collection(CollectionDiff::Add {
                        index: kept,
                        items,
                    }));
                }
            }
            (out, st.items.len() != len)
        });
        self.emit(out);
    }

    fn resync(&self) {
        let items = self.derive();
        if self.cache.write(|st| st.items = items.into()).is_some() {
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
        }
    }
}

impl<T: Item> Activation for Window<T> {
    fn listeners_changed(&self) {
        self.cache
            .sync("window", || self.listeners.is_observed(), || self.build());
    }
}

impl<T: Item> LiveView<T> for Window<T> {
    fn len(&self) -> usize {
        self.cache
            .read(|st| st.items.len())
            .unwrap_or_else(|| self.fill(self.source().len()))
    }

    fn get(&self, index: usize) -> Option<T> {
        match self.cache.read(|st| st.items.get(index).cloned()) {
            Some(item) => item,
            None if index < self.fill(self.source().len()) => self.source().get(self.skip + index),
            None => None,
        }
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<T> {
        self.cache
            .read(|st| st.items.to_vec())
            .unwrap_or_else(|| self.derive())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use crate::{
        buffer::vec::ObservableVec,
        projection::{window::*, ProjectionExt},
        view::testing::Recorder,
    };

    fn one_to_eight() -> ObservableVec<i32> {
        ObservableVec::with_data((1..=8).collect())
    }

    #[test]
    fn slices_the_source() {
        let source = one_to_eight();
        assert_eq!(source.window(3, Some(4)).snapshot(), vec![4, 5, 6, 7]);
        assert_eq!(source.skip(6).snapshot(), vec![7, 8]);
        assert_eq!(source.take(2).snapshot(), vec![1, 2]);
        assert!(source.skip(10).is_empty());
        assert_eq!(source.take(3).bounds(), (0, Some(3)));
    }

    #[test]
    fn insert_in_front_shifts_the_window() {
        let source = one_to_eight();
        let window = source.window(2, Some(4));
        let rec = Recorder::attach(&window);

        source.insert_range(1, vec![20, 21, 22]).unwrap();
        assert_eq!(
            rec.take(),
            vec![
                CollectionDiff::Remove {
                    index: 1,
                    items: vec![4, 5, 6]
                },
                CollectionDiff::Add {
                    index: 0,
                    items: vec![21, 22, 2]
                },
            ]
        );
        assert_eq!(rec.mirror(), vec![21, 22, 2, 3]);
        assert!(rec.take_properties().is_empty());
    }

    #[test]
    fn insert_inside_evicts_the_tail() {
        let source = one_to_eight();
        let window = source.window(3, Some(4));
        let rec = Recorder::attach(&window);

        source.insert(5, 50).unwrap();
        assert_eq!(
            rec.take(),
            vec![CollectionDiff::remove(3, 7), CollectionDiff::add(2, 50)]
        );
        assert_eq!(rec.mirror(), vec![4, 5, 50, 6]);

        source.push(9).unwrap();
        assert!(rec.take().is_empty());
    }

    #[test]
    fn removal_pulls_items_in_from_behind() {
        let source = one_to_eight();
        let window = source.window(3, Some(4));
        let rec = Recorder::attach(&window);

        source.remove_at(0).unwrap();
        assert_eq!(
            rec.take(),
            vec![CollectionDiff::remove(0, 4), CollectionDiff::add(3, 8)]
        );
        assert_eq!(rec.mirror(), vec![5, 6, 7, 8]);

        source.remove_at(4).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::remove(1, 6)]);
        assert_eq!(rec.take_properties(), vec![COUNT]);
        assert_eq!(rec.mirror(), vec![5, 7, 8]);
    }

    #[test]
    fn open_ended_window_grows() {
        let source = ObservableVec::with_data(vec![1, 2]);
        let rest = source.skip(1);
        let rec = Recorder::attach(&rest);

        source.push(3).unwrap();
        source.insert(0, 0).unwrap();
        assert_eq!(
            rec.take(),
            vec![CollectionDiff::add(1, 3), CollectionDiff::add(0, 1)]
        );
        assert_eq!(rec.mirror(), vec![1, 2, 3]);
    }

    #[test]
    fn replace_and_move_stay_consistent() {
        let source = one_to_eight();
        let window = source.window(2, Some(3));
        let rec = Recorder::attach(&window);

        source.replace(3, 40).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::replace(1, 4, 40)]);

        source.move_item(0, 7).unwrap();
        assert_eq!(rec.mirror(), source.snapshot()[2..5].to_vec());

        source.move_item(7, 6).unwrap();
        assert!(rec.take().iter().all(|d| !matches!(d, CollectionDiff::Reset)));
        assert_eq!(rec.mirror(), window.snapshot());
    }

    #[test]
    fn reset_rebuilds() {
        let source = one_to_eight();
        let window = source.take(3);
        let rec = Recorder::attach(&window);

        source.reset_with(vec![9, 8]).unwrap();
        assert_eq!(rec.take(), vec![CollectionDiff::Reset]);
        assert_eq!(rec.mirror(), vec![9, 8]);
    }
}
