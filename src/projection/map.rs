use {
    crate::{
        buffer::move_vec::MoveVec,
        view::{
            port::{observe_source, Activation, Cache},
            CollectionDiff, Item, Listeners, LiveView, SharedView, Subscription, COUNT,
        },
    },
    std::sync::{Arc, RwLock, Weak},
};

pub type Projector<S, U> = Arc<dyn Fn(&S) -> U + Send + Sync>;

/// Releases whatever a projected value holds once it leaves the view.
pub type Disposer<U> = Arc<dyn Fn(U) + Send + Sync>;

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

struct MapState<U> {
    values: MoveVec<U>,
    disposer: Option<Disposer<U>>,
    _source_sub: Subscription,
}

impl<U> Drop for MapState<U> {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            std::mem::take(&mut self.values)
                .into_iter()
                .for_each(|v| disposer(v));
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    Map
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Index-aligned projection of a source view.
pub struct Map<S: Item, U: Item> {
    weak: Weak<Self>,
    source: RwLock<SharedView<S>>,
    selector: RwLock<Projector<S, U>>,
    disposer: RwLock<Option<Disposer<U>>>,
    cache: Cache<MapState<U>>,
    listeners: Listeners<U>,
}

impl<S: Item, U: Item> Map<S, U> {
    pub fn new(source: SharedView<S>, selector: Projector<S, U>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            Map {
                weak: weak.clone(),
                source: RwLock::new(source),
                selector: RwLock::new(selector),
                disposer: RwLock::new(None),
                cache: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    /// Hands every projected value to `disposer` after it has left the view,
    /// including all cached values when the view goes dormant.
    pub fn dispose_with(self: Arc<Self>, disposer: impl Fn(U) + Send + Sync + 'static) -> Arc<Self> {
        let disposer: Disposer<U> = Arc::new(disposer);
        *self.disposer.write().unwrap() = Some(disposer.clone());
        self.cache.write(|st| st.disposer = Some(disposer));
        self
    }

    pub fn set_selector(&self, selector: Projector<S, U>) {
        *self.selector.write().unwrap() = selector;
        tracing::debug!("map selector replaced");
        self.reload();
    }

    pub fn set_source(&self, source: SharedView<S>) {
        *self.source.write().unwrap() = source;
        self.reload();
    }

    pub fn is_active(&self) -> bool {
        self.cache.is_active()
    }

    fn source(&self) -> SharedView<S> {
        self.source.read().unwrap().clone()
    }

    fn project(&self, items: &[S]) -> Vec<U> {
        let selector = self.selector.read().unwrap().clone();
        items.iter().map(|x| selector(x)).collect()
    }

    fn build(&self) -> MapState<U> {
        let source = self.source();
        let source_sub = observe_source(&*source, &self.weak, Self::on_source);
        MapState {
            values: self.project(&source.snapshot()).into(),
            disposer: self.disposer.read().unwrap().clone(),
            _source_sub: source_sub,
        }
    }

    fn dispose(&self, values: Vec<U>) {
        if let Some(disposer) = self.cache.read(|st| st.disposer.clone()).flatten() {
            values.into_iter().for_each(|v| disposer(v));
        }
    }

    /// Swaps in a fresh state; the old one (and its values) goes after the Reset.
    fn reload(&self) {
        if !self.cache.is_active() {
            return;
        }
        let fresh = self.build();
        if let Some(old) = self.cache.write(|st| std::mem::replace(st, fresh)) {
            self.listeners.notify(&CollectionDiff::Reset);
            self.listeners.notify_property(COUNT);
            drop(old);
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    fn on_source(&self, diff: &CollectionDiff<S>) {
        match diff {
            CollectionDiff::Add { index, items } => {
                let values = self.project(items);
                let added = self.cache.write(|st| {
                    st.values.insert_range(*index, values.iter().cloned()).ok()
                });
                if let Some(Some(())) = added {
                    self.listeners.notify(&CollectionDiff::Add {
                        index: *index,
                        items: values,
                    });
                    self.listeners.notify_property(COUNT);
                }
            }

            CollectionDiff::Remove { index, items } => {
                let removed = self
                    .cache
                    .write(|st| st.values.remove_range(*index, items.len()).ok())
                    .flatten();
                if let Some(removed) = removed {
                    self.listeners.notify(&CollectionDiff::Remove {
                        index: *index,
                        items: removed.clone(),
                    });
                    self.listeners.notify_property(COUNT);
                    self.dispose(removed);
                }
            }

            CollectionDiff::Replace {
                index,
                old_items,
                new_items,
            } => {
                let values = self.project(new_items);
                let replaced = self
                    .cache
                    .write(|st| {
                        let old = st.values.remove_range(*index, old_items.len()).ok()?;
                        st.values.insert_range(*index, values.iter().cloned()).ok()?;
                        Some(old)
                    })
                    .flatten();
                if let Some(old) = replaced {
                    let resized = old.len() != values.len();
                    self.listeners.notify(&CollectionDiff::Replace {
                        index: *index,
                        old_items: old.clone(),
                        new_items: values,
                    });
                    if resized {
                        self.listeners.notify_property(COUNT);
                    }
                    self.dispose(old);
                }
            }

            CollectionDiff::Move {
                old_index,
                new_index,
                items,
            } => {
                let count = items.len();
                let moved = self
                    .cache
                    .write(|st| {
                        st.values.move_range(*old_index, *new_index, count).ok()?;
                        Some(st.values[*new_index..*new_index + count].to_vec())
                    })
                    .flatten();
                if let Some(moved) = moved {
                    self.listeners.notify(&CollectionDiff::Move {
                        old_index: *old_index,
                        new_index: *new_index,
                        items: moved,
                    });
                }
            }

            CollectionDiff::Reset => self.reload(),
        }
    }
}

impl<S: Item, U: Item> Activation for Map<S, U> {
    fn listeners_changed(&self) {
        self.cache
            .sync("map", || self.listeners.is_observed(), || self.build());
    }
}

impl<S: Item, U: Item> LiveView<U> for Map<S, U> {
    fn len(&self) -> usize {
        self.source().len()
    }

    fn get(&self, index: usize) -> Option<U> {
        match self.cache.read(|st| st.values.get(index).cloned()) {
            Some(value) => value,
            None => {
                let item = self.source().get(index)?;
                Some((self.selector.read().unwrap())(&item))
            }
        }
    }

    fn listeners(&self) -> &Listeners<U> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<U> {
        self.cache
            .read(|st| st.values.to_vec())
            .unwrap_or_else(|| self.project(&self.source().snapshot()))
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        crate::{
            buffer::vec::ObservableVec,
            projection::{map::*, ProjectionExt},
            view::{testing::Recorder, LiveViewExt},
        },
        std::sync::{Arc, Mutex},
    };

    #[test]
    fn mirrors_every_source_change() {
        let source = ObservableVec::with_data(vec![1, 2, 3]);
        let doubled = source.map(|x: &i32| x * 2);
        let rec = Recorder::attach(&doubled);

        source.insert(1, 10).unwrap();
        source.move_item(0, 3).unwrap();
        source.replace(0, 5).unwrap();
        source.remove_at(2).unwrap();

        assert_eq!(
            rec.take(),
            vec![
                CollectionDiff::add(1, 20),
                CollectionDiff::moved(0, 3, 2),
                CollectionDiff::replace(0, 20, 10),
                CollectionDiff::remove(2, 6),
            ]
        );
        assert_eq!(rec.take_properties(), vec![COUNT, COUNT]);
        assert_eq!(rec.mirror(), vec![10, 4, 2]);
        assert_eq!(doubled.snapshot(), vec![10, 4, 2]);
    }

    #[test]
    fn dormant_reads_follow_the_source() {
        let source = ObservableVec::with_data(vec!["a", "bb"]);
        let lens = source.map(|s: &&'static str| s.len());

        assert!(!lens.is_active());
        assert_eq!(lens.len(), 2);
        assert_eq!(lens.get(1), Some(2));
        assert_eq!(lens.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(source.listeners().count(), 0);
    }

    #[test]
    fn removed_values_are_disposed_after_the_event() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = ObservableVec::with_data(vec![1, 2, 3]);
        let labels = {
            let log = log.clone();
            source
                .map(|x: &i32| format!("#{}", x))
                .dispose_with(move |label| log.lock().unwrap().push(format!("dispose {}", label)))
        };

        let sub = {
            let log = log.clone();
            labels.observe(move |diff| {
                if let CollectionDiff::Remove { items, .. } = diff {
                    log.lock().unwrap().push(format!("removed {}", items[0]));
                }
            })
        };

        source.remove_at(1).unwrap();
        source.replace(0, 7).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["removed #2", "dispose #2", "dispose #1"]
        );

        log.lock().unwrap().clear();
        drop(sub);
        let mut disposed = log.lock().unwrap().clone();
        disposed.sort();
        assert_eq!(disposed, vec!["dispose #3", "dispose #7"]);
    }

    #[test]
    fn selector_replacement_resets() {
        let source = ObservableVec::with_data(vec![1, 2]);
        let mapped = source.map(|x: &i32| x + 1);
        let rec = Recorder::attach(&mapped);

        mapped.set_selector(Arc::new(|x: &i32| x * 100));
        assert_eq!(rec.take(), vec![CollectionDiff::Reset]);
        assert_eq!(rec.mirror(), vec![100, 200]);
    }
}
