use {
    crate::view::{
        port::{observe_source, Activation, Cache},
        CollectionDiff, Item, Listeners, LiveView, SharedView, Subscription, COUNT,
    },
    std::sync::{Arc, RwLock, Weak},
};

struct Links {
    _first: Subscription,
    _second: Subscription,
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Concat
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Two views read back to back. Keeps no items of its own:
/// indices of the second view are offset by the current length of the first.
pub struct Concat<T: Item> {
    weak: Weak<Self>,
    first: RwLock<SharedView<T>>,
    second: RwLock<SharedView<T>>,
    links: Cache<Links>,
    listeners: Listeners<T>,
}

impl<T: Item> Concat<T> {
    pub fn new(first: SharedView<T>, second: SharedView<T>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            Concat {
                weak: weak.clone(),
                first: RwLock::new(first),
                second: RwLock::new(second),
                links: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    pub fn first(&self) -> SharedView<T> {
        self.first.read().unwrap().clone()
    }

    pub fn second(&self) -> SharedView<T> {
        self.second.read().unwrap().clone()
    }

    /// Swaps the leading view, announcing it as removal of the old
    /// items followed by insertion of the new ones.
    pub fn set_first(&self, first: SharedView<T>) {
        let old = std::mem::replace(&mut *self.first.write().unwrap(), first.clone());
        self.splice(0, old, first);
    }

    pub fn set_second(&self, second: SharedView<T>) {
        let old = std::mem::replace(&mut *self.second.write().unwrap(), second.clone());
        let offset = self.first().len();
        self.splice(offset, old, second);
    }

    pub fn is_active(&self) -> bool {
        self.links.is_active()
    }

    fn splice(&self, offset: usize, old: SharedView<T>, new: SharedView<T>) {
        if !self.links.rebuild(|| self.build()) {
            return;
        }

        let old_items = old.snapshot();
        let new_items = new.snapshot();
        let resized = old_items.len() != new_items.len();
        if !old_items.is_empty() {
            self.listeners.notify(&CollectionDiff::Remove {
                index: offset,
                items: old_items,
            });
        }
        if !new_items.is_empty() {
            self.listeners.notify(&CollectionDiff::Add {
                index: offset,
                items: new_items,
            });
        }
        if resized {
            self.listeners.notify_property(COUNT);
        }
    }

    fn build(&self) -> Links {
        Links {
            _first: observe_source(&*self.first(), &self.weak, Self::on_first),
            _second: observe_source(&*self.second(), &self.weak, Self::on_second),
        }
    }

    fn forward(&self, diff: CollectionDiff<T>) {
        let resized = !matches!(diff.len_delta(), Some(0));
        self.listeners.notify(&diff);
        if resized {
            self.listeners.notify_property(COUNT);
        }
    }

    fn on_first(&self, diff: &CollectionDiff<T>) {
        self.forward(diff.clone());
    }

    fn on_second(&self, diff: &CollectionDiff<T>) {
        let offset = self.first().len();
        self.forward(diff.shifted(offset));
    }
}

impl<T: Item> Activation for Concat<T> {
    fn listeners_changed(&self) {
        self.links
            .sync("concat", || self.listeners.is_observed(), || self.build());
    }
}

impl<T: Item> LiveView<T> for Concat<T> {
    fn len(&self) -> usize {
        self.first().len() + self.second().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        let first = self.first();
        let offset = first.len();
        if index < offset {
            first.get(index)
        } else {
            self.second().get(index - offset)
        }
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<T> {
        let mut items = self.first().snapshot();
        items.extend(self.second().snapshot());
        items
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
