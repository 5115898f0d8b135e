use {
    crate::view::{
        port::{observe_source, Activation, Cache},
        CollectionDiff, Item, Listeners, LiveView, SharedView, Subscription, COUNT,
    },
    std::sync::{Arc, Weak},
};

/// Rewrites a range event as the equivalent sequence of single-item events.
pub fn split<T: Clone>(diff: &CollectionDiff<T>) -> Vec<CollectionDiff<T>> {
    match diff {
        CollectionDiff::Add { index, items } => items
            .iter()
            .enumerate()
            .map(|(i, item)| CollectionDiff::add(index + i, item.clone()))
            .collect(),

        CollectionDiff::Remove { index, items } => items
            .iter()
            .map(|item| CollectionDiff::remove(*index, item.clone()))
            .collect(),

        CollectionDiff::Replace {
            index,
            old_items,
            new_items,
        } if old_items.len() == new_items.len() => old_items
            .iter()
            .zip(new_items)
            .enumerate()
            .map(|(i, (old, new))| CollectionDiff::replace(index + i, old.clone(), new.clone()))
            .collect(),

        CollectionDiff::Replace {
            index,
            old_items,
            new_items,
        } => {
            let removed = CollectionDiff::Remove {
                index: *index,
                items: old_items.clone(),
            };
            let added = CollectionDiff::Add {
                index: *index,
                items: new_items.clone(),
            };
            let mut out = split(&removed);
            out.extend(split(&added));
            out
        }

        CollectionDiff::Move {
            old_index,
            new_index,
            items,
        } => {
            let count = items.len();
            if new_index > old_index {
                // the head of the run is always at `old_index`
                items
                    .iter()
                    .map(|item| CollectionDiff::moved(*old_index, new_index + count - 1, item.clone()))
                    .collect()
            } else {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| CollectionDiff::moved(old_index + i, new_index + i, item.clone()))
                    .collect()
            }
        }

        CollectionDiff::Reset => vec![CollectionDiff::Reset],
    }
}

struct Link {
    _source_sub: Subscription,
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Split Events
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Same items as the source, announced one item per event.
///
/// For consumers that cannot handle range events.
pub struct SplitEvents<T: Item> {
    weak: Weak<Self>,
    source: SharedView<T>,
    link: Cache<Link>,
    listeners: Listeners<T>,
}

impl<T: Item> SplitEvents<T> {
    pub fn new(source: SharedView<T>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            SplitEvents {
                weak: weak.clone(),
                source,
                link: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    fn build(&self) -> Link {
        Link {
            _source_sub: observe_source(&*self.source, &self.weak, Self::on_source),
        }
    }

    fn on_source(&self, diff: &CollectionDiff<T>) {
        for single in split(diff) {
            let resized = !matches!(single.len_delta(), Some(0));
            self.listeners.notify(&single);
            if resized {
                self.listeners.notify_property(COUNT);
            }
        }
    }
}

impl<T: Item> Activation for SplitEvents<T> {
    fn listeners_changed(&self) {
        self.link
            .sync("split_events", || self.listeners.is_observed(), || self.build());
    }
}

impl<T: Item> LiveView<T> for SplitEvents<T> {
    fn len(&self) -> usize {
        self.source.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.source.get(index)
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<T> {
        self.source.snapshot()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
