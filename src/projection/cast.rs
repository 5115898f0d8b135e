use {
    crate::view::{
        port::{Activation, Cache},
        CollectionDiff, Item, Listeners, LiveView, SharedView, Subscription,
    },
    std::sync::{Arc, Weak},
};

pub type Conversion<S, U> = Arc<dyn Fn(&S) -> U + Send + Sync>;

struct Links {
    _structural: Subscription,
    _informational: Subscription,
}

/// Source items seen under another element type.
///
/// Keeps nothing; every read and every event is converted on the way through.
pub struct Cast<S: Item, U: Item> {
    weak: Weak<Self>,
    source: SharedView<S>,
    convert: Conversion<S, U>,
    links: Cache<Links>,
    listeners: Listeners<U>,
}

impl<S: Item, U: Item> Cast<S, U> {
    pub fn new(source: SharedView<S>, convert: Conversion<S, U>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            Cast {
                weak: weak.clone(),
                source,
                convert,
                links: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    fn build(&self) -> Links {
        let structural = {
            let weak = self.weak.clone();
            self.source.listeners().subscribe(move |diff: &CollectionDiff<S>| {
                if let Some(cast) = weak.upgrade() {
                    let converted = diff.map(|x| (cast.convert)(x));
                    cast.listeners.notify(&converted);
                }
            })
        };
        let informational = {
            let weak = self.weak.clone();
            self.source.listeners().subscribe_property(move |name| {
                if let Some(cast) = weak.upgrade() {
                    cast.listeners.notify_property(name);
                }
            })
        };
        Links {
            _structural: structural,
            _informational: informational,
        }
    }
}

impl<S: Item, U: Item> Activation for Cast<S, U> {
    fn listeners_changed(&self) {
        self.links
            .sync("cast", || self.listeners.is_observed(), || self.build());
    }
}

impl<S: Item, U: Item> LiveView<U> for Cast<S, U> {
    fn len(&self) -> usize {
        self.source.len()
    }

    fn get(&self, index: usize) -> Option<U> {
        self.source.get(index).map(|x| (self.convert)(&x))
    }

    fn listeners(&self) -> &Listeners<U> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<U> {
        self.source.snapshot().iter().map(|x| (self.convert)(x)).collect()
    }
}
