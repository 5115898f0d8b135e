use {
    crate::error::{Error, Result},
    std::{hash::Hash, sync::Arc},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                   Items
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Bound shared by everything stored in a live view.
pub trait Item: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Item for T {}

/// Identity used to tell items apart when they compare equal by value.
///
/// Value types identify by value, shared handles (`Arc`) by address.
/// Sorting breaks ties by identity; grouping places each identity once.
pub trait Identity {
    type Id: Hash + Eq + Ord + Clone + Send + Sync + 'static;

    fn identity(&self) -> Self::Id;
}

macro_rules! identity_by_value {
    ($($t:ty),*) => {
        $(
            impl Identity for $t {
                type Id = $t;

                fn identity(&self) -> $t {
                    self.clone()
                }
            }
        )*
    };
}

identity_by_value!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, String,
    &'static str
);

impl<V: ?Sized> Identity for Arc<V> {
    type Id = usize;

    fn identity(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Live View
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// An ordered, indexable sequence that notifies its listeners
/// of every change.
///
/// Derived views stay dormant until the first listener attaches;
/// reads on a dormant view are computed from the source on demand.
pub trait LiveView<T: Item>: Send + Sync {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<T>;

    fn listeners(&self) -> &Listeners<T>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole content. The default reads item by item through `get`,
    /// which derived views override with a single pass.
    fn snapshot(&self) -> Vec<T> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// Direct write access. Derived views are read-only.
    fn set(&self, index: usize, item: T) -> Result<()> {
        let _ = (index, item);
        Err(Error::UnsupportedMutation)
    }
}

pub type SharedView<T> = Arc<dyn LiveView<T>>;

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<T: Item, V: LiveView<T> + ?Sized> LiveView<T> for Arc<V> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Option<T> {
        (**self).get(index)
    }

    fn listeners(&self) -> &Listeners<T> {
        (**self).listeners()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn snapshot(&self) -> Vec<T> {
        (**self).snapshot()
    }

    fn set(&self, index: usize, item: T) -> Result<()> {
        (**self).set(index, item)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub trait LiveViewExt<T: Item>: LiveView<T> {
    /// Iterates over a snapshot taken now.
    fn iter(&self) -> std::vec::IntoIter<T> {
        self.snapshot().into_iter()
    }

    fn observe(&self, f: impl Fn(&CollectionDiff<T>) + Send + Sync + 'static) -> Subscription {
        self.listeners().subscribe(f)
    }

    fn observe_property(&self, f: impl Fn(&'static str) + Send + Sync + 'static) -> Subscription {
        self.listeners().subscribe_property(f)
    }
}

impl<T: Item, V: LiveView<T> + ?Sized> LiveViewExt<T> for V {}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// A view that never contains anything.
pub struct EmptyView<T> {
    listeners: Listeners<T>,
}

impl<T: Item> EmptyView<T> {
    pub fn new() -> Self {
        EmptyView {
            listeners: Listeners::new(),
        }
    }

    pub fn shared() -> SharedView<T> {
        Arc::new(EmptyView::new())
    }
}

impl<T: Item> Default for EmptyView<T> {
    fn default() -> Self {
        EmptyView::new()
    }
}

impl<T: Item> LiveView<T> for EmptyView<T> {
    fn len(&self) -> usize {
        0
    }

    fn get(&self, _index: usize) -> Option<T> {
        None
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.listeners
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub mod channel;
pub mod diff;
pub mod observer;
pub mod port;
pub mod watch;

pub use {
    diff::{CollectionDiff, Notification, COUNT},
    observer::{Broadcast, Observer, Signal, Subscription},
    port::{Activation, Listeners},
    watch::{Notifying, Watcher},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
pub(crate) mod testing {
    use {
        crate::view::*,
        std::sync::{Arc, Mutex},
    };

    /// Listener that records every event and mirrors the view
    /// by replaying them.
    pub struct Recorder<T: Item> {
        events: Arc<Mutex<Vec<CollectionDiff<T>>>>,
        properties: Arc<Mutex<Vec<&'static str>>>,
        mirror: Arc<Mutex<Vec<T>>>,
        _view: SharedView<T>,
        _subs: Vec<Subscription>,
    }

    impl<T: Item> Recorder<T> {
        pub fn attach(view: &(impl LiveView<T> + Clone + 'static)) -> Self {
            let view: SharedView<T> = Arc::new(view.clone());
            let events = Arc::new(Mutex::new(Vec::new()));
            let properties = Arc::new(Mutex::new(Vec::new()));
            let mirror = Arc::new(Mutex::new(Vec::new()));

            let structural = {
                let events = events.clone();
                let mirror = mirror.clone();
                let weak = Arc::downgrade(&view);
                view.listeners().subscribe(move |diff: &CollectionDiff<T>| {
                    events.lock().unwrap().push(diff.clone());
                    let reload = || weak.upgrade().map(|v| v.snapshot()).unwrap_or_default();
                    diff.apply_to(&mut mirror.lock().unwrap(), reload);
                })
            };
            let informational = {
                let properties = properties.clone();
                view.listeners()
                    .subscribe_property(move |name| properties.lock().unwrap().push(name))
            };

            *mirror.lock().unwrap() = view.snapshot();

            Recorder {
                events,
                properties,
                mirror,
                _view: view,
                _subs: vec![structural, informational],
            }
        }

        /// Drains the structural events recorded so far.
        pub fn take(&self) -> Vec<CollectionDiff<T>> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        pub fn take_properties(&self) -> Vec<&'static str> {
            std::mem::take(&mut *self.properties.lock().unwrap())
        }

        pub fn mirror(&self) -> Vec<T> {
            self.mirror.lock().unwrap().clone()
        }
    }
}
