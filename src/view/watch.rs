use {
    crate::view::observer::{Signal, Subscription},
    std::sync::Arc,
};

/// Items that announce changes of their own state.
pub trait Notifying {
    fn signal(&self) -> &Signal;
}

/// Strategy telling an operator how to observe individual items.
///
/// Operators whose output depends on mutable item state (filter, sort,
/// group) subscribe to each tracked item through their watcher.
pub struct Watcher<T> {
    signal_of: Option<Arc<dyn Fn(&T) -> Option<Signal> + Send + Sync>>,
}

impl<T> Clone for Watcher<T> {
    fn clone(&self) -> Self {
        Watcher {
            signal_of: self.signal_of.clone(),
        }
    }
}

impl<T> Default for Watcher<T> {
    fn default() -> Self {
        Watcher::none()
    }
}

impl<T> Watcher<T> {
    /// Items are treated as immutable.
    pub fn none() -> Self {
        Watcher { signal_of: None }
    }

    pub fn new(signal_of: impl Fn(&T) -> Option<Signal> + Send + Sync + 'static) -> Self {
        Watcher {
            signal_of: Some(Arc::new(signal_of)),
        }
    }

    pub fn is_none(&self) -> bool {
        self.signal_of.is_none()
    }

    pub fn watch(
        &self,
        item: &T,
        on_change: impl Fn() + Send + Sync + 'static,
    ) -> Option<Subscription> {
        let signal = (self.signal_of.as_ref()?)(item)?;
        Some(signal.add_notify_fn(move |_| on_change()))
    }
}

impl<T: Notifying> Watcher<T> {
    pub fn notifying() -> Self {
        Watcher::new(|item: &T| Some(item.signal().clone()))
    }
}
