use {
    crate::view::{
        diff::{CollectionDiff, Notification},
        observer::{Broadcast, Subscription},
        LiveView,
    },
    std::sync::{
        atomic::{AtomicBool, Ordering},
        RwLock, Weak,
    },
};

/// Hook invoked whenever the number of listeners of a view changes.
pub trait Activation: Send + Sync {
    fn listeners_changed(&self);
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Listeners
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// The two listener registries of a live view:
/// structural changes and named property changes.
pub struct Listeners<T> {
    collection: Broadcast<CollectionDiff<T>>,
    property: Broadcast<&'static str>,
}

impl<T: Send + Sync + 'static> Default for Listeners<T> {
    fn default() -> Self {
        Listeners::new()
    }
}

impl<T: Send + Sync + 'static> Listeners<T> {
    pub fn new() -> Self {
        Listeners {
            collection: Broadcast::new(),
            property: Broadcast::new(),
        }
    }

    /// Listeners whose count drives the activation of `hook`.
    pub fn with_hook(hook: Weak<dyn Activation>) -> Self {
        Listeners {
            collection: Broadcast::with_hook(hook.clone()),
            property: Broadcast::with_hook(hook),
        }
    }

    pub fn subscribe(
        &self,
        f: impl Fn(&CollectionDiff<T>) + Send + Sync + 'static,
    ) -> Subscription {
        self.collection.add_notify_fn(f)
    }

    pub fn subscribe_property(
        &self,
        f: impl Fn(&'static str) + Send + Sync + 'static,
    ) -> Subscription {
        self.property.add_notify_fn(move |name: &&'static str| f(*name))
    }

    /// Union of structural and informational listener counts.
    pub fn count(&self) -> usize {
        self.collection.len() + self.property.len()
    }

    pub fn is_observed(&self) -> bool {
        self.count() > 0
    }

    pub fn notify(&self, diff: &CollectionDiff<T>) {
        self.collection.notify(diff);
    }

    pub fn notify_property(&self, name: &'static str) {
        self.property.notify(&name);
    }

    pub fn dispatch(&self, notification: &Notification<T>) {
        match notification {
            Notification::Collection(diff) => self.notify(diff),
            Notification::Property(name) => self.notify_property(name),
        }
    }

    pub fn dispatch_all(&self, notifications: impl IntoIterator<Item = Notification<T>>) {
        for n in notifications {
            self.dispatch(&n);
        }
    }
}

/// Subscribes to the structural events of `source` on behalf of `target`,
/// without keeping `target` alive.
pub fn observe_source<S, C>(
    source: &dyn LiveView<S>,
    target: &Weak<C>,
    on_change: fn(&C, &CollectionDiff<S>),
) -> Subscription
where
    S: Clone + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    let target = target.clone();
    source.listeners().subscribe(move |diff| {
        if let Some(target) = target.upgrade() {
            on_change(&target, diff);
        }
    })
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
             Activation Gate
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Serializes activation changes of one operator.
///
/// A change requested while another one is in progress (for example a
/// listener attached from inside teardown) only marks the gate dirty;
/// the running pass loops until the observed state is stable.
#[derive(Default)]
pub struct ActivationGate {
    busy: AtomicBool,
    dirty: AtomicBool,
}

impl ActivationGate {
    pub fn run(&self, mut sync: impl FnMut()) {
        self.dirty.store(true, Ordering::SeqCst);
        loop {
            if self.busy.swap(true, Ordering::SeqCst) {
                return;
            }
            while self.dirty.swap(false, Ordering::SeqCst) {
                sync();
            }
            self.busy.store(false, Ordering::SeqCst);
            if !self.dirty.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
              Derived Cache
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Materialized state of an operator, present only while it is observed.
pub struct Cache<S> {
    slot: RwLock<Option<S>>,
    gate: ActivationGate,
}

impl<S> Default for Cache<S> {
    fn default() -> Self {
        Cache::new()
    }
}

impl<S> Cache<S> {
    pub fn new() -> Self {
        Cache {
            slot: RwLock::new(None),
            gate: ActivationGate::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.read().unwrap().is_some()
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.slot.read().unwrap().as_ref().map(f)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.slot.write().unwrap().as_mut().map(f)
    }

    /// Builds or drops the state so that it exists exactly while `observed` holds.
    /// `build` runs without any lock held.
    pub fn sync(&self, name: &'static str, observed: impl Fn() -> bool, build: impl Fn() -> S) {
        self.gate.run(|| {
            let active = self.is_active();
            let wanted = observed();
            if wanted && !active {
                let state = build();
                *self.slot.write().unwrap() = Some(state);
                tracing::debug!(operator = name, "activated");
            } else if !wanted && active {
                let state = self.slot.write().unwrap().take();
                drop(state);
                tracing::debug!(operator = name, "deactivated");
            }
        });
    }

    /// Replaces the state with a freshly built one if currently active.
    /// The previous state is dropped after the new one is in place.
    pub fn rebuild(&self, build: impl FnOnce() -> S) -> bool {
        if !self.is_active() {
            return false;
        }
        let state = build();
        let old = self.slot.write().unwrap().replace(state);
        drop(old);
        true
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
