use {
    crate::view::port::Activation,
    std::sync::{Arc, RwLock, Weak},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Observer
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub trait Observer<M>: Send + Sync {
    fn notify(&self, msg: &M);
}

impl<M, F> Observer<M> for F
where
    F: Fn(&M) + Send + Sync,
{
    fn notify(&self, msg: &M) {
        self(msg);
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Broadcast
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
struct BroadcastState<M> {
    next_id: u64,
    observers: Vec<(u64, Arc<dyn Observer<M>>)>,
    hook: Option<Weak<dyn Activation>>,
}

/// Registry of observers for one kind of message.
///
/// Observers are invoked in registration order, without any lock held,
/// so they are free to subscribe or unsubscribe while being notified.
/// The optional activation hook is told every time the observer count changes.
pub struct Broadcast<M> {
    state: Arc<RwLock<BroadcastState<M>>>,
}

impl<M> Clone for Broadcast<M> {
    fn clone(&self) -> Self {
        Broadcast {
            state: self.state.clone(),
        }
    }
}

impl<M: Send + Sync + 'static> Default for Broadcast<M> {
    fn default() -> Self {
        Broadcast::new()
    }
}

impl<M: Send + Sync + 'static> Broadcast<M> {
    pub fn new() -> Self {
        Broadcast {
            state: Arc::new(RwLock::new(BroadcastState {
                next_id: 0,
                observers: Vec::new(),
                hook: None,
            })),
        }
    }

    pub fn with_hook(hook: Weak<dyn Activation>) -> Self {
        let broadcast = Broadcast::new();
        broadcast.state.write().unwrap().hook = Some(hook);
        broadcast
    }

    pub fn add_observer(&self, obs: Arc<dyn Observer<M>>) -> Subscription {
        let (id, hook) = {
            let mut state = self.state.write().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, obs));
            (id, state.hook.clone())
        };
        fire(hook);

        let state = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                let hook = {
                    let mut state = state.write().unwrap();
                    state.observers.retain(|(i, _)| *i != id);
                    state.hook.clone()
                };
                fire(hook);
            }
        })
    }

    pub fn add_notify_fn(&self, f: impl Fn(&M) + Send + Sync + 'static) -> Subscription {
        self.add_observer(Arc::new(f))
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, msg: &M) {
        let observers: Vec<Arc<dyn Observer<M>>> = self
            .state
            .read()
            .unwrap()
            .observers
            .iter()
            .map(|(_, o)| o.clone())
            .collect();

        for o in observers {
            o.notify(msg);
        }
    }
}

fn fire(hook: Option<Weak<dyn Activation>>) {
    if let Some(hook) = hook.and_then(|h| h.upgrade()) {
        hook.listeners_changed();
    }
}

/// Change notification of a single item.
pub type Signal = Broadcast<()>;

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Subscription
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Keeps an observer registered; dropping it detaches the observer.
#[must_use = "the observer is detached as soon as the subscription is dropped"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Subscription {
            detach: Some(Box::new(detach)),
        }
    }

    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Subscription { detach: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
