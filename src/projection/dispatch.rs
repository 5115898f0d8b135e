use {
    crate::{
        dispatch::DispatchQueue,
        view::{
            port::{observe_source, Activation, Cache},
            CollectionDiff, Item, Listeners, LiveView, SharedView, Subscription, COUNT,
        },
    },
    std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock, Weak,
    },
};

struct DispatchLink {
    _source_sub: Subscription,
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Dispatching
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Redelivers the events of a source view on the context that pumps `queue`.
///
/// While observed it reads from a private copy that only advances when a
/// queued event is delivered, so listeners always see a state that agrees
/// with the events they have received.
pub struct Dispatching<T: Item> {
    weak: Weak<Self>,
    source: SharedView<T>,
    queue: Arc<DispatchQueue>,
    items: RwLock<Vec<T>>,
    epoch: AtomicU64,
    link: Cache<DispatchLink>,
    listeners: Listeners<T>,
}

impl<T: Item> Dispatching<T> {
    pub fn new(source: SharedView<T>, queue: Arc<DispatchQueue>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let hook: Weak<dyn Activation> = weak.clone();
            Dispatching {
                weak: weak.clone(),
                source,
                queue,
                items: RwLock::new(Vec::new()),
                epoch: AtomicU64::new(0),
                link: Cache::new(),
                listeners: Listeners::with_hook(hook),
            }
        })
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    fn build(&self) -> DispatchLink {
        // events still queued from an earlier activation are stale
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let source_sub = observe_source(&*self.source, &self.weak, Self::on_source);
        *self.items.write().unwrap() = self.source.snapshot();
        DispatchLink {
            _source_sub: source_sub,
        }
    }

    fn on_source(&self, diff: &CollectionDiff<T>) {
        let reload = match diff {
            CollectionDiff::Reset => Some(self.source.snapshot()),
            _ => None,
        };
        let diff = diff.clone();
        let epoch = self.epoch.load(Ordering::SeqCst);
        let weak = self.weak.clone();

        self.queue.push(move || {
            if let Some(view) = weak.upgrade() {
                view.deliver(epoch, diff, reload);
            }
        });
    }

    fn deliver(&self, epoch: u64, diff: CollectionDiff<T>, reload: Option<Vec<T>>) {
        if !self.link.is_active() || self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        let resized = {
            let mut items = self.items.write().unwrap();
            let before = items.len();
            diff.apply_to(&mut items, || reload.unwrap_or_default());
            items.len() != before
        };

        self.listeners.notify(&diff);
        if resized || matches!(diff, CollectionDiff::Reset) {
            self.listeners.notify_property(COUNT);
        }
    }
}

impl<T: Item> Activation for Dispatching<T> {
    fn listeners_changed(&self) {
        self.link
            .sync("dispatch", || self.listeners.is_observed(), || self.build());
    }
}

impl<T: Item> LiveView<T> for Dispatching<T> {
    fn len(&self) -> usize {
        if self.link.is_active() {
            self.items.read().unwrap().len()
        } else {
            self.source.len()
        }
    }

    fn get(&self, index: usize) -> Option<T> {
        if self.link.is_active() {
            self.items.read().unwrap().get(index).cloned()
        } else {
            self.source.get(index)
        }
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.listeners
    }

    fn snapshot(&self) -> Vec<T> {
        if self.link.is_active() {
            self.items.read().unwrap().clone()
        } else {
            self.source.snapshot()
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        crate::{
            buffer::vec::ObservableVec,
            dispatch::DispatchQueue,
            projection::{dispatch::*, ProjectionExt},
            view::testing::Recorder,
        },
        std::sync::Arc,
    };

    #[test]
    fn delivers_only_when_pumped() {
        let queue = Arc::new(DispatchQueue::default());
        let source = ObservableVec::with_data(vec![1, 2]);
        let ui = source.dispatch(&queue);
        let rec = Recorder::attach(&ui);

        source.push(3).unwrap();
        source.remove_at(0).unwrap();
        assert!(rec.take().is_empty());
        assert_eq!(ui.snapshot(), vec![1, 2]);

        assert!(!queue.pump());
        assert_eq!(
            rec.take(),
            vec![CollectionDiff::add(2, 3), CollectionDiff::remove(0, 1)]
        );
        assert_eq!(rec.take_properties(), vec![COUNT, COUNT]);
        assert_eq!(ui.snapshot(), vec![2, 3]);
    }

    #[test]
    fn reset_uses_the_state_at_event_time() {
        let queue = Arc::new(DispatchQueue::default());
        let source = ObservableVec::with_data(vec![1]);
        let ui = source.dispatch(&queue);
        let rec = Recorder::attach(&ui);

        source.reset_with(vec![5, 6]).unwrap();
        source.push(7).unwrap();
        queue.pump();

        assert_eq!(rec.take()[0], CollectionDiff::Reset);
        assert_eq!(ui.snapshot(), vec![5, 6, 7]);
    }

    #[test]
    fn stale_events_are_dropped_after_reactivation() {
        let queue = Arc::new(DispatchQueue::default());
        let source = ObservableVec::with_data(vec![1]);
        let ui = source.dispatch(&queue);

        let rec = Recorder::attach(&ui);
        source.push(2).unwrap();
        drop(rec);

        let rec = Recorder::attach(&ui);
        queue.pump();
        assert!(rec.take().is_empty());
        assert_eq!(ui.snapshot(), vec![1, 2]);
    }
}
