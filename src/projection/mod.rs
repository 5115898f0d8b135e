pub mod order_index;

pub mod cast;
pub mod concat;
pub mod dispatch;
pub mod filter;
pub mod group;
pub mod map;
pub mod of_type;
pub mod sort;
pub mod split_events;
pub mod window;

use {
    crate::{
        compare::{Comparer, NaturalOrder, PropertyComparer},
        dispatch::DispatchQueue,
        view::{Identity, Item, LiveView, SharedView},
    },
    std::{any::Any, sync::Arc},
};

pub use {
    cast::Cast,
    concat::Concat,
    dispatch::Dispatching,
    filter::{Filter, OfType},
    group::{Group, GroupBy, GroupKey},
    map::Map,
    of_type::AnyItem,
    sort::Sort,
    split_events::SplitEvents,
    window::Window,
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
              Projection Ext
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Operator constructors available on every live view handle.
///
/// Each operator holds its own shared copy of the handle it was built from.
pub trait ProjectionExt<T: Item>: LiveView<T> + Clone + Sized + 'static {
    fn shared(&self) -> SharedView<T> {
        Arc::new(self.clone())
    }

    fn filter(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Arc<Filter<T>> {
        Filter::new(self.shared(), predicate)
    }

    /// Keeps the items `f` accepts, as whatever `f` turns them into.
    fn narrow<U: Item>(
        &self,
        f: impl Fn(&T) -> Option<U> + Send + Sync + 'static,
    ) -> Arc<OfType<T, U>> {
        Filter::with_selector(self.shared(), Arc::new(f))
    }

    fn sort(&self) -> Arc<Sort<T>>
    where
        T: Identity + Ord,
    {
        Sort::new(self.shared(), Arc::new(NaturalOrder))
    }

    fn sort_by(&self, comparer: Comparer<T>) -> Arc<Sort<T>>
    where
        T: Identity,
    {
        Sort::new(self.shared(), comparer)
    }

    fn order_by<K: Ord + 'static>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Arc<Sort<T>>
    where
        T: Identity,
    {
        Sort::new(self.shared(), Arc::new(PropertyComparer::new(key)))
    }

    fn order_by_descending<K: Ord + 'static>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Arc<Sort<T>>
    where
        T: Identity,
    {
        Sort::new(self.shared(), Arc::new(PropertyComparer::descending(key)))
    }

    fn group_by<K: GroupKey>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Arc<GroupBy<K, T>>
    where
        T: Identity,
    {
        GroupBy::new(self.shared(), Arc::new(key))
    }

    fn map<U: Item>(&self, f: impl Fn(&T) -> U + Send + Sync + 'static) -> Arc<Map<T, U>> {
        Map::new(self.shared(), Arc::new(f))
    }

    fn concat(&self, other: impl LiveView<T> + 'static) -> Arc<Concat<T>> {
        Concat::new(self.shared(), Arc::new(other))
    }

    fn window(&self, skip: usize, take: Option<usize>) -> Arc<Window<T>> {
        Window::new(self.shared(), skip, take)
    }

    fn skip(&self, count: usize) -> Arc<Window<T>> {
        self.window(count, None)
    }

    fn take(&self, count: usize) -> Arc<Window<T>> {
        self.window(0, Some(count))
    }

    fn split_events(&self) -> Arc<SplitEvents<T>> {
        SplitEvents::new(self.shared())
    }

    fn cast<U: Item>(&self) -> Arc<Cast<T, U>>
    where
        T: Into<U>,
    {
        Cast::new(self.shared(), Arc::new(|x: &T| x.clone().into()))
    }

    fn cast_with<U: Item>(&self, f: impl Fn(&T) -> U + Send + Sync + 'static) -> Arc<Cast<T, U>> {
        Cast::new(self.shared(), Arc::new(f))
    }

    /// Re-emits this view's events on the context that pumps `queue`.
    fn dispatch(&self, queue: &Arc<DispatchQueue>) -> Arc<Dispatching<T>> {
        Dispatching::new(self.shared(), queue.clone())
    }
}

impl<T: Item, V: LiveView<T> + Clone + 'static> ProjectionExt<T> for V {}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub trait AnyViewExt: ProjectionExt<AnyItem> {
    /// The items that are a `U`.
    fn of_type<U: Any + Send + Sync>(&self) -> Arc<OfType<AnyItem, Arc<U>>> {
        Filter::with_selector(self.shared(), of_type::downcast::<U>())
    }
}

impl<V: ProjectionExt<AnyItem>> AnyViewExt for V {}
