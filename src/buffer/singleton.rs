use {
    crate::view::{Identity, Notifying, Signal},
    std::{
        ops::{Deref, DerefMut},
        sync::{Arc, RwLock},
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Shared mutable value that announces its own changes.
///
/// Clones refer to the same value; identity is the shared allocation,
/// so two cells holding equal values are still different items.
pub struct ItemCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    value: Arc<RwLock<T>>,
    signal: Signal,
}

impl<T> Clone for ItemCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        ItemCell {
            value: self.value.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<T> ItemCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        ItemCell {
            value: Arc::new(RwLock::new(value)),
            signal: Signal::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.read().unwrap().clone()
    }

    pub fn set(&self, new_value: T) {
        let mut v = self.value.write().unwrap();
        *v = new_value;
        drop(v);
        self.signal.notify(&());
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut v = self.value.write().unwrap();
        f(&mut v);
        drop(v);
        self.signal.notify(&());
    }

    pub fn get_mut(&self) -> MutableCellAccess<T> {
        MutableCellAccess {
            cell: self.clone(),
            val: self.get(),
        }
    }
}

impl<T> Notifying for ItemCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn signal(&self) -> &Signal {
        &self.signal
    }
}

impl<T> Identity for ItemCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Id = usize;

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.value) as *const () as usize
    }
}

impl<T> std::fmt::Debug for ItemCell<T>
where
    T: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ItemCell").field(&self.get()).finish()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Write guard; the new value is stored and announced on drop.
pub struct MutableCellAccess<T>
where
    T: Clone + Send + Sync + 'static,
{
    cell: ItemCell<T>,
    val: T,
}

impl<T> Deref for MutableCellAccess<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Target = T;

    fn deref(&self) -> &T {
        &self.val
    }
}

impl<T> DerefMut for MutableCellAccess<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.val
    }
}

impl<T> Drop for MutableCellAccess<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cell.set(self.val.clone());
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        crate::buffer::singleton::*,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn item_cell1() {
        let cell = ItemCell::<char>::new('a');
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let _sub = cell.signal().add_notify_fn(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(cell.get(), 'a');

        *cell.get_mut() = 'b';
        assert_eq!(cell.get(), 'b');

        cell.update(|c| *c = 'c');
        assert_eq!(cell.clone().get(), 'c');
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn identity_is_the_allocation() {
        let a = ItemCell::new(1);
        let b = ItemCell::new(1);
        assert_eq!(a.identity(), a.clone().identity());
        assert_ne!(a.identity(), b.identity());
    }
}
