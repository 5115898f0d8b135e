use {
    crate::{
        buffer::move_vec::MoveVec,
        error::{Error, Result},
        view::{CollectionDiff, Item, Listeners, LiveView, COUNT},
    },
    std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

struct VecCore<T: Item> {
    data: RwLock<MoveVec<T>>,
    listeners: Listeners<T>,
    dispatching: AtomicBool,
}

/// Mutable source collection.
///
/// Every successful mutation updates the data first, then emits exactly one
/// structural event followed by a `Count` event if the length changed.
/// Mutating the collection from inside one of its own listeners is rejected.
#[derive(Clone)]
pub struct ObservableVec<T: Item> {
    core: Arc<VecCore<T>>,
}

struct DispatchGuard<'a>(&'a AtomicBool);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<T: Item> Default for ObservableVec<T> {
    fn default() -> Self {
        ObservableVec::new()
    }
}

impl<T: Item> ObservableVec<T> {
    pub fn new() -> Self {
        ObservableVec::with_data(Vec::new())
    }

    pub fn with_data(data: Vec<T>) -> Self {
        ObservableVec {
            core: Arc::new(VecCore {
                data: RwLock::new(MoveVec::from(data)),
                listeners: Listeners::new(),
                dispatching: AtomicBool::new(false),
            }),
        }
    }

    fn apply<R>(
        &self,
        f: impl FnOnce(&mut MoveVec<T>) -> Result<(R, Option<CollectionDiff<T>>)>,
    ) -> Result<R> {
        if self.core.dispatching.load(Ordering::SeqCst) {
            return Err(Error::ReentrantMutation);
        }

        let mut data = self.core.data.write().unwrap();
        let old_len = data.len();
        let (ret, diff) = f(&mut data)?;
        let new_len = data.len();
        drop(data);

        if let Some(diff) = diff {
            self.core.dispatching.store(true, Ordering::SeqCst);
            let _guard = DispatchGuard(&self.core.dispatching);

            self.core.listeners.notify(&diff);
            if old_len != new_len {
                self.core.listeners.notify_property(COUNT);
            }
        }
        Ok(ret)
    }

    pub fn push(&self, item: T) -> Result<()> {
        self.apply(|data| {
            let index = data.len();
            data.push(item.clone());
            Ok(((), Some(CollectionDiff::add(index, item))))
        })
    }

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.apply(|data| {
            data.insert(index, item.clone())?;
            Ok(((), Some(CollectionDiff::add(index, item))))
        })
    }

    pub fn insert_range(&self, index: usize, items: impl IntoIterator<Item = T>) -> Result<()> {
        let items: Vec<T> = items.into_iter().collect();
        self.apply(|data| {
            if items.is_empty() {
                return Ok(((), None));
            }
            data.insert_range(index, items.iter().cloned())?;
            Ok(((), Some(CollectionDiff::Add { index, items })))
        })
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        let index = self.len();
        self.insert_range(index, items)
    }

    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.apply(|data| {
            let item = data.remove(index)?;
            Ok((item.clone(), Some(CollectionDiff::remove(index, item))))
        })
    }

    pub fn remove_range(&self, index: usize, count: usize) -> Result<Vec<T>> {
        self.apply(|data| {
            let items = data.remove_range(index, count)?;
            let diff = (!items.is_empty()).then(|| CollectionDiff::Remove {
                index,
                items: items.clone(),
            });
            Ok((items, diff))
        })
    }

    /// Removes the first item equal to `item`.
    pub fn remove(&self, item: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.apply(|data| match data.iter().position(|x| x == item) {
            Some(index) => {
                let item = data.remove(index)?;
                Ok((true, Some(CollectionDiff::remove(index, item))))
            }
            None => Ok((false, None)),
        })
    }

    pub fn replace(&self, index: usize, item: T) -> Result<T> {
        self.apply(|data| {
            let old = data.set(index, item.clone())?;
            Ok((old.clone(), Some(CollectionDiff::replace(index, old, item))))
        })
    }

    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.apply(|data| {
            data.move_item(old_index, new_index)?;
            let diff = (old_index != new_index)
                .then(|| data.get(new_index).cloned())
                .flatten()
                .map(|item| CollectionDiff::moved(old_index, new_index, item));
            Ok(((), diff))
        })
    }

    pub fn move_range(&self, old_index: usize, new_index: usize, count: usize) -> Result<()> {
        self.apply(|data| {
            data.move_range(old_index, new_index, count)?;
            let diff = (old_index != new_index && count > 0).then(|| CollectionDiff::Move {
                old_index,
                new_index,
                items: data[new_index..new_index + count].to_vec(),
            });
            Ok(((), diff))
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.apply(|data| {
            if data.is_empty() {
                return Ok(((), None));
            }
            data.clear();
            Ok(((), Some(CollectionDiff::Reset)))
        })
    }

    /// Replaces the whole content and announces it as a reset.
    pub fn reset_with(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        let items: MoveVec<T> = items.into_iter().collect();
        self.apply(|data| {
            *data = items;
            Ok(((), Some(CollectionDiff::Reset)))
        })
    }
}

impl<T: Item> FromIterator<T> for ObservableVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ObservableVec::with_data(iter.into_iter().collect())
    }
}

impl<T: Item> LiveView<T> for ObservableVec<T> {
    fn len(&self) -> usize {
        self.core.data.read().unwrap().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.core.data.read().unwrap().get(index).cloned()
    }

    fn listeners(&self) -> &Listeners<T> {
        &self.core.listeners
    }

    fn snapshot(&self) -> Vec<T> {
        self.core.data.read().unwrap().to_vec()
    }

    fn set(&self, index: usize, item: T) -> Result<()> {
        self.replace(index, item).map(|_| ())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
