use {
    crate::error::{Error, Result},
    std::ops::Deref,
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Growable array with first-class relocation of single items and runs.
///
/// Relocations only touch the slots between the old and the new position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveVec<T> {
    items: Vec<T>,
}

fn out_of_range(index: usize, len: usize) -> Error {
    Error::IndexOutOfRange { index, len }
}

impl<T> MoveVec<T> {
    pub fn new() -> Self {
        MoveVec { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MoveVec {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Overwrites the item at `index`, returning the previous one.
    pub fn set(&mut self, index: usize, item: T) -> Result<T> {
        let len = self.items.len();
        let slot = self.items.get_mut(index).ok_or(out_of_range(index, len))?;
        Ok(std::mem::replace(slot, item))
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn insert(&mut self, index: usize, item: T) -> Result<()> {
        if index > self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }
        self.items.insert(index, item);
        Ok(())
    }

    pub fn insert_range(&mut self, index: usize, items: impl IntoIterator<Item = T>) -> Result<()> {
        if index > self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }
        self.items.splice(index..index, items);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<T> {
        if index >= self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }
        Ok(self.items.remove(index))
    }

    pub fn remove_range(&mut self, index: usize, count: usize) -> Result<Vec<T>> {
        let len = self.items.len();
        let end = index.checked_add(count).filter(|end| *end <= len);
        match end {
            Some(end) => Ok(self.items.drain(index..end).collect()),
            None => Err(out_of_range(index.saturating_add(count), len)),
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Moves the item at `old_index` so that it ends up at `new_index`.
    ///
    /// Neighbours are swapped; otherwise only the span in between shifts by one.
    pub fn move_item(&mut self, old_index: usize, new_index: usize) -> Result<()> {
        let len = self.items.len();
        if old_index >= len {
            return Err(out_of_range(old_index, len));
        }
        if new_index >= len {
            return Err(out_of_range(new_index, len));
        }

        if old_index.abs_diff(new_index) == 1 {
            self.items.swap(old_index, new_index);
        } else if old_index < new_index {
            self.items[old_index..=new_index].rotate_left(1);
        } else if new_index < old_index {
            self.items[new_index..=old_index].rotate_right(1);
        }
        Ok(())
    }

    /// Moves the run `old_index .. old_index + count` so that it starts at `new_index`.
    ///
    /// The rotation only covers the run and the gap it crosses; a one-slot
    /// shift degenerates to a single pass over the run.
    pub fn move_range(&mut self, old_index: usize, new_index: usize, count: usize) -> Result<()> {
        let len = self.items.len();
        if old_index.checked_add(count).map_or(true, |end| end > len) {
            return Err(out_of_range(old_index.saturating_add(count), len));
        }
        if new_index.checked_add(count).map_or(true, |end| end > len) {
            return Err(out_of_range(new_index.saturating_add(count), len));
        }

        if count == 0 || old_index == new_index {
            return Ok(());
        }
        if count == 1 {
            return self.move_item(old_index, new_index);
        }

        if new_index + 1 == old_index {
            self.items[new_index..old_index + count].rotate_left(1);
        } else if old_index + 1 == new_index {
            self.items[old_index..new_index + count].rotate_right(1);
        } else if new_index < old_index {
            self.items[new_index..old_index + count].rotate_left(old_index - new_index);
        } else {
            self.items[old_index..new_index + count].rotate_right(new_index - old_index);
        }
        Ok(())
    }
}

impl<T> Default for MoveVec<T> {
    fn default() -> Self {
        MoveVec::new()
    }
}

impl<T> Deref for MoveVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> From<Vec<T>> for MoveVec<T> {
    fn from(items: Vec<T>) -> Self {
        MoveVec { items }
    }
}

impl<T> FromIterator<T> for MoveVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        MoveVec {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for MoveVec<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
