use serde::{Deserialize, Serialize};

/// Name of the informational event raised whenever the length of a view changes.
pub const COUNT: &str = "Count";

/// Structural change of an ordered collection.
///
/// Indices always refer to the state of the collection *after* the change
/// has been applied (for `Remove` and `Replace` this is the position the
/// affected run occupied). `Move::new_index` is the final position of the
/// first moved item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionDiff<T> {
    Add {
        index: usize,
        items: Vec<T>,
    },
    Remove {
        index: usize,
        items: Vec<T>,
    },
    Replace {
        index: usize,
        old_items: Vec<T>,
        new_items: Vec<T>,
    },
    Move {
        old_index: usize,
        new_index: usize,
        items: Vec<T>,
    },
    Reset,
}

/// Anything a live view can tell its listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification<T> {
    Collection(CollectionDiff<T>),
    Property(&'static str),
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<T> CollectionDiff<T> {
    pub fn add(index: usize, item: T) -> Self {
        CollectionDiff::Add {
            index,
            items: vec![item],
        }
    }

    pub fn remove(index: usize, item: T) -> Self {
        CollectionDiff::Remove {
            index,
            items: vec![item],
        }
    }

    pub fn replace(index: usize, old_item: T, new_item: T) -> Self {
        CollectionDiff::Replace {
            index,
            old_items: vec![old_item],
            new_items: vec![new_item],
        }
    }

    pub fn moved(old_index: usize, new_index: usize, item: T) -> Self {
        CollectionDiff::Move {
            old_index,
            new_index,
            items: vec![item],
        }
    }

    /// Net change in length caused by this diff, `None` for a reset.
    pub fn len_delta(&self) -> Option<isize> {
        match self {
            CollectionDiff::Add { items, .. } => Some(items.len() as isize),
            CollectionDiff::Remove { items, .. } => Some(-(items.len() as isize)),
            CollectionDiff::Replace {
                old_items,
                new_items,
                ..
            } => Some(new_items.len() as isize - old_items.len() as isize),
            CollectionDiff::Move { .. } => Some(0),
            CollectionDiff::Reset => None,
        }
    }

    /// Same change, positioned `offset` slots further down.
    pub fn shifted(&self, offset: usize) -> Self
    where
        T: Clone,
    {
        match self {
            CollectionDiff::Add { index, items } => CollectionDiff::Add {
                index: index + offset,
                items: items.clone(),
            },
            CollectionDiff::Remove { index, items } => CollectionDiff::Remove {
                index: index + offset,
                items: items.clone(),
            },
            CollectionDiff::Replace {
                index,
                old_items,
                new_items,
            } => CollectionDiff::Replace {
                index: index + offset,
                old_items: old_items.clone(),
                new_items: new_items.clone(),
            },
            CollectionDiff::Move {
                old_index,
                new_index,
                items,
            } => CollectionDiff::Move {
                old_index: old_index + offset,
                new_index: new_index + offset,
                items: items.clone(),
            },
            CollectionDiff::Reset => CollectionDiff::Reset,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> CollectionDiff<U> {
        let mut map_all = |items: &Vec<T>| items.iter().map(&mut f).collect::<Vec<U>>();
        match self {
            CollectionDiff::Add { index, items } => CollectionDiff::Add {
                index: *index,
                items: map_all(items),
            },
            CollectionDiff::Remove { index, items } => CollectionDiff::Remove {
                index: *index,
                items: map_all(items),
            },
            CollectionDiff::Replace {
                index,
                old_items,
                new_items,
            } => CollectionDiff::Replace {
                index: *index,
                old_items: map_all(old_items),
                new_items: map_all(new_items),
            },
            CollectionDiff::Move {
                old_index,
                new_index,
                items,
            } => CollectionDiff::Move {
                old_index: *old_index,
                new_index: *new_index,
                items: map_all(items),
            },
            CollectionDiff::Reset => CollectionDiff::Reset,
        }
    }

    /// Replays the change onto `list`.
    /// A reset replaces the whole content with whatever `reload` returns.
    pub fn apply_to(&self, list: &mut Vec<T>, reload: impl FnOnce() -> Vec<T>)
    where
        T: Clone,
    {
        match self {
            CollectionDiff::Add { index, items } => {
                list.splice(*index..*index, items.iter().cloned());
            }
            CollectionDiff::Remove { index, items } => {
                list.drain(*index..*index + items.len());
            }
            CollectionDiff::Replace {
                index,
                old_items,
                new_items,
            } => {
                list.splice(*index..*index + old_items.len(), new_items.iter().cloned());
            }
            CollectionDiff::Move {
                old_index,
                new_index,
                items,
            } => {
                let run: Vec<T> = list.drain(*old_index..*old_index + items.len()).collect();
                list.splice(*new_index..*new_index, run);
            }
            CollectionDiff::Reset => {
                *list = reload();
            }
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use crate::view::diff::*;

    #[test]
    fn apply_move_forward_and_back() {
        let mut list = vec![0, 1, 2, 3, 4, 5];
        CollectionDiff::Move {
            old_index: 1,
            new_index: 3,
            items: vec![1, 2],
        }
        .apply_to(&mut list, Vec::new);
        assert_eq!(list, vec![0, 3, 4, 1, 2, 5]);

        CollectionDiff::moved(5, 0, 5).apply_to(&mut list, Vec::new);
        assert_eq!(list, vec![5, 0, 3, 4, 1, 2]);
    }

    #[test]
    fn apply_replace_with_different_length() {
        let mut list = vec!['a', 'b', 'c'];
        CollectionDiff::Replace {
            index: 1,
            old_items: vec!['b'],
            new_items: vec!['x', 'y'],
        }
        .apply_to(&mut list, Vec::new);
        assert_eq!(list, vec!['a', 'x', 'y', 'c']);
    }

    #[test]
    fn reset_reloads() {
        let mut list = vec![1, 2, 3];
        CollectionDiff::Reset.apply_to(&mut list, || vec![9]);
        assert_eq!(list, vec![9]);
    }

    #[test]
    fn shifted_and_mapped() {
        let diff = CollectionDiff::Move {
            old_index: 0,
            new_index: 2,
            items: vec![1, 2],
        };
        assert_eq!(
            diff.shifted(3).map(|x| x * 10),
            CollectionDiff::Move {
                old_index: 3,
                new_index: 5,
                items: vec![10, 20]
            }
        );
        assert_eq!(diff.len_delta(), Some(0));
        assert_eq!(CollectionDiff::<u8>::Reset.len_delta(), None);
    }

    #[test]
    fn diff_serializes() {
        let diff = CollectionDiff::add(2, 10u32);
        let json = serde_json::to_string(&diff).unwrap();
        assert_eq!(json, r#"{"Add":{"index":2,"items":[10]}}"#);
        let back: CollectionDiff<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diff);
    }
}
