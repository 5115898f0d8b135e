use {
    crate::buffer::move_vec::MoveVec,
    std::{
        cmp::Ordering,
        collections::HashMap,
        hash::Hash,
        ops::Range,
        sync::atomic::{self, AtomicU64},
    },
};

/// Surrogate position of a tracked item.
pub type OrderKey = u64;

/// Order keys of tracked source items.
///
/// Keys grow strictly along the source order. New items take evenly
/// spaced keys inside the gap between their neighbours; when that gap is
/// too narrow every key is regenerated across the full key space.
#[derive(Clone, Debug)]
pub struct OrderIndex<I> {
    keys: HashMap<I, OrderKey>,
    regenerations: usize,
}

/// Largest step taken into an open-ended gap.
const OPEN_STEP: u128 = 1 << 40;

/// `count` increasing keys strictly between `lo` and `hi`.
/// Open bounds stand for the ends of the key space.
pub fn spread(lo: Option<OrderKey>, hi: Option<OrderKey>, count: usize) -> Option<Vec<OrderKey>> {
    let slots = count as u128 + 1;
    let low = lo.map_or(0u128, u128::from);
    let high = hi.map_or(OrderKey::MAX as u128, u128::from);

    if high <= low || high - low < slots {
        return None;
    }

    let even = (high - low) / slots;
    let keys = match (lo, hi) {
        (Some(_), None) => {
            let step = even.min(OPEN_STEP);
            (1..slots).map(|i| low + i * step).collect()
        }
        (None, Some(_)) => {
            let step = even.min(OPEN_STEP);
            (1..slots).map(|i| high - (slots - i) * step).collect()
        }
        _ => (1..slots).map(|i| low + i * even).collect::<Vec<u128>>(),
    };
    Some(keys.into_iter().map(|k: u128| k as OrderKey).collect())
}

impl<I> Default for OrderIndex<I>
where
    I: Hash + Eq + Clone,
{
    fn default() -> Self {
        OrderIndex::new()
    }
}

impl<I> OrderIndex<I>
where
    I: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        OrderIndex {
            keys: HashMap::new(),
            regenerations: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, id: &I) -> Option<OrderKey> {
        self.keys.get(id).copied()
    }

    pub fn remove(&mut self, id: &I) -> Option<OrderKey> {
        self.keys.remove(id)
    }

    pub fn contains(&self, id: &I) -> bool {
        self.keys.contains_key(id)
    }

    /// Number of fallback regenerations since creation.
    pub fn regenerations(&self) -> usize {
        self.regenerations
    }

    /// Assigns evenly spaced keys to the whole sequence, in order.
    pub fn respace(&mut self, ids: impl IntoIterator<Item = I>) {
        let ids: Vec<I> = ids.into_iter().collect();
        self.keys.clear();
        self.keys.reserve(ids.len());

        if let Some(keys) = spread(None, None, ids.len()) {
            self.keys.extend(ids.into_iter().zip(keys));
        }
    }

    /// Like `respace`, but counted as a regeneration caused by an exhausted gap.
    pub fn regenerate(&mut self, ids: impl IntoIterator<Item = I>) {
        self.respace(ids);
        self.regenerations += 1;
        tracing::trace!(tracked = self.keys.len(), "order keys regenerated");
    }

    /// Places `ids` strictly between the keys `lo` and `hi`.
    /// Returns false, assigning nothing, when the gap is too narrow.
    pub fn assign_between(&mut self, ids: &[I], lo: Option<OrderKey>, hi: Option<OrderKey>) -> bool {
        match spread(lo, hi, ids.len()) {
            Some(keys) => {
                self.keys.extend(ids.iter().cloned().zip(keys));
                true
            }
            None => false,
        }
    }

    /// Keys the run `ids`, which now sits between the tracked items
    /// `before` and `after`. Regenerates everything from `all` (the full
    /// tracked sequence, in order) when the run does not fit.
    pub fn place(
        &mut self,
        ids: &[I],
        before: Option<&I>,
        after: Option<&I>,
        all: impl FnOnce() -> Vec<I>,
    ) {
        let lo = before.map(|id| self.get(id));
        let hi = after.map(|id| self.get(id));
        let placed = match (lo, hi) {
            (Some(None), _) | (_, Some(None)) => false,
            (lo, hi) => self.assign_between(ids, lo.flatten(), hi.flatten()),
        };
        if !placed {
            self.regenerate(all());
        }
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Source Slots
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Handle of one source position. It follows its item through moves.
pub type Slot = u64;

/// Hands out fresh slot handles.
#[derive(Debug, Default)]
pub struct SlotCounter(AtomicU64);

impl SlotCounter {
    pub fn take(&self, count: usize) -> Vec<Slot> {
        let start = self.0.fetch_add(count as u64, atomic::Ordering::Relaxed);
        (start..start + count as u64).collect()
    }
}

/// Slots of every source position, in source order, with their order keys.
///
/// Repeated items occupy slots of their own, so every occurrence is keyed
/// and located separately.
#[derive(Clone, Debug)]
pub struct SourceSlots {
    slots: MoveVec<Slot>,
    order: OrderIndex<Slot>,
}

impl SourceSlots {
    pub fn new(slots: Vec<Slot>) -> Self {
        let mut order = OrderIndex::new();
        order.respace(slots.iter().copied());
        SourceSlots {
            slots: slots.into(),
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<Slot> {
        self.slots.get(index).copied()
    }

    /// The slots of the positions `index .. index + count`.
    pub fn run(&self, index: usize, count: usize) -> Vec<Slot> {
        self.slots
            .get(index..index.saturating_add(count))
            .map(<[Slot]>::to_vec)
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<Slot> {
        self.slots.to_vec()
    }

    pub fn key(&self, slot: Slot) -> Option<OrderKey> {
        self.order.get(&slot)
    }

    pub fn regenerations(&self) -> usize {
        self.order.regenerations()
    }

    /// Opens `run` at source position `index` and keys it.
    pub fn insert(&mut self, index: usize, run: &[Slot]) {
        match self.slots.insert_range(index, run.iter().copied()) {
            Ok(()) => self.rekey(index, run.len()),
            Err(err) => tracing::warn!(%err, "slots out of step with the source"),
        }
    }

    /// Closes `count` positions at `index`.
    /// The keys of the closed slots stay readable until they are released.
    pub fn remove(&mut self, index: usize, count: usize) -> Vec<Slot> {
        self.slots.remove_range(index, count).unwrap_or_else(|err| {
            tracing::warn!(%err, "slots out of step with the source");
            Vec::new()
        })
    }

    pub fn release(&mut self, slots: &[Slot]) {
        for slot in slots {
            self.order.remove(slot);
        }
    }

    /// Moves `count` positions from `old_index` to `new_index` and rekeys them.
    pub fn relocate(&mut self, old_index: usize, new_index: usize, count: usize) -> Vec<Slot> {
        let run = self.run(old_index, count);
        if let Err(err) = self.slots.move_range(old_index, new_index, count) {
            tracing::warn!(%err, "slots out of step with the source");
            return Vec::new();
        }
        self.release(&run);
        self.rekey(new_index, count);
        run
    }

    fn rekey(&mut self, index: usize, count: usize) {
        let run = self.run(index, count);
        let before = index.checked_sub(1).and_then(|i| self.slot(i));
        let after = self.slot(index + count);
        let slots = &self.slots;
        self.order
            .place(&run, before.as_ref(), after.as_ref(), || slots.to_vec());
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Binary search over `len` slots, skipping the slots in `skip`.
///
/// `cmp(i)` orders the element at real index `i` against the target.
/// Both `Ok` and `Err` positions are counted as if the skipped slots
/// were absent, which is exactly the destination index of the skipped run
/// once it has been relocated.
pub fn binary_search(
    len: usize,
    skip: Option<Range<usize>>,
    mut cmp: impl FnMut(usize) -> Ordering,
) -> Result<usize, usize> {
    let (skip_start, skip_len) = skip.map_or((usize::MAX, 0), |r| (r.start, r.len()));
    let mut low = 0;
    let mut high = len.saturating_sub(skip_len);

    while low < high {
        let mid = low + (high - low) / 2;
        let real = if mid >= skip_start { mid + skip_len } else { mid };
        match cmp(real) {
            Ordering::Equal => return Ok(mid),
            Ordering::Less => low = mid + 1,
            Ordering::Greater => high = mid,
        }
    }
    Err(low)
}

/// Position of `key` in a sequence ordered by `key_of`.
pub fn search_key<E>(
    items: &[E],
    key: OrderKey,
    skip: Option<Range<usize>>,
    key_of: impl Fn(&E) -> OrderKey,
) -> Result<usize, usize> {
    binary_search(items.len(), skip, |i| key_of(&items[i]).cmp(&key))
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
