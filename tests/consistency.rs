use {
    livelinq::{
        prelude::*,
        projection::{Group, GroupKey},
    },
    proptest::prelude::*,
    std::{
        collections::HashSet,
        sync::{Arc, Mutex, Once},
    },
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[derive(Clone, Debug)]
enum Op {
    Push,
    Insert(usize),
    InsertRange(usize, usize),
    /// inserts another copy of an item already in the source
    Repeat(usize, usize),
    RemoveAt(usize),
    RemoveRange(usize, usize),
    Move(usize, usize, usize),
    Replace(usize),
    Reset(usize),
    Clear,
    SwapTail,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Push),
        4 => any::<usize>().prop_map(Op::Insert),
        2 => (any::<usize>(), 1..4usize).prop_map(|(i, n)| Op::InsertRange(i, n)),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(i, j)| Op::Repeat(i, j)),
        3 => any::<usize>().prop_map(Op::RemoveAt),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(i, n)| Op::RemoveRange(i, n)),
        2 => (any::<usize>(), any::<usize>(), any::<usize>()).prop_map(|(a, b, n)| Op::Move(a, b, n)),
        2 => any::<usize>().prop_map(Op::Replace),
        1 => (0..6usize).prop_map(Op::Reset),
        1 => Just(Op::Clear),
        1 => Just(Op::SwapTail),
    ]
}

/// Distinct values in a scrambled order.
struct Fresh(u32);

impl Fresh {
    fn next(&mut self) -> u32 {
        self.0 += 1;
        (self.0 * 7919) % 100_003
    }
}

fn apply<T: Item>(source: &ObservableVec<T>, op: &Op, mut make: impl FnMut() -> T) -> Result<()> {
    let len = source.len();
    let mut take = |n: usize| (0..n).map(|_| make()).collect::<Vec<T>>();
    match op {
        Op::Push => source.push(take(1).remove(0)),
        Op::Insert(i) => source.insert(i % (len + 1), take(1).remove(0)),
        Op::InsertRange(i, n) => source.insert_range(i % (len + 1), take(*n)),
        Op::Repeat(i, j) if len > 0 => match source.get(i % len) {
            Some(copy) => source.insert(j % (len + 1), copy),
            None => Ok(()),
        },
        Op::RemoveAt(i) if len > 0 => source.remove_at(i % len).map(drop),
        Op::RemoveRange(i, n) if len > 0 => {
            let at = i % len;
            source.remove_range(at, 1 + n % (len - at)).map(drop)
        }
        Op::Move(a, b, n) if len > 0 => {
            let count = 1 + n % len;
            let slots = len - count + 1;
            source.move_range(a % slots, b % slots, count)
        }
        Op::Replace(i) if len > 0 => source.replace(i % len, take(1).remove(0)).map(drop),
        Op::Reset(n) => source.reset_with(take(*n)),
        Op::Clear => source.clear(),
        _ => Ok(()),
    }
}

/// Replays every event of a view onto a plain list.
struct Mirror<T> {
    list: Arc<Mutex<Vec<T>>>,
    _sub: Subscription,
}

impl<T: Item> Mirror<T> {
    fn attach(view: SharedView<T>) -> Self {
        let list = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let list = list.clone();
            let weak = Arc::downgrade(&view);
            view.observe(move |diff| {
                let reload = || weak.upgrade().map(|v| v.snapshot()).unwrap_or_default();
                diff.apply_to(&mut list.lock().unwrap(), reload);
            })
        };
        *list.lock().unwrap() = view.snapshot();
        Mirror { list, _sub: sub }
    }

    fn get(&self) -> Vec<T> {
        self.list.lock().unwrap().clone()
    }
}

/// Groups by key; new groups are appended, so their order is creation order.
fn layout<K: GroupKey + Ord, T: Item, V>(
    groups: &[Arc<Group<K, T>>],
    value: impl Fn(&T) -> V,
) -> Vec<(K, Vec<V>)> {
    let mut layout: Vec<(K, Vec<V>)> = groups
        .iter()
        .map(|g| (g.key().clone(), g.snapshot().iter().map(&value).collect()))
        .collect();
    layout.sort_by(|a, b| a.0.cmp(&b.0));
    layout
}

/// Each identity grouped once, at its first occurrence.
fn partition<T: Identity, K: Ord + Clone, V>(
    items: &[T],
    key: impl Fn(&T) -> K,
    value: impl Fn(&T) -> V,
) -> Vec<(K, Vec<V>)> {
    let mut seen = HashSet::new();
    let mut out: Vec<(K, Vec<V>)> = Vec::new();
    for item in items.iter().filter(|x| seen.insert(x.identity())) {
        let k = key(item);
        match out.iter_mut().find(|(key, _)| *key == k) {
            Some((_, run)) => run.push(value(item)),
            None => out.push((k, vec![value(item)])),
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn values(cells: &[ItemCell<u32>]) -> Vec<u32> {
    cells.iter().map(ItemCell::get).collect()
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[derive(Clone, Debug)]
enum CellOp {
    Structural(Op),
    Set(usize, u32),
}

fn cell_op() -> impl Strategy<Value = CellOp> {
    prop_oneof![
        3 => op().prop_map(CellOp::Structural),
        2 => (any::<usize>(), 0..20u32).prop_map(|(i, v)| CellOp::Set(i, v)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn derived_views_match_a_fresh_derivation(
        initial in 0..12usize,
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        init_tracing();

        let mut fresh = Fresh(0);
        let source = ObservableVec::with_data((0..initial).map(|_| fresh.next()).collect());
        let tails = [
            ObservableVec::with_data(vec![1_000_000u32, 1_000_001]),
            ObservableVec::with_data(vec![2_000_000u32]),
        ];
        let mut tail = 0;
        let queue = Arc::new(DispatchQueue::default());

        let evens = source.filter(|x: &u32| x % 2 == 0);
        let thirds = source.narrow(|x: &u32| (x % 3 == 0).then(|| x / 3));
        let sorted = source.sort();
        let by_digit = source.order_by(|x: &u32| x % 10);
        let doubled = source.map(|x: &u32| u64::from(*x) * 2);
        let both = source.concat(tails[0].clone());
        let window = source.window(2, Some(5));
        let singles = source.split_events();
        let groups = source.group_by(|x: &u32| x % 4);
        let relayed = source.dispatch(&queue);

        let mirrors = (
            Mirror::attach(evens.shared()),
            Mirror::attach(thirds.shared()),
            Mirror::attach(sorted.shared()),
            Mirror::attach(by_digit.shared()),
            Mirror::attach(both.shared()),
            Mirror::attach(window.shared()),
            Mirror::attach(singles.shared()),
            Mirror::attach(relayed.shared()),
        );
        let doubled_mirror = Mirror::attach(doubled.shared());
        let group_mirror = Mirror::attach(groups.shared());

        for op in &ops {
            if let Op::SwapTail = op {
                tail = 1 - tail;
                both.set_second(tails[tail].shared());
            }
            apply(&source, op, || fresh.next()).unwrap();
            while queue.pump() {}

            let items = source.snapshot();

            let expected: Vec<u32> = items.iter().copied().filter(|x| x % 2 == 0).collect();
            prop_assert_eq!(evens.snapshot(), expected.clone());
            prop_assert_eq!(mirrors.0.get(), expected);

            let expected: Vec<u32> =
                items.iter().filter_map(|x| (x % 3 == 0).then(|| x / 3)).collect();
            prop_assert_eq!(thirds.snapshot(), expected.clone());
            prop_assert_eq!(mirrors.1.get(), expected);

            let mut expected = items.clone();
            expected.sort();
            prop_assert_eq!(sorted.snapshot(), expected.clone());
            prop_assert_eq!(mirrors.2.get(), expected);

            let mut expected = items.clone();
            expected.sort_by_key(|x| (x % 10, *x));
            prop_assert_eq!(by_digit.snapshot(), expected.clone());
            prop_assert_eq!(mirrors.3.get(), expected);

            let mut expected = items.clone();
            expected.extend(tails[tail].snapshot());
            prop_assert_eq!(both.snapshot(), expected.clone());
            prop_assert_eq!(mirrors.4.get(), expected);

            let expected: Vec<u32> = items.iter().copied().skip(2).take(5).collect();
            prop_assert_eq!(window.snapshot(), expected.clone());
            prop_assert_eq!(mirrors.5.get(), expected);

            prop_assert_eq!(mirrors.6.get(), items.clone());

            prop_assert_eq!(relayed.snapshot(), items.clone());
            prop_assert_eq!(mirrors.7.get(), items.clone());

            let expected: Vec<u64> = items.iter().map(|x| u64::from(*x) * 2).collect();
            prop_assert_eq!(doubled.snapshot(), expected.clone());
            prop_assert_eq!(doubled_mirror.get(), expected);

            let expected = partition(&items, |x| x % 4, |x| *x);
            prop_assert_eq!(layout(&groups.snapshot(), |x| *x), expected.clone());
            prop_assert_eq!(layout(&group_mirror.get(), |x| *x), expected);
        }
    }

    #[test]
    fn watched_cells_match_a_fresh_derivation(
        initial in 0..10usize,
        ops in proptest::collection::vec(cell_op(), 1..40),
    ) {
        init_tracing();

        let mut fresh = Fresh(0);
        let mut cell = move || ItemCell::new(fresh.next() % 20);
        let source = ObservableVec::with_data((0..initial).map(|_| cell()).collect());

        let evens = source
            .filter(|c: &ItemCell<u32>| c.get() % 2 == 0)
            .watch_items(Watcher::notifying());
        let thirds = source
            .narrow(|c: &ItemCell<u32>| (c.get() % 3 == 0).then(|| c.get() / 3))
            .watch_items(Watcher::notifying());
        let ranked = source
            .order_by(|c: &ItemCell<u32>| c.get())
            .watch_items(Watcher::notifying());
        let groups = source
            .group_by(|c: &ItemCell<u32>| c.get() % 3)
            .watch_items(Watcher::notifying());

        let evens_mirror = Mirror::attach(evens.shared());
        let thirds_mirror = Mirror::attach(thirds.shared());
        let ranked_mirror = Mirror::attach(ranked.shared());
        let group_mirror = Mirror::attach(groups.shared());

        for op in &ops {
            match op {
                CellOp::Structural(op) => apply(&source, op, &mut cell).unwrap(),
                CellOp::Set(i, v) => {
                    let len = source.len();
                    if let Some(c) = source.get(i % len.max(1)) {
                        c.set(*v);
                    }
                }
            }

            let cells = source.snapshot();
            let now = values(&cells);

            let expected: Vec<u32> = now.iter().copied().filter(|x| x % 2 == 0).collect();
            prop_assert_eq!(values(&evens.snapshot()), expected.clone());
            prop_assert_eq!(values(&evens_mirror.get()), expected);

            let expected: Vec<u32> =
                now.iter().filter_map(|x| (x % 3 == 0).then(|| x / 3)).collect();
            prop_assert_eq!(thirds.snapshot(), expected.clone());
            prop_assert_eq!(thirds_mirror.get(), expected);

            let mut expected = now.clone();
            expected.sort();
            prop_assert_eq!(values(&ranked.snapshot()), expected.clone());
            prop_assert_eq!(values(&ranked_mirror.get()), expected);

            let expected = partition(&cells, |c| c.get() % 3, ItemCell::get);
            prop_assert_eq!(layout(&groups.snapshot(), ItemCell::get), expected.clone());
            prop_assert_eq!(layout(&group_mirror.get(), ItemCell::get), expected);
        }
    }

    #[test]
    fn random_inserts_rarely_regenerate(values in proptest::collection::hash_set(any::<u32>(), 1000)) {
        let source = ObservableVec::new();
        let sorted = source.sort();
        let _mirror = Mirror::attach(sorted.shared());

        for v in values {
            source.push(v).unwrap();
        }
        prop_assert!(sorted.order_regenerations() <= 4);
        prop_assert_eq!(sorted.len(), 1000);
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[test]
fn single_add_yields_single_add() {
    let source = ObservableVec::with_data(vec![1u32, 6, 10]);
    let sorted = source.sort();
    let events = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let events = events.clone();
        sorted.observe(move |diff| events.lock().unwrap().push(diff.clone()))
    };

    source.push(100).unwrap();
    assert_eq!(*events.lock().unwrap(), vec![CollectionDiff::add(3, 100)]);
}

#[test]
fn dormant_views_do_not_subscribe() {
    let source = ObservableVec::with_data(vec![3u32, 1, 2]);
    let chain = source
        .filter(|x: &u32| *x > 1)
        .sort()
        .map(|x: &u32| x + 1)
        .window(0, Some(1));

    assert_eq!(chain.snapshot(), vec![3]);
    assert_eq!(source.listeners().count(), 0);

    let sub = chain.observe(|_| {});
    assert_eq!(source.listeners().count(), 1);
    assert_eq!(chain.snapshot(), vec![3]);

    drop(sub);
    assert_eq!(source.listeners().count(), 0);
}
