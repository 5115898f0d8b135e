//! Composable orderings.
//!
//! Comparers are built once and handed to the operators that need them;
//! there is no process-wide registry of default orderings.

use {
    crate::view::Identity,
    std::{cmp::Ordering, sync::Arc},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Compare
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub trait Compare<T>: Send + Sync {
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// Components of a lexicographic chain, used to keep chains flat.
    fn chain(&self) -> Option<&[Comparer<T>]> {
        None
    }
}

pub type Comparer<T> = Arc<dyn Compare<T>>;

impl<T, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// The `Ord` ordering of the values themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<K: Ord> Compare<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Orders by a projected key.
pub struct PropertyComparer<T, K> {
    key: Arc<dyn Fn(&T) -> K + Send + Sync>,
    key_order: Comparer<K>,
    descending: bool,
}

impl<T, K> PropertyComparer<T, K>
where
    K: 'static,
{
    pub fn new(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self
    where
        K: Ord,
    {
        PropertyComparer::with_order(key, Arc::new(NaturalOrder), false)
    }

    pub fn descending(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self
    where
        K: Ord,
    {
        PropertyComparer::with_order(key, Arc::new(NaturalOrder), true)
    }

    pub fn with_order(
        key: impl Fn(&T) -> K + Send + Sync + 'static,
        key_order: Comparer<K>,
        descending: bool,
    ) -> Self {
        PropertyComparer {
            key: Arc::new(key),
            key_order,
            descending,
        }
    }
}

impl<T, K> Compare<T> for PropertyComparer<T, K> {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        let ord = self.key_order.compare(&(self.key)(a), &(self.key)(b));
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Lexicographic chain: the first non-equal result wins.
pub struct MultiComparer<T> {
    comparers: Vec<Comparer<T>>,
}

impl<T> MultiComparer<T> {
    pub fn new(comparers: impl IntoIterator<Item = Comparer<T>>) -> Self {
        let mut flat = Vec::new();
        for c in comparers {
            match c.chain() {
                Some(inner) => flat.extend(inner.iter().cloned()),
                None => flat.push(c),
            }
        }
        MultiComparer { comparers: flat }
    }

    pub fn len(&self) -> usize {
        self.comparers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparers.is_empty()
    }
}

impl<T> Compare<T> for MultiComparer<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.comparers
            .iter()
            .map(|c| c.compare(a, b))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    fn chain(&self) -> Option<&[Comparer<T>]> {
        Some(&self.comparers)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Total order on identities; only equal for the very same item.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceComparer;

impl<T: Identity> Compare<T> for ReferenceComparer {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.identity().cmp(&b.identity())
    }
}

pub fn reference_equality<T: Identity>(a: &T, b: &T) -> bool {
    a.identity() == b.identity()
}

/// `comparer`, falling back to identity so that distinct items never tie.
pub fn with_fallback<T: Identity + 'static>(comparer: Comparer<T>) -> Comparer<T> {
    Arc::new(MultiComparer::new([
        comparer,
        Arc::new(ReferenceComparer) as Comparer<T>,
    ]))
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Builder
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub struct ComparerBuilder<T> {
    parts: Vec<Comparer<T>>,
}

impl<T: 'static> ComparerBuilder<T> {
    pub fn order_by<K: Ord + 'static>(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        ComparerBuilder {
            parts: vec![Arc::new(PropertyComparer::new(key))],
        }
    }

    pub fn order_by_descending<K: Ord + 'static>(
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        ComparerBuilder {
            parts: vec![Arc::new(PropertyComparer::descending(key))],
        }
    }

    pub fn then(mut self, comparer: Comparer<T>) -> Self {
        self.parts.push(comparer);
        self
    }

    pub fn then_by<K: Ord + 'static>(self, key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        self.then(Arc::new(PropertyComparer::new(key)))
    }

    pub fn then_by_descending<K: Ord + 'static>(
        self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        self.then(Arc::new(PropertyComparer::descending(key)))
    }

    pub fn build(mut self) -> Comparer<T> {
        if self.parts.len() == 1 {
            if let Some(single) = self.parts.pop() {
                return single;
            }
        }
        Arc::new(MultiComparer::new(self.parts))
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use crate::compare::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Person {
        name: &'static str,
        age: u32,
    }

    fn p(name: &'static str, age: u32) -> Person {
        Person { name, age }
    }

    #[test]
    fn descending_keeps_ties() {
        let by_age = PropertyComparer::descending(|x: &Person| x.age);
        assert_eq!(by_age.compare(&p("a", 3), &p("b", 5)), Ordering::Greater);
        assert_eq!(by_age.compare(&p("a", 3), &p("b", 3)), Ordering::Equal);
    }

    #[test]
    fn chain_orders_lexicographically() {
        let c = ComparerBuilder::order_by(|x: &Person| x.age)
            .then_by_descending(|x: &Person| x.name)
            .build();

        let mut people = vec![p("ann", 30), p("bob", 20), p("cid", 30)];
        people.sort_by(|a, b| c.compare(a, b));
        assert_eq!(people, vec![p("bob", 20), p("cid", 30), p("ann", 30)]);
    }

    #[test]
    fn nested_chains_are_flattened() {
        let inner: Comparer<u32> = Arc::new(MultiComparer::new([
            Arc::new(NaturalOrder) as Comparer<u32>,
            Arc::new(|a: &u32, b: &u32| b.cmp(a)) as Comparer<u32>,
        ]));
        let outer = MultiComparer::new([inner, Arc::new(NaturalOrder) as Comparer<u32>]);
        assert_eq!(outer.len(), 3);
    }

    #[test]
    fn fallback_never_ties_distinct_items() {
        let a = Arc::new(1);
        let b = Arc::new(1);
        let c = with_fallback(Arc::new(PropertyComparer::new(|x: &Arc<i32>| **x)));

        assert_ne!(c.compare(&a, &b), Ordering::Equal);
        assert_eq!(c.compare(&a, &a.clone()), Ordering::Equal);
        assert!(reference_equality(&a, &a.clone()));
        assert!(!reference_equality(&a, &b));
    }
}
