use {
    crate::projection::filter::Selector,
    std::{any::Any, sync::Arc},
};

pub use crate::projection::filter::OfType;

/// Dynamically typed item, identified by address.
pub type AnyItem = Arc<dyn Any + Send + Sync>;

/// Keeps the items that are a `U`, handing them out as `Arc<U>`.
pub fn downcast<U: Any + Send + Sync>() -> Selector<AnyItem, Arc<U>> {
    Arc::new(|item: &AnyItem| item.clone().downcast::<U>().ok())
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
