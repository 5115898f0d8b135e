//! Live, incrementally maintained views over observable collections.
//!
//! A *live view* is an ordered, indexable sequence that tells its listeners
//! about every change through fine-grained structural events
//! (`Add`, `Remove`, `Replace`, `Move`, `Reset`) and a `Count` property event.
//! *Projections* (filter, sort, group, map, concat, window, ...) derive new live
//! views from a source and keep them up to date by translating each source
//! event into the minimal events of the derived view.
//!
//! Derived views are lazy: they subscribe to their source and keep a cache only
//! while somebody is listening. Reads on an unobserved view are computed from
//! the source on demand.
//!
//!# Examples
//!
//! ```
//! use livelinq::prelude::*;
//!
//! let source = ObservableVec::with_data(vec![4, 6, 7, 9]);
//!
//! let evens = source.filter(|x: &i32| x % 2 == 0);
//! let labels = evens.map(|x: &i32| format!("#{}", x));
//!
//! let _sub = labels.observe(|diff| println!("{:?}", diff));
//! assert_eq!(labels.snapshot(), vec!["#4", "#6"]);
//!
//! source.push(10).unwrap();   // passes the filter
//! source.push(11).unwrap();   // does not
//!
//! assert_eq!(labels.get(2), Some("#10".to_string()));
//! assert_eq!(labels.len(), 3);
//! ```

pub mod error;

pub mod buffer;
pub mod compare;
pub mod dispatch;
pub mod projection;
pub mod view;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::{
        buffer::{singleton::ItemCell, vec::ObservableVec},
        compare::{Comparer, ComparerBuilder},
        dispatch::{DispatchConfig, DispatchQueue},
        projection::{AnyItem, AnyViewExt, ProjectionExt},
        view::{CollectionDiff, Identity, Item, LiveView, LiveViewExt, SharedView, Subscription, Watcher},
        Error, Result,
    };
}
