use thiserror::Error;

/// Failures surfaced by source collections and derived views.
///
/// Everything else (a panicking predicate, selector or comparator) unwinds
/// to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("derived views are read-only")]
    UnsupportedMutation,

    #[error("collection was mutated while dispatching one of its own change events")]
    ReentrantMutation,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
