//! Entity trait: identity + positional handle in the store.

/// A record persisted as one row of a named range.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// 1-based row number of the record inside its range, as last read.
    ///
    /// Row handles shift when rows above are deleted; re-resolve by id before
    /// writing back.
    fn row_index(&self) -> u32;
}
