//! Entity trait: identity within a batch.

/// Entity marker + minimal interface.
///
/// Snapshots handed to the engine are identified by id only; two snapshots with
/// the same id in one batch are a contract violation.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
