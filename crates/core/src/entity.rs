//! Entity trait: identity that survives changes to the row's contents.

/// Entity marker + minimal interface.
///
/// Ledger entries keep their identifier while being relocated or merged into,
/// which is what lets callers address them by id in move/reset operations.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
