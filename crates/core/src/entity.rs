//! Entity trait: identity that survives attribute changes.

/// Entity marker + minimal interface.
///
/// An entity keeps its identity while its attributes are overwritten; two
/// records with the same id describe the same thing at different times.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
