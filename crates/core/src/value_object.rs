//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity; they are defined entirely by their attribute
/// values and are never mutated after construction. A payer identifier or a
/// transaction timestamp is a value object: two `Payer("DANNON")` values are
/// the same payer.
///
/// Constructors are expected to validate, so holding a value object means
/// holding a valid value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
