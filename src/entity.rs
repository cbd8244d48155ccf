//! A small helper for declaring dense `u32` entity-reference newtypes,
//! in the spirit of the teacher's `ir::entities` module (`entity_impl!`):
//! a compact, type-safe index into a table owned elsewhere, with
//! `Display`/`Debug` and [`cranelift_entity::EntityRef`] for free so it can
//! key a [`cranelift_entity::PrimaryMap`] or [`cranelift_entity::SecondaryMap`].

/// Declares a `Copy` `u32` newtype implementing [`cranelift_entity::EntityRef`].
///
/// `entity_id!(pub struct Foo("foo"));` produces a `Foo(u32)` with
/// `Foo::from_u32`/`Foo::as_u32`, `Display` as `foo<N>`, and the trait impl
/// `PrimaryMap`/`SecondaryMap` need to use `Foo` as a key.
macro_rules! entity_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($prefix:literal);) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name(u32);

        impl $name {
            /// Constructs a reference from its raw index.
            pub const fn from_u32(n: u32) -> Self {
                Self(n)
            }

            /// The raw index backing this reference.
            pub const fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(self, f)
            }
        }

        impl ::cranelift_entity::EntityRef for $name {
            fn new(index: usize) -> Self {
                Self(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

pub(crate) use entity_id;
