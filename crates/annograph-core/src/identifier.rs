//! Identifier management using string interning for efficient string storage and comparison
//!
//! This module provides the untyped [`Id`] together with the typed wrappers
//! [`LayerId`], [`AnchorId`] and [`AnnotationId`]. All of them are `Copy`
//! handles into a global string interner, so the arena maps of a
//! [`Graph`](crate::Graph) can be keyed by id without cloning strings.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for efficient identifier storage.
///
/// # Thread Safety
///
/// This uses `Mutex` for thread-safe access to the string interner, so
/// graphs holding ids can be processed on separate worker threads.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Efficient identifier type using string interning
///
/// # Examples
///
/// ```
/// use annograph_core::identifier::Id;
///
/// let graph_id = Id::new("interview-01.eaf");
/// assert_eq!(graph_id, "interview-01.eaf");
/// assert_eq!(graph_id.to_string(), "interview-01.eaf");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from &str.
    ///
    /// # Arguments
    ///
    /// * `name` - The string representation of the identifier
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Looks up an `Id` without interning it.
    ///
    /// Returns `None` when no identifier with this name has ever been created,
    /// which means no graph can contain it.
    pub fn existing(name: &str) -> Option<Self> {
        interner().get(name).map(Self)
    }

    /// Runs `f` with the string form of this identifier, without allocating.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        let interner = interner();
        f(interner.resolve(self.0).unwrap_or_default())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| f.write_str(s))
    }
}

impl std::str::FromStr for Id {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<&String> for Id {
    fn from(name: &String) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.with_str(|s| s == other)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        <Self as PartialEq<str>>::eq(self, other)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with_str(|s| serializer.serialize_str(s))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}

/// Declares a typed identifier wrapping [`Id`].
///
/// The wrappers keep layer, anchor and annotation identities apart at the
/// type level while sharing the interner.
macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Id);

        impl $name {
            /// Creates the identifier from its string form.
            pub fn new(name: &str) -> Self {
                Self(Id::new(name))
            }

            /// Returns the untyped identifier.
            pub fn id(self) -> Id {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Id> for $name {
            fn from(id: Id) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }

        impl From<&String> for $name {
            fn from(name: &String) -> Self {
                Self::new(name)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                <Id as PartialEq<str>>::eq(&self.0, other)
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                <Id as PartialEq<str>>::eq(&self.0, other)
            }
        }
    };
}

typed_id!(
    /// Identity of a [`Layer`](crate::Layer) within a [`Schema`](crate::Schema).
    LayerId
);

typed_id!(
    /// Identity of an [`Anchor`](crate::Anchor) within a [`Graph`](crate::Graph).
    AnchorId
);

typed_id!(
    /// Identity of an [`Annotation`](crate::Annotation) within a [`Graph`](crate::Graph).
    ///
    /// The root annotation of a graph shares its string form with the graph id.
    AnnotationId
);

/// Renders `n` in base 36 using lowercase digits.
pub(crate) fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_through_display() {
        let id = Id::new("utterance");
        assert_eq!(id.to_string(), "utterance");
        assert_eq!(id, "utterance");
        assert_eq!(Id::new("utterance"), id);
    }

    #[test]
    fn test_existing_does_not_intern() {
        assert!(Id::existing("never-interned-7f3a").is_none());
        let id = Id::new("interned-7f3a");
        assert_eq!(Id::existing("interned-7f3a"), Some(id));
    }

    #[test]
    fn test_typed_ids_share_interner() {
        let layer = LayerId::new("word");
        let annotation = AnnotationId::new("word");
        assert_eq!(layer.id(), annotation.id());
        assert_eq!(layer, "word");
    }

    #[test]
    fn test_base36() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(1295), "zz");
    }
}
