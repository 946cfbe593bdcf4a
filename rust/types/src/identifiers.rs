//! Typed identifiers for declarations and machine instances.
//!
//! Declarations are referenced by id, never by structure: two events that
//! share a name are still distinct if they were declared separately.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Build an id from its raw index.
            #[must_use]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw index of this id.
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Index into a declaration table.
            #[must_use]
            #[allow(clippy::as_conversions)]
            pub const fn index(self) -> usize {
                // u32 -> usize is lossless on 32-bit or larger platforms
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identity of a declared event.
    EventId,
    "ev#"
);
define_id!(
    /// Identity of a declared state.
    StateId,
    "st#"
);
define_id!(
    /// Identity of a declared handler function.
    FunId,
    "fn#"
);
define_id!(
    /// Identity of a running machine instance.
    MachineId,
    "m#"
);

impl EventId {
    /// The null (epsilon) event: "no event, fall through to wildcard handling".
    pub const NULL: Self = Self(0);
    /// The built-in halt event.
    pub const HALT: Self = Self(1);
    /// First id handed out to user-declared events.
    pub const FIRST_USER: Self = Self(2);

    /// Whether this is one of the two built-in events.
    #[must_use]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER.0
    }
}

impl FunId {
    /// The built-in `Ignore` handler.
    pub const IGNORE: Self = Self(0);
    /// The built-in `Skip` handler.
    pub const SKIP: Self = Self(1);
    /// First id handed out to user-declared functions.
    pub const FIRST_USER: Self = Self(2);

    /// Whether this is one of the built-in no-op handlers.
    #[must_use]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids_are_builtin() {
        assert!(EventId::NULL.is_builtin());
        assert!(EventId::HALT.is_builtin());
        assert!(!EventId::FIRST_USER.is_builtin());
        assert!(FunId::IGNORE.is_builtin());
        assert!(!FunId::new(7).is_builtin());
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&EventId::new(5)).unwrap();
        assert_eq!(json, "5");
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventId::new(5));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(StateId::new(3).to_string(), "st#3");
        assert_eq!(format!("{:?}", MachineId::new(9)), "MachineId(9)");
    }
}
