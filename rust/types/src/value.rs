//! Runtime values carried in payloads and handler locals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identifiers::{EventId, MachineId};

/// A runtime value.
///
/// Values own everything they contain, so `clone` is always a deep copy and
/// two machines can never observe each other's mutations through a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Unit / no value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Event reference.
    Event(EventId),
    /// Machine reference.
    Machine(MachineId),
    /// Fixed-arity tuple.
    Tuple(Vec<Value>),
    /// Sequence.
    Seq(Vec<Value>),
    /// Encoded as a list of `[key, value]` pairs so non-string keys survive
    /// JSON.
    Map(#[serde(with = "map_entries")] BTreeMap<Value, Value>),
}

impl Value {
    /// Whether this is the null value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Boolean content, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content, if any.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Machine reference, if any.
    #[must_use]
    pub fn as_machine(&self) -> Option<MachineId> {
        match self {
            Self::Machine(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<MachineId> for Value {
    fn from(id: MachineId) -> Self {
        Self::Machine(id)
    }
}

impl From<EventId> for Value {
    fn from(id: EventId) -> Self {
        Self::Event(id)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Event(id) => write!(f, "{id}"),
            Self::Machine(id) => write!(f, "{id}"),
            Self::Tuple(items) => write_seq(f, "(", items, ")"),
            Self::Seq(items) => write_seq(f, "[", items, "]"),
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

mod map_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::Value;

    pub(super) fn serialize<S: Serializer>(
        map: &BTreeMap<Value, Value>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Value, Value>, D::Error> {
        let entries = Vec::<(Value, Value)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

fn write_seq(
    f: &mut std::fmt::Formatter<'_>,
    open: &str,
    items: &[Value],
    close: &str,
) -> std::fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}
