//! Payload types.
//!
//! Declared on every event and used to build the zero value of handler
//! locals. The front end is responsible for type checking; the runtime only
//! needs the shape.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Type of an event payload or handler local.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValType {
    /// The unit/null type.
    Null,
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// Reference to a declared event.
    Event,
    /// Reference to a machine instance.
    Machine,
    /// Any value; defaults to null.
    Any,
    /// Fixed-arity tuple.
    Tuple(Vec<ValType>),
    /// Homogeneous sequence.
    Seq(Box<ValType>),
    /// Ordered map.
    Map(Box<ValType>, Box<ValType>),
}

impl ValType {
    /// Zero value of this type.
    ///
    /// References (`Event`, `Machine`) and `Any` have no meaningful zero and
    /// start out as [`Value::Null`].
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            Self::Null | Self::Event | Self::Machine | Self::Any => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Tuple(fields) => Value::Tuple(fields.iter().map(Self::default_value).collect()),
            Self::Seq(_) => Value::Seq(Vec::new()),
            Self::Map(_, _) => Value::Map(std::collections::BTreeMap::new()),
        }
    }
}

impl std::fmt::Display for ValType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Event => write!(f, "event"),
            Self::Machine => write!(f, "machine"),
            Self::Any => write!(f, "any"),
            Self::Tuple(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, ")")
            }
            Self::Seq(elem) => write!(f, "seq[{elem}]"),
            Self::Map(k, v) => write!(f, "map[{k}, {v}]"),
        }
    }
}
