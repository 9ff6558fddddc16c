//! Runtime-typed values crossing the native/managed boundary.
//!
//! Every argument handed to a managed invocation and every result coming back is
//! carried as a [`Value`]. The accompanying [`ValueKind`] is the primitive
//! *category* the member resolver matches declared parameters against — the
//! category model is deliberately coarse (it distinguishes the integer widths,
//! strings and entity references the legacy bridge cared about) because overload
//! resolution only ever compares categories, never full type identity.
//!
//! # Compatibility Rules
//!
//! A declared parameter category accepts a supplied argument according to the
//! legacy table preserved by [`ValueKind::accepts`]:
//!
//! - `Bool`, `I4`, `I2`, `U2` and `String` are strict: only the same category.
//! - `U4` accepts `U4` **or** `EntityId` (entity ids travel as unsigned ints).
//! - Every other declared category accepts any argument.
//! - A null argument matches any declared category.
//!
//! This permissiveness is load-bearing: managed script code depends on the
//! exact set of rejections, so the table must not be tightened.

use std::fmt;

use bitflags::bitflags;

/// Identity of a managed object within the runtime's heap.
///
/// An `ObjectId` is a stable reference to an object, not an address: a moving
/// collector may relocate the underlying storage at any collection cycle
/// without invalidating the id. Raw addresses are only meaningful while the
/// object is pinned (see [`HandleTable::pinned`](crate::handles::HandleTable::pinned)).
///
/// The id value `0` is reserved and never names a live object; hosts mint ids
/// starting at `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// An entity reference as seen by the engine side.
///
/// Entity ids are plain 32-bit values on the wire; they get their own category
/// so that a declared unsigned-int parameter can accept one (and nothing else
/// can).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// A runtime-typed value marshalled across the boundary.
///
/// Arguments are built on the native side from engine data; results are
/// produced by the managed runtime. Object references carried in a `Value` are
/// *not* rooted — callers that hold one across a collection must register it
/// with the [`HandleTable`](crate::handles::HandleTable) first.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A null reference
    Null,
    /// Boolean value
    Bool(bool),
    /// 16-bit signed integer
    I2(i16),
    /// 16-bit unsigned integer
    U2(u16),
    /// 32-bit signed integer
    I4(i32),
    /// 32-bit unsigned integer
    U4(u32),
    /// 64-bit signed integer
    I8(i64),
    /// 64-bit unsigned integer
    U8(u64),
    /// 32-bit floating point
    R4(f32),
    /// 64-bit floating point
    R8(f64),
    /// String value (marshalled by copy)
    String(String),
    /// Engine entity reference
    EntityId(EntityId),
    /// Reference to a managed object
    Object(ObjectId),
}

impl Value {
    /// The primitive category this value belongs to.
    ///
    /// `Null` reports [`ValueKind::Object`]; note that for overload matching a
    /// null argument is a wildcard regardless of its reported kind.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null | Value::Object(_) => ValueKind::Object,
            Value::Bool(_) => ValueKind::Bool,
            Value::I2(_) => ValueKind::I2,
            Value::U2(_) => ValueKind::U2,
            Value::I4(_) => ValueKind::I4,
            Value::U4(_) => ValueKind::U4,
            Value::I8(_) => ValueKind::I8,
            Value::U8(_) => ValueKind::U8,
            Value::R4(_) => ValueKind::R4,
            Value::R8(_) => ValueKind::R8,
            Value::String(_) => ValueKind::String,
            Value::EntityId(_) => ValueKind::EntityId,
        }
    }

    /// `true` if this is the null reference.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to convert to a boolean value
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::I4(value) => Some(*value != 0),
            Value::U4(value) => Some(*value != 0),
            _ => None,
        }
    }

    /// Try to convert to a 32-bit integer value
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Bool(value) => Some(i32::from(*value)),
            Value::I2(value) => Some(i32::from(*value)),
            Value::U2(value) => Some(i32::from(*value)),
            Value::I4(value) => Some(*value),
            Value::U4(value) => i32::try_from(*value).ok(),
            Value::I8(value) => i32::try_from(*value).ok(),
            Value::U8(value) => i32::try_from(*value).ok(),
            Value::EntityId(value) => i32::try_from(value.0).ok(),
            _ => None,
        }
    }

    /// Try to convert to a 64-bit integer value
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(value) => Some(i64::from(*value)),
            Value::I2(value) => Some(i64::from(*value)),
            Value::U2(value) => Some(i64::from(*value)),
            Value::I4(value) => Some(i64::from(*value)),
            Value::U4(value) => Some(i64::from(*value)),
            Value::I8(value) => Some(*value),
            Value::U8(value) => i64::try_from(*value).ok(),
            Value::EntityId(value) => Some(i64::from(value.0)),
            _ => None,
        }
    }

    /// Try to convert to a 32-bit floating point value
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::R4(value) => Some(*value),
            #[allow(clippy::cast_possible_truncation)]
            Value::R8(value) => Some(*value as f32),
            Value::I2(value) => Some(f32::from(*value)),
            Value::U2(value) => Some(f32::from(*value)),
            _ => None,
        }
    }

    /// Try to convert to a 64-bit floating point value
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::R4(value) => Some(f64::from(*value)),
            Value::R8(value) => Some(*value),
            Value::I2(value) => Some(f64::from(*value)),
            Value::U2(value) => Some(f64::from(*value)),
            Value::I4(value) => Some(f64::from(*value)),
            Value::U4(value) => Some(f64::from(*value)),
            _ => None,
        }
    }

    /// Try to view as a string slice
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Try to convert to a managed object reference
    #[must_use]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(value) => Some(*value),
            _ => None,
        }
    }
}

/// The primitive category of a value or declared parameter.
///
/// Categories are what overload resolution compares; they intentionally carry
/// no assembly or namespace identity. `Void` only ever appears as a declared
/// return category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ValueKind {
    /// No value (return category only)
    Void,
    /// Boolean
    Bool,
    /// 16-bit signed integer
    I2,
    /// 16-bit unsigned integer
    U2,
    /// 32-bit signed integer
    I4,
    /// 32-bit unsigned integer
    U4,
    /// 64-bit signed integer
    I8,
    /// 64-bit unsigned integer
    U8,
    /// 32-bit floating point
    R4,
    /// 64-bit floating point
    R8,
    /// String
    String,
    /// Engine entity reference
    EntityId,
    /// Managed object reference
    Object,
}

impl ValueKind {
    /// Whether a parameter declared with this category accepts an argument of
    /// the supplied category.
    ///
    /// This is the legacy compatibility table, preserved exactly: the strict
    /// categories reject anything but themselves, `U4` additionally admits
    /// entity ids, and every other declared category accepts any argument.
    /// Callers must treat a null argument as compatible before consulting the
    /// table (see [`ArgEntry`](crate::typesystem::ArgEntry)).
    #[must_use]
    pub fn accepts(self, supplied: ValueKind) -> bool {
        match self {
            ValueKind::Bool
            | ValueKind::I4
            | ValueKind::I2
            | ValueKind::U2
            | ValueKind::String => supplied == self,
            ValueKind::U4 => matches!(supplied, ValueKind::U4 | ValueKind::EntityId),
            _ => true,
        }
    }
}

bitflags! {
    /// Modifier flags on a declared parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParamFlags: u8 {
        /// Parameter is passed by reference
        const BY_REF = 0x01;
        /// Parameter is a raw pointer
        const POINTER = 0x02;
    }
}

/// One slot of a declared parameter signature.
///
/// Carries the primitive category together with modifier flags and the array
/// rank (`0` for a non-array parameter). Overload resolution matches on the
/// category only; modifiers and rank travel with the descriptor for
/// diagnostics and marshalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSig {
    /// Primitive category of the parameter
    pub kind: ValueKind,
    /// By-reference / pointer modifiers
    pub flags: ParamFlags,
    /// Array rank, `0` when the parameter is not an array
    pub array_rank: u8,
}

impl ParamSig {
    /// A plain by-value parameter of the given category.
    #[must_use]
    pub fn plain(kind: ValueKind) -> Self {
        ParamSig {
            kind,
            flags: ParamFlags::empty(),
            array_rank: 0,
        }
    }

    /// A by-reference parameter of the given category.
    #[must_use]
    pub fn by_ref(kind: ValueKind) -> Self {
        ParamSig {
            kind,
            flags: ParamFlags::BY_REF,
            array_rank: 0,
        }
    }

    /// An array parameter of the given element category and rank.
    #[must_use]
    pub fn array(kind: ValueKind, rank: u8) -> Self {
        ParamSig {
            kind,
            flags: ParamFlags::empty(),
            array_rank: rank,
        }
    }
}
