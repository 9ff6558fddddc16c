//! The managed-runtime seam: value marshalling and the host trait.
//!
//! This module owns the two vocabularies the whole crate is written in:
//!
//! - [`value`] — runtime-typed [`Value`]s and the primitive-category model
//!   ([`ValueKind`]) that overload resolution matches against.
//! - [`host`] — the [`ManagedHost`] trait behind which the concrete scripting
//!   runtime lives, together with the raw tokens, GC-handle primitives and the
//!   unmanaged thunk ABI shared by both call directions.

pub mod host;
pub mod value;

pub use host::{
    ExceptionInfo, HandleKind, ManagedHost, MemberInfo, MemberKind, MemberToken, RawHandle,
    RawInvoke, RawThunk, ThunkEntry, TypeInfo, TypeToken,
};
pub use value::{EntityId, ObjectId, ParamFlags, ParamSig, Value, ValueKind};
