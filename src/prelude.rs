//! # clrbridge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the clrbridge library. Import this module to get quick access to the
//! essential types for driving the interop bridge.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all clrbridge operations
pub use crate::Error;

/// The result type used throughout clrbridge
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The owning bridge context and its configuration
pub use crate::{Bridge, BridgeConfig, ManagedEntryPoint};

// ================================================================================================
// Runtime Seam
// ================================================================================================

/// The managed runtime trait and its metadata/ABI vocabulary
pub use crate::runtime::{
    EntityId, ExceptionInfo, HandleKind, ManagedHost, MemberInfo, MemberKind, MemberToken,
    ObjectId, ParamFlags, ParamSig, RawHandle, RawInvoke, RawThunk, ThunkEntry, TypeInfo,
    TypeToken, Value, ValueKind,
};

// ================================================================================================
// Type System
// ================================================================================================

/// Descriptors, registry and resolver
pub use crate::typesystem::{
    ArgEntry, ArgumentSpec, MemberDescriptor, MemberList, MemberRc, MemberResolver, Resolution,
    TypeAttributes, TypeDescriptor, TypeRc, TypeRef, TypeRegistry, CONSTRUCTOR_NAME,
};

// ================================================================================================
// Dispatch and Lifetime
// ================================================================================================

/// Invocation outcomes and the dispatcher
pub use crate::dispatch::{CallResult, Dispatcher, ExceptionBridge, ExceptionCarrier, Invoked, OnMissing};

/// Handles and RAII lifetime guards
pub use crate::handles::{Handle, HandleTable, ObjectRef, PinGuard};

/// The downward native binding table
pub use crate::natives::{NativeKey, NativeRegistry};
