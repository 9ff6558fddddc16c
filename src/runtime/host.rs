//! The seam between this crate and the embedded managed runtime.
//!
//! Everything the bridge needs from the scripting runtime — reflection metadata
//! enumeration, reflective invocation, unmanaged thunk acquisition, GC handle
//! primitives and exception introspection — is expressed as the [`ManagedHost`]
//! trait. The rest of the crate only ever talks to `Arc<dyn ManagedHost>`, so
//! the concrete runtime (and its FFI surface) stays an opaque dependency behind
//! this module.
//!
//! # Contract Notes
//!
//! - Metadata queries ([`ManagedHost::type_info`], [`ManagedHost::declared_members`])
//!   must be pure reads: they are called while the registry populates its caches
//!   and must never call back into managed code, or reentrant dispatch could
//!   deadlock cache population.
//! - [`ManagedHost::invoke`] is the *safe* invocation facility: a managed fault
//!   is reported through [`RawInvoke::Raised`], never by unwinding.
//! - [`ManagedHost::member_thunk`] vends a [`RawThunk`] with **no exception
//!   safety net**: a fault surfacing during a thunk call must terminate the
//!   process. That is the documented cost of the fast path.
//! - Handle primitives must keep strong/pinned targets alive across
//!   collections, keep pinned targets address-stable, and answer `None` for a
//!   weak handle whose target was collected.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use crate::runtime::value::{ObjectId, ParamSig, Value, ValueKind};
use crate::typesystem::TypeAttributes;
use crate::Result;

/// Token identifying a managed type inside the runtime's metadata.
///
/// Tokens are minted by the host and are stable for the process lifetime; the
/// registry uses them as its primary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeToken(pub u32);

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:0x{:08X}", self.0)
    }
}

/// Token identifying a member (method, field, property or event) inside the
/// runtime's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberToken(pub u32);

impl fmt::Display for MemberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member:0x{:08X}", self.0)
    }
}

/// A runtime-level GC handle as vended by the host.
///
/// This is the raw currency of [`ManagedHost::handle_new`]; native code never
/// sees it directly — the [`HandleTable`](crate::handles::HandleTable) wraps it
/// behind its own opaque ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

/// The ownership semantics of a GC handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum HandleKind {
    /// Target is kept alive; the collector may still relocate it
    Strong,
    /// Target is kept alive and its storage address is fixed
    Pinned,
    /// No ownership; the target may be collected at any time
    Weak,
}

/// Metadata snapshot of one managed type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Simple name of the owning assembly
    pub assembly: String,
    /// Namespace (may be empty)
    pub namespace: String,
    /// Type name
    pub name: String,
    /// Attribute flags (value type, enum, delegate, ...)
    pub attributes: TypeAttributes,
    /// Base type, `None` at the root of the hierarchy
    pub base: Option<TypeToken>,
}

/// The flavor of a member as reported by runtime metadata.
///
/// Constructors are ordinary methods named `.ctor`; they are not a separate
/// flavor here, matching how the resolver finds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    /// A callable method (including constructors)
    Method,
    /// A data field
    Field,
    /// A property with optional accessor methods
    Property {
        /// Method token of the getter, if the property is readable
        getter: Option<MemberToken>,
        /// Method token of the setter, if the property is writable
        setter: Option<MemberToken>,
    },
    /// An event
    Event,
}

/// Metadata snapshot of one declared member.
///
/// The host must report members in declaration order: overload resolution is
/// first-match-in-declaration-order and managed code depends on it.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Token of the member
    pub token: MemberToken,
    /// Member name (`.ctor` for constructors)
    pub name: String,
    /// Flavor of the member
    pub kind: MemberKind,
    /// Declared on the type rather than per instance
    pub is_static: bool,
    /// Ordered parameter signature (empty for fields and events)
    pub params: Vec<ParamSig>,
    /// Declared return category (`Void` when none)
    pub returns: ValueKind,
}

/// Outcome of a reflective invocation at the host level.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInvoke {
    /// The call completed; the payload is the (possibly absent) return value
    Returned(Option<Value>),
    /// Managed code raised an exception; the payload references the exception object
    Raised(ObjectId),
}

/// Derived facts about a managed exception object.
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    /// Full name of the exception type
    pub type_name: String,
    /// Exception message text
    pub message: String,
    /// Formatted stack trace
    pub stack_trace: String,
    /// Inner exception, if any
    pub inner: Option<ObjectId>,
}

/// Signature of an unmanaged thunk entry point.
///
/// `data` is the opaque per-thunk state supplied at construction, `target` the
/// instance object id (`0` for static members), `args`/`argc` the argument
/// slice and `ret` the out-slot for the result. The same ABI serves both
/// directions: managed-method thunks vended by the host and native trampolines
/// registered by engine modules.
pub type ThunkEntry =
    unsafe extern "C" fn(data: *const c_void, target: u64, args: *const Value, argc: usize, ret: *mut Value);

/// A direct unmanaged entry point for a specific member.
///
/// Calling through a `RawThunk` bypasses the reflective marshalling layer and
/// its exception net: it is far cheaper than [`ManagedHost::invoke`] and
/// correspondingly unforgiving — a fault during the call is fatal by design.
/// Thunks are cached per member descriptor and assumed stable for the process
/// lifetime (runtime relinking is out of scope).
#[derive(Debug, Clone, Copy)]
pub struct RawThunk {
    entry: ThunkEntry,
    data: *const c_void,
}

// The data pointer refers to host-owned state that is valid for the process
// lifetime and never mutated through the thunk.
unsafe impl Send for RawThunk {}
unsafe impl Sync for RawThunk {}

impl RawThunk {
    /// Wrap an entry point together with its opaque state.
    #[must_use]
    pub fn new(entry: ThunkEntry, data: *const c_void) -> Self {
        RawThunk { entry, data }
    }

    /// Call through the thunk.
    ///
    /// # Safety
    /// The caller must guarantee that `args` matches the member's declared
    /// signature and that the member cannot raise a managed exception (or that
    /// a fault aborting the process is acceptable). Object arguments must be
    /// kept reachable by the caller for the duration of the call.
    pub unsafe fn call(&self, target: Option<ObjectId>, args: &[Value]) -> Value {
        let mut ret = Value::Null;
        (self.entry)(
            self.data,
            target.map_or(0, |obj| obj.0),
            args.as_ptr(),
            args.len(),
            &mut ret,
        );
        ret
    }
}

/// The embedded managed runtime, as seen by the bridge.
///
/// Implementations wrap a concrete scripting runtime; the test suite drives
/// the bridge against an in-memory simulation with an observable collector.
/// All methods may be called from multiple native threads concurrently.
pub trait ManagedHost: Send + Sync {
    /// Look up a type token by qualified name. Pure metadata read.
    fn find_type(&self, assembly: &str, namespace: &str, name: &str) -> Option<TypeToken>;

    /// Metadata snapshot for a token, `None` if the token is unknown. Pure
    /// metadata read.
    fn type_info(&self, ty: TypeToken) -> Option<TypeInfo>;

    /// The declared members of a type, in declaration order. Pure metadata
    /// read; called at most once per type by the registry.
    fn declared_members(&self, ty: TypeToken) -> Vec<MemberInfo>;

    /// Token of the sentinel root type (the universal base, e.g. `System.Object`).
    fn object_root(&self) -> TypeToken;

    /// The concrete class of a live object, `None` if the id is not a live
    /// object.
    fn class_of(&self, obj: ObjectId) -> Option<TypeToken>;

    /// Allocate a new, un-constructed instance of a reference type.
    ///
    /// # Errors
    /// Fails with [`Error::TypeError`](crate::Error::TypeError) for value
    /// types, interfaces and abstract types.
    fn allocate(&self, ty: TypeToken) -> Result<ObjectId>;

    /// Reflectively invoke a method. Faults are reported through
    /// [`RawInvoke::Raised`], never by unwinding into native code.
    fn invoke(&self, member: MemberToken, target: Option<ObjectId>, args: &[Value]) -> RawInvoke;

    /// Run a value-type constructor and return the constructed state as an
    /// unboxed value, without a managed heap allocation.
    fn construct_value(&self, ctor: MemberToken, args: &[Value]) -> RawInvoke;

    /// Obtain the unmanaged thunk for a method, `None` if the member is not
    /// callable through the fast path.
    fn member_thunk(&self, member: MemberToken) -> Option<RawThunk>;

    /// Read a field directly. `target` is `None` for static fields.
    ///
    /// # Errors
    /// Fails with [`Error::TypeError`](crate::Error::TypeError) when the token
    /// is not a field or the target does not carry it.
    fn read_field(&self, field: MemberToken, target: Option<ObjectId>) -> Result<Value>;

    /// Write a field directly into instance storage.
    ///
    /// # Errors
    /// Fails with [`Error::TypeError`](crate::Error::TypeError) when the token
    /// is not a field or the target does not carry it.
    fn write_field(&self, field: MemberToken, target: ObjectId, value: Value) -> Result<()>;

    /// Create a runtime-level GC handle for an object.
    fn handle_new(&self, target: ObjectId, kind: HandleKind) -> RawHandle;

    /// The current target of a handle. `None` for a weak handle whose target
    /// was collected.
    fn handle_target(&self, handle: RawHandle) -> Option<ObjectId>;

    /// Release a runtime-level handle. Safe to call concurrently with a
    /// collection cycle.
    fn handle_free(&self, handle: RawHandle);

    /// The current storage address of a live object.
    ///
    /// The address is only stable while the object is pinned; reading it
    /// through a merely-strong handle and caching it across a collection is a
    /// use-after-move bug.
    fn address_of(&self, obj: ObjectId) -> Option<NonNull<u8>>;

    /// Derive message, type name, stack trace and inner chain from a managed
    /// exception object.
    fn exception_info(&self, ex: ObjectId) -> ExceptionInfo;

    /// Re-raise an exception into managed control flow.
    ///
    /// The host must deliver it to the innermost active managed frame and keep
    /// the exception object reachable until it is delivered.
    fn rethrow(&self, ex: ObjectId);

    /// Bind a native trampoline as the implementation of a managed internal
    /// call, addressed by its `Namespace.Class::Method` path.
    fn bind_internal_call(&self, path: &str, trampoline: RawThunk);
}
