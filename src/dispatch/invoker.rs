//! The invocation dispatcher: reflective and raw-thunk call paths.
//!
//! Every cross-boundary call funnels through the [`Dispatcher`]. Two paths
//! exist, chosen by caller intent:
//!
//! - **Reflective invoke** — the safe path. Arguments travel boxed through
//!   the runtime's generic invocation facility; a managed fault is captured
//!   into an [`ExceptionCarrier`] and returned as [`Invoked::Faulted`], never
//!   unwound into native code.
//! - **Raw-thunk invoke** — the fast path. The member's unmanaged entry point
//!   is derived once, cached on the descriptor, and called directly with no
//!   marshalling layer and **no exception safety net**: a fault during a
//!   thunk call is fatal by design. Use it only for members known not to
//!   throw, or wrap it in your own guard.
//!
//! Managed objects coming back from either path are registered with the
//! lifetime manager before the caller sees them, so a result can never be
//! collected out from under native code.

use std::sync::Arc;

use crate::dispatch::{ExceptionBridge, ExceptionCarrier};
use crate::handles::{HandleTable, ObjectRef};
use crate::runtime::{ManagedHost, MemberKind, ObjectId, RawInvoke, RawThunk, Value};
use crate::typesystem::{
    ArgumentSpec, MemberRc, MemberResolver, Resolution, TypeRc, TypeRegistry, CONSTRUCTOR_NAME,
};
use crate::{Error, Result};

/// Per-call-site policy for a query that matched nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMissing {
    /// Surface the miss as a null result and keep going
    ReturnNull,
    /// Escalate the miss to [`Error::MissingMember`]
    #[default]
    Fail,
}

/// The payload of a completed invocation.
#[derive(Debug)]
pub enum CallResult {
    /// The member returned nothing (or the call site chose a null result)
    Void,
    /// A plain marshalled value
    Value(Value),
    /// A managed object, already registered with the lifetime manager
    Object(ObjectRef),
}

impl CallResult {
    /// The plain value, if this is one.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            CallResult::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The object reference, if this is one.
    #[must_use]
    pub fn object(&self) -> Option<&ObjectRef> {
        match self {
            CallResult::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// `true` when the call produced nothing.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, CallResult::Void)
    }
}

/// Outcome of a reflective invocation.
///
/// A tagged variant: callers pattern-match instead of null-checking, and a
/// captured fault travels as data until the caller decides to report or
/// rethrow it.
#[derive(Debug)]
pub enum Invoked {
    /// The call completed and produced this payload
    Returned(CallResult),
    /// Managed code raised an exception; captured, never unwound
    Faulted(ExceptionCarrier),
}

impl Invoked {
    /// The completed payload, discarding a fault.
    #[must_use]
    pub fn returned(self) -> Option<CallResult> {
        match self {
            Invoked::Returned(result) => Some(result),
            Invoked::Faulted(_) => None,
        }
    }

    /// The captured fault, if the call raised.
    #[must_use]
    pub fn faulted(self) -> Option<ExceptionCarrier> {
        match self {
            Invoked::Returned(_) => None,
            Invoked::Faulted(carrier) => Some(carrier),
        }
    }

    /// `true` if the call completed without raising.
    #[must_use]
    pub fn is_returned(&self) -> bool {
        matches!(self, Invoked::Returned(_))
    }
}

/// Performs cross-boundary calls against resolved members.
pub struct Dispatcher {
    host: Arc<dyn ManagedHost>,
    resolver: MemberResolver,
    handles: Arc<HandleTable>,
    exceptions: ExceptionBridge,
}

impl Dispatcher {
    /// Create a dispatcher over the given registry and handle table.
    #[must_use]
    pub fn new(
        host: Arc<dyn ManagedHost>,
        registry: Arc<TypeRegistry>,
        handles: Arc<HandleTable>,
    ) -> Self {
        let exceptions = ExceptionBridge::new(host.clone(), handles.clone());
        Dispatcher {
            host,
            resolver: MemberResolver::new(registry),
            handles,
            exceptions,
        }
    }

    /// The resolver this dispatcher locates members with.
    #[must_use]
    pub fn resolver(&self) -> &MemberResolver {
        &self.resolver
    }

    /// The exception bridge used at the invoke boundary.
    #[must_use]
    pub fn exceptions(&self) -> &ExceptionBridge {
        &self.exceptions
    }

    /// Reflectively invoke a resolved member.
    ///
    /// The safe path: faults are captured, object results are registered with
    /// the lifetime manager.
    #[must_use]
    pub fn invoke(&self, member: &MemberRc, target: Option<ObjectId>, args: &[Value]) -> Invoked {
        self.finish(self.host.invoke(member.token, target, args))
    }

    /// Resolve a method by name against the supplied arguments and invoke it.
    ///
    /// Resolution uses the overload-search mode (declared count >= supplied
    /// count, categories checked over the supplied prefix). A miss follows
    /// `on_missing`.
    ///
    /// # Errors
    /// - [`Error::MissingMember`] on a miss under [`OnMissing::Fail`]
    /// - [`Error::DepthLimit`] if the base chain exceeds the depth guard
    pub fn resolve_and_invoke(
        &self,
        ty: &TypeRc,
        name: &str,
        target: Option<ObjectId>,
        args: &[Value],
        on_missing: OnMissing,
    ) -> Result<Invoked> {
        let spec = ArgumentSpec::from_values(args);
        match self.resolver.resolve(ty, name, &spec, true)? {
            Resolution::Found(member) => Ok(self.invoke(&member, target, args)),
            Resolution::NotFound => self.missing(ty, name, on_missing),
        }
    }

    /// Resolve a method against the concrete class of a live object and
    /// invoke it.
    ///
    /// The object's class is read from the runtime and registered on first
    /// sight; the search then proceeds as in [`Dispatcher::resolve_and_invoke`],
    /// including the base chain.
    ///
    /// # Errors
    /// - [`Error::TypeError`] when `target` is not a live object
    /// - [`Error::MissingMember`] on a miss under [`OnMissing::Fail`]
    pub fn invoke_on(
        &self,
        target: ObjectId,
        name: &str,
        args: &[Value],
        on_missing: OnMissing,
    ) -> Result<Invoked> {
        let token = self
            .host
            .class_of(target)
            .ok_or_else(|| Error::TypeError(format!("{target} is not a live object")))?;
        let ty = self.resolver.registry().register(token)?;
        self.resolve_and_invoke(&ty, name, Some(target), args, on_missing)
    }

    /// Fetch (and permanently cache) the raw thunk for a member.
    ///
    /// # Errors
    /// Fails with [`Error::TypeError`] when the member has no callable entry
    /// point.
    pub fn thunk(&self, member: &MemberRc) -> Result<RawThunk> {
        member.thunk(self.host.as_ref())
    }

    /// Invoke a member through its raw thunk.
    ///
    /// # Safety
    /// See [`RawThunk::call`]: the member must not raise, arguments must match
    /// the declared signature, and object arguments must be kept reachable by
    /// the caller.
    ///
    /// # Errors
    /// Fails with [`Error::TypeError`] when the member has no callable entry
    /// point.
    pub unsafe fn invoke_raw(
        &self,
        member: &MemberRc,
        target: Option<ObjectId>,
        args: &[Value],
    ) -> Result<Value> {
        let thunk = self.thunk(member)?;
        Ok(thunk.call(target, args))
    }

    /// Create an instance of a reference type and run the matching
    /// constructor.
    ///
    /// With no arguments and no declared constructor the freshly allocated
    /// instance is returned as-is (default initialization). A constructor
    /// fault surfaces as [`Invoked::Faulted`]; the half-built instance is not
    /// handed out.
    ///
    /// # Errors
    /// - [`Error::TypeError`] for value types (use [`Dispatcher::create_value_into`])
    /// - [`Error::MissingMember`] when no constructor matched under [`OnMissing::Fail`]
    pub fn create_instance(
        &self,
        ty: &TypeRc,
        args: &[Value],
        on_missing: OnMissing,
    ) -> Result<Invoked> {
        if ty.is_value_type() {
            return Err(Error::TypeError(format!(
                "{} is a value type; construct it into caller storage",
                ty.fullname()
            )));
        }

        let spec = ArgumentSpec::from_values(args);
        match self.resolver.resolve(ty, CONSTRUCTOR_NAME, &spec, true)? {
            Resolution::Found(ctor) => {
                let instance = self.host.allocate(ty.token)?;
                match self.invoke(&ctor, Some(instance), args) {
                    Invoked::Faulted(carrier) => Ok(Invoked::Faulted(carrier)),
                    Invoked::Returned(_) => Ok(Invoked::Returned(CallResult::Object(
                        self.handles.adopt(instance),
                    ))),
                }
            }
            Resolution::NotFound if args.is_empty() => {
                let instance = self.host.allocate(ty.token)?;
                Ok(Invoked::Returned(CallResult::Object(
                    self.handles.adopt(instance),
                )))
            }
            Resolution::NotFound => self.missing(ty, CONSTRUCTOR_NAME, on_missing),
        }
    }

    /// Construct a value type directly into caller-supplied storage.
    ///
    /// No managed allocation takes place: the matched constructor runs and the
    /// unboxed state is written through `slot`. On a constructor fault the
    /// slot is left untouched.
    ///
    /// # Errors
    /// - [`Error::TypeError`] for reference types
    /// - [`Error::MissingMember`] when no constructor matched under [`OnMissing::Fail`]
    pub fn create_value_into(
        &self,
        ty: &TypeRc,
        args: &[Value],
        slot: &mut Value,
        on_missing: OnMissing,
    ) -> Result<Invoked> {
        if !ty.is_value_type() {
            return Err(Error::TypeError(format!(
                "{} is a reference type; use create_instance",
                ty.fullname()
            )));
        }

        let spec = ArgumentSpec::from_values(args);
        match self.resolver.resolve(ty, CONSTRUCTOR_NAME, &spec, true)? {
            Resolution::Found(ctor) => match self.host.construct_value(ctor.token, args) {
                RawInvoke::Returned(state) => {
                    if let Some(state) = state {
                        *slot = state;
                    }
                    Ok(Invoked::Returned(CallResult::Void))
                }
                RawInvoke::Raised(ex) => Ok(Invoked::Faulted(self.exceptions.capture(ex))),
            },
            Resolution::NotFound => self.missing(ty, CONSTRUCTOR_NAME, on_missing),
        }
    }

    /// Read a property through its getter.
    ///
    /// The property is resolved by name exactly once; the getter runs through
    /// the reflective path with fault capture.
    ///
    /// # Errors
    /// - [`Error::MissingMember`] when the property (or its getter) is absent
    ///   under [`OnMissing::Fail`]
    /// - [`Error::DepthLimit`] if the base chain exceeds the depth guard
    pub fn get_property(
        &self,
        ty: &TypeRc,
        target: Option<ObjectId>,
        name: &str,
        on_missing: OnMissing,
    ) -> Result<Invoked> {
        match self.resolver.resolve_property(ty, name, true)? {
            Resolution::Found(prop) => match &prop.kind {
                MemberKind::Property {
                    getter: Some(getter),
                    ..
                } => Ok(self.finish(self.host.invoke(*getter, target, &[]))),
                _ => self.missing(ty, name, on_missing),
            },
            Resolution::NotFound => self.missing(ty, name, on_missing),
        }
    }

    /// Write a property through its setter.
    ///
    /// # Errors
    /// - [`Error::MissingMember`] when the property (or its setter) is absent
    ///   under [`OnMissing::Fail`]
    /// - [`Error::DepthLimit`] if the base chain exceeds the depth guard
    pub fn set_property(
        &self,
        ty: &TypeRc,
        target: Option<ObjectId>,
        name: &str,
        value: Value,
        on_missing: OnMissing,
    ) -> Result<Invoked> {
        match self.resolver.resolve_property(ty, name, true)? {
            Resolution::Found(prop) => match &prop.kind {
                MemberKind::Property {
                    setter: Some(setter),
                    ..
                } => Ok(self.finish(self.host.invoke(*setter, target, &[value]))),
                _ => self.missing(ty, name, on_missing),
            },
            Resolution::NotFound => self.missing(ty, name, on_missing),
        }
    }

    /// Read a field directly from instance (or static) storage.
    ///
    /// Fields are plain memory reads: no managed code runs, so no fault is
    /// possible. Object-typed field values are registered with the lifetime
    /// manager before being returned.
    ///
    /// # Errors
    /// - [`Error::MissingMember`] when the field is absent under [`OnMissing::Fail`]
    /// - [`Error::TypeError`] when the host rejects the read
    pub fn get_field(
        &self,
        ty: &TypeRc,
        target: Option<ObjectId>,
        name: &str,
        on_missing: OnMissing,
    ) -> Result<CallResult> {
        match self.resolver.resolve_field(ty, name, true)? {
            Resolution::Found(field) => {
                let value = self.host.read_field(field.token, target)?;
                Ok(self.retain(value))
            }
            Resolution::NotFound => match on_missing {
                OnMissing::ReturnNull => Ok(CallResult::Void),
                OnMissing::Fail => Err(Error::MissingMember {
                    type_name: ty.fullname(),
                    member: name.to_string(),
                }),
            },
        }
    }

    /// Write a field directly into instance storage.
    ///
    /// # Errors
    /// - [`Error::MissingMember`] when the field is absent under [`OnMissing::Fail`]
    /// - [`Error::TypeError`] when the host rejects the write
    pub fn set_field(
        &self,
        ty: &TypeRc,
        target: ObjectId,
        name: &str,
        value: Value,
        on_missing: OnMissing,
    ) -> Result<()> {
        match self.resolver.resolve_field(ty, name, true)? {
            Resolution::Found(field) => self.host.write_field(field.token, target, value),
            Resolution::NotFound => match on_missing {
                OnMissing::ReturnNull => Ok(()),
                OnMissing::Fail => Err(Error::MissingMember {
                    type_name: ty.fullname(),
                    member: name.to_string(),
                }),
            },
        }
    }

    fn finish(&self, outcome: RawInvoke) -> Invoked {
        match outcome {
            RawInvoke::Returned(None) => Invoked::Returned(CallResult::Void),
            RawInvoke::Returned(Some(value)) => Invoked::Returned(self.retain(value)),
            RawInvoke::Raised(ex) => Invoked::Faulted(self.exceptions.capture(ex)),
        }
    }

    fn retain(&self, value: Value) -> CallResult {
        match value {
            Value::Object(obj) => CallResult::Object(self.handles.adopt(obj)),
            other => CallResult::Value(other),
        }
    }

    fn missing(&self, ty: &TypeRc, name: &str, on_missing: OnMissing) -> Result<Invoked> {
        match on_missing {
            OnMissing::ReturnNull => {
                log::debug!("no member {name} on {}; returning null", ty.fullname());
                Ok(Invoked::Returned(CallResult::Void))
            }
            OnMissing::Fail => Err(Error::MissingMember {
                type_name: ty.fullname(),
                member: name.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
