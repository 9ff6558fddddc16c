//! Member descriptors and the per-member thunk cache.

use std::sync::{Arc, OnceLock};

use crate::runtime::{
    ManagedHost, MemberInfo, MemberKind, MemberToken, ParamSig, RawThunk, ValueKind,
};
use crate::typesystem::{TypeRc, TypeRef};
use crate::{Error, Result};

/// Reference to a `MemberDescriptor`
pub type MemberRc = Arc<MemberDescriptor>;

/// The metadata name under which constructors are declared and resolved.
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Represents one declared member (method, field, property or event) of a
/// managed type.
///
/// Descriptors are immutable snapshots of runtime metadata plus one lazily
/// cached raw thunk. A thunk, once cached, is assumed stable for the
/// descriptor's lifetime; it would only be invalidated by the runtime
/// recompiling the method, which this design treats as out of scope.
pub struct MemberDescriptor {
    /// Metadata token of the member
    pub token: MemberToken,
    /// The type this member is declared on (non-owning back-reference)
    pub declaring: TypeRef,
    /// Member name (`.ctor` for constructors)
    pub name: String,
    /// Flavor of the member
    pub kind: MemberKind,
    /// Declared on the type rather than per instance
    pub is_static: bool,
    /// Ordered parameter signature
    pub params: Vec<ParamSig>,
    /// Declared return category
    pub returns: ValueKind,
    /// Lazily cached unmanaged entry point
    thunk: OnceLock<RawThunk>,
}

impl MemberDescriptor {
    /// Build a descriptor from a host metadata snapshot.
    pub(crate) fn new(info: MemberInfo, declaring: &TypeRc) -> Self {
        MemberDescriptor {
            token: info.token,
            declaring: TypeRef::new(declaring),
            name: info.name,
            kind: info.kind,
            is_static: info.is_static,
            params: info.params,
            returns: info.returns,
            thunk: OnceLock::new(),
        }
    }

    /// Whether this member is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.kind == MemberKind::Method && self.name == CONSTRUCTOR_NAME
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// The cached thunk, if one was already derived.
    #[must_use]
    pub fn cached_thunk(&self) -> Option<RawThunk> {
        self.thunk.get().copied()
    }

    /// Fetch the member's unmanaged thunk, deriving and caching it on first
    /// use.
    ///
    /// Two threads racing here both derive the same entry point, so the cell
    /// is filled with a plain compute-and-store; whichever write lands is
    /// correct.
    ///
    /// # Errors
    /// Fails with [`Error::TypeError`] when the host cannot produce a thunk
    /// for this member (fields and events have no callable entry point).
    pub fn thunk(&self, host: &dyn ManagedHost) -> Result<RawThunk> {
        if let Some(cached) = self.thunk.get() {
            return Ok(*cached);
        }
        let derived = host.member_thunk(self.token).ok_or_else(|| {
            Error::TypeError(format!("member {} ({}) has no unmanaged thunk", self.name, self.token))
        })?;
        self.thunk.set(derived).ok();
        Ok(derived)
    }
}

impl std::fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("is_static", &self.is_static)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}
