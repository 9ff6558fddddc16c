//! Managed type descriptors and the caches built over them.
//!
//! This module wraps the host's reflection metadata in process-lifetime
//! descriptors and provides the lookup machinery the rest of the bridge runs
//! on:
//!
//! # Key Components
//!
//! - [`TypeDescriptor`]: one managed class/struct/interface, with its base
//!   link and lazily populated member list
//! - [`MemberDescriptor`]: one method/field/property/event, with its cached
//!   unmanaged thunk
//! - [`TypeRegistry`]: central registry keyed by type token, with full-name
//!   lookup and iterative base-chain registration
//! - [`MemberResolver`]: name + argument-category overload search over a
//!   type's own and inherited members
//!
//! # Thread Safety
//!
//! Descriptors are immutable after construction apart from two lazily
//! published cells: the member list (`OnceLock`, single writer wins, readers
//! block until publication) and the per-member thunk cache (benign-race
//! compute-and-store). The registry's indexes are a lock-free skip list and a
//! concurrent hash map, so lookups never block behind registration.

mod member;
mod registry;
mod resolver;

use std::sync::{Arc, OnceLock, Weak};

use bitflags::bitflags;

pub use member::{MemberDescriptor, MemberRc, CONSTRUCTOR_NAME};
pub use registry::TypeRegistry;
pub(crate) use registry::DEFAULT_INHERITANCE_DEPTH;
pub use resolver::{ArgEntry, ArgumentSpec, MemberResolver, Resolution};

use crate::runtime::TypeToken;

/// Reference to a `TypeDescriptor`
pub type TypeRc = Arc<TypeDescriptor>;

/// A vector that holds the declared members of one type
pub type MemberList = Arc<boxcar::Vec<MemberRc>>;

bitflags! {
    /// Attribute flags of a managed type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeAttributes: u32 {
        /// Type is a value type (stack/inline storage, no identity)
        const VALUE_TYPE = 0x0001;
        /// Type is an enumeration
        const ENUM = 0x0002;
        /// Type is a delegate
        const DELEGATE = 0x0004;
        /// Type is an interface
        const INTERFACE = 0x0008;
        /// Type cannot be derived from
        const SEALED = 0x0010;
        /// Type cannot be instantiated
        const ABSTRACT = 0x0020;
    }
}

/// A smart reference to a `TypeDescriptor` that holds the target weakly,
/// preventing base-chain links from keeping the whole hierarchy alive in a
/// cycle while still providing a clean API.
#[derive(Clone, Debug)]
pub struct TypeRef {
    weak_ref: Weak<TypeDescriptor>,
}

impl TypeRef {
    /// Create a new `TypeRef` from a strong reference
    pub fn new(strong_ref: &TypeRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the type, returning None if the type has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<TypeRc> {
        self.weak_ref.upgrade()
    }

    /// Check if the referenced type is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }

    /// Get the token of the referenced type (if still alive)
    #[must_use]
    pub fn token(&self) -> Option<TypeToken> {
        self.upgrade().map(|t| t.token)
    }

    /// Get the full name of the referenced type (if still alive)
    #[must_use]
    pub fn fullname(&self) -> Option<String> {
        self.upgrade().map(|t| t.fullname())
    }
}

impl From<TypeRc> for TypeRef {
    fn from(strong_ref: TypeRc) -> Self {
        Self::new(&strong_ref)
    }
}

/// Represents one managed class/struct/interface as cached by the bridge.
///
/// A descriptor is created once per distinct managed type, lives for the
/// process, and is destroyed at runtime shutdown. The member list is populated
/// on first query and never invalidated afterwards.
pub struct TypeDescriptor {
    /// Metadata token of the type
    pub token: TypeToken,
    /// Simple name of the owning assembly
    pub assembly: String,
    /// Namespace (can be empty)
    pub namespace: String,
    /// Type name
    pub name: String,
    /// Attribute flags
    pub attributes: TypeAttributes,
    /// Base type link, unset at the root of the hierarchy
    base: OnceLock<TypeRef>,
    /// Declared members, published once on first query
    members: OnceLock<MemberList>,
}

impl TypeDescriptor {
    /// Create a new descriptor. The base link is attached separately by the
    /// registry once the parent descriptor exists.
    pub(crate) fn new(
        token: TypeToken,
        assembly: String,
        namespace: String,
        name: String,
        attributes: TypeAttributes,
    ) -> Self {
        TypeDescriptor {
            token,
            assembly,
            namespace,
            name,
            attributes,
            base: OnceLock::new(),
            members: OnceLock::new(),
        }
    }

    /// Attach the base-type link. A second attachment is ignored.
    pub(crate) fn set_base(&self, base: &TypeRc) {
        self.base.set(TypeRef::new(base)).ok();
    }

    /// Access the base type of this type, if it exists
    #[must_use]
    pub fn base(&self) -> Option<TypeRc> {
        self.base.get().and_then(TypeRef::upgrade)
    }

    /// Returns the full name (Namespace.Name) of the type
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{0}.{1}", self.namespace, self.name)
        }
    }

    /// Whether the type is a value type
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.attributes.contains(TypeAttributes::VALUE_TYPE)
    }

    /// Whether the type is an enumeration
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.attributes.contains(TypeAttributes::ENUM)
    }

    /// Whether the type is a delegate
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.attributes.contains(TypeAttributes::DELEGATE)
    }

    /// Whether the type is an interface
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.attributes.contains(TypeAttributes::INTERFACE)
    }

    /// The already-published member list, `None` before first population.
    /// [`TypeRegistry::members`] is the populating entry point.
    #[must_use]
    pub fn cached_members(&self) -> Option<MemberList> {
        self.members.get().cloned()
    }

    /// The publish-once member cell, for the registry's population path.
    pub(crate) fn members_cell(&self) -> &OnceLock<MemberList> {
        &self.members
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("token", &self.token)
            .field("fullname", &self.fullname())
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
