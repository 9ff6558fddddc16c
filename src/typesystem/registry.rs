//! Central registry of managed type descriptors.
//!
//! The registry is the single owner of every [`TypeDescriptor`] the bridge has
//! seen. It provides:
//!
//! - **Token-based lookup**: primary index over the host's type tokens
//! - **Name-based lookup**: secondary index keyed by `Assembly/Namespace.Name`
//! - **Base-chain registration**: registering a type registers its whole
//!   ancestry up to the sentinel root, linked through weak references
//! - **Member population**: the declared-member list of a type is read from
//!   the host exactly once, lazily, and atomically published
//!
//! # Thread Safety
//!
//! The primary index is a lock-free skip list and the name index a concurrent
//! hash map, so lookups never block behind registration. Member population
//! uses a publish-once cell: when two threads query the same type
//! simultaneously one walks the host metadata, the other blocks until the
//! finished list is published, and no thread ever observes a partially filled
//! list. Population performs no managed calls, so reentrant dispatch
//! (managed → native → managed) cannot deadlock it.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::runtime::{ManagedHost, TypeToken};
use crate::typesystem::{MemberDescriptor, MemberList, TypeDescriptor, TypeRc};
use crate::{Error, Result};

/// Default limit for base-chain walks; deep enough for any sane hierarchy,
/// small enough to catch metadata cycles immediately.
pub(crate) const DEFAULT_INHERITANCE_DEPTH: usize = 64;

/// Central registry for all managed types known to the bridge.
///
/// Created once at bridge initialization and owned by the
/// [`Bridge`](crate::Bridge) context; components receive it as
/// `Arc<TypeRegistry>` rather than reaching for a global.
pub struct TypeRegistry {
    /// The managed runtime the descriptors are built from
    host: Arc<dyn ManagedHost>,
    /// Primary index: token -> descriptor
    types: SkipMap<TypeToken, TypeRc>,
    /// Secondary index: `Assembly/Namespace.Name` -> token
    fullnames: DashMap<String, TypeToken>,
    /// The sentinel root of every base chain
    root: TypeRc,
    /// Depth guard for base-chain walks
    max_depth: usize,
}

impl TypeRegistry {
    /// Create a registry and register the sentinel root type.
    ///
    /// # Errors
    /// Fails with [`Error::TypeNotFound`] when the host cannot describe its
    /// own root type.
    pub fn new(host: Arc<dyn ManagedHost>) -> Result<Self> {
        Self::with_depth(host, DEFAULT_INHERITANCE_DEPTH)
    }

    /// Create a registry with an explicit inheritance depth guard.
    ///
    /// # Errors
    /// Fails with [`Error::TypeNotFound`] when the host cannot describe its
    /// own root type.
    pub fn with_depth(host: Arc<dyn ManagedHost>, max_depth: usize) -> Result<Self> {
        let root_token = host.object_root();
        let info = host
            .type_info(root_token)
            .ok_or_else(|| Error::TypeNotFound(root_token.to_string()))?;
        let root: TypeRc = Arc::new(TypeDescriptor::new(
            root_token,
            info.assembly,
            info.namespace,
            info.name,
            info.attributes,
        ));

        let registry = TypeRegistry {
            host,
            types: SkipMap::new(),
            fullnames: DashMap::new(),
            root: root.clone(),
            max_depth,
        };
        registry.types.insert(root_token, root.clone());
        registry.index(&root);
        Ok(registry)
    }

    /// The sentinel root type (the universal base of every chain).
    #[must_use]
    pub fn object_root(&self) -> &TypeRc {
        &self.root
    }

    /// The managed runtime this registry was built over.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn ManagedHost> {
        &self.host
    }

    /// The configured inheritance depth guard.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` if no type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up a type by qualified name, registering it (and its base chain)
    /// on first sight.
    ///
    /// # Errors
    /// - [`Error::TypeNotFound`] when the runtime does not know the name
    /// - [`Error::DepthLimit`] when the base chain exceeds the depth guard
    pub fn get(&self, assembly: &str, namespace: &str, name: &str) -> Result<TypeRc> {
        let key = Self::fullname_key(assembly, namespace, name);
        if let Some(token) = self.fullnames.get(&key) {
            if let Some(entry) = self.types.get(token.value()) {
                return Ok(entry.value().clone());
            }
        }

        let token = self
            .host
            .find_type(assembly, namespace, name)
            .ok_or_else(|| Error::TypeNotFound(key))?;
        self.register(token)
    }

    /// Look up an already-registered type by token.
    #[must_use]
    pub fn get_by_token(&self, token: TypeToken) -> Option<TypeRc> {
        self.types.get(&token).map(|entry| entry.value().clone())
    }

    /// Register a type by token, resolving its base chain iteratively up to
    /// the sentinel root.
    ///
    /// Registration is idempotent; concurrent registration of the same token
    /// is resolved by the primary index (first insertion wins, both callers
    /// observe the same descriptor).
    ///
    /// # Errors
    /// - [`Error::TypeNotFound`] when the token (or one of its ancestors) is
    ///   unknown to the runtime
    /// - [`Error::DepthLimit`] when the base chain exceeds the depth guard
    pub fn register(&self, token: TypeToken) -> Result<TypeRc> {
        if let Some(entry) = self.types.get(&token) {
            return Ok(entry.value().clone());
        }

        // Collect the unregistered tail of the ancestry, child first. The walk
        // is iterative with a hard depth guard so corrupt metadata can never
        // recurse unbounded.
        let mut pending = Vec::new();
        let mut cursor = token;
        loop {
            if pending.len() >= self.max_depth {
                return Err(Error::DepthLimit(self.max_depth));
            }
            if self.types.contains_key(&cursor) {
                break;
            }
            let info = self
                .host
                .type_info(cursor)
                .ok_or_else(|| Error::TypeNotFound(cursor.to_string()))?;
            let parent = info.base;
            pending.push((cursor, info));
            match parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }

        // Register root-most first so every child can link to a live parent.
        for (tok, info) in pending.into_iter().rev() {
            let parent = info.base;
            let descriptor: TypeRc = Arc::new(TypeDescriptor::new(
                tok,
                info.assembly,
                info.namespace,
                info.name,
                info.attributes,
            ));
            let entry = self.types.get_or_insert(tok, descriptor);
            let registered = entry.value();
            if registered.base().is_none() {
                if let Some(parent) = parent.and_then(|p| self.get_by_token(p)) {
                    registered.set_base(&parent);
                }
            }
            self.index(registered);
        }

        self.types
            .get(&token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::TypeNotFound(token.to_string()))
    }

    /// The declared members of a type, populated from the host exactly once.
    ///
    /// The returned list is stable and insertion-ordered; repeated calls are
    /// idempotent. Concurrent first queries block until the single population
    /// pass publishes the finished list.
    #[must_use]
    pub fn members(&self, ty: &TypeRc) -> MemberList {
        ty.members_cell()
            .get_or_init(|| {
                let list = boxcar::Vec::new();
                for info in self.host.declared_members(ty.token) {
                    list.push(Arc::new(MemberDescriptor::new(info, ty)));
                }
                log::debug!("populated {} members for {}", list.count(), ty.fullname());
                Arc::new(list)
            })
            .clone()
    }

    /// Drop every registered descriptor. Called at bridge shutdown.
    pub fn clear(&self) {
        while self.types.pop_front().is_some() {}
        self.fullnames.clear();
    }

    fn index(&self, ty: &TypeRc) {
        self.fullnames.insert(
            Self::fullname_key(&ty.assembly, &ty.namespace, &ty.name),
            ty.token,
        );
    }

    fn fullname_key(assembly: &str, namespace: &str, name: &str) -> String {
        if namespace.is_empty() {
            format!("{assembly}/{name}")
        } else {
            format!("{assembly}/{namespace}.{name}")
        }
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.len())
            .field("root", &self.root.fullname())
            .finish_non_exhaustive()
    }
}
