//! The downward registration table: native services exposed to managed code.
//!
//! Engine subsystems expose their services by registering a trampoline under a
//! `(namespace, class, method)` key at startup. At bridge initialization the
//! whole table is installed into the managed runtime as internal calls, so the
//! managed side dispatches into native code through the same raw-thunk ABI the
//! upward fast path uses — the two directions are symmetric.
//!
//! The table itself is the bridge's concern; the hundreds of per-subsystem
//! modules that fill it (input, console variables, levels, materials, ...) are
//! external collaborators that simply call [`NativeRegistry::register`] during
//! their startup pass.

use std::fmt;

use dashmap::DashMap;

use crate::runtime::{ManagedHost, RawThunk};
use crate::{Error, Result};

/// Key of one native binding: the managed-visible address of the trampoline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeKey {
    /// Managed namespace the call surfaces under
    pub namespace: String,
    /// Managed class name
    pub class: String,
    /// Managed method name
    pub method: String,
}

impl NativeKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(namespace: &str, class: &str, method: &str) -> Self {
        NativeKey {
            namespace: namespace.to_string(),
            class: class.to_string(),
            method: method.to_string(),
        }
    }

    /// The internal-call path the runtime binds against
    /// (`Namespace.Class::Method`).
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}.{}::{}", self.namespace, self.class, self.method)
    }
}

impl fmt::Display for NativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Process-wide table of native trampolines exposed to managed code.
///
/// Populated once at startup by collaborator modules, then installed into the
/// runtime by the bridge. Registration after installation still works for the
/// table itself but will not reach the runtime until the next initialization,
/// so collaborators are expected to run before [`Bridge::initialize`](crate::Bridge::initialize).
#[derive(Default)]
pub struct NativeRegistry {
    table: DashMap<NativeKey, RawThunk>,
}

impl NativeRegistry {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        NativeRegistry {
            table: DashMap::new(),
        }
    }

    /// Register a trampoline under `(namespace, class, method)`.
    ///
    /// # Errors
    /// Fails with [`Error::NativeRebound`] when the key is already bound; the
    /// table is populated once and never silently overwritten.
    pub fn register(
        &self,
        namespace: &str,
        class: &str,
        method: &str,
        trampoline: RawThunk,
    ) -> Result<()> {
        let key = NativeKey::new(namespace, class, method);
        match self.table.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(Error::NativeRebound(entry.key().path()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(trampoline);
                Ok(())
            }
        }
    }

    /// Look up a registered trampoline.
    #[must_use]
    pub fn lookup(&self, namespace: &str, class: &str, method: &str) -> Option<RawThunk> {
        self.table
            .get(&NativeKey::new(namespace, class, method))
            .map(|entry| *entry.value())
    }

    /// Number of registered bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Install every binding into the runtime as an internal call.
    pub fn install(&self, host: &dyn ManagedHost) {
        for entry in self.table.iter() {
            host.bind_internal_call(&entry.key().path(), *entry.value());
        }
        log::debug!("installed {} native bindings", self.table.len());
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("bindings", &self.table.len())
            .finish()
    }
}
