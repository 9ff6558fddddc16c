//! Object lifetime management across the GC boundary.
//!
//! Native code cannot hold raw managed references across a collection cycle:
//! the collector may relocate any non-pinned object and will free anything
//! unreachable. The [`HandleTable`] is the single owner of the runtime-level
//! handle mapping and hands out opaque [`Handle`]s with three ownership
//! strengths:
//!
//! - **strong** — the target stays alive but may be relocated
//! - **pinned** — the target stays alive *and* address-stable; required before
//!   taking a raw address into it
//! - **weak** — no ownership; dereferencing after collection yields `None`,
//!   never a fault
//!
//! Raw-address access is only reachable through a [`PinGuard`], so every
//! address read is lexically scoped inside a pinned acquisition and released
//! on all exit paths. [`ObjectRef`] is the strong RAII form used for managed
//! objects handed to native callers.
//!
//! # Thread Safety
//!
//! The table is a concurrent hash map keyed by handle id; [`HandleTable::release`]
//! is safe to call concurrently with a collection cycle running inside the
//! managed runtime.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::runtime::{HandleKind, ManagedHost, ObjectId, RawHandle};
use crate::{Error, Result};

/// An opaque reference keeping a managed object reachable (and/or immovable)
/// for native code.
///
/// Handles are minted by the [`HandleTable`] and must be released explicitly
/// (or owned by one of the RAII wrappers). Operating on a released handle
/// fails with [`Error::StaleHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{}", self.0)
    }
}

struct HandleEntry {
    raw: RawHandle,
    kind: HandleKind,
}

/// Tracks every runtime-level GC handle the native side holds.
///
/// Owned by the [`Bridge`](crate::Bridge) context; components share it as
/// `Arc<HandleTable>`. All entries are dropped by [`HandleTable::clear`] at
/// shutdown.
pub struct HandleTable {
    host: Arc<dyn ManagedHost>,
    entries: DashMap<Handle, HandleEntry>,
    next: AtomicU64,
}

impl HandleTable {
    /// Create an empty table over the given runtime.
    #[must_use]
    pub fn new(host: Arc<dyn ManagedHost>) -> Self {
        HandleTable {
            host,
            entries: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    /// Keep an object alive across collections. The collector may still
    /// relocate it.
    pub fn keep(&self, obj: ObjectId) -> Handle {
        self.insert(obj, HandleKind::Strong)
    }

    /// Keep an object alive *and* fixed in memory.
    pub fn pin(&self, obj: ObjectId) -> Handle {
        self.insert(obj, HandleKind::Pinned)
    }

    /// Track an object without keeping it alive.
    pub fn weak(&self, obj: ObjectId) -> Handle {
        self.insert(obj, HandleKind::Weak)
    }

    /// The current target of a handle.
    ///
    /// Yields `Ok(None)` for a live weak handle whose target was collected —
    /// that is an answer, not a fault.
    ///
    /// # Errors
    /// Fails with [`Error::StaleHandle`] when the handle was already released.
    pub fn target(&self, handle: Handle) -> Result<Option<ObjectId>> {
        let entry = self.entries.get(&handle).ok_or(Error::StaleHandle(handle))?;
        Ok(self.host.handle_target(entry.raw))
    }

    /// The ownership strength of a handle.
    ///
    /// # Errors
    /// Fails with [`Error::StaleHandle`] when the handle was already released.
    pub fn kind(&self, handle: Handle) -> Result<HandleKind> {
        let entry = self.entries.get(&handle).ok_or(Error::StaleHandle(handle))?;
        Ok(entry.kind)
    }

    /// Release a handle, dropping the runtime-level handle behind it.
    ///
    /// Safe to call concurrently with a collection cycle.
    ///
    /// # Errors
    /// Fails with [`Error::StaleHandle`] when the handle was already released.
    pub fn release(&self, handle: Handle) -> Result<()> {
        let (_, entry) = self
            .entries
            .remove(&handle)
            .ok_or(Error::StaleHandle(handle))?;
        self.host.handle_free(entry.raw);
        Ok(())
    }

    /// Pin an object for a lexical scope.
    ///
    /// The returned guard is the only way to take a raw address into managed
    /// memory; it releases the pin on all exit paths.
    pub fn pinned(&self, obj: ObjectId) -> PinGuard<'_> {
        let handle = self.pin(obj);
        PinGuard {
            table: self,
            handle,
            target: obj,
        }
    }

    /// Wrap an object in a strong RAII reference.
    pub fn adopt(self: &Arc<Self>, obj: ObjectId) -> ObjectRef {
        ObjectRef {
            handle: self.keep(obj),
            target: obj,
            table: self.clone(),
        }
    }

    /// Number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no handle is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every live handle. Called at bridge shutdown.
    pub fn clear(&self) {
        self.entries.retain(|_, entry| {
            self.host.handle_free(entry.raw);
            false
        });
    }

    fn insert(&self, obj: ObjectId, kind: HandleKind) -> Handle {
        let raw = self.host.handle_new(obj, kind);
        let handle = Handle(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(handle, HandleEntry { raw, kind });
        handle
    }
}

impl std::fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.entries.len())
            .finish_non_exhaustive()
    }
}

/// A scoped pin: keeps its target alive and address-stable until dropped.
///
/// Any raw-address access into a managed value must happen through one of
/// these, which makes the access lexically scoped inside the pinned window by
/// construction.
pub struct PinGuard<'a> {
    table: &'a HandleTable,
    handle: Handle,
    target: ObjectId,
}

impl PinGuard<'_> {
    /// The pinned object.
    #[must_use]
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// The underlying handle (for diagnostics).
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The object's storage address, stable for the guard's lifetime.
    ///
    /// # Errors
    /// Fails with [`Error::StaleHandle`] when the runtime no longer knows the
    /// object (which would indicate a handle bookkeeping bug upstream).
    pub fn address(&self) -> Result<NonNull<u8>> {
        self.table
            .host
            .address_of(self.target)
            .ok_or(Error::StaleHandle(self.handle))
    }
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        let _ = self.table.release(self.handle);
    }
}

/// A strong RAII reference to a managed object.
///
/// Produced by [`HandleTable::adopt`] — and by the invocation dispatcher for
/// every managed object it hands back to native code — so that the object
/// stays reachable for exactly as long as the native side holds the
/// reference.
pub struct ObjectRef {
    table: Arc<HandleTable>,
    handle: Handle,
    target: ObjectId,
}

impl ObjectRef {
    /// The referenced object.
    #[must_use]
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// The underlying handle (for diagnostics).
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The target as an argument value for a further invocation.
    #[must_use]
    pub fn as_value(&self) -> crate::runtime::Value {
        crate::runtime::Value::Object(self.target)
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        self.table.adopt(self.target)
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        let _ = self.table.release(self.handle);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("target", &self.target)
            .field("handle", &self.handle)
            .finish()
    }
}
