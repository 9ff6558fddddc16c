//! The top-level bridge context and its lifecycle.
//!
//! A [`Bridge`] owns every component — registry, handle table, native table,
//! dispatcher — and is created, ticked and torn down by the host application.
//! Nothing in this crate is reachable through an ambient global: callers pass
//! the context (or the pieces they borrowed from it) explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dispatch::{Dispatcher, Invoked};
use crate::handles::HandleTable;
use crate::natives::NativeRegistry;
use crate::runtime::{ManagedHost, RawThunk, Value, ValueKind};
use crate::typesystem::{ArgEntry, ArgumentSpec, Resolution, TypeRegistry};
use crate::{Error, Result};

/// The managed class that receives lifecycle notifications.
///
/// When configured, the bridge resolves `Initialize()`, `Update(float)` and
/// `Shutdown()` on this class at startup, caches raw thunks for the per-frame
/// pair, and drives them from the host's lifecycle hooks.
#[derive(Debug, Clone)]
pub struct ManagedEntryPoint {
    /// Simple name of the assembly declaring the entry class
    pub assembly: String,
    /// Namespace of the entry class
    pub namespace: String,
    /// Name of the entry class
    pub class: String,
}

/// Configuration of a bridge instance.
///
/// Plain data with workable defaults; host applications override what they
/// need.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Managed entry class, `None` to run without lifecycle forwarding
    pub entry: Option<ManagedEntryPoint>,
    /// Depth guard for inheritance walks
    pub max_inheritance_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            entry: None,
            max_inheritance_depth: crate::typesystem::DEFAULT_INHERITANCE_DEPTH,
        }
    }
}

/// Cached entry points into the managed lifecycle class.
///
/// These run through the raw-thunk fast path: they execute once per frame and
/// are part of the managed runtime's own scaffolding, which is contractually
/// fault-free.
struct EntryThunks {
    update: RawThunk,
    shutdown: RawThunk,
}

/// The bridge context: single owner of all interop state.
///
/// # Lifecycle
///
/// - [`Bridge::initialize`] — install native bindings, build the registries,
///   wire the managed entry class (when configured) and run its `Initialize`.
/// - [`Bridge::on_update`] — forward the host's per-frame tick.
/// - [`Bridge::shutdown`] — tear everything down exactly once; a second call
///   is a no-op and `Drop` runs it as a safety net.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use clrbridge::{Bridge, BridgeConfig};
/// use clrbridge::natives::NativeRegistry;
/// # fn example(host: Arc<dyn clrbridge::runtime::ManagedHost>) -> clrbridge::Result<()> {
/// let natives = Arc::new(NativeRegistry::new());
/// let bridge = Bridge::initialize(host, BridgeConfig::default(), natives)?;
///
/// let vector = bridge.registry().get("Cryambly", "CryEngine", "Vector")?;
/// println!("resolved {}", vector.fullname());
///
/// bridge.on_update(0.016);
/// bridge.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    host: Arc<dyn ManagedHost>,
    registry: Arc<TypeRegistry>,
    handles: Arc<HandleTable>,
    natives: Arc<NativeRegistry>,
    dispatcher: Dispatcher,
    entry: Option<EntryThunks>,
    down: AtomicBool,
}

impl Bridge {
    /// Bring the bridge up.
    ///
    /// Installs the native table into the runtime, builds the type registry
    /// (registering the sentinel root), and — when an entry class is
    /// configured — resolves its lifecycle methods, caches `Update`/`Shutdown`
    /// thunks and invokes `Initialize` reflectively. An `Initialize` fault is
    /// reported and escalated: a bridge whose managed half failed to start is
    /// not handed out.
    ///
    /// # Errors
    /// - [`Error::TypeNotFound`] / [`Error::MissingMember`] when the entry
    ///   class or one of its lifecycle methods is absent
    /// - [`Error::InvocationFault`] when the managed `Initialize` raised
    pub fn initialize(
        host: Arc<dyn ManagedHost>,
        config: BridgeConfig,
        natives: Arc<NativeRegistry>,
    ) -> Result<Self> {
        natives.install(host.as_ref());

        let registry = Arc::new(TypeRegistry::with_depth(
            host.clone(),
            config.max_inheritance_depth,
        )?);
        let handles = Arc::new(HandleTable::new(host.clone()));
        let dispatcher = Dispatcher::new(host.clone(), registry.clone(), handles.clone());

        let entry = match &config.entry {
            Some(entry_point) => Some(Self::wire_entry(
                &registry,
                &dispatcher,
                entry_point,
            )?),
            None => None,
        };

        log::info!(
            "bridge initialized: {} native bindings, entry {}",
            natives.len(),
            config
                .entry
                .as_ref()
                .map_or_else(|| "none".to_string(), |e| format!("{}.{}", e.namespace, e.class)),
        );

        Ok(Bridge {
            host,
            registry,
            handles,
            natives,
            dispatcher,
            entry,
            down: AtomicBool::new(false),
        })
    }

    /// The type registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The handle table.
    #[must_use]
    pub fn handles(&self) -> &Arc<HandleTable> {
        &self.handles
    }

    /// The native binding table.
    #[must_use]
    pub fn natives(&self) -> &Arc<NativeRegistry> {
        &self.natives
    }

    /// The invocation dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The managed runtime behind this bridge.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn ManagedHost> {
        &self.host
    }

    /// Forward the host's per-frame tick into the managed entry class.
    ///
    /// Runs through the cached `Update` thunk; a no-op without an entry class
    /// or after shutdown.
    pub fn on_update(&self, delta_time: f32) {
        if self.down.load(Ordering::Acquire) {
            return;
        }
        if let Some(entry) = &self.entry {
            // Fast path by design: Update runs every frame and must not throw.
            unsafe {
                entry.update.call(None, &[Value::R4(delta_time)]);
            }
        }
    }

    /// Tear the bridge down.
    ///
    /// Notifies the managed entry class, releases every live handle and drops
    /// the registered descriptors. Idempotent: the first caller wins and
    /// every later call (including the one from `Drop`) is a no-op.
    pub fn shutdown(&self) {
        if self.down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(entry) = &self.entry {
            unsafe {
                entry.shutdown.call(None, &[]);
            }
        }
        self.handles.clear();
        self.registry.clear();
        log::info!("bridge shut down");
    }

    /// `true` once [`Bridge::shutdown`] ran.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }

    fn wire_entry(
        registry: &Arc<TypeRegistry>,
        dispatcher: &Dispatcher,
        entry_point: &ManagedEntryPoint,
    ) -> Result<EntryThunks> {
        let class = registry.get(
            &entry_point.assembly,
            &entry_point.namespace,
            &entry_point.class,
        )?;
        let resolver = dispatcher.resolver();

        let initialize = Self::required(
            resolver.resolve(&class, "Initialize", &ArgumentSpec::arity(0), false)?,
            &class,
            "Initialize",
        )?;
        let update = Self::required(
            resolver.resolve(
                &class,
                "Update",
                &ArgumentSpec::exact(vec![ArgEntry::of(ValueKind::R4)]),
                false,
            )?,
            &class,
            "Update",
        )?;
        let shutdown = Self::required(
            resolver.resolve(&class, "Shutdown", &ArgumentSpec::arity(0), false)?,
            &class,
            "Shutdown",
        )?;

        let thunks = EntryThunks {
            update: dispatcher.thunk(&update)?,
            shutdown: dispatcher.thunk(&shutdown)?,
        };

        match dispatcher.invoke(&initialize, None, &[]) {
            Invoked::Returned(_) => Ok(thunks),
            Invoked::Faulted(carrier) => {
                dispatcher.exceptions().report(&carrier);
                Err(carrier.to_error())
            }
        }
    }

    fn required(
        resolution: Resolution,
        class: &crate::typesystem::TypeRc,
        name: &str,
    ) -> Result<crate::typesystem::MemberRc> {
        resolution.found().ok_or_else(|| Error::MissingMember {
            type_name: class.fullname(),
            member: name.to_string(),
        })
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("types", &self.registry.len())
            .field("handles", &self.handles.len())
            .field("natives", &self.natives.len())
            .field("down", &self.down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
