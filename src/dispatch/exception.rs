//! Capturing, reporting and rethrowing managed exceptions.
//!
//! A fault raised during a reflective invocation is caught at the invoke
//! boundary and converted into an [`ExceptionCarrier`]: a native-side snapshot
//! of the exception (type name, message, stack trace, walkable inner chain)
//! that keeps the underlying managed object alive through a strong handle
//! while native code inspects it. The caller then decides the exception's
//! fate — [`ExceptionBridge::report`] when native code is the final handler,
//! [`ExceptionBridge::rethrow`] when a native wrapper must look
//! exception-transparent to its managed caller.

use std::sync::Arc;

use crate::handles::{HandleTable, ObjectRef};
use crate::runtime::{ManagedHost, ObjectId};
use crate::Error;

/// Inner-exception chains deeper than this are truncated; anything beyond is
/// runaway metadata, not a real cause chain.
const INNER_CHAIN_LIMIT: usize = 32;

/// A captured managed exception, held safely on the native side.
///
/// The carrier owns a strong handle to the exception object, so the snapshot
/// stays consistent with a live object for the carrier's whole lifetime —
/// including across collections — until it is dropped or consumed by
/// [`ExceptionBridge::rethrow`].
#[derive(Debug)]
pub struct ExceptionCarrier {
    obj: ObjectRef,
    type_name: String,
    message: String,
    stack_trace: String,
    inner: Option<Box<ExceptionCarrier>>,
}

impl ExceptionCarrier {
    /// Full name of the managed exception type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The exception message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The formatted managed stack trace.
    #[must_use]
    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    /// The wrapped exception object.
    #[must_use]
    pub fn object(&self) -> ObjectId {
        self.obj.target()
    }

    /// The inner exception, if any.
    #[must_use]
    pub fn inner(&self) -> Option<&ExceptionCarrier> {
        self.inner.as_deref()
    }

    /// Walk the cause chain, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionCarrier> {
        CarrierChain(Some(self))
    }

    /// Escalate the carrier into a hard [`Error::InvocationFault`].
    #[must_use]
    pub fn to_error(&self) -> Error {
        Error::InvocationFault {
            type_name: self.type_name.clone(),
            message: self.message.clone(),
        }
    }
}

struct CarrierChain<'a>(Option<&'a ExceptionCarrier>);

impl<'a> Iterator for CarrierChain<'a> {
    type Item = &'a ExceptionCarrier;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.0.take()?;
        self.0 = current.inner();
        Some(current)
    }
}

/// Converts managed exceptions into native diagnostics and back.
pub struct ExceptionBridge {
    host: Arc<dyn ManagedHost>,
    handles: Arc<HandleTable>,
}

impl ExceptionBridge {
    /// Create a bridge over the given runtime and handle table.
    #[must_use]
    pub fn new(host: Arc<dyn ManagedHost>, handles: Arc<HandleTable>) -> Self {
        ExceptionBridge { host, handles }
    }

    /// Capture a raised exception object into a carrier.
    ///
    /// The inner chain is walked iteratively (depth-capped) and every object
    /// in it is rooted through the handle table while the carrier lives.
    #[must_use]
    pub fn capture(&self, raw: ObjectId) -> ExceptionCarrier {
        let mut chain = Vec::new();
        let mut cursor = Some(raw);
        while let Some(ex) = cursor {
            if chain.len() >= INNER_CHAIN_LIMIT {
                break;
            }
            let info = self.host.exception_info(ex);
            cursor = info.inner;
            chain.push((ex, info));
        }

        // Fold innermost-first so each carrier boxes its cause.
        let mut carrier: Option<Box<ExceptionCarrier>> = None;
        for (ex, info) in chain.into_iter().rev() {
            carrier = Some(Box::new(ExceptionCarrier {
                obj: self.handles.adopt(ex),
                type_name: info.type_name,
                message: info.message,
                stack_trace: info.stack_trace,
                inner: carrier,
            }));
        }

        match carrier {
            Some(carrier) => *carrier,
            // The chain always contains at least `raw` itself; an empty walk
            // means the host answered nothing useful, so synthesize a shell.
            None => ExceptionCarrier {
                obj: self.handles.adopt(raw),
                type_name: String::from("<unknown>"),
                message: String::new(),
                stack_trace: String::new(),
                inner: None,
            },
        }
    }

    /// Surface a carrier as a native diagnostic.
    ///
    /// Logs the exception type, message and stack trace, then each inner
    /// cause. Used when native code is the final handler; reports never
    /// silently disappear.
    pub fn report(&self, carrier: &ExceptionCarrier) {
        log::error!(
            "unhandled managed exception [{}]: {}",
            carrier.type_name(),
            carrier.message()
        );
        if !carrier.stack_trace().is_empty() {
            log::error!("{}", carrier.stack_trace());
        }
        for cause in carrier.chain().skip(1) {
            log::error!(
                "caused by [{}]: {}",
                cause.type_name(),
                cause.message()
            );
        }
    }

    /// Re-raise a captured exception into managed control flow.
    ///
    /// Consumes the carrier: the runtime takes over responsibility for the
    /// exception object's reachability, and the carrier's handles are
    /// released. Used by native wrappers that must look exception-transparent
    /// to their managed callers.
    pub fn rethrow(&self, carrier: ExceptionCarrier) {
        self.host.rethrow(carrier.object());
        drop(carrier);
    }
}

impl std::fmt::Debug for ExceptionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionBridge").finish_non_exhaustive()
    }
}
