use thiserror::Error;

use crate::handles::Handle;

/// The generic Error type, which provides coverage for all recoverable errors this
/// library can potentially return.
///
/// This enum covers the failure modes of member lookup, invocation dispatch and
/// handle management. One class of failure is deliberately absent: a fault raised
/// during a raw-thunk call has no safety net and terminates the process rather than
/// surfacing here — that is the documented cost of the fast path.
///
/// # Error Categories
///
/// ## Lookup Errors
/// - [`Error::TypeNotFound`] - Requested type is not known to the managed runtime
/// - [`Error::MissingMember`] - No member matched a name/signature query
///
/// ## Invocation Errors
/// - [`Error::InvocationFault`] - Managed code raised an exception during a reflective call
///
/// ## Lifetime Errors
/// - [`Error::StaleHandle`] - Operation on a handle that was already released
///
/// ## Structural Errors
/// - [`Error::DepthLimit`] - Inheritance walk exceeded the configured depth guard
/// - [`Error::NativeRebound`] - A native trampoline was registered twice under one key
/// - [`Error::TypeError`] - Operation applied to the wrong flavor of type
///
/// # Examples
///
/// ```rust,no_run
/// use clrbridge::{Bridge, Error};
/// # fn example(bridge: &Bridge) {
/// match bridge.registry().get("Cryambly", "CryEngine", "Vector") {
///     Ok(ty) => println!("resolved {}", ty.fullname()),
///     Err(Error::TypeNotFound(name)) => eprintln!("no such type: {name}"),
///     Err(e) => eprintln!("lookup failed: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The requested type is not loaded in the managed runtime.
    ///
    /// Returned by registry lookups when neither the local cache nor the
    /// runtime's reflection metadata knows the qualified name. The associated
    /// string is the `Assembly/Namespace.Name` that failed to resolve.
    #[error("Failed to find type in the managed runtime - {0}")]
    TypeNotFound(String),

    /// No method, field, property or event matched the query.
    ///
    /// Produced only when the call site opted into escalation via
    /// [`OnMissing::Fail`](crate::dispatch::OnMissing); with the lenient policy
    /// the same condition surfaces as a null result instead.
    #[error("Failed to locate member {member} in class {type_name}")]
    MissingMember {
        /// Full name of the type that was searched (including its base chain)
        type_name: String,
        /// The member name the caller asked for
        member: String,
    },

    /// Managed code raised an exception during a reflective invocation.
    ///
    /// The fault was captured at the invoke boundary and converted into an
    /// [`ExceptionCarrier`](crate::dispatch::ExceptionCarrier); this variant is
    /// the escalated form for callers that treat a fault as a hard error.
    #[error("Managed invocation fault [{type_name}]: {message}")]
    InvocationFault {
        /// Full name of the managed exception type
        type_name: String,
        /// The exception message text
        message: String,
    },

    /// Operation on a handle that was already released.
    ///
    /// Distinct from dereferencing a live weak handle whose target was
    /// collected — that yields `None`, never an error.
    #[error("Operation on released object handle - {0}")]
    StaleHandle(Handle),

    /// An inheritance walk exceeded the configured depth guard.
    ///
    /// Base chains are walked iteratively with a fixed limit so that corrupt
    /// or adversarial metadata can never recurse unbounded. The associated
    /// value is the limit that was hit.
    #[error("Reached the maximum inheritance depth allowed - {0}")]
    DepthLimit(usize),

    /// A native trampoline was registered twice under the same key.
    ///
    /// The downward registration table is populated once at startup; a second
    /// binding for the same `Namespace.Class::Method` path is a programming
    /// error in a collaborator module, not a condition to silently overwrite.
    #[error("Native trampoline already bound - {0}")]
    NativeRebound(String),

    /// General error during type system usage.
    ///
    /// Covers operations applied to the wrong flavor of type, such as heap
    /// allocation of a value type, as well as malformed runtime metadata.
    #[error("{0}")]
    TypeError(String),
}
