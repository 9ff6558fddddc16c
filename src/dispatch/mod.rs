//! Invocation dispatch and exception bridging.
//!
//! # Key Components
//!
//! - [`Dispatcher`]: the reflective (exception-safe) and raw-thunk (fast,
//!   no safety net) call paths, constructors, and field/property access
//! - [`ExceptionBridge`] / [`ExceptionCarrier`]: capture a managed fault into
//!   a native-side snapshot, report it as a diagnostic, or rethrow it into
//!   managed control flow
//! - [`Invoked`] / [`CallResult`]: tagged invocation outcomes — faults travel
//!   as data, object results arrive pre-registered with the lifetime manager
//! - [`OnMissing`]: per-call-site choice between a null result and a hard
//!   error when resolution misses

mod exception;
mod invoker;

pub use exception::{ExceptionBridge, ExceptionCarrier};
pub use invoker::{CallResult, Dispatcher, Invoked, OnMissing};
