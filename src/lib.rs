// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # clrbridge
//!
//! A bidirectional interop bridge between native engine code and a managed,
//! CLR-style scripting runtime. Native code invokes managed methods, fields,
//! properties and constructors by reflection-like lookup; managed code invokes
//! native engine services through registered trampolines — both directions
//! sharing one unmanaged thunk ABI.
//!
//! ## Features
//!
//! - **Overload resolution** - name + argument-category search over a type's
//!   own and inherited members, preserving the legacy first-match-in-declaration-order
//!   policy that managed script code depends on
//! - **Two call paths** - an exception-safe reflective invoke, and a cached
//!   raw-thunk fast path with no safety net for hot, non-throwing members
//! - **GC lifetime coordination** - strong/pinned/weak handles over a moving
//!   collector, with RAII guards and lexically scoped raw-address access
//! - **Exception bridging** - managed faults captured into native-side
//!   carriers with walkable cause chains; report as a diagnostic or rethrow
//!   into managed control flow
//! - **Opaque runtime seam** - the concrete scripting runtime lives behind the
//!   [`ManagedHost`](runtime::ManagedHost) trait, so the bridge never commits
//!   to a particular embedding API
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clrbridge::prelude::*;
//!
//! # fn example(host: Arc<dyn ManagedHost>) -> clrbridge::Result<()> {
//! let natives = Arc::new(NativeRegistry::new());
//! let bridge = Bridge::initialize(host, BridgeConfig::default(), natives)?;
//!
//! // Locate a managed type and call a method on a fresh instance.
//! let vector = bridge.registry().get("Cryambly", "CryEngine", "Vector")?;
//! let created = bridge.dispatcher().create_instance(
//!     &vector,
//!     &[Value::R4(3.0), Value::R4(4.0)],
//!     OnMissing::Fail,
//! )?;
//!
//! if let Invoked::Returned(CallResult::Object(instance)) = created {
//!     let length = bridge.dispatcher().resolve_and_invoke(
//!         &vector,
//!         "Length",
//!         Some(instance.target()),
//!         &[],
//!         OnMissing::Fail,
//!     )?;
//!     match length {
//!         Invoked::Returned(result) => println!("length: {:?}", result.value()),
//!         Invoked::Faulted(fault) => bridge.dispatcher().exceptions().report(&fault),
//!     }
//! }
//!
//! bridge.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! `clrbridge` is organized into several key modules:
//!
//! - [`runtime`] - the [`ManagedHost`](runtime::ManagedHost) seam, runtime-typed
//!   [`Value`](runtime::Value)s and the shared thunk ABI
//! - [`typesystem`] - type/member descriptors, the concurrent
//!   [`TypeRegistry`](typesystem::TypeRegistry) and the
//!   [`MemberResolver`](typesystem::MemberResolver)
//! - [`dispatch`] - the [`Dispatcher`](dispatch::Dispatcher) call paths and the
//!   exception bridge
//! - [`handles`] - the [`HandleTable`](handles::HandleTable) lifetime manager
//! - [`natives`] - the downward [`NativeRegistry`](natives::NativeRegistry)
//! - [`Bridge`] - the owning context with its initialize/update/shutdown
//!   lifecycle
//!
//! ## Invocation Safety
//!
//! The reflective path never lets a managed fault cross into native code
//! unannounced: faults arrive as [`ExceptionCarrier`](dispatch::ExceptionCarrier)
//! values. The raw-thunk path makes the opposite trade — no marshalling
//! overhead and no net. A fault during a thunk call terminates the process;
//! that is a documented property of the fast path, not a bug to be caught.

pub mod dispatch;
pub mod handles;
pub mod natives;
pub mod runtime;
pub mod typesystem;

mod context;
mod error;

pub mod prelude;

#[cfg(test)]
pub(crate) mod test;

pub use context::{Bridge, BridgeConfig, ManagedEntryPoint};
pub use error::Error;

/// The result type used throughout clrbridge
pub type Result<T> = std::result::Result<T, Error>;
