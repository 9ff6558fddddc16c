//! Integration tests for exception capture, reporting and rethrow.

mod common;

use std::sync::{Arc, Mutex, OnceLock};

use clrbridge::prelude::*;
use common::{SimBuilder, SimHost};

fn faulting_host() -> Arc<SimHost> {
    let mut sim = SimBuilder::new();
    let object = sim.object();
    let exception = sim.exception();

    let boom = sim.add_type("Cryambly", "Game", "BoomError", TypeAttributes::empty(), Some(exception));
    let io_error = sim.add_type("Cryambly", "Game", "DiskError", TypeAttributes::empty(), Some(exception));

    let thrower = sim.add_type("Cryambly", "Game", "Thrower", TypeAttributes::empty(), Some(object));
    sim.add_method(thrower, "Explode", vec![], ValueKind::Void, true, move |host, _, _| {
        Err(host.make_exception(boom, "kaboom", None))
    });
    sim.add_method(thrower, "ExplodeNested", vec![], ValueKind::Void, true, move |host, _, _| {
        let cause = host.make_exception(io_error, "sector unreadable", None);
        Err(host.make_exception(boom, "save failed", Some(cause)))
    });

    let wrapper = sim.add_type("Cryambly", "Game", "Wrapper", TypeAttributes::empty(), Some(object));
    sim.add_method(wrapper, "Invoke", vec![], ValueKind::Void, true, |host, _, _| {
        host.call_native("Engine.Faults::Raise", None, &[]);
        Ok(None)
    });

    sim.build()
}

fn bridge_over(host: &Arc<SimHost>, natives: Arc<NativeRegistry>) -> Bridge {
    Bridge::initialize(host.clone(), BridgeConfig::default(), natives).unwrap()
}

fn invoke_static(bridge: &Bridge, type_name: &str, method: &str) -> Invoked {
    let ty = bridge.registry().get("Cryambly", "Game", type_name).unwrap();
    bridge
        .dispatcher()
        .resolve_and_invoke(&ty, method, None, &[], OnMissing::Fail)
        .unwrap()
}

#[test]
fn test_fault_is_captured_into_a_carrier() {
    let host = faulting_host();
    let bridge = bridge_over(&host, Arc::new(NativeRegistry::new()));

    let carrier = invoke_static(&bridge, "Thrower", "Explode")
        .faulted()
        .expect("Explode must fault");

    assert_eq!(carrier.type_name(), "Game.BoomError");
    assert_eq!(carrier.message(), "kaboom");
    assert!(!carrier.stack_trace().is_empty());
    assert!(carrier.inner().is_none());
    assert_eq!(carrier.chain().count(), 1);
}

#[test]
fn test_carrier_roots_the_exception_object() {
    let host = faulting_host();
    let bridge = bridge_over(&host, Arc::new(NativeRegistry::new()));

    let carrier = invoke_static(&bridge, "Thrower", "Explode")
        .faulted()
        .unwrap();
    let exception_obj = carrier.object();

    // While the carrier is alive its strong handle keeps the object across
    // collections.
    host.collect();
    assert!(host.is_alive(exception_obj));
    assert_eq!(carrier.message(), "kaboom");

    drop(carrier);
    host.collect();
    assert!(!host.is_alive(exception_obj));
}

#[test]
fn test_inner_exception_chain_is_walkable() {
    let host = faulting_host();
    let bridge = bridge_over(&host, Arc::new(NativeRegistry::new()));

    let carrier = invoke_static(&bridge, "Thrower", "ExplodeNested")
        .faulted()
        .unwrap();

    assert_eq!(carrier.type_name(), "Game.BoomError");
    assert_eq!(carrier.message(), "save failed");

    let cause = carrier.inner().expect("inner exception preserved");
    assert_eq!(cause.type_name(), "Game.DiskError");
    assert_eq!(cause.message(), "sector unreadable");
    assert!(cause.inner().is_none());

    let names: Vec<&str> = carrier.chain().map(ExceptionCarrier::type_name).collect();
    assert_eq!(names, ["Game.BoomError", "Game.DiskError"]);
}

#[test]
fn test_carrier_escalates_to_invocation_fault() {
    let host = faulting_host();
    let bridge = bridge_over(&host, Arc::new(NativeRegistry::new()));

    let carrier = invoke_static(&bridge, "Thrower", "Explode")
        .faulted()
        .unwrap();
    let error = carrier.to_error();
    match error {
        Error::InvocationFault { type_name, message } => {
            assert_eq!(type_name, "Game.BoomError");
            assert_eq!(message, "kaboom");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_report_walks_the_chain() {
    let _ = env_logger::builder().is_test(true).try_init();
    let host = faulting_host();
    let bridge = bridge_over(&host, Arc::new(NativeRegistry::new()));

    let carrier = invoke_static(&bridge, "Thrower", "ExplodeNested")
        .faulted()
        .unwrap();
    // Reports go to the log facade; this must not panic or consume the
    // carrier.
    bridge.dispatcher().exceptions().report(&carrier);
    assert_eq!(carrier.chain().count(), 2);
}

static RETHROW_BRIDGE: OnceLock<Arc<Bridge>> = OnceLock::new();
static RETHROW_CARRIER: Mutex<Option<ExceptionCarrier>> = Mutex::new(None);

unsafe extern "C" fn rethrow_trampoline(
    _data: *const std::ffi::c_void,
    _target: u64,
    _args: *const Value,
    _argc: usize,
    _ret: *mut Value,
) {
    // A native wrapper that must look exception-transparent: it re-raises the
    // captured fault into the managed frame that called it.
    let bridge = RETHROW_BRIDGE.get().expect("bridge installed");
    let carrier = RETHROW_CARRIER
        .lock()
        .unwrap()
        .take()
        .expect("carrier staged");
    bridge.dispatcher().exceptions().rethrow(carrier);
}

#[test]
fn test_rethrow_is_observed_as_the_original_exception() {
    let host = faulting_host();
    let natives = Arc::new(NativeRegistry::new());
    natives
        .register(
            "Engine",
            "Faults",
            "Raise",
            RawThunk::new(rethrow_trampoline, std::ptr::null()),
        )
        .unwrap();
    let bridge = Arc::new(bridge_over(&host, natives));
    RETHROW_BRIDGE.set(bridge.clone()).ok();

    // Capture a fault natively...
    let original = invoke_static(&bridge, "Thrower", "Explode")
        .faulted()
        .unwrap();
    let original_obj = original.object();
    *RETHROW_CARRIER.lock().unwrap() = Some(original);

    // ...then run a managed method whose native callee rethrows it. The
    // managed-side handler (here: the invoke boundary of Wrapper.Invoke)
    // observes the original exception, not a copy.
    let reraised = invoke_static(&bridge, "Wrapper", "Invoke")
        .faulted()
        .expect("rethrown fault surfaces to the managed caller");

    assert_eq!(reraised.type_name(), "Game.BoomError");
    assert_eq!(reraised.message(), "kaboom");
    assert_eq!(reraised.object(), original_obj);
}
