//! An in-memory managed host for integration tests.
//!
//! `SimHost` implements [`ManagedHost`] over a hand-built metadata model and a
//! heap with an observable collector: [`SimHost::collect`] frees every object
//! unreachable from strong/pinned handles (tracing through object fields) and
//! relocates every surviving non-pinned object. Method bodies are Rust
//! closures; exceptions are real heap objects carrying message, stack-trace
//! and inner-exception fields; `rethrow` parks the exception in a pending slot
//! that the innermost active managed frame delivers on return.

// Each integration suite compiles this module separately and uses a different
// slice of it.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clrbridge::prelude::*;

/// Outcome of a simulated managed body: a return value or a raised exception
/// object.
pub type BodyResult = std::result::Result<Option<Value>, ObjectId>;

type Body = Arc<dyn Fn(&SimHost, Option<ObjectId>, &[Value]) -> BodyResult + Send + Sync>;

struct SimType {
    assembly: String,
    namespace: String,
    name: String,
    attributes: TypeAttributes,
    base: Option<TypeToken>,
    members: Vec<usize>,
}

struct SimMember {
    info: MemberInfo,
    body: Option<Body>,
}

struct SimObject {
    ty: TypeToken,
    fields: HashMap<String, Value>,
    address: usize,
}

struct Heap {
    objects: HashMap<u64, SimObject>,
    next_address: usize,
}

struct SimHandle {
    target: u64,
    kind: HandleKind,
}

struct ThunkData {
    host: *const SimHost,
    member: MemberToken,
}

pub struct SimHost {
    types: Vec<SimType>,
    by_name: HashMap<String, TypeToken>,
    members: Vec<SimMember>,
    heap: Mutex<Heap>,
    statics: Mutex<HashMap<MemberToken, Value>>,
    handles: Mutex<HashMap<u64, SimHandle>>,
    next_handle: AtomicU64,
    next_object: AtomicU64,
    pending: Mutex<Option<ObjectId>>,
    internal_calls: Mutex<HashMap<String, RawThunk>>,
    /// How many times `declared_members` ran (population-once assertions).
    pub member_walks: AtomicUsize,
}

impl SimHost {
    fn sim_type(&self, ty: TypeToken) -> Option<&SimType> {
        self.types.get(ty.0 as usize - 1)
    }

    fn sim_member(&self, member: MemberToken) -> &SimMember {
        &self.members[member.0 as usize - 1]
    }

    fn fullname(&self, ty: TypeToken) -> String {
        let rec = &self.types[ty.0 as usize - 1];
        if rec.namespace.is_empty() {
            rec.name.clone()
        } else {
            format!("{}.{}", rec.namespace, rec.name)
        }
    }

    /// Run a managed body and deliver any pending rethrow to this frame.
    fn run_member(
        &self,
        member: MemberToken,
        target: Option<ObjectId>,
        args: &[Value],
    ) -> BodyResult {
        let body = self
            .sim_member(member)
            .body
            .clone()
            .expect("member has no runnable body");
        let result = body(self, target, args);
        if let Some(pending) = self.pending.lock().unwrap().take() {
            return Err(pending);
        }
        result
    }

    /// Allocate a heap object of `ty` with all declared fields nulled.
    pub fn new_object(&self, ty: TypeToken) -> ObjectId {
        let id = self.next_object.fetch_add(1, Ordering::Relaxed);
        let mut heap = self.heap.lock().unwrap();
        let address = heap.next_address;
        heap.next_address += 64;
        let mut fields = HashMap::new();
        let mut cursor = Some(ty);
        while let Some(tok) = cursor {
            let rec = &self.types[tok.0 as usize - 1];
            for &idx in &rec.members {
                let info = &self.members[idx].info;
                if info.kind == MemberKind::Field {
                    fields.insert(info.name.clone(), Value::Null);
                }
            }
            cursor = rec.base;
        }
        heap.objects.insert(id, SimObject { ty, fields, address });
        ObjectId(id)
    }

    /// Build a managed exception object.
    pub fn make_exception(
        &self,
        ty: TypeToken,
        message: &str,
        inner: Option<ObjectId>,
    ) -> ObjectId {
        let ex = self.new_object(ty);
        self.set_field_direct(ex, "_message", Value::String(message.to_string()));
        self.set_field_direct(
            ex,
            "_stackTrace",
            Value::String(format!("  at {}.Throw()", self.fullname(ty))),
        );
        self.set_field_direct(
            ex,
            "_inner",
            inner.map_or(Value::Null, Value::Object),
        );
        ex
    }

    /// Write an object field without going through the bridge.
    pub fn set_field_direct(&self, obj: ObjectId, name: &str, value: Value) {
        let mut heap = self.heap.lock().unwrap();
        let object = heap.objects.get_mut(&obj.0).expect("dead object");
        object.fields.insert(name.to_string(), value);
    }

    /// Read an object field without going through the bridge.
    pub fn get_field_direct(&self, obj: ObjectId, name: &str) -> Option<Value> {
        let heap = self.heap.lock().unwrap();
        heap.objects
            .get(&obj.0)
            .and_then(|object| object.fields.get(name).cloned())
    }

    /// The current simulated storage address of an object.
    pub fn address_probe(&self, obj: ObjectId) -> Option<usize> {
        let heap = self.heap.lock().unwrap();
        heap.objects.get(&obj.0).map(|object| object.address)
    }

    /// `true` while the object has not been collected.
    pub fn is_alive(&self, obj: ObjectId) -> bool {
        self.heap.lock().unwrap().objects.contains_key(&obj.0)
    }

    /// Run a full collection cycle: free everything unreachable from
    /// strong/pinned handles (and a pending rethrow), then relocate every
    /// surviving non-pinned object.
    pub fn collect(&self) {
        // Snapshot the root set before touching the heap; `handle_target`
        // locks handles-then-heap and must never meet the reverse order.
        let (mut stack, pinned) = {
            let handles = self.handles.lock().unwrap();
            let stack: Vec<u64> = handles
                .values()
                .filter(|handle| handle.kind != HandleKind::Weak)
                .map(|handle| handle.target)
                .collect();
            let pinned: HashSet<u64> = handles
                .values()
                .filter(|handle| handle.kind == HandleKind::Pinned)
                .map(|handle| handle.target)
                .collect();
            (stack, pinned)
        };
        if let Some(pending) = *self.pending.lock().unwrap() {
            stack.push(pending.0);
        }

        let mut heap = self.heap.lock().unwrap();
        let mut live: HashSet<u64> = HashSet::new();
        while let Some(id) = stack.pop() {
            if !live.insert(id) {
                continue;
            }
            if let Some(object) = heap.objects.get(&id) {
                for value in object.fields.values() {
                    if let Value::Object(child) = value {
                        stack.push(child.0);
                    }
                }
            }
        }
        heap.objects.retain(|id, _| live.contains(id));

        let mut next_address = heap.next_address;
        for (id, object) in heap.objects.iter_mut() {
            if !pinned.contains(id) {
                object.address = next_address;
                next_address += 64;
            }
        }
        heap.next_address = next_address;
    }

    /// Dispatch into a registered native trampoline the way managed internal
    /// calls do.
    pub fn call_native(&self, path: &str, target: Option<ObjectId>, args: &[Value]) -> Value {
        let thunk = {
            let calls = self.internal_calls.lock().unwrap();
            *calls.get(path).expect("internal call not bound")
        };
        unsafe { thunk.call(target, args) }
    }

    /// Number of live handles at the runtime level.
    pub fn live_handles(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

unsafe extern "C" fn managed_thunk_entry(
    data: *const c_void,
    target: u64,
    args: *const Value,
    argc: usize,
    ret: *mut Value,
) {
    let data = &*data.cast::<ThunkData>();
    let host = &*data.host;
    let args = if argc == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(args, argc)
    };
    let target = if target == 0 { None } else { Some(ObjectId(target)) };
    match host.run_member(data.member, target, args) {
        Ok(Some(value)) => *ret = value,
        Ok(None) => *ret = Value::Null,
        // No exception net on the fast path.
        Err(_) => std::process::abort(),
    }
}

impl ManagedHost for SimHost {
    fn find_type(&self, assembly: &str, namespace: &str, name: &str) -> Option<TypeToken> {
        self.by_name
            .get(&name_key(assembly, namespace, name))
            .copied()
    }

    fn type_info(&self, ty: TypeToken) -> Option<TypeInfo> {
        self.sim_type(ty).map(|rec| TypeInfo {
            assembly: rec.assembly.clone(),
            namespace: rec.namespace.clone(),
            name: rec.name.clone(),
            attributes: rec.attributes,
            base: rec.base,
        })
    }

    fn declared_members(&self, ty: TypeToken) -> Vec<MemberInfo> {
        self.member_walks.fetch_add(1, Ordering::Relaxed);
        match self.sim_type(ty) {
            Some(rec) => rec
                .members
                .iter()
                .map(|&idx| self.members[idx].info.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    fn object_root(&self) -> TypeToken {
        TypeToken(1)
    }

    fn class_of(&self, obj: ObjectId) -> Option<TypeToken> {
        let heap = self.heap.lock().unwrap();
        heap.objects.get(&obj.0).map(|object| object.ty)
    }

    fn allocate(&self, ty: TypeToken) -> clrbridge::Result<ObjectId> {
        let rec = self
            .sim_type(ty)
            .ok_or_else(|| Error::TypeNotFound(format!("{ty}")))?;
        if rec.attributes.contains(TypeAttributes::VALUE_TYPE) {
            return Err(Error::TypeError(format!(
                "{} is a value type",
                self.fullname(ty)
            )));
        }
        Ok(self.new_object(ty))
    }

    fn invoke(&self, member: MemberToken, target: Option<ObjectId>, args: &[Value]) -> RawInvoke {
        match self.run_member(member, target, args) {
            Ok(value) => RawInvoke::Returned(value),
            Err(ex) => RawInvoke::Raised(ex),
        }
    }

    fn construct_value(&self, ctor: MemberToken, args: &[Value]) -> RawInvoke {
        match self.run_member(ctor, None, args) {
            Ok(value) => RawInvoke::Returned(value),
            Err(ex) => RawInvoke::Raised(ex),
        }
    }

    fn member_thunk(&self, member: MemberToken) -> Option<RawThunk> {
        self.sim_member(member).body.as_ref()?;
        let data = Box::leak(Box::new(ThunkData {
            host: self as *const SimHost,
            member,
        }));
        Some(RawThunk::new(
            managed_thunk_entry,
            (data as *const ThunkData).cast(),
        ))
    }

    fn read_field(&self, field: MemberToken, target: Option<ObjectId>) -> clrbridge::Result<Value> {
        let info = &self.sim_member(field).info;
        if info.kind != MemberKind::Field {
            return Err(Error::TypeError(format!("{} is not a field", info.name)));
        }
        match target {
            Some(obj) => self
                .get_field_direct(obj, &info.name)
                .ok_or_else(|| Error::TypeError(format!("no field {} on {obj}", info.name))),
            None => Ok(self
                .statics
                .lock()
                .unwrap()
                .get(&field)
                .cloned()
                .unwrap_or(Value::Null)),
        }
    }

    fn write_field(
        &self,
        field: MemberToken,
        target: ObjectId,
        value: Value,
    ) -> clrbridge::Result<()> {
        let info = &self.sim_member(field).info;
        if info.kind != MemberKind::Field {
            return Err(Error::TypeError(format!("{} is not a field", info.name)));
        }
        self.set_field_direct(target, &info.name, value);
        Ok(())
    }

    fn handle_new(&self, target: ObjectId, kind: HandleKind) -> RawHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().unwrap().insert(
            id,
            SimHandle {
                target: target.0,
                kind,
            },
        );
        RawHandle(id)
    }

    fn handle_target(&self, handle: RawHandle) -> Option<ObjectId> {
        let handles = self.handles.lock().unwrap();
        let rec = handles.get(&handle.0)?;
        match rec.kind {
            HandleKind::Weak => {
                let heap = self.heap.lock().unwrap();
                heap.objects
                    .contains_key(&rec.target)
                    .then_some(ObjectId(rec.target))
            }
            _ => Some(ObjectId(rec.target)),
        }
    }

    fn handle_free(&self, handle: RawHandle) {
        self.handles.lock().unwrap().remove(&handle.0);
    }

    fn address_of(&self, obj: ObjectId) -> Option<NonNull<u8>> {
        let heap = self.heap.lock().unwrap();
        let object = heap.objects.get(&obj.0)?;
        NonNull::new(object.address as *mut u8)
    }

    fn exception_info(&self, ex: ObjectId) -> ExceptionInfo {
        let type_name = self
            .class_of(ex)
            .map_or_else(|| "<collected>".to_string(), |ty| self.fullname(ty));
        ExceptionInfo {
            type_name,
            message: self
                .get_field_direct(ex, "_message")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            stack_trace: self
                .get_field_direct(ex, "_stackTrace")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            inner: self
                .get_field_direct(ex, "_inner")
                .and_then(|v| v.as_object()),
        }
    }

    fn rethrow(&self, ex: ObjectId) {
        *self.pending.lock().unwrap() = Some(ex);
    }

    fn bind_internal_call(&self, path: &str, trampoline: RawThunk) {
        self.internal_calls
            .lock()
            .unwrap()
            .insert(path.to_string(), trampoline);
    }
}

fn name_key(assembly: &str, namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        format!("{assembly}/{name}")
    } else {
        format!("{assembly}/{namespace}.{name}")
    }
}

/// Builds a `SimHost`. `System.Object`, `System.ValueType` and
/// `System.Exception` are pre-registered; everything else is test-specific.
pub struct SimBuilder {
    types: Vec<SimType>,
    by_name: HashMap<String, TypeToken>,
    members: Vec<SimMember>,
}

impl SimBuilder {
    pub fn new() -> Self {
        let mut builder = SimBuilder {
            types: Vec::new(),
            by_name: HashMap::new(),
            members: Vec::new(),
        };
        let object = builder.add_type("mscorlib", "System", "Object", TypeAttributes::empty(), None);
        builder.add_type(
            "mscorlib",
            "System",
            "ValueType",
            TypeAttributes::ABSTRACT,
            Some(object),
        );
        let exception = builder.add_type(
            "mscorlib",
            "System",
            "Exception",
            TypeAttributes::empty(),
            Some(object),
        );
        builder.add_field(exception, "_message", ValueKind::String);
        builder.add_field(exception, "_stackTrace", ValueKind::String);
        builder.add_field(exception, "_inner", ValueKind::Object);
        builder
    }

    pub fn object(&self) -> TypeToken {
        TypeToken(1)
    }

    pub fn value_type(&self) -> TypeToken {
        TypeToken(2)
    }

    pub fn exception(&self) -> TypeToken {
        TypeToken(3)
    }

    pub fn add_type(
        &mut self,
        assembly: &str,
        namespace: &str,
        name: &str,
        attributes: TypeAttributes,
        base: Option<TypeToken>,
    ) -> TypeToken {
        let token = TypeToken(self.types.len() as u32 + 1);
        self.types.push(SimType {
            assembly: assembly.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            attributes,
            base,
            members: Vec::new(),
        });
        self.by_name
            .insert(name_key(assembly, namespace, name), token);
        token
    }

    pub fn add_method(
        &mut self,
        ty: TypeToken,
        name: &str,
        params: Vec<ParamSig>,
        returns: ValueKind,
        is_static: bool,
        body: impl Fn(&SimHost, Option<ObjectId>, &[Value]) -> BodyResult + Send + Sync + 'static,
    ) -> MemberToken {
        let body: Body = Arc::new(body);
        self.push_member(ty, MemberKind::Method, name, params, returns, is_static, Some(body))
    }

    pub fn add_field(&mut self, ty: TypeToken, name: &str, kind: ValueKind) -> MemberToken {
        self.push_member(
            ty,
            MemberKind::Field,
            name,
            vec![ParamSig::plain(kind)],
            kind,
            false,
            None,
        )
    }

    pub fn add_property(
        &mut self,
        ty: TypeToken,
        name: &str,
        getter: Option<MemberToken>,
        setter: Option<MemberToken>,
    ) -> MemberToken {
        self.push_member(
            ty,
            MemberKind::Property { getter, setter },
            name,
            Vec::new(),
            ValueKind::Object,
            false,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn push_member(
        &mut self,
        ty: TypeToken,
        kind: MemberKind,
        name: &str,
        params: Vec<ParamSig>,
        returns: ValueKind,
        is_static: bool,
        body: Option<Body>,
    ) -> MemberToken {
        let token = MemberToken(self.members.len() as u32 + 1);
        self.members.push(SimMember {
            info: MemberInfo {
                token,
                name: name.to_string(),
                kind,
                is_static,
                params,
                returns,
            },
            body,
        });
        self.types[ty.0 as usize - 1].members.push(self.members.len() - 1);
        token
    }

    pub fn build(self) -> Arc<SimHost> {
        Arc::new(SimHost {
            types: self.types,
            by_name: self.by_name,
            members: self.members,
            heap: Mutex::new(Heap {
                objects: HashMap::new(),
                next_address: 0x1000,
            }),
            statics: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            next_object: AtomicU64::new(1),
            pending: Mutex::new(None),
            internal_calls: Mutex::new(HashMap::new()),
            member_walks: AtomicUsize::new(0),
        })
    }
}

impl Default for SimBuilder {
    fn default() -> Self {
        Self::new()
    }
}
