//! Shared factories for unit tests: build descriptors by hand without a
//! running host.

use std::sync::Arc;

use crate::runtime::{MemberInfo, MemberKind, MemberToken, ParamSig, TypeToken, ValueKind};
use crate::typesystem::{MemberDescriptor, MemberRc, TypeAttributes, TypeDescriptor, TypeRc};

/// Create a plain reference-type descriptor.
pub(crate) fn type_desc(token: u32, namespace: &str, name: &str) -> TypeRc {
    type_desc_with(token, namespace, name, TypeAttributes::empty())
}

/// Create a descriptor with explicit attributes.
pub(crate) fn type_desc_with(
    token: u32,
    namespace: &str,
    name: &str,
    attributes: TypeAttributes,
) -> TypeRc {
    Arc::new(TypeDescriptor::new(
        TypeToken(token),
        "TestAssembly".to_string(),
        namespace.to_string(),
        name.to_string(),
        attributes,
    ))
}

/// Create a descriptor derived from `base`.
#[allow(dead_code)]
pub(crate) fn derived(token: u32, namespace: &str, name: &str, base: &TypeRc) -> TypeRc {
    let ty = type_desc(token, namespace, name);
    ty.set_base(base);
    ty
}

/// Create an instance-method descriptor.
pub(crate) fn method(token: u32, declaring: &TypeRc, name: &str, params: Vec<ParamSig>) -> MemberRc {
    Arc::new(MemberDescriptor::new(
        MemberInfo {
            token: MemberToken(token),
            name: name.to_string(),
            kind: MemberKind::Method,
            is_static: false,
            params,
            returns: ValueKind::Void,
        },
        declaring,
    ))
}

/// Create a field descriptor.
#[allow(dead_code)]
pub(crate) fn field(token: u32, declaring: &TypeRc, name: &str, kind: ValueKind) -> MemberRc {
    Arc::new(MemberDescriptor::new(
        MemberInfo {
            token: MemberToken(token),
            name: name.to_string(),
            kind: MemberKind::Field,
            is_static: false,
            params: vec![ParamSig::plain(kind)],
            returns: kind,
        },
        declaring,
    ))
}
