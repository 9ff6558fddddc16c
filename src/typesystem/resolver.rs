//! Member resolution: name + argument-category overload search.
//!
//! Given a textual member name and a description of the supplied arguments,
//! the resolver walks a type's own member list and then its base chain,
//! returning the **first** signature in declaration order that satisfies every
//! check. There is no best-match scoring: the legacy bridge resolved overloads
//! first-match-wins and managed script code depends on the exact order, so the
//! policy is preserved deliberately even where it is not
//! most-specific-overload-correct.
//!
//! # Candidate Checks
//!
//! 1. Name equality, case-sensitive. An empty query name matches any member.
//! 2. Parameter count: an [`ArgumentSpec::exact`] query requires the declared
//!    count to match exactly; an [`ArgumentSpec::at_least`] query accepts any
//!    declared count `>=` the supplied count, which is how optional/default
//!    trailing parameters are found.
//! 3. Per-argument category compatibility over the supplied entries. The
//!    first mismatch rejects the whole candidate — resolution moves on to the
//!    next signature, never to the next parameter slot, and partial checks are
//!    never reused between candidates.
//!
//! The sentinel root type terminates every walk: its own members are never
//! matched against user queries.

use std::sync::Arc;

use crate::runtime::{MemberKind, ParamFlags, ParamSig, Value, ValueKind};
use crate::typesystem::{MemberRc, TypeRc, TypeRegistry};
use crate::{Error, Result};

/// One entry of an [`ArgumentSpec`].
///
/// `kind` of `None` is a wildcard: it matches any declared category. Null
/// arguments derive wildcard entries, matching the legacy behavior of
/// skipping the category check for null items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgEntry {
    /// Supplied category, `None` to match any declared category
    pub kind: Option<ValueKind>,
    /// Supplied modifier flags (carried for diagnostics, not matched)
    pub flags: ParamFlags,
}

impl ArgEntry {
    /// An entry of a concrete category.
    #[must_use]
    pub fn of(kind: ValueKind) -> Self {
        ArgEntry {
            kind: Some(kind),
            flags: ParamFlags::empty(),
        }
    }

    /// A wildcard entry that matches any declared category.
    #[must_use]
    pub fn any() -> Self {
        ArgEntry {
            kind: None,
            flags: ParamFlags::empty(),
        }
    }

    fn matches(&self, declared: &ParamSig) -> bool {
        match self.kind {
            Some(kind) => declared.kind.accepts(kind),
            None => true,
        }
    }
}

/// A candidate call signature: supplied argument categories plus a
/// parameter-count policy.
///
/// Built either from concrete runtime values ([`ArgumentSpec::from_values`],
/// the overload-search mode that tolerates optional trailing parameters) or
/// from an explicit count ([`ArgumentSpec::arity`], the exact-count mode that
/// performs no category checks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSpec {
    entries: Vec<ArgEntry>,
    at_least: bool,
}

impl ArgumentSpec {
    /// A spec requiring exactly these argument categories and exactly this
    /// count.
    #[must_use]
    pub fn exact(entries: Vec<ArgEntry>) -> Self {
        ArgumentSpec {
            entries,
            at_least: false,
        }
    }

    /// A spec matching declared signatures with **at least** this many
    /// parameters, checking categories over the supplied prefix.
    #[must_use]
    pub fn at_least(entries: Vec<ArgEntry>) -> Self {
        ArgumentSpec {
            entries,
            at_least: true,
        }
    }

    /// Derive a spec from concrete argument values.
    ///
    /// Uses the `at_least` count policy so declared signatures with optional
    /// trailing parameters remain candidates; null values become wildcards.
    /// An empty value list demands an exactly-empty signature — a no-argument
    /// call never selects an overload with parameters.
    #[must_use]
    pub fn from_values(values: &[Value]) -> Self {
        ArgumentSpec {
            entries: values
                .iter()
                .map(|value| {
                    if value.is_null() {
                        ArgEntry::any()
                    } else {
                        ArgEntry::of(value.kind())
                    }
                })
                .collect(),
            at_least: !values.is_empty(),
        }
    }

    /// A spec matching exactly `count` parameters of any category.
    #[must_use]
    pub fn arity(count: usize) -> Self {
        ArgumentSpec {
            entries: vec![ArgEntry::any(); count],
            at_least: false,
        }
    }

    /// Number of supplied entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no entries were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a declared parameter list satisfies this spec.
    ///
    /// Rejection is immediate: the first failing entry disqualifies the
    /// candidate as a whole.
    #[must_use]
    pub fn matches(&self, declared: &[ParamSig]) -> bool {
        let count_ok = if self.at_least {
            declared.len() >= self.entries.len()
        } else {
            declared.len() == self.entries.len()
        };
        if !count_ok {
            return false;
        }
        self.entries
            .iter()
            .zip(declared)
            .all(|(entry, param)| entry.matches(param))
    }
}

/// Outcome of a member resolution.
///
/// A tagged variant rather than a nullable pointer: callers pattern-match and
/// decide per call site whether `NotFound` is a soft null result or escalates
/// to [`Error::MissingMember`].
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A member satisfied every check; first match in declaration order
    Found(MemberRc),
    /// No member matched the query
    NotFound,
}

impl Resolution {
    /// Convert to an `Option`, discarding the distinction's documentation
    /// value when a plain optional is more convenient.
    #[must_use]
    pub fn found(self) -> Option<MemberRc> {
        match self {
            Resolution::Found(member) => Some(member),
            Resolution::NotFound => None,
        }
    }

    /// `true` if a member was found.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// Searches a type's own and inherited members for a name/signature match.
pub struct MemberResolver {
    registry: Arc<TypeRegistry>,
}

impl MemberResolver {
    /// Create a resolver over the given registry.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        MemberResolver { registry }
    }

    /// Resolve a method by name and argument spec.
    ///
    /// Walks `ty`'s own members first, then the base chain when `search_base`
    /// is set, stopping before the sentinel root. Only method members are
    /// candidates; use the kind-specific variants for fields, properties and
    /// events.
    ///
    /// # Errors
    /// Fails with [`Error::DepthLimit`] when the base chain exceeds the
    /// registry's depth guard.
    pub fn resolve(
        &self,
        ty: &TypeRc,
        name: &str,
        spec: &ArgumentSpec,
        search_base: bool,
    ) -> Result<Resolution> {
        self.walk(ty, search_base, |member| {
            member.kind == MemberKind::Method
                && Self::name_matches(name, member)
                && spec.matches(&member.params)
        })
    }

    /// Resolve a field by name.
    ///
    /// # Errors
    /// Fails with [`Error::DepthLimit`] when the base chain exceeds the
    /// registry's depth guard.
    pub fn resolve_field(&self, ty: &TypeRc, name: &str, search_base: bool) -> Result<Resolution> {
        self.walk(ty, search_base, |member| {
            member.kind == MemberKind::Field && Self::name_matches(name, member)
        })
    }

    /// Resolve a property by name.
    ///
    /// # Errors
    /// Fails with [`Error::DepthLimit`] when the base chain exceeds the
    /// registry's depth guard.
    pub fn resolve_property(
        &self,
        ty: &TypeRc,
        name: &str,
        search_base: bool,
    ) -> Result<Resolution> {
        self.walk(ty, search_base, |member| {
            matches!(member.kind, MemberKind::Property { .. }) && Self::name_matches(name, member)
        })
    }

    /// Resolve an event by name.
    ///
    /// # Errors
    /// Fails with [`Error::DepthLimit`] when the base chain exceeds the
    /// registry's depth guard.
    pub fn resolve_event(&self, ty: &TypeRc, name: &str, search_base: bool) -> Result<Resolution> {
        self.walk(ty, search_base, |member| {
            member.kind == MemberKind::Event && Self::name_matches(name, member)
        })
    }

    /// The registry this resolver searches.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    fn name_matches(query: &str, member: &MemberRc) -> bool {
        query.is_empty() || member.name == query
    }

    fn walk(
        &self,
        ty: &TypeRc,
        search_base: bool,
        accept: impl Fn(&MemberRc) -> bool,
    ) -> Result<Resolution> {
        let root = self.registry.object_root().token;
        let mut current = Some(ty.clone());
        let mut depth = 0usize;

        while let Some(ty) = current {
            // The sentinel root's own members are never matched.
            if ty.token == root {
                break;
            }
            if depth > self.registry.max_depth() {
                return Err(Error::DepthLimit(self.registry.max_depth()));
            }

            for (_, member) in self.registry.members(&ty).iter() {
                if accept(member) {
                    return Ok(Resolution::Found(member.clone()));
                }
            }

            if !search_base {
                break;
            }
            current = ty.base();
            depth += 1;
        }

        Ok(Resolution::NotFound)
    }
}
