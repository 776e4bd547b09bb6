//! Reflected class descriptors and the registry that caches them.
//!
//! A [`ClassDescriptor`] is the immutable, id-sorted member table of one
//! (class, compatibility mode) pair. Descriptors are side-built under the
//! registry's build lock and published into a concurrent map; the read path
//! never takes the lock. Readers can never observe a partially built
//! descriptor.

use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace, warn};

use marten_core::{DataType, DispatchResult, MemberId};

use crate::class::{ClassDef, CompatMode, MemberHook, MemberHookDecl};
use crate::reflect::{
    ClassId, DeclKind, InterfaceId, MAX_ARGS, MemberDecl, NativeGetter, NativeMethod, NativeSetter,
    ParamDecl, ReflectionProvider,
};

/// Resolved metadata of one reflected member.
#[derive(Clone)]
pub struct MemberInfo {
    /// Member id.
    pub id: MemberId,
    /// Member name, case preserved.
    pub name: Arc<str>,
    /// Source interface the member was first declared through.
    pub iface: InterfaceId,
    /// Class-supplied override hook.
    pub hook: Option<MemberHook>,
    /// Fast-path method entry point.
    pub call: Option<NativeMethod>,
    /// Fast-path getter entry point.
    pub get: Option<NativeGetter>,
    /// Fast-path setter entry point.
    pub put: Option<NativeSetter>,
    /// Declared method parameters.
    pub params: Box<[ParamDecl]>,
    /// Declared method return type, `None` for void.
    pub ret: Option<DataType>,
    /// Declared property type.
    pub prop_ty: Option<DataType>,
    /// Index into the per-instance wrapper cache; methods only.
    pub wrapper_slot: Option<usize>,
    /// The member is off the fast native path and routes through the
    /// reflection provider.
    pub generic: bool,
}

impl MemberInfo {
    fn new(id: MemberId, name: Arc<str>, iface: InterfaceId, hook: Option<MemberHook>) -> MemberInfo {
        MemberInfo {
            id,
            name,
            iface,
            hook,
            call: None,
            get: None,
            put: None,
            params: Box::new([]),
            ret: None,
            prop_ty: None,
            wrapper_slot: None,
            generic: false,
        }
    }

    /// Whether this member is a method (owns a wrapper-cache slot).
    pub fn is_method(&self) -> bool {
        self.wrapper_slot.is_some()
    }

    /// Declared parameter count.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn default_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_some()).count()
    }
}

impl std::fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("method", &self.is_method())
            .field("generic", &self.generic)
            .finish()
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let a = a.bytes().map(|c| c.to_ascii_lowercase());
    let b = b.bytes().map(|c| c.to_ascii_lowercase());
    a.cmp(b)
}

/// Immutable member table of one (class, compatibility mode) pair.
pub struct ClassDescriptor {
    class: &'static ClassDef,
    mode: CompatMode,
    /// Sorted ascending by id, exactly once, before publication.
    members: Box<[MemberInfo]>,
    /// Indices into `members`, sorted case-insensitively by name.
    name_index: Box<[u32]>,
    wrapper_count: usize,
}

impl ClassDescriptor {
    /// The class this descriptor was built for.
    pub fn class(&self) -> &'static ClassDef {
        self.class
    }

    /// The compatibility mode this descriptor was built for.
    pub fn mode(&self) -> CompatMode {
        self.mode
    }

    /// All members, ascending by id.
    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    /// Number of members owning a wrapper-cache slot.
    pub fn wrapper_count(&self) -> usize {
        self.wrapper_count
    }

    fn index_of(&self, id: MemberId) -> Option<usize> {
        self.members.binary_search_by_key(&id, |m| m.id).ok()
    }

    /// Member lookup by id.
    pub fn by_id(&self, id: MemberId) -> Option<&MemberInfo> {
        self.index_of(id).map(|i| &self.members[i])
    }

    /// Member lookup by name. Case-sensitive lookups reject a match whose
    /// stored case differs.
    pub fn by_name(&self, name: &str, case_insensitive: bool) -> Option<&MemberInfo> {
        let found = self
            .name_index
            .binary_search_by(|&i| cmp_ignore_case(&self.members[i as usize].name, name))
            .ok()?;
        let member = &self.members[self.name_index[found] as usize];
        if !case_insensitive && *member.name != *name {
            return None;
        }
        Some(member)
    }

    /// Next enumerable builtin after `last` (`None` starts over), skipping
    /// method-value placeholders.
    pub fn next_enumerable(&self, last: Option<MemberId>) -> DispatchResult<Option<MemberId>> {
        let start = match last {
            None => 0,
            Some(id) => self.index_of(id).ok_or(marten_core::DispatchError::NotFound)? + 1,
        };
        for member in &self.members[start..] {
            if member.wrapper_slot.is_none() {
                return Ok(Some(member.id));
            }
        }
        Ok(None)
    }
}

/// Accumulates member declarations during a descriptor build.
///
/// Handed to [`crate::class::ClassHooks::init_members`] so classes can inject
/// declarations or attach hook tables ahead of interface processing.
pub struct DescriptorBuilder<'a> {
    class: &'static ClassDef,
    mode: CompatMode,
    provider: &'a dyn ReflectionProvider,
    members: Vec<MemberInfo>,
    wrapper_count: usize,
}

impl<'a> DescriptorBuilder<'a> {
    fn new(
        class: &'static ClassDef,
        mode: CompatMode,
        provider: &'a dyn ReflectionProvider,
    ) -> DescriptorBuilder<'a> {
        DescriptorBuilder { class, mode, provider, members: Vec::with_capacity(16), wrapper_count: 0 }
    }

    /// The mode being built for.
    pub fn mode(&self) -> CompatMode {
        self.mode
    }

    /// Pull declarations of `iface` from the provider and merge them,
    /// applying a per-member hook table.
    pub fn add_interface(
        &mut self,
        iface: InterfaceId,
        hooks: &[MemberHookDecl],
    ) -> DispatchResult<()> {
        for decl in self.provider.interface_members(iface)? {
            let hook = hooks.iter().find(|h| h.id == decl.id);
            match hook {
                Some(h) if h.invoke.is_none() => continue, // suppressed
                _ => self.add_declaration(iface, decl, hook.and_then(|h| h.invoke)),
            }
        }
        Ok(())
    }

    /// Merge one declaration under first-registration precedence: a later
    /// declaration whose id or name is already taken by an earlier interface
    /// is dropped; declarations from the same interface merge by id.
    pub fn add_declaration(&mut self, iface: InterfaceId, decl: MemberDecl, hook: Option<MemberHook>) {
        let existing = self
            .members
            .iter()
            .position(|m| m.id == decl.id || m.name == decl.name);
        let idx = match existing {
            Some(i) => {
                if self.members[i].iface != iface {
                    return; // duplicated in another interface
                }
                i
            }
            None => {
                trace!(class = self.class.name, name = %decl.name, id = %decl.id, "adding member");
                self.members.push(MemberInfo::new(decl.id, decl.name.clone(), iface, hook));
                self.members.len() - 1
            }
        };
        let member = &mut self.members[idx];

        match decl.kind {
            DeclKind::Method { params, ret, entry, optional_params } => {
                if member.wrapper_slot.is_some() {
                    return; // first method registration wins
                }
                member.wrapper_slot = Some(self.wrapper_count);
                self.wrapper_count += 1;

                let mut generic = entry.is_none() || optional_params;
                if params.len() > MAX_ARGS {
                    warn!(name = %member.name, argc = params.len(), "too many parameters, using generic path");
                    generic = true;
                }
                if ret.is_some_and(|t| !t.fast_path_eligible())
                    || params.iter().any(|p| !p.ty.fast_path_eligible())
                {
                    trace!(name = %member.name, "unsupported declared type, using generic path");
                    generic = true;
                }
                if generic {
                    member.generic = true;
                } else {
                    member.call = entry;
                }
                member.params = params.into_boxed_slice();
                member.ret = ret;
            }
            DeclKind::Getter { ty, entry } => {
                if member.get.is_none() {
                    member.get = entry;
                    member.prop_ty = Some(ty);
                    member.generic |= entry.is_none();
                }
            }
            DeclKind::Setter { ty, entry } => {
                if member.put.is_none() {
                    member.put = entry;
                    member.prop_ty = Some(ty);
                }
            }
        }
    }

    fn finish(self) -> ClassDescriptor {
        let mut members = self.members;
        members.sort_unstable_by_key(|m| m.id);

        let mut name_index: Vec<u32> = (0..members.len() as u32).collect();
        name_index
            .sort_unstable_by(|&a, &b| cmp_ignore_case(&members[a as usize].name, &members[b as usize].name));

        ClassDescriptor {
            class: self.class,
            mode: self.mode,
            members: members.into_boxed_slice(),
            name_index: name_index.into_boxed_slice(),
            wrapper_count: self.wrapper_count,
        }
    }
}

/// Process-scoped registry: owns the reflection provider and the published
/// descriptor cache.
///
/// Constructed explicitly by the host and passed to consumers; there is no
/// ambient global registry. The cache is the sole cross-thread structure of
/// the engine.
pub struct DispatchRegistry {
    provider: Arc<dyn ReflectionProvider>,
    cache: DashMap<(ClassId, CompatMode), Arc<ClassDescriptor>, FxBuildHasher>,
    build_lock: Mutex<()>,
}

impl DispatchRegistry {
    /// Create a registry around a reflection provider.
    pub fn new(provider: Arc<dyn ReflectionProvider>) -> Arc<DispatchRegistry> {
        Arc::new(DispatchRegistry {
            provider,
            cache: DashMap::with_hasher(FxBuildHasher),
            build_lock: Mutex::new(()),
        })
    }

    /// The reflection provider this registry consults.
    pub fn provider(&self) -> &Arc<dyn ReflectionProvider> {
        &self.provider
    }

    /// Fetch the descriptor of `(class, mode)`, building it on first use.
    ///
    /// The fast path is a lock-free cache hit. A build runs under the
    /// process-wide build lock; a builder that lost the publication race
    /// discards its work and uses the winner's descriptor.
    pub fn descriptor(
        &self,
        class: &'static ClassDef,
        mode: CompatMode,
    ) -> DispatchResult<Arc<ClassDescriptor>> {
        let key = (class.id, mode);
        if let Some(found) = self.cache.get(&key) {
            return Ok(found.clone());
        }

        let _guard = self.build_lock.lock();
        if let Some(found) = self.cache.get(&key) {
            return Ok(found.clone());
        }

        debug!(class = class.name, ?mode, "building class descriptor");
        let mut builder = DescriptorBuilder::new(class, mode, self.provider.as_ref());
        if let Some(hooks) = class.hooks() {
            hooks.init_members(&mut builder, mode)?;
        }
        for iface in class.interfaces {
            builder.add_interface(*iface, &[])?;
        }
        let built = Arc::new(builder.finish());
        self.cache.insert(key, built.clone());
        Ok(built)
    }
}

impl std::fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("cached_descriptors", &self.cache.len())
            .finish()
    }
}
