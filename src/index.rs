//! Whole-program index surface.
//!
//! The interpreter never walks program structure itself; everything it knows
//! about other functions and classes comes through the [`Index`] trait. The
//! fixed-point driver supplies the real implementation; [`MapIndex`] is a
//! plain in-memory one for drivers without a repo and for tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::lattice::{Ty, TINIT_CELL};

/// Resolved class handle. Carries the facts the interpreter needs without
/// another index round-trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Class {
    name: Arc<str>,
    magic_get: bool,
}

impl Class {
    pub fn new(name: impl Into<Arc<str>>, magic_get: bool) -> Self {
        Self { name: name.into(), magic_get }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether reads of missing/uninitialized properties on instances of this
    /// class may invoke a user-defined interception hook.
    pub fn could_have_magic_get(&self) -> bool {
        self.magic_get
    }
}

/// Resolved function handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Func {
    name: Arc<str>,
}

impl Func {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// How a callee expects a given parameter to be prepared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepKind {
    /// By value.
    Val,
    /// By boxed reference.
    Ref,
    /// Not statically known.
    Unknown,
}

/// Queries the interpreter makes against the whole-program index.
pub trait Index {
    fn resolve_class(&self, name: &str) -> Option<Class>;
    fn resolve_func(&self, name: &str) -> Option<Func>;
    fn resolve_method(&self, cls: &str, name: &str) -> Option<Func>;

    /// Parameter-passing convention for `param` of a resolved callee.
    fn lookup_param_prep(&self, func: &Func, param: u32) -> PrepKind;

    /// Return type of a resolved callee, as a subtype of the initialized
    /// value top.
    fn lookup_return_type(&self, func: &Func) -> Ty;

    /// Whether the callee may reflectively write the calling frame's locals.
    fn may_write_caller_frame(&self, func: &Func) -> bool;

    /// Whether the callee may reflectively read the calling frame's locals.
    fn may_read_caller_frame(&self, func: &Func) -> bool;
}

/// Static description of the function being analyzed.
#[derive(Clone, Debug)]
pub struct FuncInfo {
    pub name: Arc<str>,
    pub num_locals: u32,
    pub num_cls_ref_slots: u32,
    pub num_iters: u32,
    volatile_locals: Vec<bool>,
}

impl FuncInfo {
    pub fn new(name: impl Into<Arc<str>>, num_locals: u32) -> Self {
        Self {
            name: name.into(),
            num_locals,
            num_cls_ref_slots: 0,
            num_iters: 0,
            volatile_locals: vec![false; num_locals as usize],
        }
    }

    pub fn with_slots(mut self, cls_ref_slots: u32, iters: u32) -> Self {
        self.num_cls_ref_slots = cls_ref_slots;
        self.num_iters = iters;
        self
    }

    /// Mark a local as escaping static tracking (dynamic-by-name access
    /// somewhere in the function reaches it).
    pub fn mark_volatile(mut self, local: u32) -> Self {
        self.volatile_locals[local as usize] = true;
        self
    }

    /// A volatile local is permanently pinned to the generic top type.
    pub fn is_volatile(&self, local: u32) -> bool {
        self.volatile_locals
            .get(local as usize)
            .copied()
            .unwrap_or(false)
    }
}

/// The analysis context for one function body: the function itself and the
/// class lexically enclosing it, if any.
#[derive(Clone, Debug)]
pub struct Context<'a> {
    pub func: &'a FuncInfo,
    pub cls: Option<&'a str>,
}

#[derive(Clone, Debug, Default)]
struct FuncMeta {
    param_preps: Vec<PrepKind>,
    return_type: Option<Ty>,
    may_write_caller_frame: bool,
    may_read_caller_frame: bool,
}

/// In-memory [`Index`] implementation.
#[derive(Default)]
pub struct MapIndex {
    classes: HashMap<String, Class>,
    funcs: HashMap<String, FuncMeta>,
    methods: HashMap<(String, String), String>,
}

impl MapIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, name: &str, magic_get: bool) {
        self.classes
            .insert(name.to_string(), Class::new(name, magic_get));
    }

    pub fn add_func(&mut self, name: &str) -> &mut Self {
        self.funcs.entry(name.to_string()).or_default();
        self
    }

    pub fn set_caller_frame_effects(&mut self, name: &str, reads: bool, writes: bool) {
        let meta = self.funcs.entry(name.to_string()).or_default();
        meta.may_read_caller_frame = reads;
        meta.may_write_caller_frame = writes;
    }

    pub fn set_param_preps(&mut self, name: &str, preps: Vec<PrepKind>) {
        self.funcs.entry(name.to_string()).or_default().param_preps = preps;
    }

    pub fn set_return_type(&mut self, name: &str, ty: Ty) {
        self.funcs.entry(name.to_string()).or_default().return_type = Some(ty);
    }

    pub fn add_method(&mut self, cls: &str, meth: &str, func: &str) {
        self.add_func(func);
        self.methods
            .insert((cls.to_string(), meth.to_string()), func.to_string());
    }
}

impl Index for MapIndex {
    fn resolve_class(&self, name: &str) -> Option<Class> {
        self.classes.get(name).cloned()
    }

    fn resolve_func(&self, name: &str) -> Option<Func> {
        self.funcs.get(name).map(|_| Func::new(name))
    }

    fn resolve_method(&self, cls: &str, name: &str) -> Option<Func> {
        self.methods
            .get(&(cls.to_string(), name.to_string()))
            .map(|f| Func::new(f.as_str()))
    }

    fn lookup_param_prep(&self, func: &Func, param: u32) -> PrepKind {
        self.funcs
            .get(func.name())
            .and_then(|m| m.param_preps.get(param as usize).copied())
            .unwrap_or(PrepKind::Unknown)
    }

    fn lookup_return_type(&self, func: &Func) -> Ty {
        self.funcs
            .get(func.name())
            .and_then(|m| m.return_type.clone())
            .unwrap_or(TINIT_CELL)
    }

    fn may_write_caller_frame(&self, func: &Func) -> bool {
        self.funcs
            .get(func.name())
            .is_some_and(|m| m.may_write_caller_frame)
    }

    fn may_read_caller_frame(&self, func: &Func) -> bool {
        self.funcs
            .get(func.name())
            .is_some_and(|m| m.may_read_caller_frame)
    }
}
