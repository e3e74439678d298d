//! Step environment: the mutable context threaded into every opcode handler,
//! and the state-access contracts the handlers go through.
//!
//! Every read or write of the operand stack, locals, class-ref slots,
//! iterators, call-preparation stack, and property summaries happens through
//! a method here. The kind-tagged stack accessors are contracts: a bound
//! check failure is an interpreter bug and aborts the run.

use tracing::trace;

use crate::index::{Context, Index, PrepKind};
use crate::interp::state::{
    ActRec, BlockId, ClsRefSlotId, CollectedInfo, FpiKind, Iter, IterId, JmpDir, LocalId,
    PropName, StackElem, State, StepFlags,
};
use crate::lattice::{
    cls_exact, sub_cls, sub_obj, union_of, Ty, TCELL, TCLS, TGEN, TINIT_CELL, TINIT_NULL, TREF,
    TUNINIT,
};
use crate::options::Options;

/// Everything one opcode handler can see and mutate. One aggregate, passed
/// by reference; no handler reaches for ambient state.
pub struct StepEnv<'a> {
    pub index: &'a dyn Index,
    pub ctx: &'a Context<'a>,
    pub options: &'a Options,
    pub collect: &'a mut CollectedInfo,
    pub state: &'a mut State,
    pub flags: &'a mut StepFlags,
    pub propagate: &'a mut dyn FnMut(BlockId, &State),
}

impl<'a> StepEnv<'a> {
    //////////////////////////////////////////////////////////////////////
    // flags

    pub fn nothrow(&mut self) {
        trace!("nothrow");
        self.flags.may_throw = false;
    }

    pub fn constprop(&mut self) {
        self.flags.can_const_prop = true;
    }

    pub fn unreachable(&mut self) {
        self.state.unreachable = true;
    }

    pub fn jmp_nofallthrough(&mut self) {
        self.flags.jmp = JmpDir::Taken;
    }

    pub fn jmp_nevertaken(&mut self) {
        self.flags.jmp = JmpDir::Fallthrough;
    }

    /// Hand the current state to the fixed-point driver as the entry state
    /// of `target`.
    pub fn propagate_to(&mut self, target: BlockId) {
        trace!(target, "propagate");
        (self.propagate)(target, self.state);
    }

    pub fn may_read_local(&mut self, l: LocalId) {
        self.flags.may_read_locals.set(l);
    }

    pub fn read_unknown_locals(&mut self) {
        self.flags.may_read_locals.set_all();
    }

    pub fn do_ret(&mut self, t: Ty) {
        self.read_unknown_locals();
        assert!(self.state.stack.is_empty(), "stack not empty at return");
        self.flags.returned = Some(t);
    }

    /// The enclosing function may need a fully reified variable environment.
    pub fn may_use_var_env(&mut self) {
        self.collect.may_use_var_env = true;
    }

    fn is_volatile(&self, l: LocalId) -> bool {
        self.ctx.func.is_volatile(l)
    }

    //////////////////////////////////////////////////////////////////////
    // eval stack

    pub fn push(&mut self, t: Ty) {
        trace!(ty = %t, "push");
        assert!(t.subtype_of(&TGEN), "pushed non-Gen stack value: {t}");
        self.state.stack.push(StackElem { ty: t, equiv_local: None });
    }

    /// Push a value known to currently equal `l`'s value.
    pub fn push_owned(&mut self, t: Ty, l: LocalId) {
        trace!(ty = %t, local = l, "push");
        assert!(t.subtype_of(&TGEN), "pushed non-Gen stack value: {t}");
        assert!(!self.is_volatile(l), "stack value owned by volatile local {l}");
        self.state.stack.push(StackElem { ty: t, equiv_local: Some(l) });
    }

    pub fn pop_t(&mut self) -> Ty {
        let elem = self.state.stack.pop().expect("pop on empty stack");
        trace!(ty = %elem.ty, "pop");
        assert!(elem.ty.subtype_of(&TGEN), "popped non-Gen stack value: {}", elem.ty);
        elem.ty
    }

    /// Pop a plain, initialized value.
    pub fn pop_c(&mut self) -> Ty {
        let t = self.pop_t();
        assert!(t.subtype_of(&TINIT_CELL), "popC on non-InitCell value: {t}");
        t
    }

    /// Pop a boxed reference.
    pub fn pop_v(&mut self) -> Ty {
        let t = self.pop_t();
        assert!(t.subtype_of(&TREF), "popV on non-Ref value: {t}");
        t
    }

    /// Pop a definitely-uninitialized slot.
    pub fn pop_u(&mut self) -> Ty {
        let t = self.pop_t();
        assert!(t.subtype_of(&TUNINIT), "popU on non-Uninit value: {t}");
        t
    }

    /// Pop a possibly-uninitialized plain value.
    pub fn pop_cu(&mut self) -> Ty {
        let t = self.pop_t();
        assert!(t.subtype_of(&TCELL), "popCU on non-Cell value: {t}");
        t
    }

    /// Bulk cleanup on non-local exits; results are intentionally dropped.
    pub fn discard(&mut self, n: usize) {
        for _ in 0..n {
            self.pop_t();
        }
    }

    pub fn top_t(&self, idx: usize) -> &Ty {
        let len = self.state.stack.len();
        assert!(idx < len, "stack peek out of range");
        &self.state.stack[len - idx - 1].ty
    }

    pub fn top_c(&self, idx: usize) -> &Ty {
        let t = self.top_t(idx);
        assert!(t.subtype_of(&TINIT_CELL), "topC on non-InitCell value: {t}");
        t
    }

    /// The local the stack value at depth `idx` is known to equal.
    pub fn top_stk_equiv(&self, idx: usize) -> Option<LocalId> {
        let len = self.state.stack.len();
        assert!(idx < len, "stack peek out of range");
        self.state.stack[len - idx - 1].equiv_local
    }

    //////////////////////////////////////////////////////////////////////
    // call-preparation stack

    pub fn fpi_push(&mut self, ar: ActRec) {
        trace!(kind = ?ar.kind, "fpi push");
        self.state.fpi_stack.push(ar);
    }

    pub fn fpi_pop(&mut self) -> ActRec {
        let ar = self.state.fpi_stack.pop().expect("fpi pop on empty stack");
        trace!(kind = ?ar.kind, "fpi pop");
        ar
    }

    pub fn fpi_top(&self) -> &ActRec {
        self.state.fpi_stack.last().expect("fpi peek on empty stack")
    }

    /// Passing convention for parameter `param` of the staged call. Only a
    /// single unambiguous target gives a definite answer; builtins always
    /// have one.
    pub fn prep_kind(&self, param: u32) -> PrepKind {
        let ar = self.fpi_top();
        if let (Some(func), None) = (&ar.func, &ar.fallback) {
            let ret = self.index.lookup_param_prep(func, param);
            assert!(
                ar.kind != FpiKind::Builtin || ret != PrepKind::Unknown,
                "builtin {} with unknown param prep",
                func.name()
            );
            return ret;
        }
        assert!(ar.kind != FpiKind::Builtin, "builtin call without resolved target");
        PrepKind::Unknown
    }

    //////////////////////////////////////////////////////////////////////
    // locals

    pub fn loc_raw(&mut self, l: LocalId) -> Ty {
        self.may_read_local(l);
        let ret = self.state.locals[l as usize].clone();
        if self.is_volatile(l) {
            assert!(ret == TGEN, "volatile local {l} was not Gen: {ret}");
        }
        ret
    }

    pub fn set_loc_raw(&mut self, l: LocalId, t: Ty) {
        self.may_read_local(l);
        self.kill_loc_equiv(l);
        self.kill_stk_equiv(l);
        if self.is_volatile(l) {
            let current = &self.state.locals[l as usize];
            assert!(*current == TGEN, "volatile local {l} was not Gen: {current}");
            return;
        }
        trace!(local = l, ty = %t, "setLocRaw");
        self.state.locals[l as usize] = t;
    }

    /// Read a local as a plain value: uninitialized collapses to definite
    /// null, and a boxed wrapper is stripped to its initialized inner type.
    pub fn loc_as_cell(&mut self, l: LocalId) -> Ty {
        let t = self.loc_raw(l);
        if !t.subtype_of(&TCELL) {
            TINIT_CELL
        } else if t.subtype_of(&TUNINIT) {
            TINIT_NULL
        } else {
            t.remove_uninit()
        }
    }

    /// Read a local stripping only a possible reference wrapper, without
    /// normalizing uninitialized to null.
    pub fn deref_loc(&mut self, l: LocalId) -> Ty {
        let t = self.loc_raw(l);
        if t.subtype_of(&TCELL) {
            return t;
        }
        if t.could_be(&TUNINIT) { TCELL } else { TINIT_CELL }
    }

    pub fn loc_could_be_uninit(&mut self, l: LocalId) -> bool {
        self.loc_raw(l).could_be(&TUNINIT)
    }

    pub fn loc_could_be_ref(&mut self, l: LocalId) -> bool {
        self.loc_raw(l).could_be(&TREF)
    }

    /// Write a local in the value sense: only applies when the local is
    /// known to hold a plain value, since a value write can never change
    /// whether a local is boxed.
    pub fn set_loc(&mut self, l: LocalId, t: Ty) {
        self.kill_loc_equiv(l);
        self.kill_stk_equiv(l);
        let v = self.loc_raw(l);
        if self.is_volatile(l) {
            assert!(v == TGEN, "volatile local {l} was not Gen: {v}");
            return;
        }
        if v.subtype_of(&TCELL) {
            trace!(local = l, ty = %t, "setLoc");
            self.state.locals[l as usize] = t;
        }
    }

    //////////////////////////////////////////////////////////////////////
    // local equivalence

    pub fn find_loc_equiv(&self, l: LocalId) -> Option<LocalId> {
        let ret = *self.state.equiv_locals.get(l as usize)?;
        if ret.is_some() {
            assert!(!self.is_volatile(l), "volatile local {l} had an equivalence");
        }
        ret
    }

    pub fn add_loc_equiv(&mut self, from: LocalId, to: LocalId) {
        assert!(!self.is_volatile(from), "equivalence from volatile local {from}");
        assert!(!self.is_volatile(to), "equivalence to volatile local {to}");
        trace!(from, to, "addLocEquiv");
        self.state.equiv_locals[from as usize] = Some(to);
    }

    /// Remove every local↔local edge where `l` is source or target.
    pub fn kill_loc_equiv(&mut self, l: LocalId) {
        for to in &mut self.state.equiv_locals {
            if *to == Some(l) {
                *to = None;
            }
        }
        if let Some(slot) = self.state.equiv_locals.get_mut(l as usize) {
            *slot = None;
        }
    }

    pub fn kill_all_loc_equiv(&mut self) {
        for slot in &mut self.state.equiv_locals {
            *slot = None;
        }
    }

    /// Remove every stack↔local edge naming `l`.
    pub fn kill_stk_equiv(&mut self, l: LocalId) {
        for e in &mut self.state.stack {
            if e.equiv_local == Some(l) {
                e.equiv_local = None;
            }
        }
    }

    pub fn kill_all_stk_equiv(&mut self) {
        for e in &mut self.state.stack {
            e.equiv_local = None;
        }
    }

    //////////////////////////////////////////////////////////////////////
    // bulk conservative widenings

    /// Widen every local to the generic top and drop all equivalence state.
    /// Used when an opaque callee may have rewritten the frame wholesale.
    pub fn kill_locals(&mut self) {
        trace!("killLocals");
        self.read_unknown_locals();
        for l in &mut self.state.locals {
            *l = TGEN;
        }
        self.kill_all_loc_equiv();
        self.kill_all_stk_equiv();
    }

    /// Widen every non-reference local to the plain-value top. Used when an
    /// unknown local's value may have changed without changing boxed-ness.
    pub fn lose_non_ref_local_types(&mut self) {
        trace!("loseNonRefLocalTypes");
        self.read_unknown_locals();
        for l in &mut self.state.locals {
            if l.subtype_of(&TCELL) {
                *l = TCELL;
            }
        }
        self.kill_all_loc_equiv();
        self.kill_all_stk_equiv();
    }

    /// Widen every non-reference local to the full top. Used when an
    /// unknown local may have become boxed.
    pub fn box_unknown_local(&mut self) {
        trace!("boxUnknownLocal");
        self.read_unknown_locals();
        for l in &mut self.state.locals {
            if !l.subtype_of(&TREF) {
                *l = TGEN;
            }
        }
        self.kill_all_loc_equiv();
        self.kill_all_stk_equiv();
    }

    /// Union the uninitialized type into every local. Used when an
    /// operation may have unset an unknown local.
    pub fn unset_unknown_local(&mut self) {
        trace!("unsetUnknownLocal");
        self.read_unknown_locals();
        for l in &mut self.state.locals {
            *l = union_of(l.clone(), TUNINIT);
        }
        self.kill_all_loc_equiv();
        self.kill_all_stk_equiv();
    }

    //////////////////////////////////////////////////////////////////////
    // class-ref slots

    pub fn peek_cls_ref(&self, slot: ClsRefSlotId) -> &Ty {
        let t = &self.state.cls_ref_slots[slot as usize];
        assert!(t.subtype_of(&TCLS), "class-ref slot {slot} held non-Cls value: {t}");
        t
    }

    /// Read a class-ref slot and discard the stored value.
    pub fn take_cls_ref(&mut self, slot: ClsRefSlotId) -> Ty {
        let ret = std::mem::replace(&mut self.state.cls_ref_slots[slot as usize], TCLS);
        trace!(slot, ty = %ret, "takeClsRef");
        assert!(ret.subtype_of(&TCLS), "class-ref slot {slot} held non-Cls value: {ret}");
        ret
    }

    pub fn put_cls_ref(&mut self, slot: ClsRefSlotId, t: Ty) {
        assert!(t.subtype_of(&TCLS), "wrote non-Cls value to class-ref slot {slot}: {t}");
        trace!(slot, ty = %t, "putClsRef");
        self.state.cls_ref_slots[slot as usize] = t;
    }

    //////////////////////////////////////////////////////////////////////
    // iterators

    pub fn set_iter(&mut self, iter: IterId, iter_state: Iter) {
        self.state.iters[iter as usize] = iter_state;
    }

    pub fn free_iter(&mut self, iter: IterId) {
        self.state.iters[iter as usize] = Iter::Unknown;
    }

    //////////////////////////////////////////////////////////////////////
    // $this

    pub fn set_this_available(&mut self) {
        trace!("setThisAvailable");
        self.state.this_available = true;
    }

    pub fn this_available(&self) -> bool {
        self.state.this_available
    }

    /// Type of the receiver if it is not null. Callers must check
    /// `this_available` before assuming non-null.
    pub fn this_type(&self) -> Option<Ty> {
        let cls = self.ctx.cls?;
        self.index.resolve_class(cls).map(sub_obj)
    }

    pub fn self_cls(&self) -> Option<Ty> {
        let cls = self.ctx.cls?;
        self.index.resolve_class(cls).map(sub_cls)
    }

    pub fn self_cls_exact(&self) -> Option<Ty> {
        let cls = self.ctx.cls?;
        self.index.resolve_class(cls).map(cls_exact)
    }

    //////////////////////////////////////////////////////////////////////
    // private properties on $this
    //
    // Property summaries are flow-insensitive: an interception hook can run
    // re-entrant code on any access, so only one widen-only upper bound per
    // function is sound. The "setters" below all union, never replace.

    pub fn is_tracked_this_prop(&self, name: &str) -> bool {
        self.collect.private_props.contains_key(name)
    }

    pub fn kill_this_props(&mut self) {
        trace!("killThisProps");
        for t in self.collect.private_props.values_mut() {
            *t = TGEN;
        }
    }

    /// Every type reading `$this->name` could produce. Accounts for the
    /// possibility of a magic-get hook fabricating a value when the property
    /// could be uninitialized.
    pub fn this_prop_as_cell(&self, name: &str) -> Option<Ty> {
        let t = self.collect.private_props.get(name)?;
        if t.could_be(&TUNINIT) {
            let magic = match self.this_type() {
                None => true,
                Some(this) => match this.class_of() {
                    None => true,
                    Some((cls, _)) => cls.could_have_magic_get(),
                },
            };
            if magic {
                return Some(TINIT_CELL);
            }
        }
        Some(if !t.subtype_of(&TCELL) {
            TINIT_CELL
        } else if t.subtype_of(&TUNINIT) {
            TINIT_NULL
        } else {
            t.remove_uninit()
        })
    }

    /// Widen a property summary by `ty`. Literal and static refinements are
    /// stripped first: a serialization round-trip of the object would not
    /// preserve them.
    pub fn merge_this_prop(&mut self, name: &str, ty: Ty) {
        let Some(t) = self.collect.private_props.get_mut(name) else { return };
        let widened = ty.loosen_statics().loosen_values();
        trace!(prop = name, ty = %widened, "mergeThisProp");
        *t = union_of(t.clone(), widened);
    }

    /// Widen every tracked property by `f` applied to its raw tracked type.
    pub fn merge_each_this_prop_raw(&mut self, f: impl Fn(&Ty) -> Ty) {
        let merges: Vec<(PropName, Ty)> = self
            .collect
            .private_props
            .iter()
            .map(|(name, t)| (name.clone(), f(t)))
            .collect();
        for (name, t) in merges {
            self.merge_this_prop(&name, t);
        }
    }

    pub fn unset_this_prop(&mut self, name: &str) {
        self.merge_this_prop(name, TUNINIT);
    }

    pub fn unset_unknown_this_prop(&mut self) {
        self.merge_each_this_prop_raw(|_| TUNINIT);
    }

    pub fn box_this_prop(&mut self, name: &str) {
        let Some(t) = self.collect.private_props.get_mut(name) else { return };
        *t = union_of(t.clone(), TREF);
    }

    /// Widen non-reference property summaries to the plain-value top; an
    /// unknown property write can't change reffiness.
    pub fn lose_non_ref_this_prop_types(&mut self) {
        trace!("loseNonRefThisPropTypes");
        for t in self.collect.private_props.values_mut() {
            if t.subtype_of(&TCELL) {
                *t = TCELL;
            }
        }
    }

    //////////////////////////////////////////////////////////////////////
    // private statics on self::
    //
    // Same widen-only discipline as instance properties.

    pub fn kill_self_props(&mut self) {
        trace!("killSelfProps");
        for t in self.collect.private_statics.values_mut() {
            *t = TGEN;
        }
    }

    pub fn kill_self_prop(&mut self, name: &str) {
        trace!(prop = name, "killSelfProp");
        if let Some(t) = self.collect.private_statics.get_mut(name) {
            *t = TGEN;
        }
    }

    pub fn self_prop_as_cell(&self, name: &str) -> Option<Ty> {
        let t = self.collect.private_statics.get(name)?;
        Some(if !t.subtype_of(&TCELL) {
            TINIT_CELL
        } else if t.subtype_of(&TUNINIT) {
            TINIT_NULL
        } else {
            t.remove_uninit()
        })
    }

    pub fn merge_self_prop(&mut self, name: &str, ty: Ty) {
        let Some(t) = self.collect.private_statics.get_mut(name) else { return };
        trace!(prop = name, ty = %ty, "mergeSelfProp");
        *t = union_of(t.clone(), ty);
    }

    pub fn box_self_prop(&mut self, name: &str) {
        self.merge_self_prop(name, TREF);
    }

    pub fn lose_non_ref_self_prop_types(&mut self) {
        trace!("loseNonRefSelfPropTypes");
        for t in self.collect.private_statics.values_mut() {
            if t.subtype_of(&TINIT_CELL) {
                *t = TCELL;
            }
        }
    }
}
