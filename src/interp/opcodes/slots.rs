use crate::interp::env::StepEnv;
use crate::interp::state::{BlockId, ClsRefSlotId, Iter, IterId, LocalId};
use crate::lattice::{cls_exact, TARR, TCLS, TINIT_CELL};

pub fn late_bound_cls(env: &mut StepEnv<'_>, slot: ClsRefSlotId) {
    env.nothrow();
    let cls = env.self_cls().unwrap_or(TCLS);
    env.put_cls_ref(slot, cls);
}

/// Convert the top of the stack into a class and store it in a slot. A
/// literal name that resolves gives an exact class; anything else may need
/// autoloading and stays opaque.
pub fn cls_ref_get_c(env: &mut StepEnv<'_>, slot: ClsRefSlotId) {
    let t = env.pop_c();
    let cls = t
        .str_value()
        .and_then(|s| env.index.resolve_class(s))
        .map(cls_exact)
        .unwrap_or(TCLS);
    env.put_cls_ref(slot, cls);
}

pub fn discard_cls_ref(env: &mut StepEnv<'_>, slot: ClsRefSlotId) {
    env.nothrow();
    env.take_cls_ref(slot);
}

fn iter_value(env: &StepEnv<'_>, iter: IterId) -> crate::lattice::Ty {
    match &env.state.iters[iter as usize] {
        Iter::Tracked { value, .. } => value.clone(),
        Iter::Unknown => TINIT_CELL,
    }
}

/// Start iterating the popped base. The branch target is the empty case,
/// reached before the iterator or the value local exist.
pub fn iter_init(env: &mut StepEnv<'_>, iter: IterId, target: BlockId, loc: LocalId) {
    let base = env.pop_c();
    if base.subtype_of(&TARR) {
        env.nothrow();
    }
    env.propagate_to(target);
    env.set_iter(iter, Iter::Tracked { key: TINIT_CELL, value: TINIT_CELL });
    env.set_loc(loc, TINIT_CELL);
}

/// Advance an iterator. The branch target is the has-more case with the
/// value local rebound; the fallthrough is exhaustion, where the iterator is
/// released.
pub fn iter_next(env: &mut StepEnv<'_>, iter: IterId, target: BlockId, loc: LocalId) {
    env.nothrow();
    let value = iter_value(env, iter);
    env.set_loc(loc, value);
    env.propagate_to(target);
    env.free_iter(iter);
}

pub fn iter_free(env: &mut StepEnv<'_>, iter: IterId) {
    env.nothrow();
    env.free_iter(iter);
}
