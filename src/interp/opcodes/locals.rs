use crate::interp::env::StepEnv;
use crate::interp::state::LocalId;
use crate::lattice::{TREF, TUNINIT};

/// Read a local as a value and push it, remembering which local the stack
/// value came from.
pub fn c_get_l(env: &mut StepEnv<'_>, loc: LocalId) {
    if !env.loc_could_be_uninit(loc) {
        // Reading an initialized local can neither raise nor observe
        // anything.
        env.nothrow();
        env.constprop();
    }
    let t = env.loc_as_cell(loc);
    if env.ctx.func.is_volatile(loc) {
        env.push(t);
    } else {
        env.push_owned(t, loc);
    }
}

/// Read a local as-is, including a possible uninitialized state.
pub fn cu_get_l(env: &mut StepEnv<'_>, loc: LocalId) {
    env.nothrow();
    let t = env.loc_raw(loc);
    if env.ctx.func.is_volatile(loc) {
        env.push(t);
    } else {
        env.push_owned(t, loc);
    }
}

/// Move a local's value onto the stack, leaving the local unset.
pub fn push_l(env: &mut StepEnv<'_>, loc: LocalId) {
    if !env.loc_could_be_ref(loc) {
        env.nothrow();
    }
    let t = env.loc_as_cell(loc);
    env.set_loc_raw(loc, TUNINIT);
    env.push(t);
}

pub fn set_l(env: &mut StepEnv<'_>, loc: LocalId) {
    env.nothrow();
    let stk_equiv = env.top_stk_equiv(0);
    let t = env.pop_c();
    env.set_loc(loc, t.clone());
    if env.ctx.func.is_volatile(loc) {
        env.push(t);
        return;
    }
    // The assigned value still equals whatever local it was read from.
    if let Some(other) = stk_equiv {
        if other != loc && !env.ctx.func.is_volatile(other) {
            env.add_loc_equiv(loc, other);
        }
    }
    env.push_owned(t, loc);
}

/// Bind a boxed reference into a local; the local is a ref afterwards no
/// matter what it held.
pub fn bind_l(env: &mut StepEnv<'_>, loc: LocalId) {
    env.nothrow();
    env.pop_v();
    env.set_loc_raw(loc, TREF);
    env.push(TREF);
}

pub fn unset_l(env: &mut StepEnv<'_>, loc: LocalId) {
    env.nothrow();
    env.set_loc_raw(loc, TUNINIT);
}
