use crate::interp::env::StepEnv;
use crate::interp::opcodes::Bytecode;
use crate::interp::reduce;
use crate::lattice::{union_of, TCELL, TINIT_CELL, TINIT_NULL, TOBJ, TREF};

/// Throws when the receiver is null; a path that already proved the receiver
/// makes this a no-op.
pub fn check_this(env: &mut StepEnv<'_>) {
    if env.this_available() {
        return reduce(env, vec![Bytecode::Nop]);
    }
    env.set_this_available();
}

/// Push the receiver, or null when there is none.
pub fn bare_this(env: &mut StepEnv<'_>) {
    env.nothrow();
    let this = env.this_type().unwrap_or(TOBJ);
    if env.this_available() {
        env.constprop();
        env.push(this);
    } else {
        env.push(union_of(this, TINIT_NULL));
    }
}

pub fn get_this_prop(env: &mut StepEnv<'_>, prop: &str) {
    match env.this_prop_as_cell(prop) {
        Some(t) => {
            // A tracked property that is definitely initialized and unboxed
            // can be read without running any hook.
            let raw = &env.collect.private_props[prop];
            if raw.subtype_of(&TINIT_CELL) {
                env.nothrow();
            }
            env.push(t);
        }
        None => env.push(TINIT_CELL),
    }
}

pub fn set_this_prop(env: &mut StepEnv<'_>, prop: &str) {
    let t = env.pop_c();
    if env.is_tracked_this_prop(prop) {
        env.nothrow();
        env.merge_this_prop(prop, t.clone());
    }
    env.push(t);
}

pub fn bind_this_prop(env: &mut StepEnv<'_>, prop: &str) {
    env.pop_v();
    env.box_this_prop(prop);
    env.push(TREF);
}

pub fn unset_this_prop(env: &mut StepEnv<'_>, prop: &str) {
    env.nothrow();
    env.unset_this_prop(prop);
}

pub fn get_self_static(env: &mut StepEnv<'_>, prop: &str) {
    match env.self_prop_as_cell(prop) {
        Some(t) => {
            let raw = &env.collect.private_statics[prop];
            if raw.subtype_of(&TCELL) {
                env.nothrow();
            }
            env.push(t);
        }
        None => env.push(TINIT_CELL),
    }
}

pub fn set_self_static(env: &mut StepEnv<'_>, prop: &str) {
    let t = env.pop_c();
    env.merge_self_prop(prop, t.clone());
    env.push(t);
}

pub fn bind_self_static(env: &mut StepEnv<'_>, prop: &str) {
    env.pop_v();
    env.box_self_prop(prop);
    env.push(TREF);
}
