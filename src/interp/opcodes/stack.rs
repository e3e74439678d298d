use crate::interp::env::StepEnv;
use crate::lattice::{bval, dval, ival, sval, TINIT_NULL, TUNINIT};
use std::sync::Arc;

pub fn nop(env: &mut StepEnv<'_>) {
    env.nothrow();
}

pub fn null(env: &mut StepEnv<'_>) {
    env.nothrow();
    env.constprop();
    env.push(TINIT_NULL);
}

pub fn null_uninit(env: &mut StepEnv<'_>) {
    env.nothrow();
    env.push(TUNINIT);
}

pub fn true_(env: &mut StepEnv<'_>) {
    env.nothrow();
    env.constprop();
    env.push(bval(true));
}

pub fn false_(env: &mut StepEnv<'_>) {
    env.nothrow();
    env.constprop();
    env.push(bval(false));
}

pub fn int(env: &mut StepEnv<'_>, v: i64) {
    env.nothrow();
    env.constprop();
    env.push(ival(v));
}

pub fn double(env: &mut StepEnv<'_>, v: f64) {
    env.nothrow();
    env.constprop();
    env.push(dval(v));
}

pub fn string(env: &mut StepEnv<'_>, s: Arc<str>) {
    env.nothrow();
    env.constprop();
    env.push(sval(s));
}

pub fn dup(env: &mut StepEnv<'_>) {
    env.nothrow();
    let v = env.pop_c();
    env.push(v.clone());
    env.push(v);
}

pub fn pop_c(env: &mut StepEnv<'_>) {
    env.nothrow();
    env.pop_c();
}

pub fn pop_v(env: &mut StepEnv<'_>) {
    env.nothrow();
    env.pop_v();
}

pub fn pop_u(env: &mut StepEnv<'_>) {
    env.nothrow();
    env.pop_u();
}
