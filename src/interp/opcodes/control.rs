use crate::interp::env::StepEnv;
use crate::interp::state::BlockId;

pub fn jmp(env: &mut StepEnv<'_>, target: BlockId) {
    env.nothrow();
    env.jmp_nofallthrough();
    env.propagate_to(target);
}

/// Branch when the operand is falsy.
pub fn jmp_z(env: &mut StepEnv<'_>, target: BlockId) {
    env.nothrow();
    let truthy = env.top_c(0).truthiness();
    env.pop_c();
    match truthy {
        Some(true) => env.jmp_nevertaken(),
        Some(false) => {
            env.jmp_nofallthrough();
            env.propagate_to(target);
        }
        None => env.propagate_to(target),
    }
}

/// Branch when the operand is truthy.
pub fn jmp_nz(env: &mut StepEnv<'_>, target: BlockId) {
    env.nothrow();
    let truthy = env.top_c(0).truthiness();
    env.pop_c();
    match truthy {
        Some(false) => env.jmp_nevertaken(),
        Some(true) => {
            env.jmp_nofallthrough();
            env.propagate_to(target);
        }
        None => env.propagate_to(target),
    }
}

pub fn ret_c(env: &mut StepEnv<'_>) {
    let t = env.pop_c();
    env.do_ret(t);
}

pub fn ret_v(env: &mut StepEnv<'_>) {
    let t = env.pop_v();
    env.do_ret(t);
}

pub fn throw(env: &mut StepEnv<'_>) {
    env.pop_c();
    env.unreachable();
}

pub fn fatal(env: &mut StepEnv<'_>) {
    env.pop_c();
    env.read_unknown_locals();
    env.unreachable();
}
