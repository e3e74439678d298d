use crate::interp::env::StepEnv;
use crate::interp::opcodes::op_macros::{arith_op, cmp_op};
use crate::interp::opcodes::Bytecode;
use crate::interp::reduce;
use crate::lattice::{bval, sval, TBOOL, TOBJ, TSTR};

arith_op!(add, i64::wrapping_add);
arith_op!(sub, i64::wrapping_sub);
arith_op!(mul, i64::wrapping_mul);

cmp_op!(eq, |a, b| a == b);
cmp_op!(lt, |a, b| a < b);

pub fn concat(env: &mut StepEnv<'_>) {
    let r = env.pop_c();
    let l = env.pop_c();
    if let (Some(a), Some(b)) = (l.str_value(), r.str_value()) {
        let folded = format!("{a}{b}");
        env.constprop();
        env.nothrow();
        env.push(sval(folded));
        return;
    }
    // Object operands may run a __toString hook; everything else coerces
    // silently.
    if !l.could_be(&TOBJ) && !r.could_be(&TOBJ) {
        env.nothrow();
    }
    env.push(TSTR);
}

pub fn not(env: &mut StepEnv<'_>) {
    // Strength-reduce before touching any state: a known-truthiness operand
    // makes this a pop plus a literal.
    match env.top_c(0).truthiness() {
        Some(true) => reduce(env, vec![Bytecode::PopC, Bytecode::False]),
        Some(false) => reduce(env, vec![Bytecode::PopC, Bytecode::True]),
        None => {
            env.pop_c();
            env.nothrow();
            env.push(TBOOL);
        }
    }
}

pub fn same(env: &mut StepEnv<'_>) {
    let r = env.pop_c();
    let l = env.pop_c();
    env.nothrow();
    if !l.could_be(&r) {
        env.constprop();
        env.push(bval(false));
        return;
    }
    if l == r && l.is_singleton() {
        env.constprop();
        env.push(bval(true));
        return;
    }
    env.push(TBOOL);
}
