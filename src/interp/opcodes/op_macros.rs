//! Shared handler-generating macros for the simple binary operators.

/// Binary arithmetic handler: folds known int operands, keeps int/double
/// refinements, and falls back to the initialized-value top when dynamic
/// coercion (which may raise) is possible.
macro_rules! arith_op {
    ($name:ident, $fold:expr) => {
        pub fn $name(env: &mut $crate::interp::env::StepEnv<'_>) {
            let r = env.pop_c();
            let l = env.pop_c();
            if let (Some(a), Some(b)) = (l.int_value(), r.int_value()) {
                env.constprop();
                env.nothrow();
                env.push($crate::lattice::ival(($fold)(a, b)));
                return;
            }
            if l.subtype_of(&$crate::lattice::TINT) && r.subtype_of(&$crate::lattice::TINT) {
                env.nothrow();
                env.push($crate::lattice::TINT);
                return;
            }
            if l.subtype_of(&$crate::lattice::TDBL) && r.subtype_of(&$crate::lattice::TDBL) {
                env.nothrow();
                env.push($crate::lattice::TDBL);
                return;
            }
            env.push($crate::lattice::TINIT_CELL);
        }
    };
}

/// Binary comparison handler: folds known int operands; only object
/// operands can make a comparison raise.
macro_rules! cmp_op {
    ($name:ident, $fold:expr) => {
        pub fn $name(env: &mut $crate::interp::env::StepEnv<'_>) {
            let r = env.pop_c();
            let l = env.pop_c();
            if let (Some(a), Some(b)) = (l.int_value(), r.int_value()) {
                env.constprop();
                env.nothrow();
                env.push($crate::lattice::bval(($fold)(a, b)));
                return;
            }
            if !l.could_be(&$crate::lattice::TOBJ) && !r.could_be(&$crate::lattice::TOBJ) {
                env.nothrow();
            }
            env.push($crate::lattice::TBOOL);
        }
    };
}

pub(crate) use arith_op;
pub(crate) use cmp_op;
