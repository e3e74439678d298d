//! Per-instruction abstract interpretation.
//!
//! The fixed-point driver owns control flow: it walks blocks, merges states
//! at joins, and re-queues work. This module owns single instructions. Each
//! [`step`] consumes the incoming state in place and reports what the
//! instruction did through [`StepFlags`]; successor states for branch
//! targets are handed out through the `propagate` callback.

pub mod effects;
pub mod env;
pub mod opcodes;
pub mod state;

use tracing::debug;

use crate::index::{Context, Index};
use crate::interp::env::StepEnv;
use crate::interp::opcodes::{dispatch, Bytecode};
use crate::interp::state::{BlockId, CollectedInfo, JmpDir, State, StepFlags};
use crate::options::Options;

/// Everything the driver threads through the interpretation of one block.
pub struct Interp<'a> {
    pub index: &'a dyn Index,
    pub ctx: &'a Context<'a>,
    pub options: &'a Options,
    pub collect: &'a mut CollectedInfo,
    pub state: &'a mut State,
}

/// Interpret one instruction, mutating the state in place.
pub fn step(
    interp: &mut Interp<'_>,
    propagate: &mut dyn FnMut(BlockId, &State),
    bc: &Bytecode,
) -> StepFlags {
    debug!(op = ?bc, "step");
    let mut flags = StepFlags::new(interp.ctx.func.num_locals);
    let mut env = StepEnv {
        index: interp.index,
        ctx: interp.ctx,
        options: interp.options,
        collect: &mut *interp.collect,
        state: &mut *interp.state,
        flags: &mut flags,
        propagate,
    };
    dispatch(&mut env, bc);
    flags
}

/// Interpret a composite operation as the given sequence of simpler ones.
///
/// Throw behavior accumulates: the composite may throw if any piece may.
/// Constant-propagation and reduction flags are whatever the last piece
/// left, since only its result survives on the stack. No piece may branch.
fn impl_vec(env: &mut StepEnv<'_>, record: bool, bcs: Vec<Bytecode>) {
    let mut replacement = Vec::with_capacity(bcs.len());
    env.flags.may_throw = false;
    for bc in bcs {
        assert_eq!(
            env.flags.jmp,
            JmpDir::Either,
            "branching instruction inside a composite"
        );
        let already = env.flags.may_throw;
        env.flags.may_throw = true;
        env.flags.can_const_prop = false;
        env.flags.reduced = None;
        dispatch(env, &bc);
        // A piece may itself have been strength-reduced; splice its
        // replacement in flat.
        match env.flags.reduced.take() {
            Some(seq) => replacement.extend(seq),
            None => replacement.push(bc),
        }
        env.flags.may_throw |= already;
    }
    env.flags.reduced = record.then_some(replacement);
}

/// Model the current instruction by interpreting `bcs` in its place,
/// without rewriting it.
pub fn impl_seq(env: &mut StepEnv<'_>, bcs: Vec<Bytecode>) {
    impl_vec(env, false, bcs);
}

/// Replace the current instruction with `bcs`: interpret the sequence and
/// record it for the driver to splice over the original. Only legal before
/// the handler has touched any state.
pub fn reduce(env: &mut StepEnv<'_>, bcs: Vec<Bytecode>) {
    impl_vec(env, true, bcs);
}

#[cfg(test)]
mod tests {
    use super::env::testing::{env, Fixture};
    use super::*;
    use crate::lattice::{ival, TINIT_NULL};

    fn noop() -> impl FnMut(BlockId, &State) {
        |_, _| {}
    }

    #[test]
    fn step_runs_one_instruction() {
        let mut fx = Fixture::with_locals(1);
        let func = fx.func.clone();
        let ctx = Context { func: &func, cls: None };
        let mut interp = Interp {
            index: &fx.index,
            ctx: &ctx,
            options: &fx.options,
            collect: &mut fx.collect,
            state: &mut fx.state,
        };
        let flags = step(&mut interp, &mut noop(), &Bytecode::Int(3));
        assert!(flags.can_const_prop);
        assert!(!flags.may_throw);
        assert_eq!(interp.state.stack.len(), 1);
    }

    #[test]
    fn composite_throw_behavior_accumulates() {
        let mut fx = Fixture::with_locals(1);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        // CGetL of an uninitialized local may raise; the trailing PopC is
        // clean but must not erase that.
        impl_seq(
            &mut env,
            vec![Bytecode::CGetL { loc: 0 }, Bytecode::PopC],
        );
        assert!(env.flags.may_throw);
        assert!(env.flags.reduced.is_none());
        assert!(env.state.stack.is_empty());
    }

    #[test]
    fn composite_of_clean_pieces_cannot_throw() {
        let mut fx = Fixture::with_locals(0);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        impl_seq(&mut env, vec![Bytecode::Int(1), Bytecode::PopC]);
        assert!(!env.flags.may_throw);
    }

    #[test]
    fn reduce_records_the_replacement_sequence() {
        let mut fx = Fixture::with_locals(0);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        reduce(&mut env, vec![Bytecode::Int(2)]);
        assert_eq!(env.flags.reduced, Some(vec![Bytecode::Int(2)]));
        assert_eq!(*env.top_t(0), ival(2));
    }

    #[test]
    fn nested_reductions_flatten() {
        let mut fx = Fixture::with_locals(0);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        // Not on a known-falsy operand itself reduces to [PopC, True].
        env.push(TINIT_NULL);
        reduce(&mut env, vec![Bytecode::Not]);
        assert_eq!(
            env.flags.reduced,
            Some(vec![Bytecode::PopC, Bytecode::True])
        );
        assert_eq!(*env.top_t(0), crate::lattice::bval(true));
    }
}
