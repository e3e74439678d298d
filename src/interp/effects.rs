//! Caller-frame effects of invoking a staged call.
//!
//! A callee can reach back into the calling frame through reflection. When
//! that can't be ruled out, the only sound move is to forget everything
//! tracked about the frame's locals. Classification here is deliberately
//! ordered; see the rule comments.

use tracing::trace;

use crate::index::Func;
use crate::interp::env::StepEnv;
use crate::interp::state::{ActRec, FpiKind};

/// Builtins that write the calling frame by reflection, always, regardless
/// of configuration.
const FRAME_WRITING_INTRINSICS: &[&str] = &["frame_set_metadata", "extract_frame_vars"];

/// Diagnostic builtin whose failure callback may be dynamically-evaluated
/// code reaching the caller's frame. Unlike the frame-writing intrinsics it
/// is *not* unconditionally may-write: the strictness flag can rule the
/// callback path out entirely, and otherwise it is judged by its recorded
/// per-function capabilities like any other callee.
const DIAGNOSTIC_INTRINSIC: &str = "assert";

/// Effects of one resolved callee on the calling frame.
pub fn special_function_effects(env: &mut StepEnv<'_>, func: &Func) {
    if FRAME_WRITING_INTRINSICS.contains(&func.name()) {
        // Writes the caller's frame but never needs the reified variable
        // environment.
        trace!(func = func.name(), "frame-writing intrinsic");
        env.read_unknown_locals();
        env.kill_locals();
        return;
    }

    if func.name() == DIAGNOSTIC_INTRINSIC && env.options.disallow_dynamic_frame_access {
        return;
    }

    if env.index.may_write_caller_frame(func) {
        trace!(func = func.name(), "may write caller frame");
        env.read_unknown_locals();
        env.kill_locals();
        env.may_use_var_env();
        return;
    }

    if env.index.may_read_caller_frame(func) {
        trace!(func = func.name(), "may read caller frame");
        env.read_unknown_locals();
        env.may_use_var_env();
    }
}

/// Effects of invoking a staged call. Unresolved plain-function targets are
/// treated as frame-writing unless dynamic frame access is disallowed; a
/// fallback candidate is classified independently of the primary, so the
/// more permissive classification wins.
pub fn special_function_effects_ar(env: &mut StepEnv<'_>, ar: &ActRec) {
    match ar.kind {
        FpiKind::Unknown | FpiKind::Func | FpiKind::Builtin => {
            let Some(func) = &ar.func else {
                if ar.kind != FpiKind::Builtin && !env.options.disallow_dynamic_frame_access {
                    trace!("unresolved callee: assuming caller-frame write");
                    env.read_unknown_locals();
                    env.kill_locals();
                    env.may_use_var_env();
                }
                return;
            };
            special_function_effects(env, func);
            if let Some(fallback) = &ar.fallback {
                special_function_effects(env, fallback);
            }
        }
        FpiKind::Ctor
        | FpiKind::ObjMeth
        | FpiKind::ClsMeth
        | FpiKind::ObjInvoke
        | FpiKind::CallableArr => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Context;
    use crate::interp::env::testing::{env, Fixture};
    use crate::interp::state::{BlockId, State};
    use crate::lattice::{TGEN, TINT};

    fn noop() -> impl FnMut(BlockId, &State) {
        |_, _| {}
    }

    #[test]
    fn frame_writing_intrinsic_always_kills_locals() {
        let mut fx = Fixture::with_locals(2);
        fx.options.disallow_dynamic_frame_access = true;
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        env.add_loc_equiv(0, 1);
        let ar = ActRec::new(FpiKind::Builtin, Some(Func::new("frame_set_metadata")));
        special_function_effects_ar(&mut env, &ar);

        assert_eq!(env.state.locals, vec![TGEN, TGEN]);
        assert_eq!(env.find_loc_equiv(0), None);
        assert!(env.flags.may_read_locals.contains(0));
        // The strictness flag does not shield against this set.
        assert!(!env.collect.may_use_var_env);
    }

    #[test]
    fn diagnostic_intrinsic_is_inert_under_strict_config() {
        let mut fx = Fixture::with_locals(1);
        fx.options.disallow_dynamic_frame_access = true;
        fx.index.add_func("assert");
        fx.index.set_caller_frame_effects("assert", true, true);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        let ar = ActRec::new(FpiKind::Func, Some(Func::new("assert")));
        special_function_effects_ar(&mut env, &ar);

        assert_eq!(env.state.locals, vec![TINT]);
        assert!(!env.collect.may_use_var_env);
    }

    #[test]
    fn diagnostic_intrinsic_falls_through_to_capabilities() {
        let mut fx = Fixture::with_locals(1);
        fx.index.add_func("assert");
        fx.index.set_caller_frame_effects("assert", true, true);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        let ar = ActRec::new(FpiKind::Func, Some(Func::new("assert")));
        special_function_effects_ar(&mut env, &ar);

        assert_eq!(env.state.locals, vec![TGEN]);
        assert!(env.collect.may_use_var_env);
    }

    #[test]
    fn clean_resolved_callee_has_no_effect() {
        let mut fx = Fixture::with_locals(1);
        fx.index.add_func("strlen");
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        let ar = ActRec::new(FpiKind::Func, Some(Func::new("strlen")));
        special_function_effects_ar(&mut env, &ar);

        assert_eq!(env.state.locals, vec![TINT]);
        assert!(!env.collect.may_use_var_env);
        assert!(!env.flags.may_read_locals.contains(0));
    }

    #[test]
    fn unresolved_callee_is_frame_writing_by_default() {
        let mut fx = Fixture::with_locals(1);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        let ar = ActRec::new(FpiKind::Unknown, None);
        special_function_effects_ar(&mut env, &ar);

        assert_eq!(env.state.locals, vec![TGEN]);
        assert!(env.collect.may_use_var_env);
    }

    #[test]
    fn unresolved_callee_is_inert_under_strict_config() {
        let mut fx = Fixture::with_locals(1);
        fx.options.disallow_dynamic_frame_access = true;
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        let ar = ActRec::new(FpiKind::Unknown, None);
        special_function_effects_ar(&mut env, &ar);

        assert_eq!(env.state.locals, vec![TINT]);
        assert!(!env.collect.may_use_var_env);
    }

    #[test]
    fn fallback_target_takes_the_more_permissive_effect() {
        let mut fx = Fixture::with_locals(1);
        fx.index.add_func("pure_f");
        fx.index.add_func("frame_reader");
        fx.index.set_caller_frame_effects("frame_reader", true, false);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        let ar = ActRec::new(FpiKind::Func, Some(Func::new("pure_f")))
            .with_fallback(Func::new("frame_reader"));
        special_function_effects_ar(&mut env, &ar);

        // Reader fallback: locals keep their types but the frame may be read.
        assert_eq!(env.state.locals, vec![TINT]);
        assert!(env.collect.may_use_var_env);
        assert!(env.flags.may_read_locals.contains(0));
    }

    #[test]
    fn method_kinds_never_touch_the_caller_frame() {
        let mut fx = Fixture::with_locals(1);
        let ctx = Context { func: &fx.func, cls: None };
        let mut prop = noop();
        let mut env = env!(fx, ctx, prop);

        env.set_loc_raw(0, TINT);
        for kind in [
            FpiKind::Ctor,
            FpiKind::ObjMeth,
            FpiKind::ClsMeth,
            FpiKind::ObjInvoke,
            FpiKind::CallableArr,
        ] {
            let ar = ActRec::new(kind, None);
            special_function_effects_ar(&mut env, &ar);
        }
        assert_eq!(env.state.locals, vec![TINT]);
        assert!(!env.collect.may_use_var_env);
    }
}
