use crate::index::PrepKind;
use crate::interp::effects::special_function_effects_ar;
use crate::interp::env::StepEnv;
use crate::interp::opcodes::Bytecode;
use crate::interp::reduce;
use crate::interp::state::{ActRec, ClsRefSlotId, FpiKind, LocalId};
use crate::lattice::{obj_exact, sub_obj, union_of, ClsTag, Ty, TGEN, TINIT_CELL, TOBJ, TREF};

pub fn f_push_func_d(env: &mut StepEnv<'_>, name: &str) {
    let func = env.index.resolve_func(name);
    if func.is_some() {
        env.nothrow();
    }
    env.fpi_push(ActRec::new(FpiKind::Func, func));
}

/// Stage a call through a popped callable value. A literal name that
/// resolves behaves like the direct form.
pub fn f_push_func(env: &mut StepEnv<'_>) {
    let t = env.pop_c();
    let func = t.str_value().and_then(|s| env.index.resolve_func(s));
    let kind = if func.is_some() { FpiKind::Func } else { FpiKind::Unknown };
    env.fpi_push(ActRec::new(kind, func));
}

pub fn f_push_obj_method_d(env: &mut StepEnv<'_>, name: &str) {
    let obj = env.pop_c();
    let func = obj
        .class_of()
        .and_then(|(cls, _)| env.index.resolve_method(cls.name(), name));
    env.fpi_push(ActRec::new(FpiKind::ObjMeth, func));
}

pub fn f_push_cls_method_d(env: &mut StepEnv<'_>, cls: &str, name: &str) {
    let func = env.index.resolve_method(cls, name);
    env.fpi_push(ActRec::new(FpiKind::ClsMeth, func));
}

pub fn f_push_ctor_d(env: &mut StepEnv<'_>, cls: &str) {
    match env.index.resolve_class(cls) {
        Some(c) => {
            env.nothrow();
            let ctor = env.index.resolve_method(cls, "__construct");
            env.fpi_push(ActRec::new(FpiKind::Ctor, ctor));
            env.push(obj_exact(c));
        }
        None => {
            env.fpi_push(ActRec::new(FpiKind::Ctor, None));
            env.push(TOBJ);
        }
    }
}

/// Construct an instance of the class held in a class-ref slot.
pub fn f_push_ctor(env: &mut StepEnv<'_>, slot: ClsRefSlotId) {
    let cls = env.take_cls_ref(slot);
    let (obj, ctor) = match cls.class_of() {
        Some((c, ClsTag::Exact)) => (
            obj_exact(c.clone()),
            env.index.resolve_method(c.name(), "__construct"),
        ),
        Some((c, ClsTag::Sub)) => (sub_obj(c.clone()), None),
        None => (TOBJ, None),
    };
    env.fpi_push(ActRec::new(FpiKind::Ctor, ctor));
    env.push(obj);
}

pub fn f_pass_c(env: &mut StepEnv<'_>, param: u32) {
    // A plain value on the stack already satisfies by-value passing; a
    // by-ref or unknown convention may raise at bind time.
    if env.prep_kind(param) == PrepKind::Val {
        env.nothrow();
    }
}

pub fn f_pass_l(env: &mut StepEnv<'_>, param: u32, loc: LocalId) {
    match env.prep_kind(param) {
        PrepKind::Val => reduce(env, vec![Bytecode::CGetL { loc }]),
        PrepKind::Ref => {
            env.nothrow();
            env.set_loc_raw(loc, TREF);
            env.push(TREF);
        }
        PrepKind::Unknown => {
            // The callee decides at runtime; the local may end up boxed.
            env.set_loc_raw(loc, TGEN);
            env.push(TGEN);
        }
    }
}

fn return_type(env: &StepEnv<'_>, ar: &ActRec) -> Ty {
    let Some(func) = &ar.func else { return TINIT_CELL };
    let primary = env.index.lookup_return_type(func);
    match &ar.fallback {
        Some(fallback) => union_of(primary, env.index.lookup_return_type(fallback)),
        None => primary,
    }
}

pub fn f_call(env: &mut StepEnv<'_>, num_args: u32) {
    env.discard(num_args as usize);
    let ar = env.fpi_pop();
    special_function_effects_ar(env, &ar);
    if ar.func.is_none() {
        // An opaque callee may re-enter this class and rewrite any private
        // property.
        env.kill_this_props();
        env.kill_self_props();
    }
    let ret = return_type(env, &ar);
    env.push(ret);
}
