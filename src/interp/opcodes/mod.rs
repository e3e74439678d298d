//! The closed opcode set and its dispatch.
//!
//! One enum variant per opcode, one match arm per variant, no catch-all:
//! adding an opcode without a modeled effect is a compile error.

pub mod op_macros;

pub mod arith;
pub mod calls;
pub mod control;
pub mod locals;
pub mod props;
pub mod slots;
pub mod stack;

use std::sync::Arc;

use crate::interp::env::StepEnv;
use crate::interp::state::{BlockId, ClsRefSlotId, IterId, LocalId};

/// One instruction of the analyzed bytecode.
#[derive(Clone, Debug, PartialEq)]
pub enum Bytecode {
    Nop,

    // literals
    Null,
    NullUninit,
    True,
    False,
    Int(i64),
    Double(f64),
    String(Arc<str>),

    // stack manipulation
    Dup,
    PopC,
    PopV,
    PopU,

    // arithmetic / comparison / logic
    Add,
    Sub,
    Mul,
    Concat,
    Not,
    Same,
    Eq,
    Lt,

    // locals
    CGetL { loc: LocalId },
    CUGetL { loc: LocalId },
    PushL { loc: LocalId },
    SetL { loc: LocalId },
    BindL { loc: LocalId },
    UnsetL { loc: LocalId },

    // control flow
    Jmp { target: BlockId },
    JmpZ { target: BlockId },
    JmpNZ { target: BlockId },
    RetC,
    RetV,
    Throw,
    Fatal,

    // $this and private properties
    CheckThis,
    BareThis,
    GetThisProp { prop: Arc<str> },
    SetThisProp { prop: Arc<str> },
    BindThisProp { prop: Arc<str> },
    UnsetThisProp { prop: Arc<str> },
    GetSelfStatic { prop: Arc<str> },
    SetSelfStatic { prop: Arc<str> },
    BindSelfStatic { prop: Arc<str> },

    // class-ref slots and iterators
    LateBoundCls { slot: ClsRefSlotId },
    ClsRefGetC { slot: ClsRefSlotId },
    DiscardClsRef { slot: ClsRefSlotId },
    IterInit { iter: IterId, target: BlockId, loc: LocalId },
    IterNext { iter: IterId, target: BlockId, loc: LocalId },
    IterFree { iter: IterId },

    // call staging and invocation
    FPushFuncD { name: Arc<str> },
    FPushFunc,
    FPushObjMethodD { name: Arc<str> },
    FPushClsMethodD { cls: Arc<str>, name: Arc<str> },
    FPushCtorD { cls: Arc<str> },
    FPushCtor { slot: ClsRefSlotId },
    FPassC { param: u32 },
    FPassL { param: u32, loc: LocalId },
    FCall { num_args: u32 },
}

pub fn dispatch(env: &mut StepEnv<'_>, bc: &Bytecode) {
    match bc {
        Bytecode::Nop => stack::nop(env),
        Bytecode::Null => stack::null(env),
        Bytecode::NullUninit => stack::null_uninit(env),
        Bytecode::True => stack::true_(env),
        Bytecode::False => stack::false_(env),
        Bytecode::Int(v) => stack::int(env, *v),
        Bytecode::Double(v) => stack::double(env, *v),
        Bytecode::String(s) => stack::string(env, s.clone()),
        Bytecode::Dup => stack::dup(env),
        Bytecode::PopC => stack::pop_c(env),
        Bytecode::PopV => stack::pop_v(env),
        Bytecode::PopU => stack::pop_u(env),
        Bytecode::Add => arith::add(env),
        Bytecode::Sub => arith::sub(env),
        Bytecode::Mul => arith::mul(env),
        Bytecode::Concat => arith::concat(env),
        Bytecode::Not => arith::not(env),
        Bytecode::Same => arith::same(env),
        Bytecode::Eq => arith::eq(env),
        Bytecode::Lt => arith::lt(env),
        Bytecode::CGetL { loc } => locals::c_get_l(env, *loc),
        Bytecode::CUGetL { loc } => locals::cu_get_l(env, *loc),
        Bytecode::PushL { loc } => locals::push_l(env, *loc),
        Bytecode::SetL { loc } => locals::set_l(env, *loc),
        Bytecode::BindL { loc } => locals::bind_l(env, *loc),
        Bytecode::UnsetL { loc } => locals::unset_l(env, *loc),
        Bytecode::Jmp { target } => control::jmp(env, *target),
        Bytecode::JmpZ { target } => control::jmp_z(env, *target),
        Bytecode::JmpNZ { target } => control::jmp_nz(env, *target),
        Bytecode::RetC => control::ret_c(env),
        Bytecode::RetV => control::ret_v(env),
        Bytecode::Throw => control::throw(env),
        Bytecode::Fatal => control::fatal(env),
        Bytecode::CheckThis => props::check_this(env),
        Bytecode::BareThis => props::bare_this(env),
        Bytecode::GetThisProp { prop } => props::get_this_prop(env, prop),
        Bytecode::SetThisProp { prop } => props::set_this_prop(env, prop),
        Bytecode::BindThisProp { prop } => props::bind_this_prop(env, prop),
        Bytecode::UnsetThisProp { prop } => props::unset_this_prop(env, prop),
        Bytecode::GetSelfStatic { prop } => props::get_self_static(env, prop),
        Bytecode::SetSelfStatic { prop } => props::set_self_static(env, prop),
        Bytecode::BindSelfStatic { prop } => props::bind_self_static(env, prop),
        Bytecode::LateBoundCls { slot } => slots::late_bound_cls(env, *slot),
        Bytecode::ClsRefGetC { slot } => slots::cls_ref_get_c(env, *slot),
        Bytecode::DiscardClsRef { slot } => slots::discard_cls_ref(env, *slot),
        Bytecode::IterInit { iter, target, loc } => slots::iter_init(env, *iter, *target, *loc),
        Bytecode::IterNext { iter, target, loc } => slots::iter_next(env, *iter, *target, *loc),
        Bytecode::IterFree { iter } => slots::iter_free(env, *iter),
        Bytecode::FPushFuncD { name } => calls::f_push_func_d(env, name),
        Bytecode::FPushFunc => calls::f_push_func(env),
        Bytecode::FPushObjMethodD { name } => calls::f_push_obj_method_d(env, name),
        Bytecode::FPushClsMethodD { cls, name } => calls::f_push_cls_method_d(env, cls, name),
        Bytecode::FPushCtorD { cls } => calls::f_push_ctor_d(env, cls),
        Bytecode::FPushCtor { slot } => calls::f_push_ctor(env, *slot),
        Bytecode::FPassC { param } => calls::f_pass_c(env, *param),
        Bytecode::FPassL { param, loc } => calls::f_pass_l(env, *param, *loc),
        Bytecode::FCall { num_args } => calls::f_call(env, *num_args),
    }
}
