//! Symbolic machine state and per-step output flags.
//!
//! A `State` is owned by exactly one stepping loop while a basic block is
//! interpreted. The fixed-point driver clones it to fan out control-flow
//! successors and owns all merging at join points; nothing in this crate
//! merges states.

use std::collections::HashMap;
use std::sync::Arc;

use crate::index::{Context, Func};
use crate::interp::opcodes::Bytecode;
use crate::lattice::{Ty, TCLS, TGEN, TUNINIT};

pub type LocalId = u32;
pub type ClsRefSlotId = u32;
pub type IterId = u32;
pub type BlockId = u32;
pub type PropName = Arc<str>;

/// One operand-stack entry: the tracked type, and the local whose current
/// value it is known to equal, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct StackElem {
    pub ty: Ty,
    pub equiv_local: Option<LocalId>,
}

/// Call kind staged by a call-preparation instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FpiKind {
    Unknown,
    Func,
    Builtin,
    Ctor,
    ObjMeth,
    ClsMeth,
    ObjInvoke,
    CallableArr,
}

/// Staged metadata for one in-progress call, between its preparation
/// instruction and the invoking instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct ActRec {
    pub kind: FpiKind,
    pub func: Option<Func>,
    /// Second candidate for ambiguous dispatch; both must be considered.
    pub fallback: Option<Func>,
}

impl ActRec {
    pub fn new(kind: FpiKind, func: Option<Func>) -> Self {
        Self { kind, func, fallback: None }
    }

    pub fn with_fallback(mut self, fallback: Func) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// Tracked state of one iterator slot.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Iter {
    #[default]
    Unknown,
    Tracked {
        key: Ty,
        value: Ty,
    },
}

/// Abstract machine state for one program point.
#[derive(Clone, Debug)]
pub struct State {
    pub stack: Vec<StackElem>,
    pub locals: Vec<Ty>,
    pub cls_ref_slots: Vec<Ty>,
    pub iters: Vec<Iter>,
    pub fpi_stack: Vec<ActRec>,
    /// Set once the current path has established a definitely-non-null
    /// receiver.
    pub this_available: bool,
    /// Directional "local i currently equals local equiv_locals[i]" facts.
    pub equiv_locals: Vec<Option<LocalId>>,
    /// The rest of the current block cannot execute.
    pub unreachable: bool,
}

impl State {
    /// Entry state for a function body: every local uninitialized except
    /// volatile ones, which are pinned to the generic top from the start.
    pub fn entry(ctx: &Context<'_>) -> Self {
        let func = ctx.func;
        let locals = (0..func.num_locals)
            .map(|l| if func.is_volatile(l) { TGEN } else { TUNINIT })
            .collect();
        Self {
            stack: Vec::new(),
            locals,
            cls_ref_slots: vec![TCLS; func.num_cls_ref_slots as usize],
            iters: vec![Iter::Unknown; func.num_iters as usize],
            fpi_stack: Vec::new(),
            this_available: false,
            equiv_locals: vec![None; func.num_locals as usize],
            unreachable: false,
        }
    }
}

/// Dense bit set over local ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSet {
    words: Vec<u64>,
    len: usize,
}

impl LocalSet {
    pub fn new(len: usize) -> Self {
        Self { words: vec![0; len.div_ceil(64)], len }
    }

    pub fn set(&mut self, id: LocalId) {
        let id = id as usize;
        if id < self.len {
            self.words[id / 64] |= 1 << (id % 64);
        }
    }

    pub fn set_all(&mut self) {
        for (i, word) in self.words.iter_mut().enumerate() {
            let remaining = self.len - i * 64;
            *word = if remaining >= 64 { u64::MAX } else { (1u64 << remaining) - 1 };
        }
    }

    pub fn contains(&self, id: LocalId) -> bool {
        let id = id as usize;
        id < self.len && self.words[id / 64] & (1 << (id % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

/// Branch direction knowledge produced by a conditional-jump handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JmpDir {
    #[default]
    Either,
    /// The branch is always taken; there is no fallthrough.
    Taken,
    /// The branch is never taken; only the fallthrough survives.
    Fallthrough,
}

/// Per-instruction interpretation results handed back to the driver.
#[derive(Clone, Debug)]
pub struct StepFlags {
    /// The modeled operation may transfer control to error handling. Not
    /// control flow inside this crate; the driver adds the throw edge.
    pub may_throw: bool,
    /// The instruction's result is a known constant the optimizer may
    /// substitute.
    pub can_const_prop: bool,
    pub jmp: JmpDir,
    /// Locals this instruction may have read.
    pub may_read_locals: LocalSet,
    /// Terminal return type, for return instructions.
    pub returned: Option<Ty>,
    /// Replacement instruction sequence recorded by strength reduction; the
    /// driver splices it over the original instruction.
    pub reduced: Option<Vec<Bytecode>>,
}

impl StepFlags {
    pub fn new(num_locals: u32) -> Self {
        Self {
            may_throw: true,
            can_const_prop: false,
            jmp: JmpDir::Either,
            may_read_locals: LocalSet::new(num_locals as usize),
            returned: None,
            reduced: None,
        }
    }
}

/// Flow-insensitive facts collected across the whole analysis of one
/// function. Property summaries live here, not in `State`: interception
/// hooks may run re-entrant code on any access, so only one widen-only
/// summary per function is sound.
#[derive(Clone, Debug, Default)]
pub struct CollectedInfo {
    pub private_props: HashMap<PropName, Ty>,
    pub private_statics: HashMap<PropName, Ty>,
    /// The enclosing function may need a fully reified variable environment.
    pub may_use_var_env: bool,
}

impl CollectedInfo {
    /// Track the given private instance properties, starting each at its
    /// declared initializer type.
    pub fn with_private_props<I>(props: I) -> Self
    where
        I: IntoIterator<Item = (PropName, Ty)>,
    {
        Self {
            private_props: props.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_private_statics<I>(mut self, statics: I) -> Self
    where
        I: IntoIterator<Item = (PropName, Ty)>,
    {
        self.private_statics = statics.into_iter().collect();
        self
    }
}
