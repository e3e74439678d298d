//! Machine-level properties checked over generated programs.

use proptest::prelude::*;
use typeflux::interp::state::BlockId;
use typeflux::lattice::{TGEN, TINIT_CELL};
use typeflux::{
    step, Bytecode, CollectedInfo, Context, FuncInfo, Interp, MapIndex, Options, State,
};

fn arb_literal() -> impl Strategy<Value = Bytecode> {
    prop_oneof![
        Just(Bytecode::Null),
        Just(Bytecode::True),
        Just(Bytecode::False),
        any::<i64>().prop_map(Bytecode::Int),
        "[a-z]{0,6}".prop_map(|s| Bytecode::String(s.into())),
    ]
}

fn arb_binop() -> impl Strategy<Value = Bytecode> {
    prop_oneof![
        Just(Bytecode::Add),
        Just(Bytecode::Sub),
        Just(Bytecode::Mul),
        Just(Bytecode::Concat),
        Just(Bytecode::Same),
        Just(Bytecode::Eq),
        Just(Bytecode::Lt),
    ]
}

struct Machine {
    func: FuncInfo,
    index: MapIndex,
    options: Options,
    state: State,
    collect: CollectedInfo,
}

impl Machine {
    fn new(func: FuncInfo) -> Self {
        let ctx = Context { func: &func, cls: None };
        let state = State::entry(&ctx);
        Self {
            func,
            index: MapIndex::new(),
            options: Options::default(),
            state,
            collect: CollectedInfo::default(),
        }
    }

    fn step(&mut self, bc: &Bytecode) {
        let ctx = Context { func: &self.func, cls: None };
        let mut interp = Interp {
            index: &self.index,
            ctx: &ctx,
            options: &self.options,
            collect: &mut self.collect,
            state: &mut self.state,
        };
        let mut on_target = |_: BlockId, _: &State| {};
        step(&mut interp, &mut on_target, bc);
    }
}

proptest! {
    #[test]
    fn literal_programs_balance_the_stack(lits in prop::collection::vec(arb_literal(), 1..16)) {
        let mut m = Machine::new(FuncInfo::new("f", 0));
        for bc in &lits {
            m.step(bc);
        }
        prop_assert_eq!(m.state.stack.len(), lits.len());
        for _ in 0..lits.len() {
            m.step(&Bytecode::PopC);
        }
        prop_assert!(m.state.stack.is_empty());
    }

    #[test]
    fn binary_ops_consume_two_and_produce_one(
        a in arb_literal(),
        b in arb_literal(),
        op in arb_binop(),
    ) {
        let mut m = Machine::new(FuncInfo::new("f", 0));
        m.step(&a);
        m.step(&b);
        m.step(&op);
        prop_assert_eq!(m.state.stack.len(), 1);
        // Every operator result is an initialized value.
        prop_assert!(m.state.stack[0].ty.subtype_of(&TINIT_CELL));
    }

    #[test]
    fn stored_locals_stay_within_the_frame_top(
        lits in prop::collection::vec(arb_literal(), 1..8),
    ) {
        let num = lits.len() as u32;
        let mut m = Machine::new(FuncInfo::new("f", num));
        for (i, bc) in lits.iter().enumerate() {
            m.step(bc);
            m.step(&Bytecode::SetL { loc: i as u32 });
            m.step(&Bytecode::PopC);
        }
        for l in &m.state.locals {
            prop_assert!(l.subtype_of(&TGEN));
        }
        prop_assert!(m.state.stack.is_empty());
    }

    #[test]
    fn property_summaries_never_narrow(
        lits in prop::collection::vec(arb_literal(), 1..8),
    ) {
        let mut m = Machine::new(FuncInfo::new("f", 0));
        m.collect = CollectedInfo::with_private_props([("x".into(), typeflux::lattice::TBOTTOM)]);
        let mut prev = m.collect.private_props["x"].clone();
        for bc in &lits {
            m.step(bc);
            m.step(&Bytecode::SetThisProp { prop: "x".into() });
            m.step(&Bytecode::PopC);
            let cur = m.collect.private_props["x"].clone();
            prop_assert!(prev.subtype_of(&cur));
            prev = cur;
        }
    }

    #[test]
    fn volatile_locals_are_always_the_frame_top(
        lits in prop::collection::vec(arb_literal(), 1..8),
    ) {
        let mut m = Machine::new(FuncInfo::new("f", 1).mark_volatile(0));
        for bc in &lits {
            m.step(bc);
            m.step(&Bytecode::SetL { loc: 0 });
            m.step(&Bytecode::PopC);
            prop_assert_eq!(m.state.locals[0].clone(), TGEN);
        }
    }
}
