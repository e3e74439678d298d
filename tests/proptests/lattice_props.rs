//! Order-theoretic properties of the type lattice.

use proptest::prelude::*;
use typeflux::lattice::{
    bval, ival, sval, union_of, Ty, TARR, TBOOL, TCELL, TDBL, TGEN, TINIT_CELL, TINIT_NULL,
    TINT, TOBJ, TREF, TSTR, TUNINIT,
};

fn arb_ty() -> impl Strategy<Value = Ty> {
    prop_oneof![
        Just(TUNINIT),
        Just(TINIT_NULL),
        Just(TBOOL),
        Just(TINT),
        Just(TDBL),
        Just(TSTR),
        Just(TARR),
        Just(TOBJ),
        Just(TREF),
        Just(TINIT_CELL),
        Just(TCELL),
        Just(TGEN),
        any::<i64>().prop_map(ival),
        any::<bool>().prop_map(bval),
        "[a-z]{0,4}".prop_map(sval),
    ]
}

proptest! {
    #[test]
    fn union_is_an_upper_bound(a in arb_ty(), b in arb_ty()) {
        let u = union_of(a.clone(), b.clone());
        prop_assert!(a.subtype_of(&u));
        prop_assert!(b.subtype_of(&u));
    }

    #[test]
    fn union_commutes(a in arb_ty(), b in arb_ty()) {
        prop_assert_eq!(
            union_of(a.clone(), b.clone()),
            union_of(b, a)
        );
    }

    #[test]
    fn union_is_idempotent(a in arb_ty()) {
        prop_assert_eq!(union_of(a.clone(), a.clone()), a);
    }

    #[test]
    fn union_is_monotone(a in arb_ty(), b in arb_ty(), c in arb_ty()) {
        // Widening one side can only widen the result.
        let small = union_of(a.clone(), b.clone());
        let big = union_of(a, union_of(b, c));
        prop_assert!(small.subtype_of(&big));
    }

    #[test]
    fn subtype_is_reflexive_and_transitive(a in arb_ty(), b in arb_ty(), c in arb_ty()) {
        prop_assert!(a.subtype_of(&a));
        if a.subtype_of(&b) && b.subtype_of(&c) {
            prop_assert!(a.subtype_of(&c));
        }
    }

    #[test]
    fn could_be_is_symmetric(a in arb_ty(), b in arb_ty()) {
        prop_assert_eq!(a.could_be(&b), b.could_be(&a));
    }

    #[test]
    fn subtypes_overlap(a in arb_ty(), b in arb_ty()) {
        // Nothing in the generator is bottom, so containment implies a
        // shared value.
        if a.subtype_of(&b) {
            prop_assert!(a.could_be(&b));
        }
    }

    #[test]
    fn loosen_values_widens(a in arb_ty()) {
        prop_assert!(a.subtype_of(&a.loosen_values()));
    }

    #[test]
    fn loosen_statics_widens(a in arb_ty()) {
        prop_assert!(a.subtype_of(&a.loosen_statics()));
    }

    #[test]
    fn remove_uninit_narrows(a in arb_ty()) {
        prop_assert!(a.remove_uninit().subtype_of(&a));
        prop_assert!(!a.remove_uninit().could_be(&TUNINIT));
    }

    #[test]
    fn known_truthiness_survives_widening_to_union(a in arb_ty(), b in arb_ty()) {
        // If both sides agree on truthiness, the union must not disagree.
        if let (Some(ta), Some(tb)) = (a.truthiness(), b.truthiness()) {
            if ta == tb {
                let u = union_of(a, b);
                prop_assert_ne!(u.truthiness(), Some(!ta));
            }
        }
    }
}
