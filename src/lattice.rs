//! Abstract type lattice for the interpreter.
//!
//! Types are a bit set of base kinds plus an optional refinement (a literal
//! value or a resolved class). The interpreter only consumes the operations
//! here; it never invents lattice facts of its own.

use std::fmt;
use std::sync::Arc;

use crate::index::Class;

type Bits = u16;

const B_UNINIT: Bits = 1 << 0;
const B_INIT_NULL: Bits = 1 << 1;
const B_FALSE: Bits = 1 << 2;
const B_TRUE: Bits = 1 << 3;
const B_INT: Bits = 1 << 4;
const B_DBL: Bits = 1 << 5;
const B_STR: Bits = 1 << 6;
const B_ARR: Bits = 1 << 7;
const B_OBJ: Bits = 1 << 8;
const B_CLS: Bits = 1 << 9;
const B_REF: Bits = 1 << 10;

const B_INIT_CELL: Bits =
    B_INIT_NULL | B_FALSE | B_TRUE | B_INT | B_DBL | B_STR | B_ARR | B_OBJ;
const B_CELL: Bits = B_INIT_CELL | B_UNINIT;
const B_GEN: Bits = B_CELL | B_REF;
const B_TOP: Bits = B_GEN | B_CLS;

/// Whether an object/class refinement names the exact class or any subclass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClsTag {
    Exact,
    Sub,
}

#[derive(Clone, Debug)]
enum Data {
    Int(i64),
    Dbl(f64),
    Str(Arc<str>),
    Obj(ClsTag, Class),
    Cls(ClsTag, Class),
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::Int(a), Data::Int(b)) => a == b,
            // Bitwise so the lattice stays a partial order at NaN.
            (Data::Dbl(a), Data::Dbl(b)) => a.to_bits() == b.to_bits(),
            (Data::Str(a), Data::Str(b)) => a == b,
            (Data::Obj(ta, ca), Data::Obj(tb, cb)) => ta == tb && ca == cb,
            (Data::Cls(ta, ca), Data::Cls(tb, cb)) => ta == tb && ca == cb,
            _ => false,
        }
    }
}

/// An abstract type: a set of base kinds, optionally refined by a literal
/// value or a resolved class when exactly one kind bit is set.
#[derive(Clone, PartialEq)]
pub struct Ty {
    bits: Bits,
    data: Option<Data>,
}

pub const TBOTTOM: Ty = Ty { bits: 0, data: None };
pub const TUNINIT: Ty = Ty { bits: B_UNINIT, data: None };
pub const TINIT_NULL: Ty = Ty { bits: B_INIT_NULL, data: None };
pub const TNULL: Ty = Ty { bits: B_UNINIT | B_INIT_NULL, data: None };
pub const TFALSE: Ty = Ty { bits: B_FALSE, data: None };
pub const TTRUE: Ty = Ty { bits: B_TRUE, data: None };
pub const TBOOL: Ty = Ty { bits: B_FALSE | B_TRUE, data: None };
pub const TINT: Ty = Ty { bits: B_INT, data: None };
pub const TDBL: Ty = Ty { bits: B_DBL, data: None };
pub const TSTR: Ty = Ty { bits: B_STR, data: None };
pub const TARR: Ty = Ty { bits: B_ARR, data: None };
pub const TOBJ: Ty = Ty { bits: B_OBJ, data: None };
pub const TCLS: Ty = Ty { bits: B_CLS, data: None };
pub const TREF: Ty = Ty { bits: B_REF, data: None };
pub const TINIT_CELL: Ty = Ty { bits: B_INIT_CELL, data: None };
pub const TCELL: Ty = Ty { bits: B_CELL, data: None };
pub const TGEN: Ty = Ty { bits: B_GEN, data: None };
pub const TTOP: Ty = Ty { bits: B_TOP, data: None };

/// The exact integer `v`.
pub fn ival(v: i64) -> Ty {
    Ty { bits: B_INT, data: Some(Data::Int(v)) }
}

/// The exact double `v`.
pub fn dval(v: f64) -> Ty {
    Ty { bits: B_DBL, data: Some(Data::Dbl(v)) }
}

/// The exact string `s`.
pub fn sval(s: impl Into<Arc<str>>) -> Ty {
    Ty { bits: B_STR, data: Some(Data::Str(s.into())) }
}

/// `true` or `false` as a singleton type.
pub fn bval(v: bool) -> Ty {
    if v { TTRUE } else { TFALSE }
}

/// An instance of exactly `cls`.
pub fn obj_exact(cls: Class) -> Ty {
    Ty { bits: B_OBJ, data: Some(Data::Obj(ClsTag::Exact, cls)) }
}

/// An instance of `cls` or any subclass.
pub fn sub_obj(cls: Class) -> Ty {
    Ty { bits: B_OBJ, data: Some(Data::Obj(ClsTag::Sub, cls)) }
}

/// The class value for exactly `cls`.
pub fn cls_exact(cls: Class) -> Ty {
    Ty { bits: B_CLS, data: Some(Data::Cls(ClsTag::Exact, cls)) }
}

/// The class value for `cls` or any subclass.
pub fn sub_cls(cls: Class) -> Ty {
    Ty { bits: B_CLS, data: Some(Data::Cls(ClsTag::Sub, cls)) }
}

fn refinement_subtype(a: &Data, b: &Data) -> bool {
    match (a, b) {
        (Data::Obj(ta, ca), Data::Obj(tb, cb)) | (Data::Cls(ta, ca), Data::Cls(tb, cb)) => {
            // No hierarchy data in the handle; only same-class relations are
            // known. Exact ⊑ Sub of the same class, anything else is not
            // provable and must answer false.
            ca == cb && (*tb == ClsTag::Sub || *ta == ClsTag::Exact)
        }
        _ => a == b,
    }
}

fn refinement_could_be(a: &Data, b: &Data) -> bool {
    match (a, b) {
        (Data::Obj(ta, ca), Data::Obj(tb, cb)) | (Data::Cls(ta, ca), Data::Cls(tb, cb)) => {
            // Distinct exact classes are disjoint; everything else may overlap.
            if ca == cb {
                return true;
            }
            !(*ta == ClsTag::Exact && *tb == ClsTag::Exact)
        }
        _ => a == b,
    }
}

impl Ty {
    /// True if every value of `self` is also a value of `other`.
    pub fn subtype_of(&self, other: &Ty) -> bool {
        if self.bits & !other.bits != 0 {
            return false;
        }
        match (&self.data, &other.data) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => refinement_subtype(a, b),
        }
    }

    /// True if `self` and `other` may share a value.
    pub fn could_be(&self, other: &Ty) -> bool {
        let common = self.bits & other.bits;
        if common == 0 {
            return false;
        }
        match (&self.data, &other.data) {
            (Some(a), Some(b)) if self.bits == other.bits => refinement_could_be(a, b),
            // Refinements on different bit sets can only conflict on the
            // refined bit itself; keep the conservative answer.
            _ => true,
        }
    }

    /// Drop the uninitialized kind, keeping any refinement.
    pub fn remove_uninit(&self) -> Ty {
        Ty { bits: self.bits & !B_UNINIT, data: self.data.clone() }
    }

    /// Drop literal-value refinements (an exact int/double/string/array
    /// narrows to its base kind). Class refinements survive.
    pub fn loosen_values(&self) -> Ty {
        match self.data {
            Some(Data::Int(_)) | Some(Data::Dbl(_)) | Some(Data::Str(_)) => {
                Ty { bits: self.bits, data: None }
            }
            _ => self.clone(),
        }
    }

    /// Drop refinements that depend on a value being a static (interned)
    /// string or array, which serialization round-trips do not preserve.
    pub fn loosen_statics(&self) -> Ty {
        match self.data {
            Some(Data::Str(_)) => Ty { bits: self.bits, data: None },
            _ => self.clone(),
        }
    }

    /// Statically known truthiness, if any.
    pub fn truthiness(&self) -> Option<bool> {
        match &self.data {
            Some(Data::Int(v)) => return Some(*v != 0),
            Some(Data::Dbl(v)) => return Some(*v != 0.0),
            Some(Data::Str(s)) => return Some(!s.is_empty() && &**s != "0"),
            _ => {}
        }
        if self.bits == 0 {
            return None;
        }
        const FALSY: Bits = B_UNINIT | B_INIT_NULL | B_FALSE;
        if self.bits & !FALSY == 0 {
            return Some(false);
        }
        // Objects are always truthy; true is true. Int/Dbl/Str/Arr without a
        // refinement include falsy values.
        const TRUTHY: Bits = B_TRUE | B_OBJ;
        if self.bits & !TRUTHY == 0 {
            return Some(true);
        }
        None
    }

    /// True if this type denotes exactly one runtime value. Doubles are
    /// excluded: a NaN literal is not identical to itself.
    pub fn is_singleton(&self) -> bool {
        match &self.data {
            Some(Data::Int(_)) | Some(Data::Str(_)) => return true,
            Some(_) => return false,
            None => {}
        }
        matches!(self.bits, B_UNINIT | B_INIT_NULL | B_TRUE | B_FALSE)
    }

    /// The literal integer this type denotes, if it is a singleton int.
    pub fn int_value(&self) -> Option<i64> {
        match self.data {
            Some(Data::Int(v)) => Some(v),
            _ => None,
        }
    }

    /// The literal string this type denotes, if it is a singleton string.
    pub fn str_value(&self) -> Option<&Arc<str>> {
        match &self.data {
            Some(Data::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// The class refinement of an object or class-value type.
    pub fn class_of(&self) -> Option<(&Class, ClsTag)> {
        match &self.data {
            Some(Data::Obj(tag, cls)) | Some(Data::Cls(tag, cls)) => Some((cls, *tag)),
            _ => None,
        }
    }
}

/// Least upper bound of two types.
pub fn union_of(a: Ty, b: Ty) -> Ty {
    if a.subtype_of(&b) {
        return b;
    }
    if b.subtype_of(&a) {
        return a;
    }
    let bits = a.bits | b.bits;
    let same_bits = a.bits == b.bits;
    let data = match (a.data, b.data) {
        (Some(Data::Obj(ta, ca)), Some(Data::Obj(tb, cb))) if ca == cb && same_bits => {
            let tag = if ta == tb { ta } else { ClsTag::Sub };
            Some(Data::Obj(tag, ca))
        }
        (Some(Data::Cls(ta, ca)), Some(Data::Cls(tb, cb))) if ca == cb && same_bits => {
            let tag = if ta == tb { ta } else { ClsTag::Sub };
            Some(Data::Cls(tag, ca))
        }
        _ => None,
    };
    Ty { bits, data }
}

impl fmt::Debug for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(Data::Int(v)) => return write!(f, "Int={v}"),
            Some(Data::Dbl(v)) => return write!(f, "Dbl={v}"),
            Some(Data::Str(s)) => return write!(f, "Str={s:?}"),
            Some(Data::Obj(tag, cls)) => return write!(f, "Obj{tag:?}({})", cls.name()),
            Some(Data::Cls(tag, cls)) => return write!(f, "Cls{tag:?}({})", cls.name()),
            None => {}
        }
        let named = [
            (B_TOP, "Top"),
            (B_GEN, "Gen"),
            (B_CELL, "Cell"),
            (B_INIT_CELL, "InitCell"),
            (B_UNINIT | B_INIT_NULL, "Null"),
            (B_FALSE | B_TRUE, "Bool"),
        ];
        for (bits, name) in named {
            if self.bits == bits {
                return f.write_str(name);
            }
        }
        if self.bits == 0 {
            return f.write_str("Bottom");
        }
        let parts = [
            (B_UNINIT, "Uninit"),
            (B_INIT_NULL, "InitNull"),
            (B_FALSE, "False"),
            (B_TRUE, "True"),
            (B_INT, "Int"),
            (B_DBL, "Dbl"),
            (B_STR, "Str"),
            (B_ARR, "Arr"),
            (B_OBJ, "Obj"),
            (B_CLS, "Cls"),
            (B_REF, "Ref"),
        ];
        let mut first = true;
        for (bit, name) in parts {
            if self.bits & bit != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
