//! Typeflux library surface.
//!
//! Per-instruction abstract interpretation core for a dynamically typed,
//! stack-based bytecode VM. The crate models the effect of one instruction
//! on an abstract machine state; a fixed-point driver built on top of it
//! owns block scheduling, state merging, and widening.

pub mod error;
pub mod index;
pub mod interp;
pub mod lattice;
pub mod options;

pub use error::{AnalysisError, Result};
pub use index::{Context, Func, FuncInfo, Index, MapIndex, PrepKind};
pub use interp::opcodes::Bytecode;
pub use interp::state::{CollectedInfo, State, StepFlags};
pub use interp::{step, Interp};
pub use lattice::Ty;
pub use options::Options;
