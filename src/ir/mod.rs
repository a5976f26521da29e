//! The intermediate representation Ruby methods and blocks are compiled to.
//!
//! A scope ([`IrScope`]) is an ordered list of instructions ([`Instr`]) over
//! operands ([`Operand`]) and variables ([`Variable`]). Instructions are
//! interpreted directly, analyzed into per-scope flags ([`ScopeFlags`]),
//! simplified, marked dead and compacted, and cloned either to copy a scope
//! or to inline it into a caller ([`CloneInfo`]).

pub use self::{
    clone::{CloneInfo, InlineCloneInfo, SimpleCloneInfo},
    errors::{InlineError, InterpretError},
    flags::{IrFlag, ScopeFlags},
    inliner::{CallSite, Inliner},
    instructions::{
        ArgMultipleAsgnInstr, CopyInstr, Instr, InstrKind, Liveness, Operation, ReceiveArgInstr,
        ReceiveKind, ReturnInstr, SearchConstInstr,
    },
    operands::{Operand, Variable, VariableAllocator, VariableId, VariableKind},
    scope::{IrScope, PreparedArguments, Signature},
};

mod clone;
mod errors;
mod flags;
mod inliner;
mod instructions;
mod operands;
mod scope;
