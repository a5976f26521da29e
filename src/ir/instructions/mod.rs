//! IR instructions.
//!
//! An instruction has an immutable [`Operation`] tag, operand slots that
//! simplification may rewrite in place, and at most one result variable.
//! Instructions are never cloned with `Clone`: duplication always goes
//! through [`Instr::clone_instr`] and a [`CloneInfo`].

use std::{collections::HashMap, fmt};

use itertools::Itertools;

pub use self::{
    receive::{ArgMultipleAsgnInstr, ReceiveArgInstr, ReceiveKind},
    search_const::SearchConstInstr,
};
use super::{
    InterpretError,
    clone::CloneInfo,
    flags::{IrFlag, ScopeFlags},
    operands::{Operand, Variable},
};
use crate::runtime::{Frame, Value};

mod receive;
mod search_const;

/// The closed set of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RecvPreReqdArg,
    RecvPostReqdArg,
    RecvOptArg,
    RecvRestArg,
    RecvKwArg,
    RecvKwRestArg,
    ReqdArgMultipleAsgn,
    OptArgMultipleAsgn,
    RestArgMultipleAsgn,
    KwArgMultipleAsgn,
    KwRestArgMultipleAsgn,
    Copy,
    Return,
    SearchConst,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::RecvPreReqdArg => "recv_pre_reqd_arg",
            Operation::RecvPostReqdArg => "recv_post_reqd_arg",
            Operation::RecvOptArg => "recv_opt_arg",
            Operation::RecvRestArg => "recv_rest_arg",
            Operation::RecvKwArg => "recv_kw_arg",
            Operation::RecvKwRestArg => "recv_kw_rest_arg",
            Operation::ReqdArgMultipleAsgn => "reqd_arg_multiple_asgn",
            Operation::OptArgMultipleAsgn => "opt_arg_multiple_asgn",
            Operation::RestArgMultipleAsgn => "rest_arg_multiple_asgn",
            Operation::KwArgMultipleAsgn => "kw_arg_multiple_asgn",
            Operation::KwRestArgMultipleAsgn => "kw_rest_arg_multiple_asgn",
            Operation::Copy => "copy",
            Operation::Return => "return",
            Operation::SearchConst => "search_const",
        }
    }

    /// Binds a parameter from the incoming argument array.
    pub fn is_arg_receive(self) -> bool {
        matches!(
            self,
            Operation::RecvPreReqdArg
                | Operation::RecvPostReqdArg
                | Operation::RecvOptArg
                | Operation::RecvRestArg
                | Operation::RecvKwArg
                | Operation::RecvKwRestArg
        )
    }

    /// Whether the operand count is fixed by the operation. Every operation
    /// in the set takes a fixed number of operands; an operation with a
    /// variable operand list (such as a call) would return false here.
    pub fn is_fixed_arity(self) -> bool {
        match self {
            Operation::RecvPreReqdArg
            | Operation::RecvPostReqdArg
            | Operation::RecvOptArg
            | Operation::RecvRestArg
            | Operation::RecvKwArg
            | Operation::RecvKwRestArg
            | Operation::ReqdArgMultipleAsgn
            | Operation::OptArgMultipleAsgn
            | Operation::RestArgMultipleAsgn
            | Operation::KwArgMultipleAsgn
            | Operation::KwRestArgMultipleAsgn
            | Operation::Copy
            | Operation::Return
            | Operation::SearchConst => true,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Liveness as established by dead code analysis.
///
/// Dead instructions stay in place until a compaction pass removes them, so
/// instruction indices remain stable in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Liveness {
    #[default]
    Unknown,
    Live,
    Dead,
}

#[derive(Debug)]
pub enum InstrKind {
    ReceiveArg(ReceiveArgInstr),
    ArgMultipleAsgn(ArgMultipleAsgnInstr),
    Copy(CopyInstr),
    Return(ReturnInstr),
    SearchConst(SearchConstInstr),
}

#[derive(Debug)]
pub struct Instr {
    kind: InstrKind,
    liveness: Liveness,
}

impl Instr {
    pub fn new(kind: InstrKind) -> Self {
        Self {
            kind,
            liveness: Liveness::Unknown,
        }
    }

    pub fn kind(&self) -> &InstrKind {
        &self.kind
    }

    pub fn operation(&self) -> Operation {
        match &self.kind {
            InstrKind::ReceiveArg(instr) => instr.operation(),
            InstrKind::ArgMultipleAsgn(instr) => instr.operation(),
            InstrKind::Copy(_) => Operation::Copy,
            InstrKind::Return(_) => Operation::Return,
            InstrKind::SearchConst(_) => Operation::SearchConst,
        }
    }

    pub fn result(&self) -> Option<&Variable> {
        match &self.kind {
            InstrKind::ReceiveArg(instr) => Some(instr.result()),
            InstrKind::ArgMultipleAsgn(instr) => Some(instr.result()),
            InstrKind::Copy(instr) => Some(&instr.result),
            InstrKind::Return(_) => None,
            InstrKind::SearchConst(instr) => Some(instr.result()),
        }
    }

    pub fn operands(&self) -> Vec<Operand> {
        match &self.kind {
            InstrKind::ReceiveArg(instr) => instr.operands(),
            InstrKind::ArgMultipleAsgn(instr) => instr.operands(),
            InstrKind::Copy(instr) => vec![instr.source.clone()],
            InstrKind::Return(instr) => vec![instr.value.clone()],
            InstrKind::SearchConst(instr) => instr.operands(),
        }
    }

    /// See [`Operation::is_fixed_arity`].
    pub fn is_fixed_arity(&self) -> bool {
        self.operation().is_fixed_arity()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_dead(&self) -> bool {
        self.liveness == Liveness::Dead
    }

    pub fn mark_dead(&mut self) {
        self.liveness = Liveness::Dead;
    }

    pub fn mark_live(&mut self) {
        self.liveness = Liveness::Live;
    }

    /// Constant propagation: replace operands by values known for them.
    pub fn simplify_operands(&mut self, value_map: &HashMap<Variable, Operand>, force: bool) {
        match &mut self.kind {
            InstrKind::ReceiveArg(_) => {}
            InstrKind::ArgMultipleAsgn(instr) => instr.simplify_operands(value_map, force),
            InstrKind::Copy(instr) => instr.source = instr.source.simplified(value_map, force),
            InstrKind::Return(instr) => instr.value = instr.value.simplified(value_map, force),
            InstrKind::SearchConst(instr) => instr.simplify_operands(value_map, force),
        }
    }

    /// The flags this instruction contributes to its scope. Pure.
    pub fn scope_flags(&self) -> ScopeFlags {
        let mut flags = ScopeFlags::new();
        if let InstrKind::ReceiveArg(instr) = &self.kind {
            if instr.kind().receives_keywords() {
                flags.insert(IrFlag::ReceivesKeywordArgs);
            }
        }

        let mut variables: Vec<Variable> = self.result().into_iter().cloned().collect();
        for operand in self.operands() {
            operand.variables(&mut variables);
        }
        if variables.iter().any(Variable::is_outer_local) {
            flags.insert(IrFlag::AccessesParentScope);
        }
        flags
    }

    /// Produces the instruction standing in for this one in a clone.
    ///
    /// The clone starts with unknown liveness.
    pub fn clone_instr(&self, info: &mut CloneInfo<'_>) -> Instr {
        let kind = match &self.kind {
            InstrKind::ReceiveArg(instr) => instr.clone_instr(info),
            InstrKind::ArgMultipleAsgn(instr) => InstrKind::ArgMultipleAsgn(instr.clone_instr(info)),
            InstrKind::Copy(instr) => InstrKind::Copy(CopyInstr::new(
                info.renamed_variable(&instr.result),
                instr.source.clone_for_inlining(info),
            )),
            InstrKind::Return(instr) => {
                let value = instr.value.clone_for_inlining(info);
                match info {
                    CloneInfo::Simple(_) => InstrKind::Return(ReturnInstr::new(value)),
                    CloneInfo::Inline(ii) => {
                        InstrKind::Copy(CopyInstr::new(ii.call_result().clone(), value))
                    }
                }
            }
            InstrKind::SearchConst(instr) => InstrKind::SearchConst(instr.clone_instr(info)),
        };
        Instr::new(kind)
    }

    /// Executes the instruction. For `return` this is the returned value.
    pub fn interpret(&self, frame: &Frame<'_>) -> Result<Value, InterpretError> {
        match &self.kind {
            InstrKind::ReceiveArg(instr) => {
                instr.receive_arg(frame.args(), frame.keyword_arguments_supplied())
            }
            InstrKind::ArgMultipleAsgn(instr) => instr.interpret(frame),
            InstrKind::Copy(instr) => instr.source.retrieve(frame),
            InstrKind::Return(instr) => instr.value.retrieve(frame),
            InstrKind::SearchConst(instr) => instr.interpret(frame),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dead() {
            write!(f, "[DEAD]")?;
        }
        if let Some(result) = self.result() {
            write!(f, "{result} = ")?;
        }
        write!(f, "{}({})", self.operation(), self.operands().iter().join(", "))
    }
}

macro_rules! impl_into_instr {
    ($($instr:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$instr> for Instr {
                fn from(instr: $instr) -> Self {
                    Instr::new(InstrKind::$variant(instr))
                }
            }
        )*
    };
}

impl_into_instr! {
    ReceiveArgInstr => ReceiveArg,
    ArgMultipleAsgnInstr => ArgMultipleAsgn,
    CopyInstr => Copy,
    ReturnInstr => Return,
    SearchConstInstr => SearchConst,
}

/// `result = source`
#[derive(Debug)]
pub struct CopyInstr {
    result: Variable,
    source: Operand,
}

impl CopyInstr {
    pub fn new(result: Variable, source: Operand) -> Self {
        Self { result, source }
    }

    pub fn result(&self) -> &Variable {
        &self.result
    }

    pub fn source(&self) -> &Operand {
        &self.source
    }
}

#[derive(Debug)]
pub struct ReturnInstr {
    value: Operand,
}

impl ReturnInstr {
    pub fn new(value: Operand) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Operand {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{SimpleCloneInfo, VariableAllocator};

    #[test]
    fn display_marks_dead_instructions() {
        let mut allocator = VariableAllocator::new();
        let result = allocator.new_temporary();
        let mut instr = Instr::from(ReceiveArgInstr::keyword_rest(result, 2));
        assert_eq!(instr.to_string(), "%v_0 = recv_kw_rest_arg(2)");

        instr.mark_dead();
        assert_eq!(instr.to_string(), "[DEAD]%v_0 = recv_kw_rest_arg(2)");
    }

    #[test]
    fn copy_simplification_rewrites_the_source() {
        let mut allocator = VariableAllocator::new();
        let a = allocator.new_temporary();
        let b = allocator.new_temporary();
        let mut instr = Instr::from(CopyInstr::new(b.clone(), a.clone().into()));

        instr.simplify_operands(&HashMap::from([(a, Operand::Fixnum(3))]), false);
        assert_eq!(instr.operands(), vec![Operand::Fixnum(3)]);
        assert_eq!(instr.result(), Some(&b));
    }

    #[test]
    fn plain_clone_renames_results_and_keeps_arity() {
        let mut allocator = VariableAllocator::new();
        let a = allocator.new_temporary();
        let b = allocator.new_temporary();
        let instr = Instr::from(CopyInstr::new(b.clone(), a.clone().into()));

        let mut target = VariableAllocator::new();
        let mut info = CloneInfo::from(SimpleCloneInfo::new(&mut target));
        let clone = instr.clone_instr(&mut info);

        assert_eq!(clone.operation(), Operation::Copy);
        assert!(clone.is_fixed_arity());
        assert_eq!(clone.is_fixed_arity(), instr.is_fixed_arity());
        assert_ne!(clone.result(), Some(&b));
        assert_ne!(clone.operands(), vec![Operand::Variable(a)]);
    }

    #[test]
    fn outer_locals_flag_the_scope() {
        let allocator = VariableAllocator::new();
        let outer = allocator.outer_local("x", 1, 0);
        let instr = Instr::from(ReturnInstr::new(outer.into()));
        assert!(instr.scope_flags().contains(IrFlag::AccessesParentScope));
    }
}
