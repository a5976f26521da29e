use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{debug, instrument};

use super::{
    InlineError, InterpretError,
    clone::{CloneInfo, SimpleCloneInfo},
    flags::{IrFlag, ScopeFlags},
    inliner::{CallSite, Inliner},
    instructions::{Instr, InstrKind, Liveness, ReceiveKind},
    operands::{Operand, Variable, VariableAllocator},
};
use crate::runtime::{Frame, RubyHash, Value};

/// Parameter shape of a scope, derived from its receive instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signature {
    pub pre: usize,
    pub opt: usize,
    pub post: usize,
    pub rest: bool,
    pub keywords: bool,
}

impl Signature {
    pub fn required(&self) -> usize {
        self.pre + self.post
    }

    /// `None` when a rest parameter takes any surplus.
    pub fn max_positional(&self) -> Option<usize> {
        (!self.rest).then_some(self.required() + self.opt)
    }
}

/// Arguments packed for a call into a particular scope.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedArguments {
    pub args: Vec<Value>,
    pub keyword_arguments_supplied: bool,
}

/// A method or block body: an ordered instruction list plus scope-wide state.
#[derive(Debug)]
pub struct IrScope {
    name: String,
    instrs: Vec<Instr>,
    /// `None` until the analysis pass ran over the current instructions.
    flags: Option<ScopeFlags>,
    allocator: VariableAllocator,
}

impl IrScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instrs: Vec::new(),
            flags: None,
            allocator: VariableAllocator::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn allocator(&self) -> &VariableAllocator {
        &self.allocator
    }

    pub fn new_temporary(&mut self) -> Variable {
        self.allocator.new_temporary()
    }

    pub fn local(&mut self, name: &str) -> Variable {
        self.allocator.local(name)
    }

    pub fn outer_local(&self, name: &str, depth: u32, offset: u32) -> Variable {
        self.allocator.outer_local(name, depth, offset)
    }

    /// Appends an instruction, returning its index.
    pub fn add_instr(&mut self, instr: impl Into<Instr>) -> usize {
        self.instrs.push(instr.into());
        self.flags = None;
        self.instrs.len() - 1
    }

    /// The analysis pass: merges the flags of every live instruction.
    ///
    /// Recomputed from scratch, so running it again yields the same flags.
    #[instrument(level = "debug", skip_all, fields(scope = %self.name))]
    pub fn compute_scope_flags(&mut self) -> &ScopeFlags {
        let mut flags = ScopeFlags::new();
        for instr in self.instrs.iter().filter(|instr| !instr.is_dead()) {
            flags.merge(&instr.scope_flags());
        }
        debug!(%flags, "computed scope flags");
        self.flags.insert(flags)
    }

    pub fn flags(&self) -> Option<&ScopeFlags> {
        self.flags.as_ref()
    }

    pub fn receives_keyword_args(&self) -> Result<bool, InterpretError> {
        self.flags
            .as_ref()
            .map(|flags| flags.contains(IrFlag::ReceivesKeywordArgs))
            .ok_or_else(|| InterpretError::FlagsNotComputed {
                scope: self.name.clone(),
            })
    }

    /// Packs call arguments for this scope.
    ///
    /// Keywords are delivered as a trailing keyword bundle only if the scope
    /// consumes keywords; otherwise a non-empty bundle becomes a positional
    /// hash.
    pub fn prepare_arguments(
        &self,
        positional: Vec<Value>,
        keywords: Option<RubyHash>,
    ) -> Result<PreparedArguments, InterpretError> {
        let receives_keywords = self.receives_keyword_args()?;
        let mut args = positional;
        let keyword_arguments_supplied = match keywords {
            Some(hash) if receives_keywords => {
                args.push(Value::Hash(Arc::new(hash)));
                true
            }
            Some(hash) if !hash.is_empty() => {
                args.push(Value::Hash(Arc::new(hash)));
                false
            }
            _ => false,
        };
        Ok(PreparedArguments {
            args,
            keyword_arguments_supplied,
        })
    }

    pub fn signature(&self) -> Signature {
        let mut signature = Signature::default();
        for instr in self.instrs.iter().filter(|instr| !instr.is_dead()) {
            let InstrKind::ReceiveArg(receive) = instr.kind() else {
                continue;
            };
            match receive.kind() {
                ReceiveKind::PreReqd { index } => signature.pre = signature.pre.max(index + 1),
                ReceiveKind::PostReqd { post_count, .. } => signature.post = *post_count,
                ReceiveKind::Opt { .. } => signature.opt += 1,
                ReceiveKind::Rest { .. } => signature.rest = true,
                ReceiveKind::Keyword { .. } | ReceiveKind::KeywordRest { .. } => {
                    signature.keywords = true
                }
            }
        }
        signature
    }

    /// Rewrites operands of every live instruction using known values.
    pub fn simplify_operands(&mut self, value_map: &HashMap<Variable, Operand>, force: bool) {
        for instr in self.instrs.iter_mut().filter(|instr| !instr.is_dead()) {
            instr.simplify_operands(value_map, force);
        }
    }

    /// Forward copy propagation over the straight-line body.
    #[instrument(level = "debug", skip_all, fields(scope = %self.name))]
    pub fn propagate_copies(&mut self) {
        let mut value_map: HashMap<Variable, Operand> = HashMap::new();
        for instr in self.instrs.iter_mut().filter(|instr| !instr.is_dead()) {
            instr.simplify_operands(&value_map, false);
            let Some(result) = instr.result().cloned() else {
                continue;
            };
            // A reassignment invalidates what was known about the variable.
            value_map.retain(|var, value| *var != result && value.as_variable() != Some(&result));
            if let InstrKind::Copy(copy) = instr.kind() {
                if copy.source().can_copy_propagate() {
                    value_map.insert(result, copy.source().clone());
                }
            }
        }
    }

    /// Marks copies whose result is never read, and everything after the
    /// first return, dead. Everything else is marked live. Returns the number
    /// of instructions marked dead.
    #[instrument(level = "debug", skip_all, fields(scope = %self.name))]
    pub fn mark_dead_code(&mut self) -> usize {
        let returned_at = self
            .instrs
            .iter()
            .position(|instr| !instr.is_dead() && matches!(instr.kind(), InstrKind::Return(_)));

        let mut used: Vec<Variable> = Vec::new();
        let mut marked = 0;
        for (index, instr) in self.instrs.iter_mut().enumerate().rev() {
            if instr.is_dead() {
                continue;
            }
            let unreachable = returned_at.is_some_and(|at| index > at);
            let unused_copy = matches!(instr.kind(), InstrKind::Copy(_))
                && instr.result().is_some_and(|result| !used.contains(result));
            if unreachable || unused_copy {
                instr.mark_dead();
                marked += 1;
                continue;
            }
            instr.mark_live();
            for operand in instr.operands() {
                operand.variables(&mut used);
            }
        }
        if marked > 0 {
            self.flags = None;
        }
        debug!(marked, "dead code marked");
        marked
    }

    /// Marks one instruction dead. Indices stay stable until [`IrScope::compact`].
    pub fn mark_dead(&mut self, index: usize) -> bool {
        match self.instrs.get_mut(index) {
            Some(instr) => {
                instr.mark_dead();
                self.flags = None;
                true
            }
            None => false,
        }
    }

    /// Physically removes dead instructions. Returns how many were removed.
    #[instrument(level = "debug", skip_all, fields(scope = %self.name))]
    pub fn compact(&mut self) -> usize {
        let before = self.instrs.len();
        self.instrs.retain(|instr| instr.liveness() != Liveness::Dead);
        let removed = before - self.instrs.len();
        debug!(removed, "compacted");
        removed
    }

    /// Duplicates the scope with fresh variables. Flags are not carried over.
    #[instrument(level = "debug", skip_all, fields(scope = %self.name))]
    pub fn clone_scope(&self, name: impl Into<String>) -> IrScope {
        let mut allocator = VariableAllocator::new();
        let instrs = {
            let mut info = CloneInfo::from(SimpleCloneInfo::new(&mut allocator));
            self.instrs
                .iter()
                .map(|instr| instr.clone_instr(&mut info))
                .collect()
        };
        IrScope {
            name: name.into(),
            instrs,
            flags: None,
            allocator,
        }
    }

    /// Inserts the callee's body for the call `site` before index `at`.
    /// Returns the number of instructions inserted.
    pub fn inline_call(
        &mut self,
        at: usize,
        callee: &IrScope,
        site: &CallSite,
        inliner: &mut Inliner,
    ) -> Result<usize, InlineError> {
        let body = inliner.inline(&mut self.allocator, callee, site)?;
        let count = body.len();
        let at = at.min(self.instrs.len());
        self.instrs.splice(at..at, body);
        self.flags = None;
        Ok(count)
    }

    /// Runs the live instructions in order until a return.
    #[instrument(level = "debug", skip_all, fields(scope = %self.name))]
    pub fn interpret(&self, frame: &mut Frame<'_>) -> Result<Value, InterpretError> {
        for instr in self.instrs.iter().filter(|instr| !instr.is_dead()) {
            let value = instr.interpret(frame)?;
            if let InstrKind::Return(_) = instr.kind() {
                return Ok(value);
            }
            if let Some(result) = instr.result() {
                frame.assign(result, value);
            }
        }
        Err(InterpretError::MissingReturn {
            scope: self.name.clone(),
        })
    }
}

impl fmt::Display for IrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope {}", self.name)?;
        if let Some(flags) = &self.flags {
            write!(f, " {flags}")?;
        }
        writeln!(f, ":")?;
        for (index, instr) in self.instrs.iter().enumerate() {
            writeln!(f, "  {index:>3}: {instr}")?;
        }
        Ok(())
    }
}
