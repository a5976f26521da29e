//! Clone contexts: why an instruction is being duplicated, and how its
//! variables are renamed.

use std::collections::HashMap;

use super::operands::{Operand, Variable, VariableAllocator, VariableKind};

/// Describes the clone being produced.
///
/// Instructions pattern-match on the variant; they never look at anything
/// outside the context they are handed.
#[derive(Debug)]
pub enum CloneInfo<'a> {
    /// Duplicating a scope, e.g. to specialize it.
    Simple(SimpleCloneInfo<'a>),
    /// Splicing a callee into a caller at a call site.
    Inline(InlineCloneInfo<'a>),
}

impl<'a> CloneInfo<'a> {
    /// The variable standing in for `variable` in the clone, allocated on first use.
    pub fn renamed_variable(&mut self, variable: &Variable) -> Variable {
        match self {
            CloneInfo::Simple(info) => info.renamed_variable(variable),
            CloneInfo::Inline(info) => info.renamed_variable(variable),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, CloneInfo::Inline(_))
    }
}

impl<'a> From<SimpleCloneInfo<'a>> for CloneInfo<'a> {
    fn from(info: SimpleCloneInfo<'a>) -> Self {
        CloneInfo::Simple(info)
    }
}

impl<'a> From<InlineCloneInfo<'a>> for CloneInfo<'a> {
    fn from(info: InlineCloneInfo<'a>) -> Self {
        CloneInfo::Inline(info)
    }
}

/// Plain copy: variables are renamed into the allocator of the new scope.
#[derive(Debug)]
pub struct SimpleCloneInfo<'a> {
    allocator: &'a mut VariableAllocator,
    renames: HashMap<Variable, Variable>,
}

impl<'a> SimpleCloneInfo<'a> {
    pub fn new(allocator: &'a mut VariableAllocator) -> Self {
        Self {
            allocator,
            renames: HashMap::new(),
        }
    }

    pub fn renamed_variable(&mut self, variable: &Variable) -> Variable {
        if let Some(renamed) = self.renames.get(variable) {
            return renamed.clone();
        }
        let renamed = match variable.kind() {
            VariableKind::Temporary { .. } => self.allocator.new_temporary(),
            VariableKind::Local { name, depth: 0, .. } => self.allocator.new_local(name.clone()),
            VariableKind::Local { name, depth, offset } => {
                self.allocator.outer_local(name.clone(), *depth, *offset)
            }
        };
        self.renames.insert(variable.clone(), renamed.clone());
        renamed
    }
}

/// Inlining: callee variables become fresh variables of the host scope, and
/// the call site's actual arguments are available for parameter binding.
#[derive(Debug)]
pub struct InlineCloneInfo<'a> {
    allocator: &'a mut VariableAllocator,
    renames: HashMap<Variable, Variable>,
    prefix: String,
    args: Vec<Operand>,
    can_map_args_statically: bool,
    keyword_arguments_supplied: bool,
    call_result: Variable,
}

impl<'a> InlineCloneInfo<'a> {
    /// The inlining driver is responsible for `can_map_args_statically` being
    /// consistent with `args`.
    pub fn new(
        allocator: &'a mut VariableAllocator,
        prefix: impl Into<String>,
        args: Vec<Operand>,
        can_map_args_statically: bool,
        keyword_arguments_supplied: bool,
        call_result: Variable,
    ) -> Self {
        Self {
            allocator,
            renames: HashMap::new(),
            prefix: prefix.into(),
            args,
            can_map_args_statically,
            keyword_arguments_supplied,
            call_result,
        }
    }

    pub fn renamed_variable(&mut self, variable: &Variable) -> Variable {
        if let Some(renamed) = self.renames.get(variable) {
            return renamed.clone();
        }
        let renamed = match variable.kind() {
            VariableKind::Temporary { .. } => self.allocator.new_temporary(),
            VariableKind::Local { name, depth, offset } => {
                let name = format!("%i_{}_{}", self.prefix, name);
                if *depth == 0 {
                    self.allocator.new_local(name)
                } else {
                    self.allocator.outer_local(name, *depth, *offset)
                }
            }
        };
        self.renames.insert(variable.clone(), renamed.clone());
        renamed
    }

    pub fn can_map_args_statically(&self) -> bool {
        self.can_map_args_statically
    }

    pub fn keyword_arguments_supplied(&self) -> bool {
        self.keyword_arguments_supplied
    }

    pub fn args(&self) -> &[Operand] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Operand> {
        self.args.get(index)
    }

    /// The actual argument list as one operand, for binding at execution time.
    pub fn args_operand(&self) -> Operand {
        Operand::Array(self.args.clone())
    }

    /// Where the callee's return value goes in the host.
    pub fn call_result(&self) -> &Variable {
        &self.call_result
    }

    /// The literal keyword bundle, unless it is consumed by `required`
    /// positional parameters.
    pub fn keyword_bundle(&self, required: usize) -> Option<&[(Operand, Operand)]> {
        if !self.keyword_arguments_supplied || self.args.len() <= required {
            return None;
        }
        match self.args.last()? {
            Operand::Hash(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Number of positional actual arguments, excluding the keyword bundle.
    pub fn positional_count(&self, required: usize) -> usize {
        match self.keyword_bundle(required) {
            Some(_) => self.args.len() - 1,
            None => self.args.len(),
        }
    }
}
