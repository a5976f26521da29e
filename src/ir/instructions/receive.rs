use std::{collections::HashMap, sync::Arc};

use tracing::error;

use super::{InstrKind, Operation};
use crate::{
    ir::{
        InterpretError,
        clone::{CloneInfo, InlineCloneInfo},
        instructions::CopyInstr,
        operands::{Operand, Variable},
    },
    runtime::{Frame, Value, args},
};

/// How a parameter binds from the argument array.
///
/// `required` counts the required positional parameters, pre and post; it
/// locates the keyword bundle in a mixed argument array. For `Rest` it also
/// counts the optional parameters, which bind before the rest does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveKind {
    /// Leading required positional parameter.
    PreReqd { index: usize },
    /// Required positional parameter after optional and rest parameters,
    /// bound from the tail.
    PostReqd {
        index: usize,
        pre_count: usize,
        post_count: usize,
    },
    /// Optional positional parameter; `Undefined` when not supplied.
    Opt {
        required: usize,
        pre_count: usize,
        index: usize,
    },
    /// `*rest`, starting at positional `index`.
    Rest { required: usize, index: usize },
    /// A single `name:` keyword; `Undefined` when not supplied.
    Keyword { name: Arc<str>, required: usize },
    /// `**rest`.
    KeywordRest { required: usize },
}

impl ReceiveKind {
    pub fn receive_operation(&self) -> Operation {
        match self {
            ReceiveKind::PreReqd { .. } => Operation::RecvPreReqdArg,
            ReceiveKind::PostReqd { .. } => Operation::RecvPostReqdArg,
            ReceiveKind::Opt { .. } => Operation::RecvOptArg,
            ReceiveKind::Rest { .. } => Operation::RecvRestArg,
            ReceiveKind::Keyword { .. } => Operation::RecvKwArg,
            ReceiveKind::KeywordRest { .. } => Operation::RecvKwRestArg,
        }
    }

    pub fn multiple_asgn_operation(&self) -> Operation {
        match self {
            ReceiveKind::PreReqd { .. } | ReceiveKind::PostReqd { .. } => {
                Operation::ReqdArgMultipleAsgn
            }
            ReceiveKind::Opt { .. } => Operation::OptArgMultipleAsgn,
            ReceiveKind::Rest { .. } => Operation::RestArgMultipleAsgn,
            ReceiveKind::Keyword { .. } => Operation::KwArgMultipleAsgn,
            ReceiveKind::KeywordRest { .. } => Operation::KwRestArgMultipleAsgn,
        }
    }

    pub fn receives_keywords(&self) -> bool {
        matches!(self, ReceiveKind::Keyword { .. } | ReceiveKind::KeywordRest { .. })
    }

    fn metadata(&self) -> Vec<Operand> {
        let fixnum = |n: usize| Operand::Fixnum(n as i64);
        match self {
            ReceiveKind::PreReqd { index } => vec![fixnum(*index)],
            ReceiveKind::PostReqd {
                index,
                pre_count,
                post_count,
            } => vec![fixnum(*index), fixnum(*pre_count), fixnum(*post_count)],
            ReceiveKind::Opt {
                required,
                pre_count,
                index,
            } => vec![fixnum(*required), fixnum(*pre_count), fixnum(*index)],
            ReceiveKind::Rest { required, index } => vec![fixnum(*required), fixnum(*index)],
            ReceiveKind::Keyword { name, required } => {
                vec![Operand::Symbol(name.clone()), fixnum(*required)]
            }
            ReceiveKind::KeywordRest { required } => vec![fixnum(*required)],
        }
    }

    /// Binds from a runtime argument array. `None` if the array is too short
    /// for a variant that cannot cope with that.
    pub fn bind(&self, args: &[Value], keyword_arguments_supplied: bool) -> Option<Value> {
        let supplied = keyword_arguments_supplied;
        match self {
            ReceiveKind::PreReqd { index } => args::receive_pre_reqd_arg(args, *index),
            ReceiveKind::PostReqd {
                index,
                pre_count,
                post_count,
            } => args::receive_post_reqd_arg(args, *index, *pre_count, *post_count, supplied),
            ReceiveKind::Opt {
                required,
                pre_count,
                index,
            } => args::receive_opt_arg(args, *required, *pre_count, *index, supplied),
            ReceiveKind::Rest { required, index } => {
                args::receive_rest_arg(args, *required, *index, supplied)
            }
            ReceiveKind::Keyword { name, required } => {
                Some(args::receive_keyword_arg(args, *required, name, supplied))
            }
            ReceiveKind::KeywordRest { required } => {
                Some(args::receive_keyword_rest_arg(args, *required, supplied))
            }
        }
    }

    /// The actual-argument operand this parameter binds to, for call sites
    /// whose shape is known at compile time.
    pub fn static_operand(&self, info: &InlineCloneInfo<'_>) -> Operand {
        let arg = |position: usize| info.arg(position).cloned().unwrap_or(Operand::Nil);
        match self {
            ReceiveKind::PreReqd { index } => arg(*index),
            ReceiveKind::PostReqd {
                index,
                pre_count,
                post_count,
            } => {
                let n = info.positional_count(pre_count + post_count);
                let remaining = n.saturating_sub(*pre_count);
                if remaining <= *index {
                    Operand::Nil
                } else if remaining > *post_count {
                    arg(n - post_count + index)
                } else {
                    arg(pre_count + index)
                }
            }
            ReceiveKind::Opt {
                required,
                pre_count,
                index,
            } => {
                if required + index < info.positional_count(*required) {
                    arg(pre_count + index)
                } else {
                    Operand::Undefined
                }
            }
            ReceiveKind::Rest { required, index } => {
                let remaining = info.positional_count(*required).saturating_sub(*required);
                let rest = info
                    .args()
                    .get(*index..index + remaining)
                    .map(<[Operand]>::to_vec)
                    .unwrap_or_default();
                Operand::Array(rest)
            }
            ReceiveKind::Keyword { name, required } => info
                .keyword_bundle(*required)
                .and_then(|pairs| {
                    pairs.iter().find_map(|(key, value)| {
                        matches!(key, Operand::Symbol(key) if key == name).then(|| value.clone())
                    })
                })
                .unwrap_or(Operand::Undefined),
            ReceiveKind::KeywordRest { required } => {
                Operand::Hash(info.keyword_bundle(*required).map(<[_]>::to_vec).unwrap_or_default())
            }
        }
    }
}

fn shape_mismatch(operation: Operation, len: usize) -> InterpretError {
    error!(%operation, len, "argument array does not match the declared arity");
    InterpretError::BindingShapeMismatch { operation, len }
}

/// Binds one declared parameter of the scope from the incoming arguments.
#[derive(Debug)]
pub struct ReceiveArgInstr {
    result: Variable,
    kind: ReceiveKind,
}

impl ReceiveArgInstr {
    pub fn new(result: Variable, kind: ReceiveKind) -> Self {
        Self { result, kind }
    }

    pub fn pre_reqd(result: Variable, index: usize) -> Self {
        Self::new(result, ReceiveKind::PreReqd { index })
    }

    pub fn post_reqd(result: Variable, index: usize, pre_count: usize, post_count: usize) -> Self {
        Self::new(
            result,
            ReceiveKind::PostReqd {
                index,
                pre_count,
                post_count,
            },
        )
    }

    pub fn optional(result: Variable, required: usize, pre_count: usize, index: usize) -> Self {
        Self::new(
            result,
            ReceiveKind::Opt {
                required,
                pre_count,
                index,
            },
        )
    }

    pub fn rest(result: Variable, required: usize, index: usize) -> Self {
        Self::new(result, ReceiveKind::Rest { required, index })
    }

    pub fn keyword(result: Variable, name: impl Into<Arc<str>>, required: usize) -> Self {
        Self::new(
            result,
            ReceiveKind::Keyword {
                name: name.into(),
                required,
            },
        )
    }

    pub fn keyword_rest(result: Variable, required: usize) -> Self {
        Self::new(result, ReceiveKind::KeywordRest { required })
    }

    pub fn result(&self) -> &Variable {
        &self.result
    }

    pub fn kind(&self) -> &ReceiveKind {
        &self.kind
    }

    pub fn operation(&self) -> Operation {
        self.kind.receive_operation()
    }

    pub fn operands(&self) -> Vec<Operand> {
        self.kind.metadata()
    }

    /// Binds from the live argument array without mutating or retaining it.
    pub fn receive_arg(&self, args: &[Value], keyword_arguments_supplied: bool) -> Result<Value, InterpretError> {
        self.kind
            .bind(args, keyword_arguments_supplied)
            .ok_or_else(|| shape_mismatch(self.operation(), args.len()))
    }

    /// - plain copy: the same receive, bound to the renamed result.
    /// - inline, statically mappable: a copy from the matching actual argument.
    /// - inline, otherwise: a runtime bind from the actual argument list.
    pub fn clone_instr(&self, info: &mut CloneInfo<'_>) -> InstrKind {
        let result = info.renamed_variable(&self.result);
        match info {
            CloneInfo::Simple(_) => InstrKind::ReceiveArg(Self::new(result, self.kind.clone())),
            CloneInfo::Inline(ii) if ii.can_map_args_statically() => {
                InstrKind::Copy(CopyInstr::new(result, self.kind.static_operand(ii)))
            }
            CloneInfo::Inline(ii) => InstrKind::ArgMultipleAsgn(ArgMultipleAsgnInstr::new(
                result,
                ii.args_operand(),
                self.kind.clone(),
                ii.keyword_arguments_supplied(),
            )),
        }
    }
}

/// Binds a parameter from an explicit argument list operand at execution
/// time. Produced when inlining a call whose argument shape is only known at
/// runtime (splats, non-literal keyword bundles).
#[derive(Debug)]
pub struct ArgMultipleAsgnInstr {
    result: Variable,
    args: Operand,
    kind: ReceiveKind,
    keyword_arguments_supplied: bool,
}

impl ArgMultipleAsgnInstr {
    pub fn new(result: Variable, args: Operand, kind: ReceiveKind, keyword_arguments_supplied: bool) -> Self {
        Self {
            result,
            args,
            kind,
            keyword_arguments_supplied,
        }
    }

    pub fn result(&self) -> &Variable {
        &self.result
    }

    pub fn args(&self) -> &Operand {
        &self.args
    }

    pub fn kind(&self) -> &ReceiveKind {
        &self.kind
    }

    pub fn keyword_arguments_supplied(&self) -> bool {
        self.keyword_arguments_supplied
    }

    pub fn operation(&self) -> Operation {
        self.kind.multiple_asgn_operation()
    }

    pub fn operands(&self) -> Vec<Operand> {
        let mut operands = vec![self.args.clone()];
        operands.extend(self.kind.metadata());
        operands
    }

    pub(super) fn simplify_operands(&mut self, value_map: &HashMap<Variable, Operand>, force: bool) {
        self.args = self.args.simplified(value_map, force);
    }

    pub(super) fn clone_instr(&self, info: &mut CloneInfo<'_>) -> Self {
        Self::new(
            info.renamed_variable(&self.result),
            self.args.clone_for_inlining(info),
            self.kind.clone(),
            self.keyword_arguments_supplied,
        )
    }

    pub fn interpret(&self, frame: &Frame<'_>) -> Result<Value, InterpretError> {
        let args = match self.args.retrieve(frame)? {
            Value::Array(values) => values,
            other => Arc::from([other]),
        };
        self.kind
            .bind(&args, self.keyword_arguments_supplied)
            .ok_or_else(|| shape_mismatch(self.operation(), args.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{Instr, SimpleCloneInfo, VariableAllocator},
        runtime::Runtime,
    };

    fn fixnums(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Fixnum(*v)).collect()
    }

    #[test]
    fn keyword_kinds_are_flagged() {
        let mut allocator = VariableAllocator::new();
        let kw = ReceiveArgInstr::keyword(allocator.new_temporary(), "k", 0);
        let pre = ReceiveArgInstr::pre_reqd(allocator.new_temporary(), 0);
        assert!(kw.kind().receives_keywords());
        assert!(!pre.kind().receives_keywords());
        assert!(Operation::RecvKwArg.is_arg_receive());
        assert!(!Operation::KwArgMultipleAsgn.is_arg_receive());
    }

    #[test]
    fn short_argument_array_is_a_shape_mismatch() {
        let mut allocator = VariableAllocator::new();
        let instr = ReceiveArgInstr::pre_reqd(allocator.new_temporary(), 2);
        assert_eq!(
            instr.receive_arg(&fixnums(&[1]), false),
            Err(InterpretError::BindingShapeMismatch {
                operation: Operation::RecvPreReqdArg,
                len: 1
            })
        );
    }

    #[test]
    fn receive_does_not_mutate_arguments() {
        let mut allocator = VariableAllocator::new();
        let instr = ReceiveArgInstr::rest(allocator.new_temporary(), 0, 0);
        let args = fixnums(&[1, 2]);
        let before = args.clone();
        instr.receive_arg(&args, false).unwrap();
        assert_eq!(args, before);
    }

    #[test]
    fn multiple_asgn_binds_from_a_single_value() {
        let runtime = Runtime::new();
        let frame = Frame::new(&runtime, Value::Nil, None);
        let mut allocator = VariableAllocator::new();
        let instr = ArgMultipleAsgnInstr::new(
            allocator.new_temporary(),
            Operand::Fixnum(4),
            ReceiveKind::PreReqd { index: 0 },
            false,
        );
        assert_eq!(instr.interpret(&frame), Ok(Value::Fixnum(4)));
        assert_eq!(instr.operation(), Operation::ReqdArgMultipleAsgn);
    }

    #[test]
    fn multiple_asgn_clone_renames_argument_operands() {
        let mut allocator = VariableAllocator::new();
        let arg = allocator.new_temporary();
        let instr = Instr::from(ArgMultipleAsgnInstr::new(
            allocator.new_temporary(),
            Operand::Array(vec![Operand::splat(arg.clone().into())]),
            ReceiveKind::Rest {
                required: 0,
                index: 0,
            },
            false,
        ));

        let mut target = VariableAllocator::new();
        let mut info = CloneInfo::from(SimpleCloneInfo::new(&mut target));
        let clone = instr.clone_instr(&mut info);

        assert_eq!(clone.operation(), Operation::RestArgMultipleAsgn);
        let mut variables = Vec::new();
        clone.operands()[0].variables(&mut variables);
        assert_eq!(variables.len(), 1);
        assert_ne!(variables[0], arg);
    }
}
