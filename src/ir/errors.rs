use thiserror::Error;

use super::Operation;
use crate::runtime::RubyError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InterpretError {
    #[error(transparent)]
    Ruby(#[from] RubyError),
    /// The argument array does not have the shape the IR generator promised.
    #[error("{operation} cannot bind from {len} arguments")]
    BindingShapeMismatch { operation: Operation, len: usize },
    #[error("variable {0} read before assignment")]
    UnassignedVariable(String),
    #[error("{operand} did not evaluate to a lexical scope")]
    NotALexicalScope { operand: String },
    #[error("scope {scope:?} was not analyzed yet")]
    FlagsNotComputed { scope: String },
    #[error("scope {scope:?} ended without a return")]
    MissingReturn { scope: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InlineError {
    #[error("inlining is disabled")]
    Disabled,
    #[error("callee {callee:?} was not analyzed yet")]
    CalleeNotAnalyzed { callee: String },
    #[error("callee {callee:?} has {size} instructions, the limit is {limit}")]
    CalleeTooLarge {
        callee: String,
        size: usize,
        limit: usize,
    },
    #[error("callee {callee:?} must end in its only return")]
    UnsupportedReturn { callee: String },
    #[error("callee {callee:?} accesses locals of an enclosing scope")]
    OuterScopeVariable { callee: String },
    #[error("call passes {found} arguments, {callee:?} requires at least {required}")]
    TooFewArguments {
        callee: String,
        found: usize,
        required: usize,
    },
    #[error("call passes {found} arguments, {callee:?} accepts at most {max}")]
    TooManyArguments {
        callee: String,
        found: usize,
        max: usize,
    },
}
