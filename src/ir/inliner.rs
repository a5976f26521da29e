//! Splices a callee's body into a caller at a call site.

use tracing::{debug, instrument};

use super::{
    InlineError,
    clone::{CloneInfo, InlineCloneInfo},
    flags::IrFlag,
    instructions::{Instr, InstrKind},
    operands::{Operand, Variable, VariableAllocator},
    scope::{IrScope, Signature},
};
use crate::config::InlineConfig;

/// A call being replaced by the callee's body.
#[derive(Debug, Clone)]
pub struct CallSite {
    result: Variable,
    args: Vec<Operand>,
    keyword_arguments_supplied: bool,
}

impl CallSite {
    pub fn new(result: Variable, args: Vec<Operand>, keyword_arguments_supplied: bool) -> Self {
        Self {
            result,
            args,
            keyword_arguments_supplied,
        }
    }

    pub fn result(&self) -> &Variable {
        &self.result
    }

    pub fn args(&self) -> &[Operand] {
        &self.args
    }

    pub fn keyword_arguments_supplied(&self) -> bool {
        self.keyword_arguments_supplied
    }
}

#[derive(Debug)]
pub struct Inliner {
    config: InlineConfig,
    /// Number of bodies inlined so far, used to keep renamed locals apart.
    inlined: usize,
}

impl Inliner {
    pub fn new(config: InlineConfig) -> Self {
        Self { config, inlined: 0 }
    }

    pub fn config(&self) -> &InlineConfig {
        &self.config
    }

    /// Clones the live instructions of `callee` for `site`, allocating their
    /// variables in `host`. The trailing return becomes a copy into the call
    /// site's result.
    #[instrument(level = "debug", skip_all, fields(callee = callee.name()))]
    pub fn inline(
        &mut self,
        host: &mut VariableAllocator,
        callee: &IrScope,
        site: &CallSite,
    ) -> Result<Vec<Instr>, InlineError> {
        if !self.config.enabled {
            return Err(InlineError::Disabled);
        }
        let name = callee.name().to_string();
        let flags = callee
            .flags()
            .ok_or_else(|| InlineError::CalleeNotAnalyzed {
                callee: name.clone(),
            })?;
        if flags.contains(IrFlag::AccessesParentScope) {
            return Err(InlineError::OuterScopeVariable { callee: name });
        }

        let body: Vec<&Instr> = callee.instrs().iter().filter(|instr| !instr.is_dead()).collect();
        if body.len() > self.config.max_callee_instructions {
            return Err(InlineError::CalleeTooLarge {
                callee: name,
                size: body.len(),
                limit: self.config.max_callee_instructions,
            });
        }
        let returns = body
            .iter()
            .filter(|instr| matches!(instr.kind(), InstrKind::Return(_)))
            .count();
        let ends_in_return = body
            .last()
            .is_some_and(|instr| matches!(instr.kind(), InstrKind::Return(_)));
        if returns != 1 || !ends_in_return {
            return Err(InlineError::UnsupportedReturn { callee: name });
        }

        // A keyword bundle passed to a callee without keyword parameters is
        // just a trailing positional hash, unless it is literally empty.
        let receives_keywords = flags.contains(IrFlag::ReceivesKeywordArgs);
        let keyword_arguments_supplied = site.keyword_arguments_supplied && receives_keywords;
        let mut args = site.args.clone();
        if site.keyword_arguments_supplied
            && !receives_keywords
            && matches!(args.last(), Some(Operand::Hash(pairs)) if pairs.is_empty())
        {
            args.pop();
        }
        let signature = callee.signature();
        let can_map_args_statically =
            self.can_map_args_statically(&name, &signature, &args, keyword_arguments_supplied)?;

        let prefix = format!("{}{}", self.config.variable_prefix, self.inlined);
        self.inlined += 1;
        debug!(%prefix, can_map_args_statically, "inlining");

        let mut info = CloneInfo::from(InlineCloneInfo::new(
            host,
            prefix,
            args,
            can_map_args_statically,
            keyword_arguments_supplied,
            site.result.clone(),
        ));
        Ok(body.iter().map(|instr| instr.clone_instr(&mut info)).collect())
    }

    /// Parameters can be bound to the call site's operands directly when no
    /// argument is splatted and any keyword bundle is a literal hash with
    /// symbol keys. The call's arity is checked in that case.
    fn can_map_args_statically(
        &self,
        callee: &str,
        signature: &Signature,
        args: &[Operand],
        keyword_arguments_supplied: bool,
    ) -> Result<bool, InlineError> {
        if !self.config.static_arg_mapping || args.iter().any(Operand::contains_splat) {
            return Ok(false);
        }

        let mut found = args.len();
        if keyword_arguments_supplied && found > signature.required() {
            match args.last() {
                Some(Operand::Hash(pairs))
                    if pairs.iter().all(|(key, _)| matches!(key, Operand::Symbol(_))) =>
                {
                    found -= 1
                }
                _ => return Ok(false),
            }
        }

        if found < signature.required() {
            return Err(InlineError::TooFewArguments {
                callee: callee.to_string(),
                found,
                required: signature.required(),
            });
        }
        if let Some(max) = signature.max_positional() {
            if found > max {
                return Err(InlineError::TooManyArguments {
                    callee: callee.to_string(),
                    found,
                    max,
                });
            }
        }
        Ok(true)
    }
}
