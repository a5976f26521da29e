use std::{collections::HashMap, sync::Arc};

use tracing::{debug, instrument, trace};

use crate::{
    ir::{
        InterpretError,
        clone::CloneInfo,
        operands::{Operand, Variable},
    },
    runtime::{CacheSlot, ConstantCache, Frame, StaticScope, Value},
};

/// Resolves a constant by name:
/// - lexical scopes first,
/// - then the inheritance chain of the innermost lexical module,
/// - then `const_missing`.
///
/// Successful lookups are cached until the name's invalidator moves on.
/// `const_missing` results are never cached.
#[derive(Debug)]
pub struct SearchConstInstr {
    result: Variable,
    const_name: Arc<str>,
    starting_scope: Operand,
    no_private_consts: bool,
    cache: CacheSlot,
}

impl SearchConstInstr {
    pub fn new(
        result: Variable,
        const_name: impl Into<Arc<str>>,
        starting_scope: Operand,
        no_private_consts: bool,
    ) -> Self {
        Self {
            result,
            const_name: const_name.into(),
            starting_scope,
            no_private_consts,
            cache: CacheSlot::default(),
        }
    }

    pub fn result(&self) -> &Variable {
        &self.result
    }

    pub fn const_name(&self) -> &str {
        &self.const_name
    }

    pub fn starting_scope(&self) -> &Operand {
        &self.starting_scope
    }

    pub fn is_no_private_consts(&self) -> bool {
        self.no_private_consts
    }

    pub fn operands(&self) -> Vec<Operand> {
        vec![
            Operand::StringLiteral(self.const_name.clone()),
            self.starting_scope.clone(),
            Operand::UnboxedBoolean(self.no_private_consts),
        ]
    }

    /// The current cache entry, valid or not.
    pub fn constant_cache(&self) -> Option<Arc<ConstantCache>> {
        self.cache.load()
    }

    pub fn cached_constant(&self) -> Option<Value> {
        self.cache.load().map(|cache| cache.value())
    }

    pub(super) fn simplify_operands(&mut self, value_map: &HashMap<Variable, Operand>, force: bool) {
        self.starting_scope = self.starting_scope.simplified(value_map, force);
    }

    /// The clone starts with an empty cache: it may run in another lexical context.
    pub(super) fn clone_instr(&self, info: &mut CloneInfo<'_>) -> Self {
        Self::new(
            info.renamed_variable(&self.result),
            self.const_name.clone(),
            self.starting_scope.clone_for_inlining(info),
            self.no_private_consts,
        )
    }

    pub fn interpret(&self, frame: &Frame<'_>) -> Result<Value, InterpretError> {
        if let Some(value) = self.cache.valid_value() {
            trace!(name = %self.const_name, "constant cache hit");
            return Ok(value);
        }
        self.resolve(frame)
    }

    #[instrument(level = "debug", skip_all, fields(name = %self.const_name))]
    fn resolve(&self, frame: &Frame<'_>) -> Result<Value, InterpretError> {
        let runtime = frame.runtime();
        let object = runtime.object();

        // Stamped before searching, so a concurrent redefinition leaves the entry stale.
        let invalidator = runtime.constant_invalidator(&self.const_name);
        let generation = invalidator.generation();

        let static_scope = self.lexical_scope(frame)?;
        let lexical = match &static_scope {
            Some(scope) => scope.constant_inner(&self.const_name),
            None => object.constant_from_ancestors(&self.const_name, true),
        };

        let publish = |value: &Value| {
            self.cache.publish(ConstantCache::new(
                value.clone(),
                generation,
                invalidator.clone(),
            ));
        };

        if let Some(value) = lexical {
            publish(&value);
            return Ok(value);
        }

        let module = static_scope.as_ref().map_or(object, |scope| scope.module());
        debug!(module = module.name(), "lexical search failed, searching ancestors");
        match module.constant_no_const_missing(&self.const_name, object, !self.no_private_consts) {
            Some(value) => {
                publish(&value);
                Ok(value)
            }
            None => {
                debug!(module = module.name(), "calling const_missing");
                Ok(module.call_const_missing(&self.const_name)?)
            }
        }
    }

    fn lexical_scope(&self, frame: &Frame<'_>) -> Result<Option<Arc<StaticScope>>, InterpretError> {
        match self.starting_scope.retrieve(frame)? {
            Value::Scope(scope) => Ok(Some(scope)),
            Value::Nil => Ok(None),
            _ => Err(InterpretError::NotALexicalScope {
                operand: self.starting_scope.to_string(),
            }),
        }
    }
}
