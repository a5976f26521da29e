use std::sync::Arc;

use crate::ir::{InterpretError, Variable, VariableKind};

use super::{Runtime, StaticScope, Value};

/// Local variable storage of a scope and the scopes it is nested in.
///
/// Depth 0 is the innermost scope.
#[derive(Debug, Clone, Default)]
pub struct DynamicScope {
    levels: Vec<Vec<Option<Value>>>,
}

impl DynamicScope {
    pub fn new() -> Self {
        Self {
            levels: vec![Vec::new()],
        }
    }

    /// A new innermost level on top of `parent`.
    pub fn nested(parent: DynamicScope) -> Self {
        let mut levels = Vec::with_capacity(parent.levels.len() + 1);
        levels.push(Vec::new());
        levels.extend(parent.levels);
        Self { levels }
    }

    pub fn get(&self, depth: u32, offset: u32) -> Option<&Value> {
        self.levels
            .get(depth as usize)?
            .get(offset as usize)?
            .as_ref()
    }

    pub fn set(&mut self, depth: u32, offset: u32, value: Value) {
        let depth = depth as usize;
        if self.levels.len() <= depth {
            self.levels.resize_with(depth + 1, Vec::new);
        }
        store(&mut self.levels[depth], offset, value);
    }
}

fn store(slots: &mut Vec<Option<Value>>, offset: u32, value: Value) {
    let offset = offset as usize;
    if slots.len() <= offset {
        slots.resize(offset + 1, None);
    }
    slots[offset] = Some(value);
}

/// Per-invocation state: everything an instruction may read while executing.
///
/// The argument array is borrowed from the caller for the duration of the call.
#[derive(Debug)]
pub struct Frame<'a> {
    runtime: &'a Runtime,
    self_value: Value,
    static_scope: Option<Arc<StaticScope>>,
    dynamic_scope: DynamicScope,
    temps: Vec<Option<Value>>,
    args: &'a [Value],
    keyword_arguments_supplied: bool,
}

impl<'a> Frame<'a> {
    pub fn new(runtime: &'a Runtime, self_value: Value, static_scope: Option<Arc<StaticScope>>) -> Self {
        Self {
            runtime,
            self_value,
            static_scope,
            dynamic_scope: DynamicScope::new(),
            temps: Vec::new(),
            args: &[],
            keyword_arguments_supplied: false,
        }
    }

    pub fn with_arguments(mut self, args: &'a [Value], keyword_arguments_supplied: bool) -> Self {
        self.args = args;
        self.keyword_arguments_supplied = keyword_arguments_supplied;
        self
    }

    pub fn with_dynamic_scope(mut self, dynamic_scope: DynamicScope) -> Self {
        self.dynamic_scope = dynamic_scope;
        self
    }

    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    pub fn self_value(&self) -> &Value {
        &self.self_value
    }

    pub fn static_scope(&self) -> Option<&Arc<StaticScope>> {
        self.static_scope.as_ref()
    }

    pub fn dynamic_scope(&self) -> &DynamicScope {
        &self.dynamic_scope
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    pub fn keyword_arguments_supplied(&self) -> bool {
        self.keyword_arguments_supplied
    }

    pub fn value_of(&self, variable: &Variable) -> Result<Value, InterpretError> {
        let value = match variable.kind() {
            VariableKind::Temporary { offset } => self
                .temps
                .get(*offset as usize)
                .and_then(|slot| slot.as_ref()),
            VariableKind::Local { depth, offset, .. } => self.dynamic_scope.get(*depth, *offset),
        };
        value
            .cloned()
            .ok_or_else(|| InterpretError::UnassignedVariable(variable.to_string()))
    }

    pub fn assign(&mut self, variable: &Variable, value: Value) {
        match variable.kind() {
            VariableKind::Temporary { offset } => store(&mut self.temps, *offset, value),
            VariableKind::Local { depth, offset, .. } => self.dynamic_scope.set(*depth, *offset, value),
        }
    }
}
