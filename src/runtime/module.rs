use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;

use super::{errors::RubyError, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Class,
    Module,
}

/// The `const_missing` hook of a module.
///
/// Invoked when both lexical and inheritance search fail. Errors are
/// propagated to the caller unmodified.
pub trait ConstMissing: Send + Sync {
    fn const_missing(&self, module: &Arc<RubyModule>, name: &str) -> Result<Value, RubyError>;
}

impl<F> ConstMissing for F
where
    F: Fn(&Arc<RubyModule>, &str) -> Result<Value, RubyError> + Send + Sync,
{
    fn const_missing(&self, module: &Arc<RubyModule>, name: &str) -> Result<Value, RubyError> {
        self(module, name)
    }
}

#[derive(Debug, Clone)]
struct ConstantEntry {
    value: Value,
    private: bool,
}

/// A class or module: a constant table plus its place in the ancestor chain.
pub struct RubyModule {
    name: String,
    kind: ModuleKind,
    superclass: Option<Arc<RubyModule>>,
    includes: RwLock<Vec<Arc<RubyModule>>>,
    constants: RwLock<HashMap<Arc<str>, ConstantEntry>>,
    const_missing: RwLock<Option<Arc<dyn ConstMissing>>>,
}

impl RubyModule {
    pub fn new_class(name: impl Into<String>, superclass: Option<Arc<RubyModule>>) -> Arc<Self> {
        Arc::new(Self::new(name.into(), ModuleKind::Class, superclass))
    }

    pub fn new_module(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name.into(), ModuleKind::Module, None))
    }

    fn new(name: String, kind: ModuleKind, superclass: Option<Arc<RubyModule>>) -> Self {
        Self {
            name,
            kind,
            superclass,
            includes: RwLock::default(),
            constants: RwLock::default(),
            const_missing: RwLock::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_class(&self) -> bool {
        self.kind == ModuleKind::Class
    }

    pub fn superclass(&self) -> Option<&Arc<RubyModule>> {
        self.superclass.as_ref()
    }

    /// Mixes `module` in. Later includes take precedence over earlier ones.
    /// Returns false if it was already included.
    pub(crate) fn include(&self, module: Arc<RubyModule>) -> bool {
        let mut includes = self.includes.write();
        if includes.iter().any(|m| Arc::ptr_eq(m, &module)) {
            return false;
        }
        includes.push(module);
        true
    }

    /// Overrides the `const_missing` hook for this module and its descendants.
    pub fn set_const_missing(&self, hook: impl ConstMissing + 'static) {
        *self.const_missing.write() = Some(Arc::new(hook));
    }

    /// The method resolution order: self, included modules (latest first), then the
    /// superclass chain.
    pub fn ancestors(self: &Arc<Self>) -> Vec<Arc<RubyModule>> {
        let mut ancestors = Vec::new();
        self.collect_ancestors(&mut ancestors);
        ancestors
    }

    fn collect_ancestors(self: &Arc<Self>, out: &mut Vec<Arc<RubyModule>>) {
        if out.iter().any(|m| Arc::ptr_eq(m, self)) {
            return;
        }
        out.push(self.clone());
        for module in self.includes.read().iter().rev() {
            module.collect_ancestors(out);
        }
        if let Some(superclass) = &self.superclass {
            superclass.collect_ancestors(out);
        }
    }

    /// Looks only at this module's own table, private constants included.
    pub fn fetch_constant(&self, name: &str) -> Option<Value> {
        self.constants.read().get(name).map(|entry| entry.value.clone())
    }

    pub fn is_private_constant(&self, name: &str) -> bool {
        self.constants
            .read()
            .get(name)
            .is_some_and(|entry| entry.private)
    }

    /// Searches the ancestor chain, skipping private constants unless asked otherwise.
    pub fn constant_from_ancestors(self: &Arc<Self>, name: &str, include_private: bool) -> Option<Value> {
        self.ancestors().iter().find_map(|module| {
            let constants = module.constants.read();
            let entry = constants.get(name)?;
            (include_private || !entry.private).then(|| entry.value.clone())
        })
    }

    /// Inheritance search without the `const_missing` fallback.
    ///
    /// Modules (not classes) additionally consult `object`'s chain, since a
    /// module's ancestors never reach it.
    pub fn constant_no_const_missing(
        self: &Arc<Self>,
        name: &str,
        object: &Arc<RubyModule>,
        include_private: bool,
    ) -> Option<Value> {
        self.constant_from_ancestors(name, include_private)
            .or_else(|| {
                (!self.is_class())
                    .then(|| object.constant_from_ancestors(name, include_private))
                    .flatten()
            })
    }

    /// Calls the nearest `const_missing` hook, raising `NameError` when there is none.
    pub fn call_const_missing(self: &Arc<Self>, name: &str) -> Result<Value, RubyError> {
        let hook = self
            .ancestors()
            .iter()
            .find_map(|module| module.const_missing.read().clone());

        match hook {
            Some(hook) => hook.const_missing(self, name),
            None => Err(RubyError::NameError {
                module: self.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Names of the constants in this module's own table.
    pub fn constant_names(&self) -> Vec<Arc<str>> {
        self.constants.read().keys().cloned().collect()
    }

    pub(crate) fn store_constant(&self, name: Arc<str>, value: Value) {
        let mut constants = self.constants.write();
        let private = constants.get(&name).is_some_and(|entry| entry.private);
        constants.insert(name, ConstantEntry { value, private });
    }

    pub(crate) fn mark_constant_private(&self, name: &str) -> bool {
        match self.constants.write().get_mut(name) {
            Some(entry) => {
                entry.private = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn take_constant(&self, name: &str) -> Option<Value> {
        self.constants.write().remove(name).map(|entry| entry.value)
    }
}

impl fmt::Debug for RubyModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RubyModule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A lexical scope: the module a piece of code was written in, and the scope
/// enclosing it.
#[derive(Debug)]
pub struct StaticScope {
    module: Arc<RubyModule>,
    previous: Option<Arc<StaticScope>>,
}

impl StaticScope {
    /// The outermost scope, whose module is `Object`.
    pub fn top(object: Arc<RubyModule>) -> Arc<Self> {
        Arc::new(Self {
            module: object,
            previous: None,
        })
    }

    pub fn nested(previous: &Arc<StaticScope>, module: Arc<RubyModule>) -> Arc<Self> {
        Arc::new(Self {
            module,
            previous: Some(previous.clone()),
        })
    }

    pub fn module(&self) -> &Arc<RubyModule> {
        &self.module
    }

    pub fn previous(&self) -> Option<&Arc<StaticScope>> {
        self.previous.as_ref()
    }

    /// Lexical search, innermost scope first.
    ///
    /// The outermost scope is only consulted when the search starts there;
    /// top-level constants are otherwise found by inheritance search.
    pub fn constant_inner(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.module.fetch_constant(name) {
            return Some(value);
        }
        self.previous.as_ref()?.constant_inner_no_object(name)
    }

    fn constant_inner_no_object(&self, name: &str) -> Option<Value> {
        self.previous.as_ref()?;
        self.constant_inner(name)
    }
}
