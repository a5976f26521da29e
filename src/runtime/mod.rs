//! The runtime environment the IR executes against.
//!
//! Only the parts the instruction core reads from are modelled: values,
//! modules with constant tables, lexical scopes, the constant invalidator
//! registry and call frames.

use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;

use parking_lot::RwLock;
use tracing::debug;

pub use self::{
    cache::{CacheSlot, ConstantCache, Invalidator},
    errors::RubyError,
    frame::{DynamicScope, Frame},
    module::{ConstMissing, ModuleKind, RubyModule, StaticScope},
    value::{RubyHash, Value},
};

pub mod args;
mod cache;
mod errors;
mod frame;
mod module;
mod value;

/// Process-wide state shared by every frame.
#[derive(Debug)]
pub struct Runtime {
    object: Arc<RubyModule>,
    invalidators: RwLock<HashMap<Arc<str>, Arc<Invalidator>>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            object: RubyModule::new_class("Object", None),
            invalidators: RwLock::default(),
        }
    }

    pub fn object(&self) -> &Arc<RubyModule> {
        &self.object
    }

    pub fn top_scope(&self) -> Arc<StaticScope> {
        StaticScope::top(self.object.clone())
    }

    /// The invalidator guarding every constant named `name`.
    pub fn constant_invalidator(&self, name: &str) -> Arc<Invalidator> {
        if let Some(invalidator) = self.invalidators.read().get(name) {
            return invalidator.clone();
        }
        self.invalidators
            .write()
            .entry(Arc::from(name))
            .or_insert_with(|| Arc::new(Invalidator::new(name)))
            .clone()
    }

    /// Assigns a constant, invalidating every cached resolution of `name`.
    pub fn define_constant(&self, module: &Arc<RubyModule>, name: &str, value: Value) {
        debug!(module = module.name(), name, "defining constant");
        module.store_constant(Arc::from(name), value);
        self.constant_invalidator(name).invalidate();
    }

    pub fn remove_constant(&self, module: &Arc<RubyModule>, name: &str) -> Option<Value> {
        let removed = module.take_constant(name);
        if removed.is_some() {
            self.constant_invalidator(name).invalidate();
        }
        removed
    }

    /// Marks an existing constant private. Returns false if `module` has no such constant.
    pub fn private_constant(&self, module: &Arc<RubyModule>, name: &str) -> bool {
        let marked = module.mark_constant_private(name);
        if marked {
            self.constant_invalidator(name).invalidate();
        }
        marked
    }

    /// Mixes `module` into `target`.
    ///
    /// Any constant reachable through `module` may now shadow a binding
    /// cached for `target` or its descendants, so each of those names is
    /// invalidated.
    pub fn include_module(&self, target: &Arc<RubyModule>, module: Arc<RubyModule>) {
        let names = module
            .ancestors()
            .iter()
            .flat_map(|ancestor| ancestor.constant_names())
            .unique()
            .collect_vec();
        if !target.include(module.clone()) {
            return;
        }
        debug!(target = target.name(), module = module.name(), "including module");
        for name in names {
            self.constant_invalidator(&name).invalidate();
        }
    }

    /// Creates a class and assigns it to a constant of `under`.
    pub fn define_class(
        &self,
        under: &Arc<RubyModule>,
        name: &str,
        superclass: Option<Arc<RubyModule>>,
    ) -> Arc<RubyModule> {
        let superclass = superclass.or_else(|| Some(self.object.clone()));
        let class = RubyModule::new_class(name, superclass);
        self.define_constant(under, name, Value::Module(class.clone()));
        class
    }

    /// Creates a module and assigns it to a constant of `under`.
    pub fn define_module(&self, under: &Arc<RubyModule>, name: &str) -> Arc<RubyModule> {
        let module = RubyModule::new_module(name);
        self.define_constant(under, name, Value::Module(module.clone()));
        module
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidators_are_shared_per_name() {
        let runtime = Runtime::new();
        let a = runtime.constant_invalidator("Foo");
        let b = runtime.constant_invalidator("Foo");
        let c = runtime.constant_invalidator("Bar");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn constant_changes_bump_the_generation() {
        let runtime = Runtime::new();
        let object = runtime.object().clone();
        let invalidator = runtime.constant_invalidator("Foo");
        let start = invalidator.generation();

        runtime.define_constant(&object, "Foo", Value::Fixnum(1));
        assert_eq!(invalidator.generation(), start + 1);

        assert!(runtime.private_constant(&object, "Foo"));
        assert_eq!(invalidator.generation(), start + 2);

        assert_eq!(runtime.remove_constant(&object, "Foo"), Some(Value::Fixnum(1)));
        assert_eq!(invalidator.generation(), start + 3);

        // Nothing changed, nothing to invalidate.
        assert_eq!(runtime.remove_constant(&object, "Foo"), None);
        assert!(!runtime.private_constant(&object, "Foo"));
        assert_eq!(invalidator.generation(), start + 3);
    }

    #[test]
    fn including_a_module_invalidates_its_constants() {
        let runtime = Runtime::new();
        let object = runtime.object().clone();
        let foo = runtime.define_class(&object, "Foo", None);
        let inner = runtime.define_module(&object, "Inner");
        let outer = runtime.define_module(&object, "Outer");
        runtime.define_constant(&inner, "Deep", Value::Fixnum(1));
        runtime.define_constant(&outer, "Shallow", Value::Fixnum(2));
        runtime.include_module(&outer, inner);

        let deep = runtime.constant_invalidator("Deep");
        let shallow = runtime.constant_invalidator("Shallow");
        let unrelated = runtime.constant_invalidator("Unrelated");
        let (d, s, u) = (deep.generation(), shallow.generation(), unrelated.generation());

        runtime.include_module(&foo, outer.clone());
        assert_eq!(deep.generation(), d + 1);
        assert_eq!(shallow.generation(), s + 1);
        assert_eq!(unrelated.generation(), u);

        // Including twice changes nothing.
        runtime.include_module(&foo, outer);
        assert_eq!(shallow.generation(), s + 1);
    }

    #[test]
    fn define_class_defaults_to_object_superclass() {
        let runtime = Runtime::new();
        let object = runtime.object().clone();
        let foo = runtime.define_class(&object, "Foo", None);

        assert!(foo.superclass().is_some_and(|s| Arc::ptr_eq(s, &object)));
        assert_eq!(object.fetch_constant("Foo"), Some(Value::Module(foo)));
    }
}
