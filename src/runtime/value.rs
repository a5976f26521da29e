use std::{fmt, sync::Arc};

use itertools::Itertools;

use super::module::{RubyModule, StaticScope};

/// A runtime value, cheaply clonable.
///
/// Modules and lexical scopes compare by identity, everything else structurally.
#[derive(Clone)]
pub enum Value {
    Nil,
    /// Sentinel for an optional or keyword parameter the caller did not supply.
    Undefined,
    Bool(bool),
    Fixnum(i64),
    Symbol(Arc<str>),
    String(Arc<str>),
    Array(Arc<[Value]>),
    Hash(Arc<RubyHash>),
    Module(Arc<RubyModule>),
    Scope(Arc<StaticScope>),
}

impl Value {
    pub fn symbol(name: impl Into<Arc<str>>) -> Self {
        Value::Symbol(name.into())
    }

    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Value::String(value.into())
    }

    pub fn array(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(values.into_iter().collect())
    }

    pub fn empty_array() -> Self {
        Value::Array(Arc::from([]))
    }

    pub fn hash(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Hash(Arc::new(RubyHash::from_iter(entries)))
    }

    pub fn empty_hash() -> Self {
        Value::Hash(Arc::new(RubyHash::default()))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&Arc<RubyHash>> {
        match self {
            Value::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&Arc<RubyModule>> {
        match self {
            Value::Module(module) => Some(module),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Fixnum(a), Value::Fixnum(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::Scope(a), Value::Scope(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Fixnum(value) => write!(f, "{value}"),
            Value::Symbol(name) => write!(f, ":{name}"),
            Value::String(value) => write!(f, "{value:?}"),
            Value::Array(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::Hash(hash) => write!(f, "{hash}"),
            Value::Module(module) => write!(f, "{}", module.name()),
            Value::Scope(scope) => write!(f, "#<StaticScope {}>", scope.module().name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An insertion-ordered hash, as used for keyword argument bundles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RubyHash {
    entries: Vec<(Value, Value)>,
}

impl RubyHash {
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Inserts or replaces the value for `key`, keeping the original position.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Value, Value)> for RubyHash {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        let mut hash = RubyHash::default();
        for (key, value) in iter {
            hash.insert(key, value);
        }
        hash
    }
}

impl fmt::Display for RubyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.entries
                .iter()
                .map(|(k, v)| format!("{k}=>{v}"))
                .join(", ")
        )
    }
}
