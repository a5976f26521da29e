use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use educe::Educe;
use itertools::Itertools;

use super::{InterpretError, clone::CloneInfo};
use crate::runtime::{Frame, Value};

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(u64);

impl VariableId {
    fn fresh() -> Self {
        VariableId(NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    /// A compiler-introduced slot in the frame's temporary array.
    Temporary { offset: u32 },
    /// A named local in the dynamic scope, `depth` levels out.
    Local { name: Arc<str>, depth: u32, offset: u32 },
}

/// A storage slot owned by one scope.
///
/// Two variables are the same only if they are the same allocation: a clone
/// of a scope never shares variables with the original.
#[derive(Debug, Clone, Educe)]
#[educe(PartialEq, Eq, Hash)]
pub struct Variable {
    id: VariableId,
    #[educe(PartialEq(ignore), Hash(ignore))]
    kind: VariableKind,
}

impl Variable {
    fn new(kind: VariableKind) -> Self {
        Self {
            id: VariableId::fresh(),
            kind,
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    /// Whether this is a local of an enclosing scope.
    pub fn is_outer_local(&self) -> bool {
        matches!(self.kind, VariableKind::Local { depth, .. } if depth > 0)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            VariableKind::Temporary { offset } => write!(f, "%v_{offset}"),
            VariableKind::Local { name, depth: 0, .. } => write!(f, "{name}"),
            VariableKind::Local { name, depth, .. } => write!(f, "{name}(^{depth})"),
        }
    }
}

/// Hands out the variables of one scope.
#[derive(Debug, Clone, Default)]
pub struct VariableAllocator {
    temporaries: u32,
    locals: Vec<Variable>,
}

impl VariableAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_temporary(&mut self) -> Variable {
        let offset = self.temporaries;
        self.temporaries += 1;
        Variable::new(VariableKind::Temporary { offset })
    }

    /// A fresh local of this scope, even if one with the same name exists.
    pub fn new_local(&mut self, name: impl Into<Arc<str>>) -> Variable {
        let offset = self.local_count();
        let local = Variable::new(VariableKind::Local {
            name: name.into(),
            depth: 0,
            offset,
        });
        self.locals.push(local.clone());
        local
    }

    /// The local named `name`, created on first use.
    pub fn local(&mut self, name: &str) -> Variable {
        let existing = self.locals.iter().find(|local| {
            matches!(&local.kind, VariableKind::Local { name: n, .. } if &**n == name)
        });
        match existing {
            Some(local) => local.clone(),
            None => self.new_local(name),
        }
    }

    /// A local of an enclosing scope. Its slot belongs to that scope.
    pub fn outer_local(&self, name: impl Into<Arc<str>>, depth: u32, offset: u32) -> Variable {
        Variable::new(VariableKind::Local {
            name: name.into(),
            depth,
            offset,
        })
    }

    pub fn temporary_count(&self) -> u32 {
        self.temporaries
    }

    pub fn local_count(&self) -> u32 {
        self.locals.len() as u32
    }
}

/// An instruction input: a literal, a variable, or a composite of operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Nil,
    Undefined,
    Boolean(bool),
    UnboxedBoolean(bool),
    Fixnum(i64),
    Symbol(Arc<str>),
    StringLiteral(Arc<str>),
    Array(Vec<Operand>),
    Hash(Vec<(Operand, Operand)>),
    /// Flattened into the enclosing array when retrieved.
    Splat(Box<Operand>),
    Variable(Variable),
    SelfValue,
    /// The lexical scope of the executing frame, or nil at the top.
    CurrentScope,
}

impl Operand {
    pub fn symbol(name: impl Into<Arc<str>>) -> Self {
        Operand::Symbol(name.into())
    }

    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Operand::StringLiteral(value.into())
    }

    pub fn splat(operand: Operand) -> Self {
        Operand::Splat(Box::new(operand))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Operand::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    /// Whether a use of a variable may be replaced by this operand.
    pub fn can_copy_propagate(&self) -> bool {
        match self {
            Operand::Nil
            | Operand::Undefined
            | Operand::Boolean(_)
            | Operand::UnboxedBoolean(_)
            | Operand::Fixnum(_)
            | Operand::Symbol(_)
            | Operand::Variable(_)
            | Operand::SelfValue => true,
            // Composites and strings allocate a new object per evaluation.
            Operand::StringLiteral(_)
            | Operand::Array(_)
            | Operand::Hash(_)
            | Operand::Splat(_)
            | Operand::CurrentScope => false,
        }
    }

    pub fn contains_splat(&self) -> bool {
        match self {
            Operand::Splat(_) => true,
            Operand::Array(elements) => elements.iter().any(Operand::contains_splat),
            Operand::Hash(pairs) => pairs
                .iter()
                .any(|(k, v)| k.contains_splat() || v.contains_splat()),
            _ => false,
        }
    }

    /// Every variable referenced by this operand.
    pub fn variables(&self, out: &mut Vec<Variable>) {
        match self {
            Operand::Variable(variable) => out.push(variable.clone()),
            Operand::Array(elements) => elements.iter().for_each(|e| e.variables(out)),
            Operand::Hash(pairs) => pairs.iter().for_each(|(k, v)| {
                k.variables(out);
                v.variables(out);
            }),
            Operand::Splat(inner) => inner.variables(out),
            _ => {}
        }
    }

    /// Replaces variables with values known to be held in them.
    ///
    /// A mapped value is only substituted when it can be copy-propagated,
    /// unless `force` is set.
    pub fn simplified(&self, value_map: &HashMap<Variable, Operand>, force: bool) -> Operand {
        match self {
            Operand::Variable(variable) => match value_map.get(variable) {
                Some(value) if force || value.can_copy_propagate() => value.clone(),
                _ => self.clone(),
            },
            Operand::Array(elements) => Operand::Array(
                elements
                    .iter()
                    .map(|e| e.simplified(value_map, force))
                    .collect(),
            ),
            Operand::Hash(pairs) => Operand::Hash(
                pairs
                    .iter()
                    .map(|(k, v)| (k.simplified(value_map, force), v.simplified(value_map, force)))
                    .collect(),
            ),
            Operand::Splat(inner) => Operand::splat(inner.simplified(value_map, force)),
            _ => self.clone(),
        }
    }

    /// Rewrites variable references through the clone context's renaming.
    pub fn clone_for_inlining(&self, info: &mut CloneInfo<'_>) -> Operand {
        match self {
            Operand::Variable(variable) => Operand::Variable(info.renamed_variable(variable)),
            Operand::Array(elements) => Operand::Array(
                elements
                    .iter()
                    .map(|e| e.clone_for_inlining(info))
                    .collect(),
            ),
            Operand::Hash(pairs) => Operand::Hash(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone_for_inlining(info), v.clone_for_inlining(info)))
                    .collect(),
            ),
            Operand::Splat(inner) => Operand::splat(inner.clone_for_inlining(info)),
            _ => self.clone(),
        }
    }

    /// Evaluates this operand against a frame.
    pub fn retrieve(&self, frame: &Frame<'_>) -> Result<Value, InterpretError> {
        Ok(match self {
            Operand::Nil => Value::Nil,
            Operand::Undefined => Value::Undefined,
            Operand::Boolean(value) | Operand::UnboxedBoolean(value) => Value::Bool(*value),
            Operand::Fixnum(value) => Value::Fixnum(*value),
            Operand::Symbol(name) => Value::Symbol(name.clone()),
            Operand::StringLiteral(value) => Value::String(value.clone()),
            Operand::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        Operand::Splat(inner) => match inner.retrieve(frame)? {
                            Value::Array(splatted) => values.extend(splatted.iter().cloned()),
                            Value::Nil => {}
                            other => values.push(other),
                        },
                        _ => values.push(element.retrieve(frame)?),
                    }
                }
                Value::array(values)
            }
            Operand::Hash(pairs) => {
                let mut entries = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    entries.push((key.retrieve(frame)?, value.retrieve(frame)?));
                }
                Value::hash(entries)
            }
            Operand::Splat(inner) => match inner.retrieve(frame)? {
                array @ Value::Array(_) => array,
                Value::Nil => Value::empty_array(),
                other => Value::array([other]),
            },
            Operand::Variable(variable) => frame.value_of(variable)?,
            Operand::SelfValue => frame.self_value().clone(),
            Operand::CurrentScope => match frame.static_scope() {
                Some(scope) => Value::Scope(scope.clone()),
                None => Value::Nil,
            },
        })
    }
}

impl From<Variable> for Operand {
    fn from(variable: Variable) -> Self {
        Operand::Variable(variable)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Nil => write!(f, "nil"),
            Operand::Undefined => write!(f, "%undefined"),
            Operand::Boolean(value) => write!(f, "{value}"),
            Operand::UnboxedBoolean(value) => write!(f, "{value}"),
            Operand::Fixnum(value) => write!(f, "{value}"),
            Operand::Symbol(name) => write!(f, ":{name}"),
            Operand::StringLiteral(value) => write!(f, "{value:?}"),
            Operand::Array(elements) => write!(f, "[{}]", elements.iter().join(", ")),
            Operand::Hash(pairs) => write!(
                f,
                "{{{}}}",
                pairs.iter().map(|(k, v)| format!("{k}=>{v}")).join(", ")
            ),
            Operand::Splat(inner) => write!(f, "*{inner}"),
            Operand::Variable(variable) => write!(f, "{variable}"),
            Operand::SelfValue => write!(f, "%self"),
            Operand::CurrentScope => write!(f, "%current_scope"),
        }
    }
}
