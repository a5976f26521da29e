use std::{collections::BTreeSet, fmt};

use itertools::Itertools;

/// A scope-wide fact contributed by one of its instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IrFlag {
    /// Some parameter binds from the keyword bundle; call sites must deliver
    /// a trailing hash as keywords rather than as a positional argument.
    ReceivesKeywordArgs,
    /// Reads or writes locals of an enclosing scope.
    AccessesParentScope,
}

impl fmt::Display for IrFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrFlag::ReceivesKeywordArgs => write!(f, "RECEIVES_KEYWORD_ARGS"),
            IrFlag::AccessesParentScope => write!(f, "ACCESSES_PARENT_SCOPE"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFlags(BTreeSet<IrFlag>);

impl ScopeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: IrFlag) {
        self.0.insert(flag);
    }

    pub fn contains(&self, flag: IrFlag) -> bool {
        self.0.contains(&flag)
    }

    /// Set union. Merging the same flags twice is a no-op.
    pub fn merge(&mut self, other: &ScopeFlags) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = IrFlag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<IrFlag> for ScopeFlags {
    fn from_iter<T: IntoIterator<Item = IrFlag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ScopeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}
