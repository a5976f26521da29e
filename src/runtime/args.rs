//! Argument destructuring shared by the receive instructions and by their
//! runtime-binding counterparts produced when inlining.
//!
//! All helpers only read from `args` and copy out what they bind.

use std::sync::Arc;

use super::value::{RubyHash, Value};

/// The trailing keyword bundle, if one was supplied and is not consumed by
/// required positional parameters.
pub fn extract_kwargs_hash(args: &[Value], required: usize, supplied: bool) -> Option<&Arc<RubyHash>> {
    if !supplied || args.len() <= required {
        return None;
    }
    args.last()?.as_hash()
}

/// Number of positional arguments, excluding a trailing keyword bundle.
pub fn positional_len(args: &[Value], required: usize, supplied: bool) -> usize {
    match extract_kwargs_hash(args, required, supplied) {
        Some(_) => args.len() - 1,
        None => args.len(),
    }
}

/// `None` when `args` is too short, which the arity check should have prevented.
pub fn receive_pre_reqd_arg(args: &[Value], index: usize) -> Option<Value> {
    args.get(index).cloned()
}

pub fn receive_post_reqd_arg(
    args: &[Value],
    index: usize,
    pre_count: usize,
    post_count: usize,
    supplied: bool,
) -> Option<Value> {
    let n = positional_len(args, pre_count + post_count, supplied);
    let remaining = n.saturating_sub(pre_count);
    if remaining <= index {
        return Some(Value::Nil);
    }

    let position = if remaining > post_count {
        n - post_count + index
    } else {
        pre_count + index
    };
    args[..n].get(position).cloned()
}

pub fn receive_opt_arg(
    args: &[Value],
    required: usize,
    pre_count: usize,
    index: usize,
    supplied: bool,
) -> Option<Value> {
    let n = positional_len(args, required, supplied);
    if required + index < n {
        args.get(pre_count + index).cloned()
    } else {
        Some(Value::Undefined)
    }
}

pub fn receive_rest_arg(args: &[Value], required: usize, index: usize, supplied: bool) -> Option<Value> {
    let n = positional_len(args, required, supplied);
    let remaining = n.saturating_sub(required);
    if remaining == 0 {
        return Some(Value::empty_array());
    }
    args[..n]
        .get(index..index + remaining)
        .map(|rest| Value::array(rest.iter().cloned()))
}

pub fn receive_keyword_arg(args: &[Value], required: usize, name: &str, supplied: bool) -> Value {
    extract_kwargs_hash(args, required, supplied)
        .and_then(|hash| hash.get(&Value::symbol(name)).cloned())
        .unwrap_or(Value::Undefined)
}

pub fn receive_keyword_rest_arg(args: &[Value], required: usize, supplied: bool) -> Value {
    match extract_kwargs_hash(args, required, supplied) {
        Some(hash) => Value::Hash(Arc::new(RubyHash::clone(hash))),
        None => Value::empty_hash(),
    }
}
