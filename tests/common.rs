use std::sync::Arc;

use rubyir::{
    config::InlineConfig,
    ir::{CallSite, CopyInstr, InterpretError, Inliner, IrScope, Operand, ReturnInstr, SearchConstInstr},
    runtime::{Frame, RubyHash, Runtime, StaticScope, Value},
};

#[allow(unused)]
pub fn fixnums(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Fixnum(*v)).collect()
}

#[allow(unused)]
pub fn fixnum_operands(values: &[i64]) -> Vec<Operand> {
    values.iter().map(|v| Operand::Fixnum(*v)).collect()
}

#[allow(unused)]
pub fn keywords(pairs: &[(&str, i64)]) -> RubyHash {
    pairs
        .iter()
        .map(|(name, value)| (Value::symbol(*name), Value::Fixnum(*value)))
        .collect()
}

#[allow(unused)]
pub fn keyword_operand(pairs: &[(&str, i64)]) -> Operand {
    Operand::Hash(
        pairs
            .iter()
            .map(|(name, value)| (Operand::symbol(*name), Operand::Fixnum(*value)))
            .collect(),
    )
}

/// Calls `scope` through the call protocol, without inlining.
#[allow(unused)]
pub fn call(
    runtime: &Runtime,
    scope: &IrScope,
    positional: &[i64],
    kwargs: Option<&[(&str, i64)]>,
) -> Result<Value, InterpretError> {
    let prepared = scope.prepare_arguments(fixnums(positional), kwargs.map(keywords))?;
    let mut frame = Frame::new(runtime, Value::Nil, Some(runtime.top_scope()))
        .with_arguments(&prepared.args, prepared.keyword_arguments_supplied);
    scope.interpret(&mut frame)
}

/// Inlines `callee` into an empty host returning the call's result.
///
/// With `splat` the positional arguments reach the callee through a splatted
/// local, so they can only be bound at run time.
#[allow(unused)]
pub fn inline_into_host(
    callee: &IrScope,
    positional: &[i64],
    kwargs: Option<&[(&str, i64)]>,
    splat: bool,
) -> IrScope {
    let mut host = IrScope::new("host");
    let result = host.new_temporary();
    let mut args = if splat {
        let list = host.local("list");
        host.add_instr(CopyInstr::new(
            list.clone(),
            Operand::Array(fixnum_operands(positional)),
        ));
        vec![Operand::splat(list.into())]
    } else {
        fixnum_operands(positional)
    };
    if let Some(pairs) = kwargs {
        args.push(keyword_operand(pairs));
    }

    let at = host.add_instr(ReturnInstr::new(result.clone().into()));
    let site = CallSite::new(result, args, kwargs.is_some());
    host.inline_call(at, callee, &site, &mut Inliner::new(InlineConfig::default()))
        .unwrap();
    host.compute_scope_flags();
    host
}

#[allow(unused)]
pub fn run(runtime: &Runtime, scope: &IrScope) -> Result<Value, InterpretError> {
    let mut frame = Frame::new(runtime, Value::Nil, Some(runtime.top_scope()));
    scope.interpret(&mut frame)
}

/// `return ::name` searched from `CurrentScope`.
#[allow(unused)]
pub fn search_const_scope(name: &str, no_private_consts: bool) -> IrScope {
    let mut scope = IrScope::new(format!("search_{name}"));
    let result = scope.new_temporary();
    scope.add_instr(SearchConstInstr::new(
        result.clone(),
        name,
        Operand::CurrentScope,
        no_private_consts,
    ));
    scope.add_instr(ReturnInstr::new(result.into()));
    scope.compute_scope_flags();
    scope
}

#[allow(unused)]
pub fn run_in(
    runtime: &Runtime,
    scope: &IrScope,
    static_scope: Option<Arc<StaticScope>>,
) -> Result<Value, InterpretError> {
    let mut frame = Frame::new(runtime, Value::Nil, static_scope);
    scope.interpret(&mut frame)
}
