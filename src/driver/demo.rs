//! A sample method inlined into a caller, run both ways.
//!
//! ```ruby
//! Greeting = "hello"
//!
//! def describe(a, b = :none, *rest, k: 0, **opts)
//!   [a, b, rest, k, opts, Greeting]
//! end
//!
//! describe(10, 20, 30, k: 40, extra: 50)    # static argument mapping
//! list = [10, 20, 30]
//! describe(*list, k: 40, extra: 50)         # dynamic argument mapping
//! ```

use anyhow::ensure;
use owo_colors::OwoColorize;
use tracing::info;

use crate::{
    config::RubyIrConfig,
    ir::{
        CallSite, CopyInstr, InlineError, Inliner, IrScope, Operand, ReceiveArgInstr, ReturnInstr,
        SearchConstInstr,
    },
    runtime::{Frame, RubyHash, Runtime, Value},
};

pub fn demo_runtime() -> Runtime {
    let runtime = Runtime::new();
    runtime.define_constant(runtime.object(), "Greeting", Value::string("hello"));
    runtime
}

pub fn build_callee() -> IrScope {
    let mut callee = IrScope::new("describe");
    let a = callee.local("a");
    let b = callee.local("b");
    let rest = callee.local("rest");
    let k = callee.local("k");
    let opts = callee.local("opts");
    let greeting = callee.new_temporary();

    callee.add_instr(ReceiveArgInstr::pre_reqd(a.clone(), 0));
    callee.add_instr(ReceiveArgInstr::optional(b.clone(), 1, 1, 0));
    callee.add_instr(ReceiveArgInstr::rest(rest.clone(), 2, 2));
    callee.add_instr(ReceiveArgInstr::keyword(k.clone(), "k", 1));
    callee.add_instr(ReceiveArgInstr::keyword_rest(opts.clone(), 1));
    callee.add_instr(SearchConstInstr::new(
        greeting.clone(),
        "Greeting",
        Operand::CurrentScope,
        false,
    ));
    callee.add_instr(ReturnInstr::new(Operand::Array(vec![
        a.into(),
        b.into(),
        rest.into(),
        k.into(),
        opts.into(),
        greeting.into(),
    ])));
    callee.compute_scope_flags();
    callee
}

fn keywords() -> Operand {
    Operand::Hash(vec![
        (Operand::symbol("k"), Operand::Fixnum(40)),
        (Operand::symbol("extra"), Operand::Fixnum(50)),
    ])
}

/// A caller whose only call is inlined `describe`. With `dynamic` the
/// positional arguments are splatted from a local array.
pub fn build_caller(
    callee: &IrScope,
    dynamic: bool,
    inliner: &mut Inliner,
) -> Result<IrScope, InlineError> {
    let mut caller = IrScope::new("main");
    let result = caller.new_temporary();
    let positional: Vec<Operand> = (10..=30).step_by(10).map(Operand::Fixnum).collect();

    let mut args = if dynamic {
        let list = caller.local("list");
        caller.add_instr(CopyInstr::new(list.clone(), Operand::Array(positional)));
        vec![Operand::splat(list.into())]
    } else {
        positional
    };
    args.push(keywords());

    let at = caller.add_instr(ReturnInstr::new(result.clone().into()));
    caller.inline_call(at, callee, &CallSite::new(result, args, true), inliner)?;
    caller.compute_scope_flags();
    Ok(caller)
}

/// Calls `describe` through the call protocol, without inlining.
pub fn call_directly(runtime: &Runtime, callee: &IrScope) -> anyhow::Result<Value> {
    let keywords: RubyHash = [
        (Value::symbol("k"), Value::Fixnum(40)),
        (Value::symbol("extra"), Value::Fixnum(50)),
    ]
    .into_iter()
    .collect();
    let prepared = callee.prepare_arguments(
        vec![Value::Fixnum(10), Value::Fixnum(20), Value::Fixnum(30)],
        Some(keywords),
    )?;

    let mut frame = Frame::new(runtime, Value::Nil, Some(runtime.top_scope()))
        .with_arguments(&prepared.args, prepared.keyword_arguments_supplied);
    Ok(callee.interpret(&mut frame)?)
}

pub fn run_caller(runtime: &Runtime, caller: &IrScope) -> anyhow::Result<Value> {
    let mut frame = Frame::new(runtime, Value::Nil, Some(runtime.top_scope()));
    Ok(caller.interpret(&mut frame)?)
}

fn print_scope(title: &str, scope: &IrScope) {
    println!("{}", title.bold());
    for line in scope.to_string().lines() {
        if line.contains("[DEAD]") {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}

pub fn run(config: &RubyIrConfig, dynamic: bool) -> anyhow::Result<()> {
    let runtime = demo_runtime();
    let callee = build_callee();
    print_scope("callee", &callee);

    let mut inliner = Inliner::new(config.inline.clone());
    let mut caller = build_caller(&callee, dynamic, &mut inliner)?;
    print_scope("caller after inlining", &caller);

    caller.propagate_copies();
    let marked = caller.mark_dead_code();
    print_scope("caller after dead code marking", &caller);
    let removed = caller.compact();
    info!(marked, removed, "caller optimized");
    print_scope("caller after compaction", &caller);

    let direct = call_directly(&runtime, &callee)?;
    let inlined = run_caller(&runtime, &caller)?;
    println!("{} {}", "direct: ".green(), direct);
    println!("{} {}", "inlined:".green(), inlined);
    ensure!(direct == inlined, "inlined call returned {inlined}, expected {direct}");
    Ok(())
}
