use std::collections::HashMap;

use rubyir::{
    config::{InlineConfig, RubyIrConfig},
    driver::demo,
    ir::{
        CallSite, CopyInstr, InterpretError, Inliner, IrFlag, IrScope, Liveness, Operand, Operation,
        ReceiveArgInstr, ReturnInstr, Signature,
    },
    runtime::{Runtime, Value},
};
use test_case::test_case;

use crate::common::{call, fixnums, keywords, run};

mod common;

/// `def m(a, k: <undefined>); x = a; [x, k]; end`
fn sample_scope() -> IrScope {
    let mut scope = IrScope::new("m");
    let a = scope.local("a");
    let k = scope.local("k");
    let x = scope.new_temporary();
    scope.add_instr(ReceiveArgInstr::pre_reqd(a.clone(), 0));
    scope.add_instr(ReceiveArgInstr::keyword(k.clone(), "k", 1));
    scope.add_instr(CopyInstr::new(x.clone(), a.into()));
    scope.add_instr(ReturnInstr::new(Operand::Array(vec![x.into(), k.into()])));
    scope
}

#[test]
fn flags_require_the_analysis_pass() {
    let mut scope = sample_scope();
    assert_eq!(
        scope.receives_keyword_args(),
        Err(InterpretError::FlagsNotComputed { scope: "m".into() })
    );
    assert!(scope.prepare_arguments(fixnums(&[1]), None).is_err());

    scope.compute_scope_flags();
    assert_eq!(scope.receives_keyword_args(), Ok(true));

    scope.add_instr(ReturnInstr::new(Operand::Nil));
    assert!(scope.flags().is_none());
}

#[test]
fn flag_computation_is_idempotent() {
    let mut scope = sample_scope();
    let first = scope.compute_scope_flags().clone();
    let second = scope.compute_scope_flags().clone();
    assert_eq!(first, second);
    assert!(first.contains(IrFlag::ReceivesKeywordArgs));
    assert!(!first.contains(IrFlag::AccessesParentScope));
    assert_eq!(first.to_string(), "[RECEIVES_KEYWORD_ARGS]");
}

#[test]
fn dead_instructions_do_not_contribute_flags() {
    let mut scope = sample_scope();
    assert!(scope.mark_dead(1));
    assert!(!scope.compute_scope_flags().contains(IrFlag::ReceivesKeywordArgs));
}

#[test_case(Some(&[("k", 2)][..]), true, 2 ; "keywords delivered as bundle")]
#[test_case(None, false, 1 ; "no keywords")]
fn prepare_arguments_for_keyword_receivers(
    kwargs: Option<&[(&str, i64)]>,
    supplied: bool,
    len: usize,
) {
    let mut scope = sample_scope();
    scope.compute_scope_flags();
    let prepared = scope.prepare_arguments(fixnums(&[1]), kwargs.map(keywords)).unwrap();
    assert_eq!(prepared.keyword_arguments_supplied, supplied);
    assert_eq!(prepared.args.len(), len);
}

#[test]
fn prepare_arguments_without_keyword_receivers() {
    let mut scope = IrScope::new("p");
    let a = scope.local("a");
    scope.add_instr(ReceiveArgInstr::pre_reqd(a.clone(), 0));
    scope.add_instr(ReturnInstr::new(a.into()));
    scope.compute_scope_flags();

    let prepared = scope
        .prepare_arguments(vec![], Some(keywords(&[("k", 2)])))
        .unwrap();
    assert!(!prepared.keyword_arguments_supplied);
    assert_eq!(prepared.args, vec![Value::hash(keywords(&[("k", 2)]).entries().to_vec())]);

    // An empty bundle is not passed at all.
    let prepared = scope
        .prepare_arguments(fixnums(&[1]), Some(keywords(&[])))
        .unwrap();
    assert_eq!(prepared.args, fixnums(&[1]));
}

#[test]
fn interpretation_binds_and_returns() {
    let runtime = Runtime::new();
    let mut scope = sample_scope();
    scope.compute_scope_flags();
    assert_eq!(
        call(&runtime, &scope, &[1], Some(&[("k", 2)][..])),
        Ok(Value::array([Value::Fixnum(1), Value::Fixnum(2)]))
    );
}

#[test]
fn falling_off_the_end_is_an_error() {
    let runtime = Runtime::new();
    let mut scope = IrScope::new("empty");
    let x = scope.new_temporary();
    scope.add_instr(CopyInstr::new(x, Operand::Nil));
    assert_eq!(
        run(&runtime, &scope),
        Err(InterpretError::MissingReturn {
            scope: "empty".into()
        })
    );
}

#[test]
fn reading_unassigned_variables_fails() {
    let runtime = Runtime::new();
    let mut scope = IrScope::new("u");
    let x = scope.new_temporary();
    scope.add_instr(ReturnInstr::new(x.into()));
    assert!(matches!(
        run(&runtime, &scope),
        Err(InterpretError::UnassignedVariable(_))
    ));
}

#[test]
fn plain_clone_is_structurally_identical() {
    let runtime = Runtime::new();
    let mut scope = sample_scope();
    scope.compute_scope_flags();
    let mut clone = scope.clone_scope("m_copy");

    let lines = |scope: &IrScope| -> Vec<String> {
        scope.instrs().iter().map(ToString::to_string).collect()
    };
    assert_eq!(lines(&scope), lines(&clone));
    for (original, copy) in scope.instrs().iter().zip(clone.instrs()) {
        assert_eq!(original.operation(), copy.operation());
        assert_eq!(original.is_fixed_arity(), copy.is_fixed_arity());
        if let Some(result) = original.result() {
            assert_ne!(Some(result), copy.result());
        }
    }
    assert_eq!(clone.name(), "m_copy");
    assert!(clone.flags().is_none());

    clone.compute_scope_flags();
    assert_eq!(clone.flags(), scope.flags());
    assert_eq!(
        call(&runtime, &clone, &[5], Some(&[("k", 6)][..])),
        call(&runtime, &scope, &[5], Some(&[("k", 6)][..]))
    );
}

#[test]
fn dead_instructions_stay_until_compaction() {
    let runtime = Runtime::new();
    let mut scope = IrScope::new("d");
    let x = scope.new_temporary();
    let y = scope.new_temporary();
    scope.add_instr(CopyInstr::new(x.clone(), Operand::Fixnum(1)));
    scope.add_instr(CopyInstr::new(y, Operand::Fixnum(2)));
    scope.add_instr(ReturnInstr::new(x.into()));

    assert!(scope.mark_dead(1));
    assert!(!scope.mark_dead(7));
    assert_eq!(scope.instrs().len(), 3);
    assert_eq!(scope.instrs()[1].liveness(), Liveness::Dead);
    assert_eq!(scope.instrs()[1].to_string(), "[DEAD]%v_1 = copy(2)");
    assert_eq!(scope.instrs()[2].operation(), Operation::Return);
    assert_eq!(run(&runtime, &scope), Ok(Value::Fixnum(1)));

    assert_eq!(scope.compact(), 1);
    assert_eq!(scope.instrs().len(), 2);
    assert_eq!(scope.compact(), 0);
    assert_eq!(run(&runtime, &scope), Ok(Value::Fixnum(1)));
}

#[test]
fn forced_simplification_replaces_composites() {
    let mut scope = IrScope::new("s");
    let x = scope.new_temporary();
    scope.add_instr(ReturnInstr::new(x.clone().into()));

    let array = Operand::Array(vec![Operand::Fixnum(1)]);
    let values = HashMap::from([(x.clone(), array.clone())]);
    scope.simplify_operands(&values, false);
    assert_eq!(scope.instrs()[0].operands(), vec![Operand::Variable(x)]);
    scope.simplify_operands(&values, true);
    assert_eq!(scope.instrs()[0].operands(), vec![array]);
}

#[test]
fn propagation_and_dead_code_shrink_inlined_bodies() {
    let runtime = Runtime::new();
    let mut callee = IrScope::new("id");
    let a = callee.local("a");
    callee.add_instr(ReceiveArgInstr::pre_reqd(a.clone(), 0));
    callee.add_instr(ReturnInstr::new(a.into()));
    callee.compute_scope_flags();

    let mut host = IrScope::new("host");
    let result = host.new_temporary();
    let at = host.add_instr(ReturnInstr::new(result.clone().into()));
    let site = CallSite::new(result, vec![Operand::Fixnum(9)], false);
    host.inline_call(at, &callee, &site, &mut Inliner::new(InlineConfig::default()))
        .unwrap();
    assert_eq!(host.instrs().len(), 3);

    host.propagate_copies();
    assert_eq!(host.instrs()[2].operands(), vec![Operand::Fixnum(9)]);
    assert_eq!(host.mark_dead_code(), 2);
    assert_eq!(host.compact(), 2);
    assert_eq!(host.to_string(), "scope host:\n    0: return(9)\n");
    assert_eq!(run(&runtime, &host), Ok(Value::Fixnum(9)));
}

#[test]
fn dead_code_marking_resets_flags() {
    let mut scope = IrScope::new("outer");
    let x = scope.new_temporary();
    let outer = scope.outer_local("y", 1, 0);
    scope.add_instr(CopyInstr::new(x, outer.into()));
    scope.add_instr(ReturnInstr::new(Operand::Nil));
    assert!(scope.compute_scope_flags().contains(IrFlag::AccessesParentScope));

    assert_eq!(scope.mark_dead_code(), 1);
    assert!(scope.flags().is_none());
    assert!(!scope.compute_scope_flags().contains(IrFlag::AccessesParentScope));

    // Nothing new to mark, so the computed flags survive.
    assert_eq!(scope.mark_dead_code(), 0);
    assert!(scope.flags().is_some());
}

#[test]
fn code_after_return_is_dead() {
    let mut scope = IrScope::new("r");
    let x = scope.new_temporary();
    scope.add_instr(ReturnInstr::new(Operand::Nil));
    scope.add_instr(CopyInstr::new(x.clone(), Operand::Nil));
    scope.add_instr(ReturnInstr::new(x.into()));

    assert_eq!(scope.mark_dead_code(), 2);
    assert_eq!(scope.instrs()[0].liveness(), Liveness::Live);
    assert!(scope.instrs()[1].is_dead());
    assert!(scope.instrs()[2].is_dead());
}

#[test]
fn signature_follows_receives() {
    let mut scope = sample_scope();
    let rest = scope.new_temporary();
    scope.add_instr(ReceiveArgInstr::rest(rest, 1, 1));
    assert_eq!(
        scope.signature(),
        Signature {
            pre: 1,
            opt: 0,
            post: 0,
            rest: true,
            keywords: true,
        }
    );
    assert_eq!(scope.signature().max_positional(), None);
}

#[test_case(false ; "static arguments")]
#[test_case(true ; "splatted arguments")]
fn demo_inlining_matches_a_direct_call(dynamic: bool) {
    let runtime = demo::demo_runtime();
    let callee = demo::build_callee();
    let mut inliner = Inliner::new(RubyIrConfig::default().inline);
    let mut caller = demo::build_caller(&callee, dynamic, &mut inliner).unwrap();

    let direct = demo::call_directly(&runtime, &callee).unwrap();
    assert_eq!(demo::run_caller(&runtime, &caller).unwrap(), direct);

    caller.propagate_copies();
    caller.mark_dead_code();
    caller.compact();
    assert_eq!(demo::run_caller(&runtime, &caller).unwrap(), direct);
    assert!(demo::run(&RubyIrConfig::default(), dynamic).is_ok());
}
