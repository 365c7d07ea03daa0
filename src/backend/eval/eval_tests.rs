use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::Ordering;

use super::*;
use crate::backend::config::EvalConfig;
use crate::backend::environment::Context;
use crate::backend::models::{Kind, Value};
use crate::backend::natives::NativeRegistry;
use crate::interpreter::{HostError, Interpreter};
use crate::scanner::scan;

fn eval(src: &str) -> Result<Value, HostError> {
    Interpreter::new().unwrap().eval_text(src)
}

fn eval_ok(src: &str) -> Value {
    eval(src).unwrap_or_else(|e| panic!("`{}` failed: {}", src, e))
}

fn eval_err(src: &str) -> ErrorKind {
    match eval(src) {
        Err(HostError::Eval(err)) => err.kind,
        other => panic!("`{}` should fail, got {:?}", src, other),
    }
}

fn ints(values: &[i64]) -> Value {
    Value::block(values.iter().map(|n| Value::Integer(*n)).collect())
}

// ============================================================================
// Steps and literals
// ============================================================================

#[test]
fn test_literal_step_is_not_stale() {
    let lib = Context::new();
    NativeRegistry::default().install(&lib).unwrap();
    let mut ctx = EvalContext::default();
    let feed = FeedHandle::over(Rc::from(scan("10 \"x\"").unwrap()), lib);

    ctx.with_frame(&feed, None, None, |ctx, frame| {
        assert_eq!(eval_step(ctx, frame)?, Completion::Done);
        assert!(!frame.out.is_stale());
        assert_eq!(frame.out.get(), Some(&Value::Integer(10)));

        assert_eq!(eval_step(ctx, frame)?, Completion::Done);
        assert_eq!(frame.out.get(), Some(&Value::text("x")));
        assert!(frame.feed.is_end());
        Ok(())
    })
    .unwrap();
    assert_eq!(ctx.depth(), 0);
}

#[test]
fn test_enfix_step_consumes_operator() {
    let lib = Context::new();
    NativeRegistry::default().install(&lib).unwrap();
    let mut ctx = EvalContext::default();
    let feed = FeedHandle::over(Rc::from(scan("1 + 2 10").unwrap()), lib);

    ctx.with_frame(&feed, None, None, |ctx, frame| {
        assert_eq!(eval_step(ctx, frame)?, Completion::Done);
        assert_eq!(frame.out.get(), Some(&Value::Integer(3)));
        assert_eq!(frame.feed.lookback(), Some(Value::Integer(2)));
        assert_eq!(frame.feed.peek(), Some(Value::Integer(10)));
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_invisible_step_leaves_previous_value() {
    assert_eq!(eval_ok("1 comment \"note\""), Value::Integer(1));
    assert_eq!(eval_ok("1 elide 2"), Value::Integer(1));
    assert_eq!(eval_ok("1 (comment \"x\")"), Value::Integer(1));
    assert_eq!(eval_ok(""), Value::Void);
}

#[test]
fn test_enfix_left_to_right() {
    assert_eq!(eval_ok("1 + 2 * 3"), Value::Integer(9));
    assert_eq!(eval_ok("10 - 4 - 3"), Value::Integer(3));
    assert_eq!(eval_ok("add 1 2 * 3"), Value::Integer(7));
    assert_eq!(eval_ok("1 + (2 * 3)"), Value::Integer(7));
}

#[test]
fn test_invisible_step_keeps_enfix_order() {
    assert_eq!(eval_ok("1 + comment \"x\" 2 * 3"), Value::Integer(9));
    assert_eq!(eval_ok("add 1 comment \"x\" 2 * 3"), Value::Integer(7));
}

#[test]
fn test_barrier_ends_arguments() {
    assert_eq!(eval_ok("1, 2"), Value::Integer(2));
    assert!(matches!(
        eval_err("add 1, 2"),
        ErrorKind::NoArg { ref param, .. } if param == "value2"
    ));
}

#[test]
fn test_missing_left_operand() {
    assert!(matches!(eval_err("+ 1"), ErrorKind::MissingLeft(_)));
}

// ============================================================================
// Words
// ============================================================================

#[test]
fn test_unbound_and_void_words() {
    assert_eq!(
        eval_err("nowhere"),
        ErrorKind::UnboundName("nowhere".to_string())
    );
    assert!(matches!(
        eval_err("f: func [<local> x] [x] f"),
        ErrorKind::VoidRead(_)
    ));
    assert_eq!(eval_ok("x: ~ :x"), Value::Void);
}

#[test]
fn test_set_word_needs_value() {
    assert!(matches!(eval_err("x:"), ErrorKind::NeedValue(_)));
    assert!(matches!(
        eval_err("x: comment \"nothing\""),
        ErrorKind::NeedValue(_)
    ));
}

#[test]
fn test_set_word_chains() {
    assert_eq!(eval_ok("a: b: 3 a + b"), Value::Integer(6));
}

#[test]
fn test_paths() {
    assert_eq!(eval_ok("b: [10 20 30] b/2"), Value::Integer(20));
    assert_eq!(eval_ok("b: [10 20] b/2: 99 b"), ints(&[10, 99]));
    assert!(matches!(eval_err("b: [1] b/5: 2"), ErrorKind::BadPath(_)));
}

// ============================================================================
// Quoting
// ============================================================================

#[test]
fn test_quoted_literals() {
    assert_eq!(eval_ok("'x"), Value::word("x"));
    assert_eq!(eval_ok("''x"), Value::Quoted(Box::new(Value::word("x"))));
}

#[test]
fn test_hard_quote_takes_unit_literally() {
    assert_eq!(
        eval_ok("the (1 + 1)"),
        Value::group(vec![
            Value::Integer(1),
            Value::word("+"),
            Value::Integer(1)
        ])
    );
}

#[test]
fn test_soft_quote_evaluates_groups() {
    let soft = "s: func [:v] [v] ";
    assert_eq!(eval_ok(&format!("{}s word", soft)), Value::word("word"));
    assert_eq!(eval_ok(&format!("{}s (1 + 1)", soft)), Value::Integer(2));
}

// ============================================================================
// Refinements
// ============================================================================

const TWO_REFINEMENTS: &str = "f: func [a /x xa /y ya] [reduce [a xa ya]] ";

#[test]
fn test_refinement_order_independence() {
    assert_eq!(
        eval_ok(&format!("{}f/x/y 1 2 3", TWO_REFINEMENTS)),
        ints(&[1, 2, 3])
    );
    assert_eq!(
        eval_ok(&format!("{}f/y/x 1 2 3", TWO_REFINEMENTS)),
        ints(&[1, 2, 3])
    );
}

#[test]
fn test_unused_refinement_is_null() {
    assert_eq!(
        eval_ok("f: func [a /x xa] [reduce [a null? xa x]] f 1"),
        Value::block(vec![
            Value::Integer(1),
            Value::Logic(true),
        ])
    );
}

#[test]
fn test_refinement_revocation() {
    let src = "h: func [a /x xa] [either x [xa] [\"revoked\"]] ";
    assert_eq!(eval_ok(&format!("{}h/x 1 null", src)), Value::text("revoked"));
    assert_eq!(eval_ok(&format!("{}h/x 1 5", src)), Value::Integer(5));
}

#[test]
fn test_partial_revocation_is_an_error() {
    let src = "h: func [/x a b] [reduce [a b]] h/x 1 null";
    assert!(matches!(eval_err(src), ErrorKind::BadRefineRevoke { .. }));
}

#[test]
fn test_unknown_refinement() {
    assert!(matches!(eval_err("add/foo 1 2"), ErrorKind::BadRefinement(_)));
}

// ============================================================================
// Modal parameters
// ============================================================================

const MODAL: &str = "m: func [@value /mod] [either mod [\"modal\"] [\"plain\"]] ";

#[test]
fn test_modal_parameter() {
    assert_eq!(eval_ok(&format!("{}m @(1 + 1)", MODAL)), Value::text("modal"));
    assert_eq!(eval_ok(&format!("{}m 1", MODAL)), Value::text("plain"));
    assert_eq!(eval_ok(&format!("{}m/mod 1", MODAL)), Value::text("modal"));
}

#[test]
fn test_modal_with_same_named_refinement() {
    let src = "f: func [@x /x] [x] ";
    assert_eq!(eval_ok(&format!("{}f @(1 + 1)", src)), Value::Integer(2));
    assert_eq!(eval_ok(&format!("{}f 5", src)), Value::Integer(5));
}

#[test]
fn test_modal_needs_refinement() {
    assert!(matches!(
        eval_err("m: func [@value] [value]"),
        ErrorKind::ModalWithoutRefinement { .. }
    ));
}

// ============================================================================
// Signals
// ============================================================================

#[test]
fn test_definitional_return() {
    let src = "f: func [x] [if x > 0 [return 1] 2] ";
    assert_eq!(eval_ok(&format!("{}f 5", src)), Value::Integer(1));
    assert_eq!(eval_ok(&format!("{}f 0", src)), Value::Integer(2));
}

#[test]
fn test_return_crosses_loops_and_nested_calls() {
    let src = "g: func [] [loop 10 [if true [return 7]] 0] \
               f: func [] [x: g x + 1] f";
    assert_eq!(eval_ok(src), Value::Integer(8));
}

#[test]
fn test_return_type_check() {
    let src = "f: func [return: [integer!]] [return \"no\"] f";
    assert!(matches!(eval_err(src), ErrorKind::WrongType { .. }));
}

#[test]
fn test_unhandled_throw_reaches_host() {
    match eval("throw 1") {
        Err(HostError::UnhandledSignal(signal)) => {
            assert_eq!(signal.label, SignalLabel::Throw(None));
            assert_eq!(signal.payload, Value::Integer(1));
        }
        other => panic!("expected unhandled throw, got {:?}", other),
    }
}

#[test]
fn test_catch_and_named_catch() {
    assert_eq!(eval_ok("catch [throw 5 10]"), Value::Integer(5));
    assert_eq!(eval_ok("catch [10]"), Value::Integer(10));
    assert_eq!(
        eval_ok("catch/name [throw/name 3 'inner] 'inner"),
        Value::Integer(3)
    );
    assert_eq!(
        eval_ok("catch/name [catch [throw/name 4 'outer]] 'outer"),
        Value::Integer(4)
    );
}

#[test]
fn test_loops_with_break_and_continue() {
    assert_eq!(
        eval_ok("n: 0 loop 5 [n: n + 1 if n = 3 [break]] n"),
        Value::Integer(3)
    );
    assert_eq!(eval_ok("i: 0 while [i < 3] [i: i + 1] i"), Value::Integer(3));
    assert_eq!(
        eval_ok("n: 0 s: 0 loop 4 [n: n + 1 if n = 2 [continue] s: s + n] s"),
        Value::Integer(8)
    );
}

#[test]
fn test_trap_captures_errors() {
    match eval_ok("trap [1 + \"a\"]") {
        Value::Error(err) => assert!(matches!(err.kind, ErrorKind::WrongType { .. })),
        other => panic!("expected error value, got {}", other),
    }
    assert_eq!(eval_ok("trap [1]"), Value::Null);
    match eval_ok("trap [fail \"boom\"]") {
        Value::Error(err) => assert_eq!(err.kind, ErrorKind::User("boom".to_string())),
        other => panic!("expected error value, got {}", other),
    }
}

// ============================================================================
// Enfix deferral and lookback
// ============================================================================

#[test]
fn test_else_defers_to_whole_expression() {
    assert_eq!(eval_ok("if false [1] else [2]"), Value::Integer(2));
    assert_eq!(eval_ok("if true [1] else [2]"), Value::Integer(1));
    assert_eq!(eval_ok("if true [1] then [3]"), Value::Integer(3));
    assert_eq!(eval_ok("x: if false [1] else [2] x"), Value::Integer(2));
}

#[test]
fn test_deferred_enfix_in_middle_of_arguments() {
    let src = "pair: func [a b] [reduce [a b]] pair 1 then [10] 2";
    assert!(matches!(eval_err(src), ErrorKind::AmbiguousInfix(_)));
}

#[test]
fn test_postponed_enfix() {
    let mut interp = Interpreter::new().unwrap();
    assert_eq!(
        interp.eval_text("add 1 2 also [z: 5]").unwrap(),
        Value::Integer(3)
    );
    assert_eq!(interp.get("z"), Some(Value::Integer(5)));
}

#[test]
fn test_left_quoting_default() {
    assert_eq!(eval_ok("x: default [10] x"), Value::Integer(10));
    assert_eq!(eval_ok("y: 5 y: default [10] y"), Value::Integer(5));
    assert_eq!(eval_ok("y: null y: default [1 + 1] y"), Value::Integer(2));
}

#[test]
fn test_user_enfix_function() {
    assert_eq!(
        eval_ok("plus: enfix func [a b] [a + b] 1 plus 2"),
        Value::Integer(3)
    );
    assert!(matches!(
        eval_err("enfix/defer/postpone :add"),
        ErrorKind::BadRefinement(_)
    ));
}

// ============================================================================
// Generators
// ============================================================================

#[test]
fn test_specialize() {
    assert_eq!(
        eval_ok("add5: specialize :add [value2: 5] add5 10"),
        Value::Integer(15)
    );
    assert!(matches!(
        eval_err("bad: specialize :add [value2: \"x\"]"),
        ErrorKind::WrongType { .. }
    ));
}

#[test]
fn test_adapt_runs_prelude_then_adaptee() {
    assert_eq!(
        eval_ok("inc-add: adapt :add [value1: value1 + 1] inc-add 1 2"),
        Value::Integer(4)
    );
    assert!(matches!(
        eval_err("bad: adapt :add [value1: \"x\"] bad 1 2"),
        ErrorKind::WrongType { .. }
    ));
}

// ============================================================================
// Varargs
// ============================================================================

#[test]
fn test_callsite_varargs() {
    assert_eq!(
        eval_ok("f: func [args [<...>]] [take args] f 1 + 2"),
        Value::Integer(3)
    );
}

#[test]
fn test_varargs_outlive_the_call() {
    let src = "grab: func [v [<...>]] [return v] v: grab x: take v 10 + 5 x";
    assert_eq!(eval_ok(src), Value::Integer(15));
}

#[test]
fn test_block_varargs() {
    let src = "v: varargs [1 + 2 10 * 2] a: take v b: take v reduce [a b tail? v]";
    assert_eq!(
        eval_ok(src),
        Value::block(vec![
            Value::Integer(3),
            Value::Integer(20),
            Value::Logic(true)
        ])
    );
    assert_eq!(eval_ok("v: varargs [] take v"), Value::Null);
}

// ============================================================================
// Interrupts and limits
// ============================================================================

#[test]
fn test_interrupt_halts_loop() {
    let config = EvalConfig {
        poll_interval: 1,
        ..EvalConfig::default()
    };
    let mut interp = Interpreter::with_config(config).unwrap();
    let flag = interp.interrupt_handle();
    flag.store(true, Ordering::SeqCst);

    match interp.eval_text("while [true] [1]") {
        Err(HostError::UnhandledSignal(signal)) => assert_eq!(signal.label, SignalLabel::Halt),
        other => panic!("expected halt, got {:?}", other),
    }
    assert!(!flag.load(Ordering::SeqCst));
    assert_eq!(interp.eval_text("1 + 1").unwrap(), Value::Integer(2));
}

#[test]
fn test_poll_hook_can_request_halt() {
    let mut interp = Interpreter::new().unwrap();
    let flag = interp.interrupt_handle();
    let calls = Rc::new(Cell::new(0u32));
    let seen = calls.clone();
    interp.set_poll_hook(Box::new(move |_tick| {
        seen.set(seen.get() + 1);
        flag.store(true, Ordering::SeqCst);
    }));

    assert!(matches!(
        interp.eval_text("while [true] [1]"),
        Err(HostError::UnhandledSignal(_))
    ));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_stack_overflow() {
    let config = EvalConfig {
        max_depth: 64,
        ..EvalConfig::default()
    };
    let mut interp = Interpreter::with_config(config).unwrap();
    match interp.eval_text("f: func [] [f] f") {
        Err(HostError::Eval(err)) => {
            assert!(matches!(err.kind, ErrorKind::StackOverflow(_)));
            assert_eq!(err.label.as_deref(), Some("f"));
        }
        other => panic!("expected overflow, got {:?}", other),
    }
    assert_eq!(interp.eval_text("f: 1 f").unwrap(), Value::Integer(1));
}

#[test]
fn test_default_depth_limit_is_reached_before_native_overflow() {
    let worker = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let mut interp = Interpreter::new().unwrap();
            match interp.eval_text("f: func [n] [1 + f n + 1] f 0") {
                Err(HostError::Eval(err)) => matches!(err.kind, ErrorKind::StackOverflow(_)),
                _ => false,
            }
        })
        .unwrap();
    assert!(worker.join().unwrap());
}

// ============================================================================
// Natives
// ============================================================================

#[test]
fn test_arithmetic_natives() {
    assert_eq!(eval_ok("7 / 2"), Value::Decimal(3.5));
    assert_eq!(eval_ok("8 / 2"), Value::Integer(4));
    assert!(matches!(eval_err("1 / 0"), ErrorKind::Native(_)));
    assert_eq!(eval_ok("negate 4"), Value::Integer(-4));
    assert_eq!(eval_ok("1.5 + 1"), Value::Decimal(2.5));
}

#[test]
fn test_comparison_natives() {
    assert_eq!(eval_ok("1 < 2"), Value::Logic(true));
    assert_eq!(eval_ok("2 <= 1"), Value::Logic(false));
    assert_eq!(eval_ok("\"a\" < \"b\""), Value::Logic(true));
    assert_eq!(eval_ok("1 <> 1"), Value::Logic(false));
    assert_eq!(eval_ok("not 1 = 2"), Value::Logic(true));
}

#[test]
fn test_type_of() {
    assert_eq!(eval_ok("type-of 1"), Value::Datatype(Kind::Integer));
    assert_eq!(eval_ok("type-of [a]"), Value::Datatype(Kind::Block));
    assert_eq!(eval_ok("type-of null"), Value::Null);
}

#[test]
fn test_reduce_and_do() {
    assert_eq!(eval_ok("reduce [1 + 1 2 * 2]"), ints(&[2, 4]));
    assert_eq!(eval_ok("do [1 + 1]"), Value::Integer(2));
    assert_eq!(eval_ok("do \"3 * 3\""), Value::Integer(9));
    assert_eq!(eval_ok("x: 'y set x 4 get 'y"), Value::Integer(4));
}
