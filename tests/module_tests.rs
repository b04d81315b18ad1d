//! The bundled modules driven through the engine.

use std::cell::RefCell;

use classbind::{CallContext, CallError, Dynamic, Engine};

thread_local! {
    static CALLS: RefCell<Vec<Vec<Dynamic>>> = const { RefCell::new(Vec::new()) };
}

fn engine() -> Engine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut engine = Engine::with_default_modules().unwrap();
    engine
        .namespace("")
        .unwrap()
        .raw("record", |ctx: &mut CallContext<'_>| {
            CALLS.with(|calls| calls.borrow_mut().push(ctx.args().to_vec()));
            Ok(())
        });
    engine
}

fn text(value: &str) -> Dynamic {
    Dynamic::String(value.into())
}

// =============================================================================
// string
// =============================================================================

#[test]
fn string_functions() {
    let mut engine = engine();
    assert_eq!(
        engine.call_function("string.upper", &[text("abc")]).unwrap(),
        text("ABC")
    );
    assert_eq!(
        engine.call_function("string.trim", &[text("  x ")]).unwrap(),
        text("x")
    );
    assert_eq!(
        engine.call_function("string.length", &[text("héllo")]).unwrap(),
        Dynamic::Int(5)
    );
    assert_eq!(
        engine
            .call_function("string.contains", &[text("haystack"), text("st")])
            .unwrap(),
        Dynamic::Bool(true)
    );
    assert_eq!(
        engine
            .call_function("string.repeat", &[text("ab"), Dynamic::Int(3)])
            .unwrap(),
        text("ababab")
    );
}

#[test]
fn pad_is_overloaded() {
    let mut engine = engine();
    assert_eq!(
        engine
            .call_function("string.pad", &[text("7"), Dynamic::Int(3)])
            .unwrap(),
        text("  7")
    );
    assert_eq!(
        engine
            .call_function("string.pad", &[text("7"), Dynamic::Int(3), text("0")])
            .unwrap(),
        text("007")
    );
    assert!(matches!(
        engine.call_function("string.pad", &[text("7")]),
        Err(CallError::NoMatchingOverload { .. })
    ));
}

#[test]
fn format_and_join_take_any_number_of_arguments() {
    let mut engine = engine();
    assert_eq!(
        engine
            .call_function(
                "string.format",
                &[text("{} + {} = {}"), Dynamic::Int(1), Dynamic::Int(2), Dynamic::Int(3)],
            )
            .unwrap(),
        text("1 + 2 = 3")
    );
    assert!(matches!(
        engine.call_function("string.format", &[text("{}")]),
        Err(CallError::Native { .. })
    ));
    assert_eq!(
        engine
            .call_function(
                "string.join",
                &[text(", "), Dynamic::Int(1), Dynamic::Bool(false), text("x")],
            )
            .unwrap(),
        text("1, false, x")
    );
}

#[test]
fn functions_are_first_class_values() {
    let mut engine = engine();
    let upper = engine.registry().function_ref("string", "upper").unwrap();
    assert_eq!(
        engine.call_value(&upper, &[text("ok")]).unwrap(),
        text("OK")
    );
    assert_eq!(
        engine.call_function("string.missing", &[]),
        Err(CallError::UnknownFunction("string.missing".into()))
    );
}

// =============================================================================
// Vector2
// =============================================================================

#[test]
fn vector_methods_and_statics() {
    let mut engine = engine();
    let a = engine
        .construct("Vector2", &[Dynamic::Float(3.0), Dynamic::Float(4.0)])
        .unwrap();
    let b = engine
        .construct("Vector2", &[Dynamic::Float(1.0), Dynamic::Float(0.0)])
        .unwrap();

    assert_eq!(engine.call_method(&a, "length", &[]).unwrap(), Dynamic::Float(5.0));
    assert_eq!(
        engine.call_method(&a, "dot", &[b.clone()]).unwrap(),
        Dynamic::Float(3.0)
    );

    let sum = engine.call_method(&a, "add", &[b.clone()]).unwrap();
    assert_eq!(engine.get(&sum, "x").unwrap(), Dynamic::Float(4.0));
    assert_eq!(engine.get(&sum, "y").unwrap(), Dynamic::Float(4.0));

    engine.call_method(&b, "scale", &[Dynamic::Int(2)]).unwrap();
    assert_eq!(engine.get(&b, "x").unwrap(), Dynamic::Float(2.0));

    assert_eq!(engine.get_static("Vector2", "Dimensions").unwrap(), Dynamic::Int(2));
    assert_eq!(engine.get(&a, "Dimensions").unwrap(), Dynamic::Int(2));

    let zero = engine.call_static("Vector2", "zero", &[]).unwrap();
    assert_eq!(engine.get(&zero, "x").unwrap(), Dynamic::Float(0.0));
    assert!(matches!(
        engine.call_method(&zero, "normalized", &[]),
        Err(CallError::Native { .. })
    ));

    for value in [a, b, sum, zero] {
        engine.release(&value);
    }
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn vector_argument_must_be_a_vector() {
    let mut engine = engine();
    let a = engine.construct("Vector2", &[]).unwrap();
    let circle = engine.construct("Circle", &[Dynamic::Float(1.0)]).unwrap();
    assert!(matches!(
        engine.call_method(&a, "dot", &[circle]),
        Err(CallError::TypeMismatch { .. })
    ));
    assert!(matches!(
        engine.call_method(&a, "dot", &[Dynamic::Int(1)]),
        Err(CallError::NotAnObject { .. })
    ));
}

// =============================================================================
// ByteBuffer
// =============================================================================

#[test]
fn byte_buffer() {
    let mut engine = engine();
    let buffer = engine.construct("ByteBuffer", &[Dynamic::Int(16)]).unwrap();

    engine.call_method(&buffer, "write", &[text("hi")]).unwrap();
    engine.call_method(&buffer, "push", &[Dynamic::Int(33)]).unwrap();
    engine
        .call_method(&buffer, "push", &[Dynamic::Int(46), Dynamic::Int(2)])
        .unwrap();
    assert_eq!(engine.get(&buffer, "length").unwrap(), Dynamic::Int(5));
    assert_eq!(engine.call_method(&buffer, "text", &[]).unwrap(), text("hi!.."));
    assert_eq!(
        engine.call_method(&buffer, "get", &[Dynamic::Int(0)]).unwrap(),
        Dynamic::Int(104)
    );
    assert!(matches!(
        engine.call_method(&buffer, "get", &[Dynamic::Int(9)]),
        Err(CallError::Native { .. })
    ));
    assert!(matches!(
        engine.call_method(&buffer, "push", &[Dynamic::Int(300)]),
        Err(CallError::Native { .. })
    ));

    let other = engine.construct("ByteBuffer", &[]).unwrap();
    engine.call_method(&other, "write", &[text("?")]).unwrap();
    let joined = engine
        .call_static("ByteBuffer", "concat", &[buffer.clone(), other.clone()])
        .unwrap();
    assert_eq!(engine.call_method(&joined, "text", &[]).unwrap(), text("hi!..?"));

    engine.call_method(&buffer, "clear", &[]).unwrap();
    assert_eq!(engine.get(&buffer, "length").unwrap(), Dynamic::Int(0));
    assert_eq!(engine.call_method(&joined, "text", &[]).unwrap(), text("hi!..?"));
}

// =============================================================================
// timer
// =============================================================================

#[test]
fn timer_callback_runs_after_its_ticks() {
    CALLS.with(|calls| calls.borrow_mut().clear());
    let mut engine = engine();
    let record = engine.registry().function_ref("", "record").unwrap();
    let vector = engine.construct("Vector2", &[]).unwrap();

    engine
        .call_function(
            "timer.after",
            &[Dynamic::Int(2), record, text("done"), vector.clone()],
        )
        .unwrap();
    engine.release(&vector);
    assert_eq!(engine.live_handles(), 1);

    assert_eq!(engine.process_pending(), 0);
    assert_eq!(engine.process_pending(), 0);
    assert_eq!(engine.process_pending(), 1);
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.live_handles(), 0);

    CALLS.with(|calls| {
        assert_eq!(
            calls.borrow().as_slice(),
            &[vec![vector.clone(), Dynamic::Bool(true), text("done")]]
        );
    });
}

#[test]
fn failed_timer_reports_its_message() {
    CALLS.with(|calls| calls.borrow_mut().clear());
    let mut engine = engine();
    let record = engine.registry().function_ref("", "record").unwrap();

    engine
        .call_function("timer.fail_after", &[Dynamic::Int(0), record, text("timeout")])
        .unwrap();
    assert_eq!(engine.process_pending(), 1);

    CALLS.with(|calls| {
        assert_eq!(
            calls.borrow().as_slice(),
            &[vec![Dynamic::Bool(false), text("timeout")]]
        );
    });
}

#[test]
fn timer_rejects_a_non_function_callback() {
    let mut engine = engine();
    assert_eq!(
        engine.call_function("timer.after", &[Dynamic::Int(1), Dynamic::Int(5), Dynamic::Null]),
        Err(CallError::type_mismatch("function", "int"))
    );
    assert_eq!(engine.pending_count(), 0);
}

#[test]
fn oversized_requests_fail_without_crashing() {
    let mut engine = engine();
    let buffer = engine.construct("ByteBuffer", &[]).unwrap();
    engine.call_method(&buffer, "push", &[Dynamic::Int(7)]).unwrap();

    assert!(matches!(
        engine.call_method(&buffer, "push", &[Dynamic::Int(0), Dynamic::Int(i64::MAX)]),
        Err(CallError::Native { .. })
    ));
    assert_eq!(engine.get(&buffer, "length").unwrap(), Dynamic::Int(1));
    assert!(matches!(
        engine.construct("ByteBuffer", &[Dynamic::Int(i64::MAX)]),
        Err(CallError::Native { .. })
    ));
    assert!(matches!(
        engine.call_function("string.repeat", &[text("ab"), Dynamic::Int(i64::MAX)]),
        Err(CallError::Native { .. })
    ));
    assert!(matches!(
        engine.call_function("string.pad", &[text("7"), Dynamic::Int(i64::MAX)]),
        Err(CallError::Native { .. })
    ));
    assert!(matches!(
        engine.call_function("string.repeat", &[text("ab"), Dynamic::Int(-1)]),
        Err(CallError::Native { .. })
    ));

    engine.release(&buffer);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn timer_with_a_released_keep_alive_takes_no_references() {
    let mut engine = engine();
    let record = engine.registry().function_ref("", "record").unwrap();
    let live = engine.construct("Vector2", &[]).unwrap();
    let gone = engine.construct("Vector2", &[]).unwrap();
    assert!(engine.release(&gone));

    assert_eq!(
        engine
            .call_function(
                "timer.after",
                &[Dynamic::Int(1), record, text("x"), live.clone(), gone.clone()],
            )
            .unwrap_err(),
        CallError::StaleHandle {
            index: gone.as_object().unwrap().index
        }
    );
    assert_eq!(engine.pending_count(), 0);
    assert!(engine.release(&live));
    assert_eq!(engine.live_handles(), 0);
}
