use std::{
    cell::Cell,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

use super::recording::{Event, RecordingObserver, name};
use crate::{CallgateError, LimitCalls, LimitCallsOptions, MaxCalls};

fn square(x: i64) -> i64 {
    x * x
}

fn options(max_calls: u64, log_calls: bool) -> LimitCallsOptions {
    LimitCallsOptions {
        max_calls: MaxCalls::try_from(max_calls).unwrap(),
        log_calls,
    }
}

#[test]
fn default_options() {
    let o = LimitCallsOptions::default();

    assert_eq!(*o.max_calls, 3);
    assert!(!o.log_calls);
}

#[test]
fn square_example_rejects_fourth_call() {
    let square_me = LimitCalls::new(name("square_me"), square, options(3, false));

    assert_eq!(square_me.invoke(2), Ok(4));
    assert_eq!(square_me.invoke(3), Ok(9));
    assert_eq!(square_me.invoke(4), Ok(16));

    let err = square_me.invoke(5).unwrap_err();
    assert_eq!(
        err,
        CallgateError::CallLimitExceeded {
            name: name("square_me"),
            max_calls: MaxCalls::try_from(3).unwrap(),
        }
    );
    assert_eq!(square_me.num_calls(), 4);
}

#[test]
fn rejected_call_is_not_forwarded() {
    let forwarded = Cell::new(0);
    let limited = LimitCalls::new(
        name("counted"),
        |()| forwarded.set(forwarded.get() + 1),
        options(2, false),
    );

    for _ in 0..5 {
        let _ = limited.invoke(());
    }

    assert_eq!(forwarded.get(), 2);
    assert_eq!(limited.num_calls(), 5);
}

#[test]
fn every_rejected_attempt_still_increments() {
    let limited = LimitCalls::new(name("square"), square, options(1, false));

    assert!(limited.invoke(1).is_ok());
    for attempt in 2..=10 {
        assert!(limited.invoke(attempt).is_err());
        assert_eq!(limited.num_calls(), attempt as u64);
    }
}

#[test]
fn remaining_saturates_at_zero() {
    let limited = LimitCalls::new(name("square"), square, options(2, false));
    assert_eq!(limited.remaining(), 2);

    let _ = limited.invoke(1);
    assert_eq!(limited.remaining(), 1);

    let _ = limited.invoke(1);
    let _ = limited.invoke(1);
    assert_eq!(limited.remaining(), 0);
}

#[test]
fn positional_and_named_configuration_are_equivalent() {
    let named = LimitCalls::new(name("cube_me"), |n: i64| n * n * n, options(4, true));
    let positional = LimitCalls::with_limit(
        name("cube_me"),
        |n: i64| n * n * n,
        MaxCalls::try_from(4).unwrap(),
        true,
    );

    assert_eq!(named.max_calls(), positional.max_calls());
    assert_eq!(named.log_calls(), positional.log_calls());

    for n in 2..=6 {
        assert_eq!(named.invoke(n), positional.invoke(n));
    }
    assert_eq!(named.num_calls(), positional.num_calls());
}

#[test]
fn configurator_builds_independent_interceptors() {
    let limiter = LimitCalls::configure(options(2, false));

    let inc = limiter.wrap(name("inc"), |n: i32| n + 1);
    let dec = limiter.wrap(name("dec"), |n: i32| n - 1);

    assert_eq!(inc.invoke(1), Ok(2));
    assert_eq!(inc.invoke(2), Ok(3));
    assert!(inc.invoke(3).is_err());

    assert_eq!(dec.num_calls(), 0);
    assert_eq!(dec.invoke(1), Ok(0));
    assert_eq!(dec.invoke(2), Ok(1));
    assert!(dec.invoke(3).is_err());

    assert_eq!(inc.num_calls(), 3);
    assert_eq!(dec.num_calls(), 3);
    assert_eq!(limiter.options(), &options(2, false));
}

#[test]
fn positional_configurator_matches_named_configurator() {
    let named = LimitCalls::configure(options(2, true));
    let positional = LimitCalls::configure_with(MaxCalls::try_from(2).unwrap(), true);

    assert_eq!(named.options(), positional.options());

    let a = named.wrap(name("square"), square);
    let b = positional.wrap(name("square"), square);

    for x in 1..=3 {
        assert_eq!(a.invoke(x), b.invoke(x));
    }
    assert!(b.log_calls());
    assert_eq!(b.num_calls(), 3);
}

#[test]
fn configurator_matches_immediate_wrapping() {
    let deferred = LimitCalls::configure(options(3, false)).wrap(name("square"), square);
    let immediate = LimitCalls::new(name("square"), square, options(3, false));

    for x in 1..=4 {
        assert_eq!(deferred.invoke(x), immediate.invoke(x));
    }
}

#[test]
fn logging_emits_before_and_after_for_successful_calls_only() {
    let observer = RecordingObserver::new();
    let limited =
        LimitCalls::new(name("square_me"), square, options(2, true)).with_observer(observer.clone());

    let _ = limited.invoke(2);
    let _ = limited.invoke(3);
    let _ = limited.invoke(4);

    assert_eq!(observer.calls(), 2);
    assert_eq!(observer.returns(), 2);
    assert_eq!(observer.rejects(), 1);

    assert_eq!(
        observer.events(),
        vec![
            Event::Call {
                name: "square_me".into(),
                call: 1,
                args: "2".into(),
            },
            Event::Return {
                name: "square_me".into(),
                call: 1,
                result: "4".into(),
            },
            Event::Call {
                name: "square_me".into(),
                call: 2,
                args: "3".into(),
            },
            Event::Return {
                name: "square_me".into(),
                call: 2,
                result: "9".into(),
            },
            Event::Reject {
                name: "square_me".into(),
                call: 3,
                max_calls: 2,
            },
        ]
    );
}

#[test]
fn logging_disabled_reports_nothing_to_observer() {
    let observer = RecordingObserver::new();
    let limited =
        LimitCalls::new(name("square"), square, options(1, false)).with_observer(observer.clone());

    let _ = limited.invoke(1);
    let _ = limited.invoke(2);

    assert!(observer.events().is_empty());
    assert_eq!(limited.num_calls(), 2);
}

#[test]
fn logs_tuple_arguments() {
    let observer = RecordingObserver::new();
    let limited = LimitCalls::new(name("add"), |(a, b): (i32, i32)| a + b, options(1, true))
        .with_observer(observer.clone());

    assert_eq!(limited.invoke((2, 3)), Ok(5));

    assert_eq!(
        observer.events()[0],
        Event::Call {
            name: "add".into(),
            call: 1,
            args: "(2, 3)".into(),
        }
    );
}

#[test]
fn error_message_names_operation_and_limit() {
    let limited = LimitCalls::new(name("dec_three_from_me"), |n: i32| n - 1, options(3, false));

    for n in 1..=3 {
        limited.invoke(n).unwrap();
    }

    assert_eq!(
        limited.invoke(4).unwrap_err().to_string(),
        "operation dec_three_from_me exceeded its call limit of 3"
    );
}

#[derive(Debug, PartialEq)]
enum ParseFailure {
    Invalid,
    Limited(CallgateError),
}

impl From<CallgateError> for ParseFailure {
    fn from(err: CallgateError) -> Self {
        Self::Limited(err)
    }
}

#[test]
fn try_invoke_folds_rejection_into_operation_error() {
    let parse = LimitCalls::new(
        name("parse"),
        |s: &str| s.parse::<u32>().map_err(|_| ParseFailure::Invalid),
        options(2, false),
    );

    assert_eq!(parse.try_invoke("7"), Ok(7));
    assert_eq!(parse.try_invoke("x"), Err(ParseFailure::Invalid));
    assert!(matches!(
        parse.try_invoke("8"),
        Err(ParseFailure::Limited(CallgateError::CallLimitExceeded { .. }))
    ));
}

#[test]
fn operation_failure_propagates_unchanged() {
    let parse = LimitCalls::new(name("parse"), |s: &str| s.parse::<u32>(), options(3, false));

    let inner = parse.invoke("nope").unwrap();
    assert!(inner.is_err());
    assert_eq!(parse.invoke("12").unwrap(), Ok(12));
}

#[derive(Debug)]
struct Widget {
    id: u64,
}

static NEXT_WIDGET: AtomicU64 = AtomicU64::new(1);

impl Widget {
    fn new(_: ()) -> Self {
        Self {
            id: NEXT_WIDGET.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}

#[test]
fn limiting_a_constructor_caps_instances() {
    let build = LimitCalls::new(name("Widget::new"), Widget::new, options(1, false));

    let widget = build.invoke(()).unwrap();
    assert!(widget.id() >= 1);

    assert!(build.invoke(()).is_err());
}

#[test]
fn limits_method_with_explicit_receiver() {
    let a = Widget::new(());
    let b = Widget::new(());
    let id = LimitCalls::new(name("Widget::id"), Widget::id, options(2, false));

    assert_eq!(id.invoke(&a), Ok(a.id));
    assert_eq!(id.invoke(&b), Ok(b.id));
    assert!(id.invoke(&a).is_err());
}

#[test]
fn interceptors_compose() {
    let counted = crate::CountCalls::quiet(name("square"), square);
    let limited = LimitCalls::new(name("square"), |x: i64| counted.invoke(x), options(2, false));

    let _ = limited.invoke(1);
    let _ = limited.invoke(2);
    let _ = limited.invoke(3);

    assert_eq!(limited.num_calls(), 3);
    assert_eq!(counted.num_calls(), 2);
}

#[test]
fn concurrent_callers_forward_exactly_max_calls() {
    let forwarded = Arc::new(AtomicU64::new(0));
    let limited = {
        let forwarded = Arc::clone(&forwarded);
        Arc::new(LimitCalls::new(
            name("shared"),
            move |x: u64| {
                forwarded.fetch_add(1, Ordering::Relaxed);
                x
            },
            options(500, false),
        ))
    };

    let threads = 8_u64;
    let per_thread = 200_u64;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let limited = Arc::clone(&limited);
            thread::spawn(move || {
                let mut ok = 0_u64;
                for i in 0..per_thread {
                    if limited.invoke(i).is_ok() {
                        ok += 1;
                    }
                }
                ok
            })
        })
        .collect();

    let ok: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(ok, 500);
    assert_eq!(forwarded.load(Ordering::Relaxed), 500);
    assert_eq!(limited.num_calls(), threads * per_thread);
}

#[test]
fn unbounded_limit_never_rejects() {
    let limited = LimitCalls::new(
        name("square"),
        square,
        LimitCallsOptions {
            max_calls: MaxCalls::unbounded(),
            log_calls: false,
        },
    );

    for x in 0..10_000 {
        assert_eq!(limited.invoke(x), Ok(x * x));
    }

    assert_eq!(limited.num_calls(), 10_000);
    assert!(limited.remaining() > 0);
}

// No `Debug` on purpose.
struct Handle(u32);

#[test]
fn quiet_limit_wraps_operation_without_debug() {
    let open = LimitCalls::quiet(name("open"), |id: u32| Handle(id), MaxCalls::try_from(1).unwrap());

    let handle = open.invoke(7).ok().map(|h| h.0);
    assert_eq!(handle, Some(7));

    assert!(!open.log_calls());
    assert!(matches!(
        open.invoke(8),
        Err(CallgateError::CallLimitExceeded { .. })
    ));
}

#[test]
fn configurator_wraps_operation_without_debug_quietly() {
    let observer = RecordingObserver::new();
    let limiter = LimitCalls::configure(options(1, true)).with_observer(observer.clone());

    let open = limiter.wrap_quiet(name("open"), |Handle(id): Handle| id + 1);

    assert_eq!(open.invoke(Handle(1)).ok(), Some(2));
    assert!(open.invoke(Handle(2)).is_err());
    assert!(observer.events().is_empty());
}
