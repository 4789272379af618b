//! Interceptors that wrap a single operation.
//!
//! An interceptor takes ownership of an operation (any `Fn(A) -> R`) and is
//! invoked in its place. Arguments and results pass through untouched; the
//! interceptor only adds bookkeeping around the call.
//!
//! # Strategies
//!
//! - [`CountCalls`]: counts every invocation, never rejects
//! - [`LimitCalls`]: counts every invocation and rejects once a ceiling is passed
//!
//! # Wrapping methods
//!
//! Methods need no special handling. Either capture the receiver in a closure,
//! or wrap the method path and pass the receiver as part of the arguments:
//!
//! ```
//! use callgate::{CountCalls, OperationName};
//!
//! #[derive(Debug)]
//! struct Greeter {
//!     greeting: &'static str,
//! }
//!
//! impl Greeter {
//!     fn greet(&self, who: &str) -> String {
//!         format!("{} {who}", self.greeting)
//!     }
//! }
//!
//! let greeter = Greeter { greeting: "hello" };
//!
//! let captured = CountCalls::quiet(
//!     OperationName::try_from("Greeter::greet").unwrap(),
//!     |who: &str| greeter.greet(who),
//! );
//! assert_eq!(captured.invoke("cat"), "hello cat");
//!
//! let explicit = CountCalls::quiet(
//!     OperationName::try_from("Greeter::greet").unwrap(),
//!     |(receiver, who): (&Greeter, &str)| receiver.greet(who),
//! );
//! assert_eq!(explicit.invoke((&greeter, "dog")), "hello dog");
//! ```

use std::fmt::Debug;

use crate::{
    OperationName,
    observer::{CallObserver, CallRecord, ReturnRecord},
};

mod count_calls;
pub use count_calls::*;

mod limit_calls;
pub use limit_calls::*;

/// Renders the arguments and result of an operation for call records.
///
/// Only interceptors that may log hold one, so `Debug` is required of `A` and `R`
/// when such an interceptor is built and never by `invoke`.
pub(crate) struct CallFormat<A, R> {
    args: fn(&A) -> &dyn Debug,
    result: fn(&R) -> &dyn Debug,
}

impl<A: Debug, R: Debug> CallFormat<A, R> {
    pub(crate) fn new() -> Self {
        Self {
            args: as_debug::<A>,
            result: as_debug::<R>,
        }
    }
}

fn as_debug<T: Debug>(value: &T) -> &dyn Debug {
    value
}

/// Forward `args` to `operation`, bracketing the call with records when `logging` is set.
pub(crate) fn forward<F, A, R>(
    name: &OperationName,
    operation: &F,
    call: u64,
    logging: Option<(&dyn CallObserver, &CallFormat<A, R>)>,
    args: A,
) -> R
where
    F: Fn(A) -> R,
{
    let Some((observer, format)) = logging else {
        return operation(args);
    };

    observer.on_call(&CallRecord {
        name,
        call,
        args: (format.args)(&args),
    });

    let result = operation(args);

    observer.on_return(&ReturnRecord {
        name,
        call,
        result: (format.result)(&result),
    });

    result
}
