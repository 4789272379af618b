use std::{
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    CallgateError, MaxCalls, OperationInfo, OperationName,
    interceptor::{CallFormat, forward},
    observer::{CallObserver, TracingCallObserver},
};

/// Configuration for [`LimitCalls`].
///
/// Both fields are fixed once an interceptor is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LimitCallsOptions {
    /// Number of invocations forwarded before rejecting. Defaults to `3`.
    pub max_calls: MaxCalls,
    /// Emit a record before and after every forwarded call, and one per rejection.
    /// Defaults to `false`.
    pub log_calls: bool,
}

/// Forwards at most `max_calls` invocations of the wrapped operation.
///
/// # Algorithm
///
/// 1. Increment the counter (rejected attempts count too)
/// 2. If the counter now exceeds `max_calls`, return
///    [`CallgateError::CallLimitExceeded`] without calling the operation
/// 3. Otherwise log the call (when enabled), forward, log the result, return it
///
/// The increment and the comparison use the value returned by a single
/// `fetch_add`, so concurrent callers never push more than `max_calls`
/// invocations through.
///
/// # Construction
///
/// - Immediately: [`LimitCalls::new`] (named options) or [`LimitCalls::with_limit`] (positional)
/// - Without logging, for operations whose arguments or result lack `Debug`: [`LimitCalls::quiet`]
/// - Deferred: [`LimitCalls::configure`] or [`LimitCalls::configure_with`] returns a
///   [`LimitCallsConfigurator`] that wraps operations supplied later, each with its own counter
///
/// # Examples
///
/// ```
/// use callgate::{CallgateError, LimitCalls, LimitCallsOptions, OperationName};
///
/// let square_me = LimitCalls::new(
///     OperationName::try_from("square_me").unwrap(),
///     |n: u64| n * n,
///     LimitCallsOptions::default(),
/// );
///
/// assert_eq!(square_me.invoke(2), Ok(4));
/// assert_eq!(square_me.invoke(3), Ok(9));
/// assert_eq!(square_me.invoke(4), Ok(16));
/// assert!(matches!(
///     square_me.invoke(5),
///     Err(CallgateError::CallLimitExceeded { .. })
/// ));
/// assert_eq!(square_me.num_calls(), 4);
/// ```
pub struct LimitCalls<F, A, R> {
    info: OperationInfo,
    operation: F,
    format: Option<CallFormat<A, R>>,
    max_calls: MaxCalls,
    log_calls: bool,
    observer: Arc<dyn CallObserver>,
    num_calls: AtomicU64,
}

impl LimitCalls<(), (), ()> {
    /// Build a reusable configurator from named options.
    pub fn configure(options: LimitCallsOptions) -> LimitCallsConfigurator {
        LimitCallsConfigurator::new(options)
    }

    /// Build a reusable configurator from positional options.
    pub fn configure_with(max_calls: MaxCalls, log_calls: bool) -> LimitCallsConfigurator {
        LimitCallsConfigurator::new(LimitCallsOptions {
            max_calls,
            log_calls,
        })
    }
}

impl<F, A, R> LimitCalls<F, A, R>
where
    F: Fn(A) -> R,
    A: Debug,
    R: Debug,
{
    /// Wrap `operation` with named options.
    pub fn new(info: impl Into<OperationInfo>, operation: F, options: LimitCallsOptions) -> Self {
        Self {
            format: Some(CallFormat::new()),
            log_calls: options.log_calls,
            ..Self::quiet(info, operation, options.max_calls)
        }
    } // end constructor

    /// Wrap `operation` with positional options.
    pub fn with_limit(
        info: impl Into<OperationInfo>,
        operation: F,
        max_calls: MaxCalls,
        log_calls: bool,
    ) -> Self {
        Self::new(
            info,
            operation,
            LimitCallsOptions {
                max_calls,
                log_calls,
            },
        )
    }
}

impl<F, A, R> LimitCalls<F, A, R>
where
    F: Fn(A) -> R,
{
    /// Wrap `operation` without logging.
    pub fn quiet(info: impl Into<OperationInfo>, operation: F, max_calls: MaxCalls) -> Self {
        Self {
            info: info.into(),
            operation,
            format: None,
            max_calls,
            log_calls: false,
            observer: Arc::new(TracingCallObserver),
            num_calls: AtomicU64::new(0),
        }
    }

    /// Send records to `observer` instead of `tracing`.
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Attach documentation of the wrapped operation.
    pub fn with_doc(mut self, doc: impl Into<Arc<str>>) -> Self {
        self.info = self.info.with_doc(doc);
        self
    }

    /// Metadata of the wrapped operation.
    pub fn info(&self) -> &OperationInfo {
        &self.info
    }

    /// Name of the wrapped operation.
    pub fn name(&self) -> &OperationName {
        self.info.name()
    }

    /// Number of invocation attempts so far, rejected ones included.
    pub fn num_calls(&self) -> u64 {
        self.num_calls.load(Ordering::Relaxed)
    }

    /// Configured ceiling.
    pub fn max_calls(&self) -> MaxCalls {
        self.max_calls
    }

    /// Whether calls and rejections are logged.
    pub fn log_calls(&self) -> bool {
        self.log_calls
    }

    /// Invocations left before the ceiling is reached.
    pub fn remaining(&self) -> u64 {
        self.max_calls.saturating_sub(self.num_calls())
    }

    /// Count the attempt and, while under the ceiling, forward `args`.
    ///
    /// # Errors
    ///
    /// [`CallgateError::CallLimitExceeded`] once more than `max_calls` attempts were made.
    /// The operation is not called in that case.
    pub fn invoke(&self, args: A) -> Result<R, CallgateError> {
        let call = self.num_calls.fetch_add(1, Ordering::Relaxed) + 1;

        let logging = match &self.format {
            Some(format) if self.log_calls => Some((self.observer.as_ref(), format)),
            _ => None,
        };

        if call > *self.max_calls {
            if let Some((observer, _)) = logging {
                observer.on_reject(self.info.name(), call, self.max_calls);
            }

            return Err(CallgateError::CallLimitExceeded {
                name: self.info.name().clone(),
                max_calls: self.max_calls,
            });
        }

        Ok(forward(self.info.name(), &self.operation, call, logging, args))
    } // end method invoke

    /// Unwrap the interceptor, returning the wrapped operation.
    pub fn into_inner(self) -> F {
        self.operation
    }
} // end of impl

impl<F, A, T, E> LimitCalls<F, A, Result<T, E>>
where
    F: Fn(A) -> Result<T, E>,
    E: From<CallgateError>,
{
    /// Like [`LimitCalls::invoke`] for fallible operations, folding a rejection into the
    /// operation's own error type.
    pub fn try_invoke(&self, args: A) -> Result<T, E> {
        match self.invoke(args) {
            Ok(result) => result,
            Err(err) => Err(E::from(err)),
        }
    } // end method try_invoke
}

impl<F, A, R> fmt::Debug for LimitCalls<F, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitCalls")
            .field("info", &self.info)
            .field("max_calls", &self.max_calls)
            .field("log_calls", &self.log_calls)
            .field("num_calls", &self.num_calls.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Wraps operations with a fixed [`LimitCallsOptions`].
///
/// Every [`wrap`](LimitCallsConfigurator::wrap) produces an independent
/// [`LimitCalls`] starting from zero calls.
#[derive(Clone)]
pub struct LimitCallsConfigurator {
    options: LimitCallsOptions,
    observer: Arc<dyn CallObserver>,
}

impl LimitCallsConfigurator {
    pub(crate) fn new(options: LimitCallsOptions) -> Self {
        tracing::debug!(
            max_calls = *options.max_calls,
            log_calls = options.log_calls,
            "configured call limit"
        );

        Self {
            options,
            observer: Arc::new(TracingCallObserver),
        }
    }

    /// Hand `observer` to every interceptor built from now on.
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Options applied to wrapped operations.
    pub fn options(&self) -> &LimitCallsOptions {
        &self.options
    }

    /// Wrap `operation`.
    pub fn wrap<F, A, R>(&self, info: impl Into<OperationInfo>, operation: F) -> LimitCalls<F, A, R>
    where
        F: Fn(A) -> R,
        A: Debug,
        R: Debug,
    {
        LimitCalls::new(info, operation, self.options).with_observer(Arc::clone(&self.observer))
    }

    /// Wrap `operation` with this limit but without logging, whatever `log_calls` says.
    pub fn wrap_quiet<F, A, R>(
        &self,
        info: impl Into<OperationInfo>,
        operation: F,
    ) -> LimitCalls<F, A, R>
    where
        F: Fn(A) -> R,
    {
        LimitCalls::quiet(info, operation, self.options.max_calls)
            .with_observer(Arc::clone(&self.observer))
    }
}

impl fmt::Debug for LimitCallsConfigurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitCallsConfigurator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
