use std::{
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    OperationInfo, OperationName,
    interceptor::{CallFormat, forward},
    observer::{CallObserver, TracingCallObserver},
};

/// Counts every invocation of the wrapped operation.
///
/// Arguments are forwarded and results returned unchanged. A failure of the
/// wrapped operation (e.g. an `Err` it returns) reaches the caller as is; the
/// counter has no error conditions of its own.
///
/// Logging is on by default and goes to [`TracingCallObserver`]; it needs
/// `A: Debug` and `R: Debug`. [`CountCalls::quiet`] never logs and wraps any
/// `Fn(A) -> R`.
///
/// # Thread Safety
///
/// The counter is an [`AtomicU64`]. When the operation is `Sync`, one
/// interceptor can be shared across threads and no increment is lost.
///
/// # Examples
///
/// ```
/// use callgate::{CountCalls, OperationName};
///
/// let inc_me = CountCalls::new(OperationName::try_from("inc_me").unwrap(), |n: i64| n + 1);
///
/// assert_eq!(inc_me.invoke(inc_me.invoke(1)), 3);
/// assert_eq!(inc_me.num_calls(), 2);
/// ```
pub struct CountCalls<F, A, R> {
    info: OperationInfo,
    operation: F,
    format: Option<CallFormat<A, R>>,
    log_calls: bool,
    observer: Arc<dyn CallObserver>,
    num_calls: AtomicU64,
}

impl<F, A, R> CountCalls<F, A, R>
where
    F: Fn(A) -> R,
    A: Debug,
    R: Debug,
{
    /// Wrap `operation`, logging every call.
    pub fn new(info: impl Into<OperationInfo>, operation: F) -> Self {
        Self {
            format: Some(CallFormat::new()),
            log_calls: true,
            ..Self::quiet(info, operation)
        }
    } // end constructor

    /// Turn logging on or off.
    pub fn with_logging(mut self, log_calls: bool) -> Self {
        if self.format.is_none() {
            self.format = Some(CallFormat::new());
        }
        self.log_calls = log_calls;
        self
    }
}

impl<F, A, R> CountCalls<F, A, R>
where
    F: Fn(A) -> R,
{
    /// Wrap `operation` without logging.
    pub fn quiet(info: impl Into<OperationInfo>, operation: F) -> Self {
        Self {
            info: info.into(),
            operation,
            format: None,
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

    /// Number of invocations so far.
    pub fn num_calls(&self) -> u64 {
        self.num_calls.load(Ordering::Relaxed)
    }

    /// Whether calls are logged.
    pub fn log_calls(&self) -> bool {
        self.log_calls
    }

    /// Count the call and forward `args` to the wrapped operation.
    pub fn invoke(&self, args: A) -> R {
        let call = self.num_calls.fetch_add(1, Ordering::Relaxed) + 1;

        let logging = match &self.format {
            Some(format) if self.log_calls => Some((self.observer.as_ref(), format)),
            _ => None,
        };

        forward(self.info.name(), &self.operation, call, logging, args)
    } // end method invoke

    /// Unwrap the interceptor, returning the wrapped operation.
    pub fn into_inner(self) -> F {
        self.operation
    }
} // end of impl

impl<F, A, R> fmt::Debug for CountCalls<F, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountCalls")
            .field("info", &self.info)
            .field("log_calls", &self.log_calls)
            .field("num_calls", &self.num_calls.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
