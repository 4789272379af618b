//! Top-level entrypoint that hands out interceptors sharing one observer.
//!
//! Interceptors can be built directly ([`CountCalls::new`], [`LimitCalls::new`]);
//! [`Callgate`] is a convenience for applications that want every interceptor to
//! report to the same [`CallObserver`] and to start from the same defaults.

use std::{
    fmt::{self, Debug},
    sync::Arc,
};

use crate::{
    CountCalls, LimitCalls, LimitCallsConfigurator, LimitCallsOptions, OperationInfo,
    observer::{CallObserver, TracingCallObserver},
};

/// Top-level configuration for [`Callgate`].
#[derive(Clone)]
pub struct CallgateOptions {
    /// Sink shared by every interceptor built by the [`Callgate`].
    pub observer: Arc<dyn CallObserver>,
    /// Options used by [`Callgate::limit`] and [`Callgate::limiter`].
    pub limit: LimitCallsOptions,
    /// Whether [`Callgate::count`] interceptors log their calls.
    pub log_counted_calls: bool,
}

impl Default for CallgateOptions {
    fn default() -> Self {
        Self {
            observer: Arc::new(TracingCallObserver),
            limit: LimitCallsOptions::default(),
            log_counted_calls: true,
        }
    }
}

impl fmt::Debug for CallgateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallgateOptions")
            .field("limit", &self.limit)
            .field("log_counted_calls", &self.log_counted_calls)
            .finish_non_exhaustive()
    }
}

/// Interceptor factory.
///
/// # Examples
///
/// ```
/// use callgate::{Callgate, CallgateOptions, LimitCallsOptions, MaxCalls, OperationName};
///
/// let gate = Callgate::new(CallgateOptions {
///     limit: LimitCallsOptions {
///         max_calls: MaxCalls::try_from(2).unwrap(),
///         log_calls: true,
///     },
///     ..CallgateOptions::default()
/// });
///
/// let dec_me = gate.limit(OperationName::try_from("dec_me").unwrap(), |n: i32| n - 1);
///
/// assert_eq!(dec_me.invoke(1), Ok(0));
/// assert_eq!(dec_me.invoke(2), Ok(1));
/// assert!(dec_me.invoke(3).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Callgate {
    options: CallgateOptions,
}

impl Callgate {
    /// Create a new [`Callgate`].
    pub fn new(options: CallgateOptions) -> Self {
        Self { options }
    }

    /// Options this factory was built with.
    pub fn options(&self) -> &CallgateOptions {
        &self.options
    }

    /// Wrap `operation` in a [`CountCalls`].
    pub fn count<F, A, R>(&self, info: impl Into<OperationInfo>, operation: F) -> CountCalls<F, A, R>
    where
        F: Fn(A) -> R,
        A: Debug,
        R: Debug,
    {
        CountCalls::new(info, operation)
            .with_logging(self.options.log_counted_calls)
            .with_observer(Arc::clone(&self.options.observer))
    }

    /// Wrap `operation` in a [`LimitCalls`] using the default limit options.
    pub fn limit<F, A, R>(&self, info: impl Into<OperationInfo>, operation: F) -> LimitCalls<F, A, R>
    where
        F: Fn(A) -> R,
        A: Debug,
        R: Debug,
    {
        self.limit_with(info, operation, self.options.limit)
    }

    /// Wrap `operation` in a [`LimitCalls`] using `options`.
    pub fn limit_with<F, A, R>(
        &self,
        info: impl Into<OperationInfo>,
        operation: F,
        options: LimitCallsOptions,
    ) -> LimitCalls<F, A, R>
    where
        F: Fn(A) -> R,
        A: Debug,
        R: Debug,
    {
        LimitCalls::new(info, operation, options).with_observer(Arc::clone(&self.options.observer))
    }

    /// A configurator bound to this factory's observer and default limit options.
    pub fn limiter(&self) -> LimitCallsConfigurator {
        LimitCalls::configure(self.options.limit).with_observer(Arc::clone(&self.options.observer))
    }
}

impl Default for Callgate {
    fn default() -> Self {
        Self::new(CallgateOptions::default())
    }
}
