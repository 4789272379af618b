//! Sinks for the records an interceptor emits around each forwarded call.
//!
//! Every logged invocation produces a [`CallRecord`] right before the wrapped
//! operation runs and a [`ReturnRecord`] right after it returns. A rejected
//! invocation produces neither; [`CallObserver::on_reject`] is told instead.
//!
//! The default sink is [`TracingCallObserver`], which forwards records to the
//! `tracing` facade. Install any subscriber to see them.

use std::fmt;

use crate::{MaxCalls, OperationName};

/// Emitted before the wrapped operation is called.
#[derive(Clone, Copy)]
pub struct CallRecord<'a> {
    /// Name of the wrapped operation.
    pub name: &'a OperationName,
    /// 1-based index of this invocation.
    pub call: u64,
    /// Arguments forwarded to the operation.
    pub args: &'a dyn fmt::Debug,
}

/// Emitted after the wrapped operation returned.
#[derive(Clone, Copy)]
pub struct ReturnRecord<'a> {
    /// Name of the wrapped operation.
    pub name: &'a OperationName,
    /// 1-based index of this invocation.
    pub call: u64,
    /// Value the operation returned.
    pub result: &'a dyn fmt::Debug,
}

/// Receives interceptor records.
///
/// Implementations must be cheap; they run inline on the caller's thread.
pub trait CallObserver: Send + Sync {
    /// A call is about to be forwarded.
    fn on_call(&self, record: &CallRecord<'_>);

    /// A forwarded call returned.
    fn on_return(&self, record: &ReturnRecord<'_>);

    /// A call was rejected without being forwarded.
    fn on_reject(&self, _name: &OperationName, _call: u64, _max_calls: MaxCalls) {}
}

/// Forwards records to `tracing`.
///
/// Calls and returns are logged at `INFO`, rejections at `DEBUG`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingCallObserver;

impl CallObserver for TracingCallObserver {
    fn on_call(&self, record: &CallRecord<'_>) {
        tracing::info!(
            operation = %record.name,
            call = record.call,
            args = ?record.args,
            "calling"
        );
    }

    fn on_return(&self, record: &ReturnRecord<'_>) {
        tracing::info!(
            operation = %record.name,
            call = record.call,
            result = ?record.result,
            "returned"
        );
    }

    fn on_reject(&self, name: &OperationName, call: u64, max_calls: MaxCalls) {
        tracing::debug!(
            operation = %name,
            call,
            max_calls = *max_calls,
            "call limit exceeded"
        );
    }
}

/// Drops every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallObserver;

impl CallObserver for NoopCallObserver {
    fn on_call(&self, _record: &CallRecord<'_>) {}

    fn on_return(&self, _record: &ReturnRecord<'_>) {}
}
