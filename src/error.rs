use crate::{MaxCalls, OperationName};

/// Error type for this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallgateError {
    /// The interceptor already forwarded `max_calls` invocations and rejected this one.
    #[error("operation {name} exceeded its call limit of {max_calls}")]
    CallLimitExceeded {
        /// Name of the wrapped operation.
        name: OperationName,
        /// Configured ceiling.
        max_calls: MaxCalls,
    },
}
