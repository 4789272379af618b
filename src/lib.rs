#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod callgate;
pub use callgate::*;

mod interceptor;
pub use interceptor::*;

pub mod observer;

mod error;
pub use error::*;

mod common;
pub use common::{MaxCalls, OperationInfo, OperationName};

#[cfg(test)]
mod tests;
