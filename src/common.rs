use std::{fmt, ops::Deref, sync::Arc};

/// Maximum number of invocations an interceptor forwards before rejecting.
///
/// Must be at least `1`. Use [`MaxCalls::unbounded`] for an effectively unlimited ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaxCalls(u64);

impl MaxCalls {
    /// A ceiling no realistic caller can reach.
    pub fn unbounded() -> Self {
        Self(u64::MAX)
    }
}

impl Default for MaxCalls {
    fn default() -> Self {
        Self(3)
    }
}

impl Deref for MaxCalls {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for MaxCalls {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            return Err("Max calls must be greater than 0".to_string());
        }

        Ok(Self(value))
    }
}

impl fmt::Display for MaxCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, cheaply clonable name for a wrapped operation.
///
/// Must not be empty.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationName(Arc<str>);

impl Deref for OperationName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<&str> for OperationName {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err("Operation name must not be empty".to_string());
        }

        Ok(Self(Arc::from(value)))
    }
}

impl TryFrom<String> for OperationName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of the operation an interceptor wraps.
///
/// Interceptors do not pretend to be the operation they wrap; callers that need the
/// wrapped operation's identity read it from here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationInfo {
    name: OperationName,
    doc: Option<Arc<str>>,
}

impl OperationInfo {
    /// Metadata with a name and no documentation.
    pub fn new(name: OperationName) -> Self {
        Self { name, doc: None }
    }

    /// Attach a documentation string.
    pub fn with_doc(mut self, doc: impl Into<Arc<str>>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Name of the wrapped operation.
    pub fn name(&self) -> &OperationName {
        &self.name
    }

    /// Documentation of the wrapped operation, if any was attached.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

impl From<OperationName> for OperationInfo {
    fn from(name: OperationName) -> Self {
        Self::new(name)
    }
}
