//! The public error type and the internal `anyhow` alias.
//!
//! Internally, fallible code returns `Res<T>` and attaches `anyhow` context as it goes. At the
//! public boundary an error is classified with an `ErrorType` using `IntoResult::pub_result` so
//! that callers (the CLI, the MCP server, a UI) can react to the kind of failure without parsing
//! messages.

use crate::store::{Operation, StoreError};
use serde::Serialize;
use std::fmt::{Debug, Display, Formatter};

/// Internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// Public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The classification of an `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Input failed a local check before any store or network call.
    Validation,
    /// Input that must be parseable (e.g. JSON text) could not be parsed.
    MalformedInput,
    /// A withdraw would take a goal balance below zero.
    InsufficientBalance,
    /// The store's access policy denied the operation.
    Permission,
    /// The store could not be reached.
    Connectivity,
    /// A compare-and-commit lost against a concurrent writer.
    Conflict,
    /// A document that was expected to exist does not.
    NotFound,
    /// The completion service failed or answered with schema-invalid output.
    Delegate,
    /// The configuration or home directory is missing or invalid.
    Config,
    /// The local database failed.
    Database,
    /// A long-running service (the MCP server) failed.
    Service,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// The resource and operation a failure is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultContext {
    pub resource_path: String,
    pub operation: Operation,
}

/// The public error type.
pub struct Error {
    error_type: ErrorType,
    context: Option<FaultContext>,
    inner: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            context: None,
            inner: inner.into(),
        }
    }

    pub(crate) fn msg<M>(error_type: ErrorType, message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self::new(error_type, anyhow::Error::msg(message))
    }

    pub(crate) fn validation<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self::msg(ErrorType::Validation, message)
    }

    /// Attaches the resource path and operation the error is about.
    pub(crate) fn with_context(mut self, resource_path: impl Into<String>, op: Operation) -> Self {
        self.context = Some(FaultContext {
            resource_path: resource_path.into(),
            operation: op,
        });
        self
    }

    /// Wraps the inner error with a higher-level message, like `anyhow::Context`.
    pub(crate) fn context_msg<C>(mut self, message: C) -> Self
    where
        C: Display + Send + Sync + 'static,
    {
        self.inner = self.inner.context(message);
        self
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// The resource path and operation, when the error came from a store operation.
    pub fn context(&self) -> Option<&FaultContext> {
        self.context.as_ref()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Error")
            .field("error_type", &self.error_type)
            .field("context", &self.context)
            .field("inner", &self.inner)
            .finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        let error_type = match &e {
            StoreError::PermissionDenied { .. } => ErrorType::Permission,
            StoreError::Unavailable { .. } => ErrorType::Connectivity,
            StoreError::Conflict { .. } => ErrorType::Conflict,
            StoreError::NotFound { .. } => ErrorType::NotFound,
            StoreError::AlreadyExists { .. } => ErrorType::Conflict,
            StoreError::Backend(_) => ErrorType::Database,
        };
        let context = e.fault_context();
        let mut error = Error::new(error_type, e);
        error.context = context;
        error
    }
}

/// Converts an internal result into a public `Result` with the given classification.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}
