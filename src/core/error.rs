use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The entity does not exist. Also returned when read access is denied.
    #[error("No such entity")]
    NotFound,

    #[error("Write access denied")]
    AccessDenied,

    #[error("Out of credit")]
    OutOfCredit,

    #[error("Cache miss")]
    CacheMiss,

    #[error("Property '{name}' is invalid: {reason}")]
    InvalidProperty { name: String, reason: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Commit lost a race with another transaction; retried by `transact`.
    #[error("Transaction conflict")]
    Conflict,

    #[error("Nested transactions are not supported")]
    NestedTransaction,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{operation} {kind}/{key}: {source}")]
    Context {
        operation: &'static str,
        kind: String,
        key: String,
        source: Box<StoreError>,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid_property(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProperty {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Errors that callers branch on. They travel through every layer untouched.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::AccessDenied
                | Self::OutOfCredit
                | Self::CacheMiss
                | Self::Conflict
                | Self::NestedTransaction
                | Self::Cancelled
                | Self::DeadlineExceeded
        )
    }

    /// Decorate with the operation and entity that failed. Sentinels are returned as-is.
    pub fn context(self, operation: &'static str, kind: &str, key: &str) -> Self {
        if self.is_sentinel() {
            return self;
        }

        Self::Context {
            operation,
            kind: kind.to_string(),
            key: key.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context wrapping.
    pub fn root(&self) -> &StoreError {
        let mut err = self;
        while let Self::Context { source, .. } = err {
            err = &**source;
        }
        err
    }
}
