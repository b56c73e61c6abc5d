use thiserror::Error;

/// Every failure a mail store surfaces to its caller.
///
/// `NotFound` and `NotSupported` are ordinary outcomes (a remote may
/// legitimately lack a folder or an extension); the other kinds point
/// at a defect or at the environment.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("the mail store has been disposed")]
    ObjectDisposed,
    #[error("operation canceled")]
    OperationCanceled,
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotSupported(_))
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
