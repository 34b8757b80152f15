use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeculumError {
    /// A record's declared fields could not be introspected. This is a
    /// programmer error in the record type, never a transient fault.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A match template could not be introspected at registration time.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// The wrapped remote space call failed. Transient by assumption;
    /// always re-raised to the caller after bookkeeping.
    #[error("remote space failure: {0}")]
    Remote(String),

    /// Local lease misuse, e.g. renewing a lease-less in-doubt holder.
    #[error("lease error: {0}")]
    Lease(String),

    #[error("event delivery error: {0}")]
    EventDelivery(String),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SpeculumError {
    /// Whether this error came from the remote space boundary.
    pub fn is_remote(&self) -> bool {
        matches!(self, SpeculumError::Remote(_))
    }
}

pub type Result<T> = std::result::Result<T, SpeculumError>;
