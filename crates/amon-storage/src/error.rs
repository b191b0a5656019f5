/// Errors that can occur within the storage layer.
///
/// Adapter callers treat every variant as an internal dependency failure;
/// the distinction exists for logging, not for the wire.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying LDAP protocol or connection error.
    #[error("directory: {0}")]
    Ldap(#[from] ldap3::LdapError),

    /// An underlying Redis protocol or connection error.
    #[error("kv: {0}")]
    Redis(#[from] redis::RedisError),

    /// A search filter the in-memory directory cannot evaluate.
    #[error("unsupported search filter: {0}")]
    UnsupportedFilter(String),

    /// Generic storage error for cases not covered by other variants.
    #[error("storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
