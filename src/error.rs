//! Error taxonomy shared by the catalog, order, and merge components.

use crate::{
    storage::StorageError,
    types::PizzaId,
    validate::Issues,
};

/// Coarse failure class handed to the transport layer.
///
/// Lost updates from unsynchronized writers (a concurrency anomaly) are not a
/// kind here: the runtime serializes catalog writers and the merge job is
/// single-flight, so the store never raises one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Target missing or unreadable.
    StorageRead,
    /// Content is not well-formed JSON of the expected shape.
    StorageParse,
    /// Content parsed but broke the record schema.
    Validation,
    /// No record with the requested id.
    NotFound,
    /// Target not writable.
    StorageWrite,
}

/// Failure of a catalog, order, or merge operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The document or directory could not be read.
    #[error("storage read failed: {0}")]
    StorageRead(#[source] StorageError),
    /// The document is not valid JSON or has the wrong top-level shape.
    #[error("malformed document {key}: {source}")]
    StorageParse {
        /// Key of the offending document.
        key: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// Input or stored content broke the record schema.
    #[error("validation failed: {0}")]
    Validation(Issues),
    /// No catalog entry has this id.
    #[error("pizza {0} not found")]
    PizzaNotFound(PizzaId),
    /// No order document has this id.
    #[error("order {0} not found")]
    OrderNotFound(String),
    /// The document could not be written.
    #[error("storage write failed: {0}")]
    StorageWrite(#[source] StorageError),
    /// A record could not be serialized.
    #[error("cannot encode document {key}: {source}")]
    Encode {
        /// Key the document was meant for.
        key: String,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Failure class for boundary mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StorageRead(_) => ErrorKind::StorageRead,
            Self::StorageParse { .. } => ErrorKind::StorageParse,
            Self::Validation(_) => ErrorKind::Validation,
            Self::PizzaNotFound(_) | Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::StorageWrite(_) | Self::Encode { .. } => ErrorKind::StorageWrite,
        }
    }

    /// Issue list for validation failures.
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            Self::Validation(issues) => Some(issues),
            _ => None,
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Read { .. } => Self::StorageRead(value),
            StorageError::Write { .. } => Self::StorageWrite(value),
        }
    }
}

impl From<Issues> for StoreError {
    fn from(value: Issues) -> Self {
        Self::Validation(value)
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Parses `bytes` as JSON, tagging syntax errors with `key`.
pub(crate) fn parse_json(key: &str, bytes: &[u8]) -> StoreResult<serde_json::Value> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::StorageParse {
        key: key.to_string(),
        source,
    })
}

/// Pretty-prints `value` with two-space indentation.
pub(crate) fn encode_json<T: serde::Serialize + ?Sized>(key: &str, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}
