use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::PublicationStatus;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("object {0} is a local master copy and cannot be overwritten by a non-master source")]
    AuthorityConflict(StorageId),
    #[error("malformed content: {0}")]
    MalformedContent(String),
    #[error("storage folder of {0} has no global envelope")]
    MissingEnvelope(StorageId),
    #[error("object {0} is not available for export")]
    NotAvailable(StorageId),
    #[error("object {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: StorageId,
        from: PublicationStatus,
        to: PublicationStatus,
    },
    #[error("object {0} is not a master copy and cannot be edited locally")]
    NotMaster(StorageId),
    #[error("unknown object {0}")]
    UnknownObject(StorageId),
    #[error(transparent)]
    Other(#[from] eyre::Report),
}

impl StorageError {
    pub(crate) fn malformed(err: impl core::fmt::Display) -> Self {
        Self::MalformedContent(err.to_string())
    }
}
