use crate::bundle::BundleError;
use crate::core::model::{BlobStatus, InstallStage, PartKind};
use std::time::Duration;
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("timed out after {0:?} waiting for the device")]
    Timeout(Duration),

    #[error("device link closed")]
    Closed,

    #[error("device sent an unexpected message: {0}")]
    Unexpected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum InstallError {
    #[error("not an app bundle: {0}")]
    InvalidBundle(String),

    #[error("bundle read failed")]
    Bundle(#[from] BundleError),

    #[error("app registration failed: {0}")]
    RegistrationFailed(BlobStatus),

    #[error("device requested app {got}; expected {want}")]
    UnexpectedFetchTarget { got: Uuid, want: Uuid },

    #[error("transfer of {part} failed")]
    TransferFailed {
        part: PartKind,
        #[source]
        cause: anyhow::Error,
    },

    #[error("device link failed")]
    Link(#[from] LinkError),

    #[error("session already finished ({0:?}); start a new one to retry")]
    AlreadyFinished(InstallStage),
}
