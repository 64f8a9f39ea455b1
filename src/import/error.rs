use thiserror::Error;

use crate::db::StoreError;
use crate::gedcom::{EncodingError, RecordKind};

/// Fel från en postladdare
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Fel posttyp: förväntade {expected}, fick {found}")]
    WrongRecordType { expected: RecordKind, found: RecordKind },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DispatchError {
    /// Avbryter felet hela importen?
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_fatal(),
            Self::WrongRecordType { .. } => false,
        }
    }
}

/// Fel som stoppar en import
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Kunde inte läsa filen: {0}")]
    Io(#[from] std::io::Error),

    #[error("Teckenkodning: {0}")]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Jobb {0} hittades inte")]
    JobNotFound(String),

    #[error("Jobb {job_id} kan inte startas i status {status}")]
    InvalidState { job_id: String, status: String },

    #[error("Tidsgränsen på {0} s överskreds")]
    TimedOut(u64),

    #[error("Internt fel: {0}")]
    Internal(String),
}

impl From<DispatchError> for ImportError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Storage(e) => Self::Store(e),
            other => Self::Internal(other.to_string()),
        }
    }
}
