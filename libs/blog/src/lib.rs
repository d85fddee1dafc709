use repository::RepositoryError;

pub mod detail;
pub mod editor;
pub mod gate;
pub mod hero;
pub mod listing;
pub mod manager;
pub mod sanitize;
pub mod session;
pub mod shell;
pub mod text;

#[cfg(test)]
mod testing;

pub use editor::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced to the user at the boundary of one action.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sunucuya ulaşılamadı: {0}")]
    Network(String),

    #[error("oturum hatası: {0}")]
    Auth(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("yazı bulunamadı")]
    NotFound,

    #[error("dosya deposu hatası: {0}")]
    Storage(String),

    #[error("bir gönderim zaten sürüyor")]
    Busy,

    #[error("bu işlem için yönetici oturumu gerekli")]
    NotPrivileged,

    #[error("silme işlemi onaylanmadı")]
    NoPendingDelete,
}

impl Error {
    /// Any collaborator failure during an upload or removal is a storage
    /// error from the user's point of view.
    pub fn storage(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Storage(message) => Error::Storage(message),
            e => Error::Storage(e.to_string()),
        }
    }
}

impl From<RepositoryError> for Error {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Auth(message) => Error::Auth(message),
            RepositoryError::NotFound => Error::NotFound,
            RepositoryError::Storage(message) => Error::Storage(message),
            e @ (RepositoryError::Network { .. }
            | RepositoryError::Status { .. }
            | RepositoryError::Decode { .. }
            | RepositoryError::InvalidHeader(_)
            | RepositoryError::Unexpected(_)) => Error::Network(e.to_string()),
        }
    }
}
