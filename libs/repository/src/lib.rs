use std::{fmt, sync::Arc, time::Duration};

use auth::{AuthBackend, SupabaseAuth};
use client::Client;
use post::{RowStore, SupabasePosts};
use storage::ObjectStore;

pub mod auth;
mod client;
pub mod memory;
pub mod post;
mod response;
pub mod storage;

pub use response::Response;

/// Handles to the three hosted collaborators.
#[derive(Clone)]
pub struct Repository {
    pub auth: Arc<dyn AuthBackend>,
    pub post: Arc<dyn RowStore>,
    pub storage: Arc<dyn ObjectStore>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("in reqwest crate from unsuccessful request: {}: {}", message, source)]
    Network {
        message: String,
        source: reqwest::Error,
    },

    #[error("unsuccessful status code {}: {}", status, message)]
    Status { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("no matching row")]
    NotFound,

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("in serde_json crate from malformed body: {}: {}", message, source)]
    Decode {
        message: String,
        source: serde_json::Error,
    },

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

/// Wires the Supabase auth and row collaborators with the given object store.
pub fn init_repository(
    config: &SupabaseConfig,
    storage: Arc<dyn ObjectStore>,
) -> Response<Repository> {
    let client = Client::new(&config.url, &config.anon_key, config.timeout)?;
    let auth = Arc::new(SupabaseAuth::new(client.clone()));
    let post = Arc::new(SupabasePosts::new(client, auth.clone()));

    Ok(Repository {
        auth,
        post,
        storage,
    })
}
