use std::{fmt, sync::Arc, time::Duration};

use entity::prelude::*;
use repository::{auth::AuthBackend, Repository};
use tokio::sync::watch;
use tracing::{error, info};

use crate::{
    detail::DetailViewer,
    editor::Editor,
    gate::AccessGate,
    hero::Hero,
    listing::ListingEngine,
    manager::PostManager,
    sanitize::Sanitizer,
    session::{SessionState, SessionTracker},
    Error, Result,
};

/// How long sign-in and sign-out wait for the tracker to catch up.
const SESSION_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ShellConfig {
    /// Object storage bucket holding cover images.
    pub bucket: String,
    pub placeholder_image: String,
}

/// The mounted application: one of each component, sharing one session.
pub struct Shell {
    auth: Arc<dyn AuthBackend>,
    session: SessionTracker,
    listing: Arc<ListingEngine>,
    detail: DetailViewer,
    editor: Editor,
    manager: PostManager,
    hero: Hero,
    config: ShellConfig,
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell")
            .field("session", &self.session.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Shell {
    /// Starts the session tracker and the first listing fetch. Must be
    /// called inside a tokio runtime.
    pub fn mount(
        repository: Repository,
        hero: Hero,
        config: ShellConfig,
    ) -> Self {
        let Repository {
            auth,
            post,
            storage,
        } = repository;
        let sanitizer = Sanitizer::default();

        let session = SessionTracker::start(auth.clone());
        let listing = Arc::new(ListingEngine::new(
            post.clone(),
            &config.placeholder_image,
        ));
        listing.select(CategoryFilter::All);

        let detail = DetailViewer::new(
            post.clone(),
            sanitizer.clone(),
            &config.placeholder_image,
        );
        let editor = Editor::new(
            auth.clone(),
            post.clone(),
            storage.clone(),
            listing.clone(),
            sanitizer,
            &config.bucket,
        );
        let manager = PostManager::new(
            auth.clone(),
            post,
            storage,
            listing.clone(),
            &config.bucket,
        );

        info!(task = "mount shell", bucket = config.bucket.as_str());

        Self {
            auth,
            session,
            listing,
            detail,
            editor,
            manager,
            hero,
            config,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session.state()
    }

    pub async fn resolved_session(&self) -> SessionState {
        self.session.resolved().await
    }

    pub fn gate(&self) -> AccessGate {
        AccessGate::new(self.session.subscribe())
    }

    pub fn listing(&self) -> &ListingEngine {
        &self.listing
    }

    pub fn detail(&self) -> &DetailViewer {
        &self.detail
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn manager(&self) -> &PostManager {
        &self.manager
    }

    pub fn hero(&self) -> &Hero {
        &self.hero
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Signs in and returns once the tracker reports the new session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::Auth("e-posta ve şifre gerekli".to_string()));
        }

        let rx = self.session.subscribe();
        self.auth.sign_in(email.trim(), password).await.map_err(|e| {
            error!(task = "sign in", error = e.to_string());
            Error::from(e)
        })?;

        info!(task = "sign in");
        settle(rx, SessionState::Privileged).await;

        Ok(())
    }

    pub async fn sign_out(&self) -> Result<()> {
        let rx = self.session.subscribe();
        self.auth.sign_out().await.map_err(|e| {
            error!(task = "sign out", error = e.to_string());
            Error::from(e)
        })?;

        info!(task = "sign out");
        settle(rx, SessionState::Anonymous).await;

        Ok(())
    }

    /// Releases the session subscription and any fetch in flight.
    pub async fn shutdown(&self) {
        self.listing.abort();
        self.session.shutdown().await;
        info!(task = "shutdown shell");
    }
}

async fn settle(mut rx: watch::Receiver<SessionState>, expected: SessionState) {
    let waited = tokio::time::timeout(
        SESSION_SETTLE_TIMEOUT,
        rx.wait_for(|state| *state == expected),
    )
    .await;

    if !matches!(waited, Ok(Ok(_))) {
        error!(
            task = "settle session",
            expected = ?expected,
            "tracker did not follow"
        );
    }
}
