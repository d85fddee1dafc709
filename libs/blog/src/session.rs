use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use entity::prelude::*;
use repository::{
    auth::{AuthBackend, Subscription},
    Response,
};
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What the client knows about its own credentials.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No answer from the auth collaborator yet.
    #[default]
    Unknown,
    Anonymous,
    Privileged,
}

impl SessionState {
    pub fn from_session(session: Option<&Session>, now: DateTime<Utc>) -> Self {
        match session {
            Some(session) if !session.is_expired_at(now) => {
                SessionState::Privileged
            }
            _ => SessionState::Anonymous,
        }
    }

    pub fn is_privileged(self) -> bool {
        self == SessionState::Privileged
    }
}

/// Mirrors the auth collaborator's session into a [`SessionState`] for the
/// lifetime of the shell. Purely event driven.
#[derive(Debug)]
pub struct SessionTracker {
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTracker {
    /// Must be called inside a tokio runtime.
    pub fn start(auth: Arc<dyn AuthBackend>) -> Self {
        let (tx, rx) = watch::channel(SessionState::Unknown);
        let cancel = CancellationToken::new();

        // Subscribe before the first fetch so no change slips in between.
        let subscription = auth.on_session_change();
        let handle =
            tokio::spawn(track(auth, subscription, tx, cancel.clone()));

        Self {
            state: rx,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits for the first answer from the auth collaborator.
    pub async fn resolved(&self) -> SessionState {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|state| *state != SessionState::Unknown)
            .await
            .map(|state| *state)
            .unwrap_or(SessionState::Anonymous);

        state
    }

    /// Stops tracking and releases the subscription. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(task = "stop session tracker", error = e.to_string());
            }
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn track(
    auth: Arc<dyn AuthBackend>,
    mut subscription: Subscription,
    tx: watch::Sender<SessionState>,
    cancel: CancellationToken,
) {
    let initial = tokio::select! {
        _ = cancel.cancelled() => {
            subscription.unsubscribe();
            return;
        }
        result = auth.current_session() => result,
    };
    publish(&tx, resolve(initial));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = subscription.recv() => match event {
                Ok(event) => {
                    info!(task = "session change", kind = %event.kind);
                    let state = SessionState::from_session(
                        event.session.as_ref(),
                        Utc::now(),
                    );
                    publish(&tx, state);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(task = "session change", skipped);
                    publish(&tx, resolve(auth.current_session().await));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    subscription.unsubscribe();
    info!(task = "session tracker stopped");
}

/// Session check failures count as anonymous.
fn resolve(result: Response<Option<Session>>) -> SessionState {
    match result {
        Ok(session) => SessionState::from_session(session.as_ref(), Utc::now()),
        Err(e) => {
            warn!(task = "session check", error = e.to_string());
            SessionState::Anonymous
        }
    }
}

fn publish(tx: &watch::Sender<SessionState>, state: SessionState) {
    tx.send_if_modified(|current| {
        if *current == state {
            return false;
        }
        *current = state;
        true
    });
}
