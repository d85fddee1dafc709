use tokio::sync::watch;

use crate::session::SessionState;

pub const SIGN_IN_ROUTE: &str = "/gizli-oda";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Session not resolved yet: show a neutral placeholder, never the
    /// protected view and never a redirect.
    Placeholder,
    Redirect { to: &'static str, replace: bool },
    Render,
}

pub fn decide(state: SessionState) -> GateDecision {
    match state {
        SessionState::Unknown => GateDecision::Placeholder,
        SessionState::Anonymous => GateDecision::Redirect {
            to: SIGN_IN_ROUTE,
            replace: true,
        },
        SessionState::Privileged => GateDecision::Render,
    }
}

/// Guard around a protected view, re-evaluated on every session change.
#[derive(Debug, Clone)]
pub struct AccessGate {
    session: watch::Receiver<SessionState>,
}

impl AccessGate {
    pub fn new(mut session: watch::Receiver<SessionState>) -> Self {
        session.borrow_and_update();
        Self { session }
    }

    pub fn decision(&self) -> GateDecision {
        decide(*self.session.borrow())
    }

    /// Next decision after a session change; `None` once the tracker is gone.
    pub async fn changed(&mut self) -> Option<GateDecision> {
        self.session.changed().await.ok()?;
        Some(decide(*self.session.borrow_and_update()))
    }
}
