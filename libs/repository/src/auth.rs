use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use entity::prelude::*;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::{
    client::Client,
    response::{IntoResponse, Response},
    RepositoryError,
};

/// Sessions this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

const EVENT_CAPACITY: usize = 16;

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// The session currently held by the client, refreshed if needed.
    async fn current_session(&self) -> Response<Option<Session>>;

    /// Subscribes to sign-in, sign-out and token refresh notifications.
    fn on_session_change(&self) -> Subscription;

    async fn sign_in(&self, email: &str, password: &str) -> Response<Session>;

    async fn sign_out(&self) -> Response<()>;
}

/// Live registration for auth change notifications. Dropping it, or calling
/// [`Subscription::unsubscribe`], ends the registration.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<AuthEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Result<AuthEvent, RecvError> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self.receiver);
    }
}

/// The client-side session slot plus its change feed.
#[derive(Debug)]
pub struct SessionStore {
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: RwLock::new(None),
            events,
        }
    }
}

impl SessionStore {
    pub fn get(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, kind: AuthEventKind, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) =
            session.clone();

        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(AuthEvent { kind, session });
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.events.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserEntity,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| now + TimeDelta::seconds(self.expires_in));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// GoTrue (Supabase auth) client holding one client session.
#[derive(Debug)]
pub struct SupabaseAuth {
    client: Client,
    store: SessionStore,
}

impl SupabaseAuth {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            store: SessionStore::default(),
        }
    }

    /// Token for row requests: the session's when signed in, else the
    /// public key.
    pub async fn bearer(&self) -> String {
        match self.current_session().await {
            Ok(Some(session)) => session.access_token,
            _ => self.client.anon_key().to_string(),
        }
    }

    async fn grant<T: Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &T,
    ) -> Response<Session> {
        let request = self
            .client
            .request(
                Method::POST,
                &format!("auth/v1/token?grant_type={grant_type}"),
                self.client.anon_key(),
            )
            .json(body);

        let text = self.client.send(request, "failed to request token").await?;
        let token = serde_json::from_str::<TokenResponse>(&text)
            .into_response("failed to parse token response")?;

        Ok(token.into_session(Utc::now()))
    }
}

#[async_trait]
impl AuthBackend for SupabaseAuth {
    async fn current_session(&self) -> Response<Option<Session>> {
        let Some(session) = self.store.get() else {
            return Ok(None);
        };

        let margin = TimeDelta::seconds(REFRESH_MARGIN_SECS);
        if !session.expires_within(Utc::now(), margin) {
            return Ok(Some(session));
        }

        let refresh = RefreshGrant {
            refresh_token: &session.refresh_token,
        };
        match self.grant("refresh_token", &refresh).await {
            Ok(refreshed) => {
                info!(task = "refresh session", user = refreshed.user.id);
                self.store
                    .set(AuthEventKind::TokenRefreshed, Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(RepositoryError::Auth(message)) => {
                warn!(task = "refresh session", error = message);
                self.store.set(AuthEventKind::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn on_session_change(&self) -> Subscription {
        self.store.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Response<Session> {
        let session = self
            .grant("password", &PasswordGrant { email, password })
            .await?;

        info!(task = "sign in", user = session.user.id);
        self.store
            .set(AuthEventKind::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_out(&self) -> Response<()> {
        let Some(session) = self.store.get() else {
            return Ok(());
        };

        let request = self.client.request(
            Method::POST,
            "auth/v1/logout",
            &session.access_token,
        );
        match self.client.send(request, "failed to sign out").await {
            Ok(_) => {}
            // The token is already dead server-side; forget it locally too.
            Err(RepositoryError::Auth(message)) => {
                warn!(task = "sign out", error = message);
            }
            Err(e) => return Err(e),
        }

        info!(task = "sign out", user = session.user.id);
        self.store.set(AuthEventKind::SignedOut, None);

        Ok(())
    }
}
