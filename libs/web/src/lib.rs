use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use blog::{editor::IMAGE_MAX_BYTES, shell::Shell};
use tower_http::trace::TraceLayer;
use tracing::info;

mod article;
mod auth;
mod contact;
mod editor;
mod gate;
pub mod healthz;
mod home;
pub mod not_found;
mod placeholder;
mod response;
mod templates;

pub use response::{WebError, WebResponse};

/// Room for one full-size image plus the text fields.
const FORM_BODY_LIMIT: usize = IMAGE_MAX_BYTES + 1024 * 1024;

#[derive(Clone, Debug)]
pub struct SiteConfig {
    /// Endpoint the contact form posts to (Formspree).
    pub contact_form_action: String,
    pub instagram_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            contact_form_action: String::new(),
            instagram_url:
                "https://www.instagram.com/sanatatilimkutuphane.toplulugu/"
                    .to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WebState {
    shell: Arc<Shell>,
    site: Arc<SiteConfig>,
    /// Token of the browser that signed in. The session is shared by the
    /// whole process, so only this browser may act on it.
    owner: Arc<Mutex<Option<String>>>,
}

impl WebState {
    pub fn new(shell: Arc<Shell>, site: SiteConfig) -> Self {
        Self {
            shell,
            site: Arc::new(site),
            owner: Arc::default(),
        }
    }

    /// Privileged session and the cookie of the browser that opened it.
    pub(crate) fn owns(&self, jar: &CookieJar) -> bool {
        if !self.shell.session().is_privileged() {
            return false;
        }

        let owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        match (owner.as_deref(), jar.get(auth::OWNER_COOKIE)) {
            (Some(token), Some(cookie)) => cookie.value() == token,
            _ => false,
        }
    }

    pub(crate) fn claim_owner(&self) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(token.clone());
        token
    }

    pub(crate) fn release_owner(&self) {
        self.owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

pub fn router(state: WebState) -> Router {
    info!(task = "build router");

    // protected
    let editor_router = Router::new()
        .route("/", get(editor::get_editor).post(editor::post_editor))
        .route(
            "/sil/:id",
            get(editor::get_delete).post(editor::post_delete),
        )
        .route("/sil/:id/iptal", post(editor::cancel_delete))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::gate))
        .layer(DefaultBodyLimit::max(FORM_BODY_LIMIT));

    Router::new()
        .route("/", get(home::get_home))
        .route("/yazi/:id", get(article::get_article))
        .route("/article/:id", get(article::redirect_legacy))
        .route("/gizli-oda", get(auth::get_sign_in).post(auth::post_sign_in))
        .route("/cikis", post(auth::post_sign_out))
        .route("/createpost", get(editor::redirect_legacy))
        .route("/iletisim", get(contact::get_contact))
        .route("/placeholder.svg", get(placeholder::get_placeholder))
        .route("/healthz", get(healthz::get_health))
        .nest("/yeni", editor_router)
        .fallback(not_found::get_404)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
