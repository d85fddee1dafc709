use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use blog::gate::{GateDecision, SIGN_IN_ROUTE};
use tracing::info;

use crate::{
    response::render,
    templates::{GatePendingTemplate, Nav},
    WebState,
};

/// Route guard for the editor pages. Unresolved sessions get a neutral
/// page that reloads itself; nothing protected is rendered until then.
/// A privileged session only opens the editor for the browser holding
/// the sign-in cookie.
pub async fn gate(
    State(state): State<WebState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    match state.shell.gate().decision() {
        GateDecision::Render if state.owns(&jar) => next.run(request).await,
        GateDecision::Render => {
            info!(
                task = "gate",
                path = request.uri().path(),
                "not the signed-in browser"
            );
            Redirect::to(SIGN_IN_ROUTE).into_response()
        }
        GateDecision::Redirect { to, .. } => {
            info!(task = "gate", path = request.uri().path(), to);
            Redirect::to(to).into_response()
        }
        GateDecision::Placeholder => render(GatePendingTemplate {
            nav: Nav::default(),
        }),
    }
}
