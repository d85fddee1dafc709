use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    response::{render, WebResponse},
    templates::{Nav, SignInTemplate},
    WebState,
};

pub(crate) const OWNER_COOKIE: &str = "sanat_owner";
const EDITOR_ROUTE: &str = "/yeni";

#[derive(Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[async_trait]
impl FromRequestParts<WebState> for Nav {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WebState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        Ok(Nav {
            privileged: state.owns(&jar),
        })
    }
}

pub(super) async fn get_sign_in(nav: Nav) -> Response {
    if nav.privileged {
        return Redirect::to(EDITOR_ROUTE).into_response();
    }

    render(SignInTemplate {
        nav,
        email: String::new(),
        error: String::new(),
    })
}

pub(super) async fn post_sign_in(
    State(state): State<WebState>,
    nav: Nav,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Response {
    match state.shell.sign_in(&form.email, &form.password).await {
        Ok(()) => {
            let cookie = Cookie::build((OWNER_COOKIE, state.claim_owner()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Strict);
            (jar.add(cookie), Redirect::to(EDITOR_ROUTE)).into_response()
        }
        Err(e) => {
            warn!(task = "sign in", error = e.to_string());
            let page = render(SignInTemplate {
                nav,
                email: form.email,
                error: e.to_string(),
            });
            (StatusCode::UNAUTHORIZED, page).into_response()
        }
    }
}

/// Only the browser that signed in can sign the session out.
pub(super) async fn post_sign_out(
    State(state): State<WebState>,
    jar: CookieJar,
) -> WebResponse<(CookieJar, Redirect)> {
    if !state.owns(&jar) {
        info!(task = "sign out", "not the signed-in browser");
        return Ok((jar, Redirect::to("/")));
    }

    state.shell.sign_out().await?;
    state.release_owner();

    let jar = jar.remove(Cookie::build(OWNER_COOKIE).path("/"));
    Ok((jar, Redirect::to("/")))
}
