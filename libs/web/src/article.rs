use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use blog::detail::{DetailView, NOT_FOUND_MESSAGE};
use entity::prelude::*;

use crate::{
    response::{render, WebError},
    templates::{ArticleTemplate, Nav, NotFoundTemplate},
    WebState,
};

pub(super) async fn get_article(
    State(state): State<WebState>,
    nav: Nav,
    Path(id): Path<String>,
) -> Response {
    match state.shell.detail().open(&id).await {
        DetailView::Ready(article) => render(ArticleTemplate {
            nav,
            placeholder: state.shell.config().placeholder_image.clone(),
            article,
        }),
        DetailView::NotFound { message } => (
            StatusCode::NOT_FOUND,
            render(NotFoundTemplate {
                nav,
                message,
            }),
        )
            .into_response(),
        DetailView::Failed { message } => {
            WebError::UpstreamError(message).into_response()
        }
    }
}

/// Old links used `/article/:id`.
pub(super) async fn redirect_legacy(Path(id): Path<String>) -> Response {
    match id.parse::<PostId>() {
        Ok(id) => Redirect::permanent(&format!("/yazi/{id}")).into_response(),
        Err(_) => WebError::NotFound(NOT_FOUND_MESSAGE.to_string())
            .into_response(),
    }
}
