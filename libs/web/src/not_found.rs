use axum::{http::StatusCode, response::IntoResponse};

use crate::{
    response::render,
    templates::{Nav, NotFoundTemplate},
};

pub(super) async fn get_404(nav: Nav) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        render(NotFoundTemplate {
            nav,
            message: "Aradığınız sayfa bu kütüphanede yok.".to_string(),
        }),
    )
}
